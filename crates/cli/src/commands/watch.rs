use cdp::{ConnectionOptions, EventHandler};
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::connect;
use crate::error::Result;
use crate::output::{self, OutputFormat};

pub async fn execute(
	endpoint: &str,
	events: &[String],
	target: Option<&str>,
	count: Option<usize>,
	enable: bool,
	format: OutputFormat,
) -> Result<()> {
	let (browser, info, connection) = connect(endpoint, target, ConnectionOptions::default()).await?;
	let (tx, mut rx) = mpsc::unbounded_channel::<(String, Value)>();

	for name in events {
		let tx = tx.clone();
		let method = name.clone();
		connection.events().subscribe(
			name.as_str(),
			EventHandler::raw(move |params| {
				let _ = tx.send((method.clone(), params));
				async { Ok(()) }
			}),
		);
	}
	drop(tx);

	if enable {
		for domain in unique_domains(events) {
			if let Err(err) = connection.send(&format!("{domain}.enable"), json!({})).await {
				warn!(domain, error = %err, "could not enable domain");
			}
		}
	}
	info!(target = %info.id, events = ?events, "watching");

	let mut seen = 0usize;
	loop {
		tokio::select! {
			received = rx.recv() => {
				let Some((method, params)) = received else { break };
				output::print_event(&method, &params, format);
				seen += 1;
				if count.is_some_and(|limit| seen >= limit) {
					break;
				}
			}
			state = connection.closed() => {
				warn!(?state, "connection ended");
				break;
			}
			_ = tokio::signal::ctrl_c() => break,
		}
	}

	browser.close().await?;
	Ok(())
}

/// Domains of the given notification names, first occurrence order.
fn unique_domains(events: &[String]) -> Vec<&str> {
	let mut domains: Vec<&str> = Vec::new();
	for event in events {
		let Some((domain, _)) = event.split_once('.') else { continue };
		if !domains.contains(&domain) {
			domains.push(domain);
		}
	}
	domains
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn domains_are_deduplicated_in_order() {
		let events = vec![
			"Network.requestWillBeSent".to_string(),
			"Page.loadEventFired".to_string(),
			"Network.responseReceived".to_string(),
			"bogus".to_string(),
		];
		assert_eq!(unique_domains(&events), vec!["Network", "Page"]);
	}
}
