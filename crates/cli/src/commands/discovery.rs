//! Commands that only talk to the HTTP discovery endpoint.

use cdp::{TargetInfo, TargetRegistry};
use colored::Colorize;
use serde_json::json;
use tracing::info;

use super::emit;
use crate::error::Result;
use crate::output::OutputFormat;

pub async fn version(endpoint: &str, format: OutputFormat) -> Result<()> {
	let version = TargetRegistry::new(endpoint)?.version().await?;
	match format {
		OutputFormat::Text => {
			println!("{} {}", "browser ".dimmed(), version.browser);
			println!("{} {}", "protocol".dimmed(), version.protocol_version);
			if !version.user_agent.is_empty() {
				println!("{} {}", "agent   ".dimmed(), version.user_agent);
			}
		}
		_ => emit("version", version, format),
	}
	Ok(())
}

pub async fn tabs(endpoint: &str, all: bool, format: OutputFormat) -> Result<()> {
	let mut targets = TargetRegistry::new(endpoint)?.list_targets().await?;
	if !all {
		targets.retain(TargetInfo::is_page);
	}
	match format {
		OutputFormat::Text => {
			for target in &targets {
				print_target(target, all);
			}
		}
		_ => emit("tabs", targets, format),
	}
	Ok(())
}

pub async fn open(endpoint: &str, url: &str, format: OutputFormat) -> Result<()> {
	let target = TargetRegistry::new(endpoint)?.new_target(url).await?;
	info!(id = %target.id, url, "opened tab");
	match format {
		OutputFormat::Text => print_target(&target, false),
		_ => emit("open", target, format),
	}
	Ok(())
}

pub async fn close(endpoint: &str, id: &str, command: &str, format: OutputFormat) -> Result<()> {
	TargetRegistry::new(endpoint)?.close_target(id).await?;
	info!(id, "closed target");
	emit(command, json!({ "id": id }), format);
	Ok(())
}

pub async fn activate(endpoint: &str, id: &str, command: &str, format: OutputFormat) -> Result<()> {
	TargetRegistry::new(endpoint)?.activate_target(id).await?;
	emit(command, json!({ "id": id }), format);
	Ok(())
}

fn print_target(target: &TargetInfo, with_type: bool) {
	let title = if target.title.is_empty() {
		"(untitled)"
	} else {
		target.title.as_str()
	};
	if with_type {
		println!(
			"{}  {:<15} {}  {}",
			target.id.yellow(),
			target.target_type,
			title.bold(),
			target.url.dimmed()
		);
	} else {
		println!("{}  {}  {}", target.id.yellow(), title.bold(), target.url.dimmed());
	}
}
