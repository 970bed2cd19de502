use std::time::Duration;

use cdp::ConnectionOptions;
use serde_json::Value;
use tracing::info;

use super::{connect, emit};
use crate::error::{CliError, Result};
use crate::output::OutputFormat;

pub async fn execute(
	endpoint: &str,
	method: &str,
	params: Option<&str>,
	target: Option<&str>,
	timeout_ms: u64,
	format: OutputFormat,
) -> Result<()> {
	let params = parse_params(params)?;
	let options = ConnectionOptions::default().with_command_timeout(Some(Duration::from_millis(timeout_ms)));
	let (browser, info, connection) = connect(endpoint, target, options).await?;

	info!(target = %info.id, method, "sending command");
	let outcome = connection.send(method, params).await;
	browser.close().await?;

	emit("send", outcome?, format);
	Ok(())
}

/// Accepts a JSON object, or nothing at all.
fn parse_params(raw: Option<&str>) -> Result<Value> {
	let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
		return Ok(Value::Object(Default::default()));
	};
	match serde_json::from_str(raw)? {
		value @ Value::Object(_) => Ok(value),
		other => Err(CliError::InvalidInput(format!("params must be a JSON object, got {other}"))),
	}
}
