//! Result envelope shared by every command.
//!
//! Machine formats wrap each result as
//!
//! ```json
//! { "ok": true, "command": "tabs", "data": [ ... ] }
//! ```
//!
//! and failures as
//!
//! ```json
//! { "ok": false, "command": "send", "error": { "code": "REMOTE_ERROR", "message": "..." } }
//! ```

use std::io::{self, Write};

use colored::Colorize;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
	/// Human-readable text
	#[default]
	Text,
	/// Pretty-printed JSON envelope
	Json,
	/// One JSON envelope per line
	Ndjson,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CommandResult<T> {
	pub ok: bool,
	pub command: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub data: Option<T>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<CommandError>,
}

impl<T> CommandResult<T> {
	pub fn success(command: &str, data: T) -> Self {
		Self {
			ok: true,
			command: command.to_string(),
			data: Some(data),
			error: None,
		}
	}

	pub fn failure(command: &str, error: CommandError) -> Self {
		Self {
			ok: false,
			command: command.to_string(),
			data: None,
			error: Some(error),
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandError {
	pub code: ErrorCode,
	pub message: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub details: Option<Value>,
}

/// Stable error codes for scripts consuming the JSON envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
	BrowserLaunchFailed,
	EndpointUnreachable,
	TargetNotFound,
	TargetCrashed,
	ConnectionClosed,
	RemoteError,
	Timeout,
	InvalidInput,
	IoError,
	InternalError,
}

impl std::fmt::Display for ErrorCode {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let code = match self {
			ErrorCode::BrowserLaunchFailed => "BROWSER_LAUNCH_FAILED",
			ErrorCode::EndpointUnreachable => "ENDPOINT_UNREACHABLE",
			ErrorCode::TargetNotFound => "TARGET_NOT_FOUND",
			ErrorCode::TargetCrashed => "TARGET_CRASHED",
			ErrorCode::ConnectionClosed => "CONNECTION_CLOSED",
			ErrorCode::RemoteError => "REMOTE_ERROR",
			ErrorCode::Timeout => "TIMEOUT",
			ErrorCode::InvalidInput => "INVALID_INPUT",
			ErrorCode::IoError => "IO_ERROR",
			ErrorCode::InternalError => "INTERNAL_ERROR",
		};
		f.write_str(code)
	}
}

pub fn print_result<T: Serialize>(result: &CommandResult<T>, format: OutputFormat) {
	match format {
		OutputFormat::Json => {
			if let Ok(json) = serde_json::to_string_pretty(result) {
				println!("{json}");
			}
		}
		OutputFormat::Ndjson => {
			if let Ok(json) = serde_json::to_string(result) {
				println!("{json}");
			}
		}
		OutputFormat::Text => print_result_text(result),
	}
}

/// Strings print bare, everything else as pretty JSON.
fn print_result_text<T: Serialize>(result: &CommandResult<T>) {
	let mut stdout = io::stdout().lock();
	if let Some(data) = &result.data {
		match serde_json::to_value(data) {
			Ok(Value::String(s)) => {
				let _ = writeln!(stdout, "{s}");
			}
			Ok(Value::Null) => {}
			Ok(value) => {
				if let Ok(json) = serde_json::to_string_pretty(&value) {
					let _ = writeln!(stdout, "{json}");
				}
			}
			Err(_) => {}
		}
	} else if let Some(error) = &result.error {
		let _ = writeln!(stdout, "Error [{}]: {}", error.code, error.message);
	}
}

/// Prints one notification as it arrives.
pub fn print_event(method: &str, params: &Value, format: OutputFormat) {
	match format {
		OutputFormat::Text => {
			let params = serde_json::to_string(params).unwrap_or_default();
			println!("{} {}", method.cyan().bold(), params.dimmed());
		}
		OutputFormat::Json | OutputFormat::Ndjson => {
			println!("{}", serde_json::json!({ "method": method, "params": params }));
		}
	}
}

pub fn print_error_stderr(error: &CommandError) {
	eprintln!("{} [{}]: {}", "error".red().bold(), error.code, error.message);
	if let Some(details) = &error.details {
		eprintln!("  {}", details.to_string().dimmed());
	}
}
