use thiserror::Error;

use crate::output::{CommandError, ErrorCode};

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
	#[error("no target with id {0}")]
	TargetNotFound(String),

	#[error("invalid input: {0}")]
	InvalidInput(String),

	#[error(transparent)]
	Runtime(#[from] cdp::Error),

	#[error(transparent)]
	Json(#[from] serde_json::Error),

	#[error(transparent)]
	Anyhow(#[from] anyhow::Error),
}

impl CliError {
	/// Maps this error onto the structured envelope.
	pub fn to_command_error(&self) -> CommandError {
		let (code, details) = match self {
			CliError::TargetNotFound(id) => (ErrorCode::TargetNotFound, Some(serde_json::json!({ "id": id }))),
			CliError::InvalidInput(_) | CliError::Json(_) => (ErrorCode::InvalidInput, None),
			CliError::Runtime(err) => classify(err),
			CliError::Anyhow(_) => (ErrorCode::InternalError, None),
		};
		CommandError {
			code,
			message: self.to_string(),
			details,
		}
	}
}

fn classify(err: &cdp::Error) -> (ErrorCode, Option<serde_json::Value>) {
	use cdp::Error;

	if err.is_launch_error() {
		return (ErrorCode::BrowserLaunchFailed, None);
	}
	match err {
		Error::Http(_) | Error::DialFailed { .. } => (ErrorCode::EndpointUnreachable, None),
		Error::Query { status: 404, .. } => (ErrorCode::TargetNotFound, None),
		Error::Query { status, .. } => (ErrorCode::EndpointUnreachable, Some(serde_json::json!({ "status": status }))),
		Error::Remote { code, data, .. } => (
			ErrorCode::RemoteError,
			Some(serde_json::json!({ "code": code, "data": data })),
		),
		Error::Timeout { method, duration } => (
			ErrorCode::Timeout,
			Some(serde_json::json!({ "method": method, "timeoutMs": duration.as_millis() as u64 })),
		),
		Error::TargetCrashed => (ErrorCode::TargetCrashed, None),
		Error::ConnectionClosed | Error::Transport(_) | Error::Protocol(_) => (ErrorCode::ConnectionClosed, None),
		Error::InvalidArgument(_) | Error::Json(_) => (ErrorCode::InvalidInput, None),
		Error::Io(_) => (ErrorCode::IoError, None),
		_ => (ErrorCode::InternalError, None),
	}
}
