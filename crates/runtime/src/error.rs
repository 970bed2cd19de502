//! Error types for the browser runtime.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Result type alias for runtime operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the browser runtime.
#[derive(Debug, Error)]
pub enum Error {
	/// No browser binary was given and none could be discovered.
	#[error("Browser executable not found. Install Chrome/Chromium or set CDP_BROWSER_PATH.")]
	BrowserNotFound,

	/// Failed to start the browser process, or it exited during startup.
	#[error("Failed to launch browser: {0}")]
	LaunchFailed(String),

	/// Working directory could not be created.
	#[error("Failed to create working directory {}: {source}", path.display())]
	Workdir {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	/// Output capture file could not be opened.
	#[error("Failed to open output file {}: {source}", path.display())]
	OutputCapture {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	/// Readiness polling exhausted its attempts.
	#[error("Browser debugging endpoint not ready after {attempts} attempts: {last_error}")]
	NotReady { attempts: u32, last_error: String },

	/// Discovery endpoint answered with a non-success status or an undecodable body.
	#[error("Discovery query failed with status {status}: {body}")]
	Query { status: u16, body: String },

	/// Discovery endpoint could not be reached.
	#[error("HTTP error: {0}")]
	Http(#[from] reqwest::Error),

	/// Socket handshake with a target failed.
	#[error("Failed to connect to {url}: {reason}")]
	DialFailed { url: String, reason: String },

	/// Transport-level failure while writing or reading frames.
	#[error("Transport error: {0}")]
	Transport(String),

	/// Protocol-level violation (bad frame, missing field).
	#[error("Protocol error: {0}")]
	Protocol(String),

	/// The remote side rejected a command.
	#[error("Remote error {code}: {message}")]
	Remote {
		code: i64,
		message: String,
		data: Option<String>,
	},

	/// Connection closed while the command was pending, or before it was sent.
	#[error("Connection closed")]
	ConnectionClosed,

	/// The target reported a renderer crash; the connection is gone.
	#[error("Target crashed")]
	TargetCrashed,

	/// Command did not resolve in time.
	#[error("Timeout after {}ms waiting for '{method}'", duration.as_millis())]
	Timeout { method: String, duration: Duration },

	/// The waiting caller was cancelled before a response arrived.
	#[error("Command cancelled")]
	Cancelled,

	/// Invalid argument provided to an operation.
	#[error("Invalid argument: {0}")]
	InvalidArgument(String),

	/// I/O error.
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	/// JSON serialization/deserialization error.
	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),
}

impl Error {
	/// Returns true if this is a timeout error.
	pub fn is_timeout(&self) -> bool {
		matches!(self, Error::Timeout { .. })
	}

	/// Returns true if the failure means the connection is gone.
	pub fn is_closed(&self) -> bool {
		matches!(self, Error::ConnectionClosed | Error::TargetCrashed)
	}

	/// Returns true for failures surfaced by process launch.
	pub fn is_launch_error(&self) -> bool {
		matches!(
			self,
			Error::BrowserNotFound
				| Error::LaunchFailed(_)
				| Error::Workdir { .. }
				| Error::OutputCapture { .. }
				| Error::NotReady { .. }
		)
	}

	/// Returns the remote error code if the browser rejected the command.
	pub fn remote_code(&self) -> Option<i64> {
		match self {
			Error::Remote { code, .. } => Some(*code),
			_ => None,
		}
	}

	/// Produces an equivalent error for fan-out to several waiters.
	///
	/// Only variants that can terminate a connection need to be cloned; anything
	/// else degrades to [`Error::Transport`] with the same message.
	pub(crate) fn duplicate(&self) -> Error {
		match self {
			Error::ConnectionClosed => Error::ConnectionClosed,
			Error::TargetCrashed => Error::TargetCrashed,
			Error::Protocol(msg) => Error::Protocol(msg.clone()),
			Error::Transport(msg) => Error::Transport(msg.clone()),
			other => Error::Transport(other.to_string()),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn timeout_message_includes_method() {
		let err = Error::Timeout {
			method: "Page.navigate".into(),
			duration: Duration::from_millis(1500),
		};
		assert!(err.is_timeout());
		assert_eq!(err.to_string(), "Timeout after 1500ms waiting for 'Page.navigate'");
	}

	#[test]
	fn classifies_launch_errors() {
		assert!(Error::BrowserNotFound.is_launch_error());
		assert!(
			Error::NotReady {
				attempts: 3,
				last_error: "refused".into()
			}
			.is_launch_error()
		);
		assert!(!Error::ConnectionClosed.is_launch_error());
	}

	#[test]
	fn remote_code_only_for_remote() {
		let err = Error::Remote {
			code: -32000,
			message: "Cannot navigate".into(),
			data: None,
		};
		assert_eq!(err.remote_code(), Some(-32000));
		assert_eq!(Error::Cancelled.remote_code(), None);
	}

	#[test]
	fn duplicate_preserves_closed_kinds() {
		assert!(matches!(Error::TargetCrashed.duplicate(), Error::TargetCrashed));
		assert!(Error::ConnectionClosed.duplicate().is_closed());
		assert!(matches!(Error::Protocol("x".into()).duplicate(), Error::Protocol(m) if m == "x"));
	}
}
