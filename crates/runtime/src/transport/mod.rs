//! Frame transports between a [`Connection`](crate::Connection) and a target.
//!
//! A transport moves whole JSON text frames and nothing else: it does not
//! parse them. Two implementations exist:
//!
//! - [`WebSocketTransport`]: the target's `webSocketDebuggerUrl`
//! - [`PipeTransport`]: NUL-delimited frames over any byte stream pair, the
//!   framing used by `--remote-debugging-pipe`
//!
//! Both split into an independent sender and receiver so the read loop can own
//! the receiving half while callers share the sending half.

use std::future::Future;
use std::pin::Pin;

use crate::error::Result;

mod pipe;
mod websocket;

pub use pipe::PipeTransport;
pub use websocket::WebSocketTransport;

/// Boxed transport future.
pub type TransportFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Sending half of a transport.
pub trait TransportSender: Send {
	/// Writes one complete frame.
	fn send(&mut self, frame: String) -> TransportFuture<'_, ()>;

	/// Closes the outbound direction. Further sends fail.
	fn close(&mut self) -> TransportFuture<'_, ()>;
}

/// Receiving half of a transport.
pub trait TransportReceiver: Send {
	/// Waits for the next frame.
	///
	/// `Ok(None)` means the peer ended the stream cleanly; `Err` means the
	/// stream broke. Either way the caller must stop reading.
	fn recv(&mut self) -> TransportFuture<'_, Option<String>>;
}

/// A connected transport split into its two halves.
pub struct TransportParts {
	pub sender: Box<dyn TransportSender>,
	pub receiver: Box<dyn TransportReceiver>,
}

impl std::fmt::Debug for TransportParts {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("TransportParts").finish_non_exhaustive()
	}
}
