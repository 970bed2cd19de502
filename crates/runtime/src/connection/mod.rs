//! Protocol connection to a single target.
//!
//! A [`Connection`] owns one duplex transport. Outbound commands are written
//! under a single lock that also allocates the request id and records the
//! pending entry, so ids on the wire are strictly increasing and a response can
//! only ever resolve the caller that sent the matching id.
//!
//! Exactly one background task reads the transport for the connection's
//! lifetime. It routes responses to their pending callers, hands notifications
//! to the [`EventRouter`], and on exit resolves every outstanding command with
//! the reason the connection ended.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use cdp_protocol::{Message, Request, Response};
use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::{Mutex as AsyncMutex, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::ConnectionOptions;
use crate::error::{Error, Result};
use crate::events::{EventHandler, EventRouter};
use crate::transport::{TransportParts, TransportReceiver, TransportSender, WebSocketTransport};

mod pending;

use pending::PendingTable;

/// How long [`Connection::close`] waits for the outbound side to shut down.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Lifecycle of a [`Connection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
	Open,
	/// Closed locally, by the peer, or after a transport failure.
	Closed,
	/// The target reported a crash.
	Crashed,
}

impl ConnectionState {
	pub fn is_open(self) -> bool {
		self == ConnectionState::Open
	}
}

struct Writer {
	/// Next id to hand out. Starts at 1 and only grows.
	next_id: u64,
	sender: Box<dyn TransportSender>,
}

/// State shared between callers and the read loop.
struct Shared {
	endpoint: String,
	pending: PendingTable,
	events: EventRouter,
	state: watch::Sender<ConnectionState>,
	options: ConnectionOptions,
}

impl Shared {
	/// Ends the connection: records the final state and fails all pending commands.
	fn shutdown(&self, reason: &Error) {
		let next = match reason {
			Error::TargetCrashed => ConnectionState::Crashed,
			_ => ConnectionState::Closed,
		};
		let changed = self.state.send_if_modified(|state| {
			if state.is_open() {
				*state = next;
				true
			} else {
				false
			}
		});
		let drained = self.pending.close(reason);
		if changed {
			info!(endpoint = %self.endpoint, state = ?next, drained, "connection closed");
		}
	}

	fn complete(&self, response: Response) {
		let id = response.id;
		let reply = match (response.error, response.result) {
			(Some(error), _) => Err(Error::Remote {
				code: error.code,
				message: error.message,
				data: error.data,
			}),
			(None, Some(result)) => Ok(result),
			(None, None) => Ok(Value::Object(serde_json::Map::new())),
		};
		if !self.pending.complete(id, reply) {
			warn!(id, "dropping response for unknown command id");
		}
	}

	/// Frames that are valid JSON but neither a response nor a notification.
	fn complete_unrecognized(&self, frame: Value) {
		match frame.get("id").and_then(Value::as_u64) {
			Some(id) => {
				let reply = Err(Error::Protocol(format!("unrecognized response frame: {frame}")));
				if !self.pending.complete(id, reply) {
					warn!(id, "dropping unrecognized frame for unknown command id");
				}
			}
			None => warn!(%frame, "ignoring unrecognized frame"),
		}
	}
}

struct Inner {
	shared: Arc<Shared>,
	writer: AsyncMutex<Writer>,
	reader: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for Inner {
	fn drop(&mut self) {
		if let Some(handle) = self.reader.get_mut().take() {
			handle.abort();
		}
		self.shared.shutdown(&Error::ConnectionClosed);
	}
}

/// Handle to an open protocol connection.
///
/// Cheap to clone; all clones share the same socket, pending table and
/// subscriptions. The connection is torn down by [`Connection::close`], by the
/// peer, or when the last handle is dropped.
#[derive(Clone)]
pub struct Connection {
	inner: Arc<Inner>,
}

impl Connection {
	/// Dials a target's `webSocketDebuggerUrl` with default options.
	pub async fn open(url: &str) -> Result<Self> {
		Self::open_with(url, ConnectionOptions::default()).await
	}

	/// Dials a target's `webSocketDebuggerUrl`.
	///
	/// # Errors
	///
	/// Returns [`Error::DialFailed`] if the handshake fails.
	pub async fn open_with(url: &str, options: ConnectionOptions) -> Result<Self> {
		let parts = WebSocketTransport::connect(url).await?;
		Ok(Self::from_transport(url, parts, options))
	}

	/// Starts a connection over an already-established transport.
	///
	/// Must be called from within a tokio runtime; the read loop is spawned
	/// immediately.
	pub fn from_transport(endpoint: impl Into<String>, parts: TransportParts, options: ConnectionOptions) -> Self {
		let TransportParts { sender, receiver } = parts;
		let (state, _) = watch::channel(ConnectionState::Open);
		let shared = Arc::new(Shared {
			endpoint: endpoint.into(),
			pending: PendingTable::new(),
			events: EventRouter::new(options.event_concurrency),
			state,
			options,
		});

		let reader = tokio::spawn(read_loop(receiver, Arc::clone(&shared)));

		Self {
			inner: Arc::new(Inner {
				shared,
				writer: AsyncMutex::new(Writer { next_id: 1, sender }),
				reader: Mutex::new(Some(reader)),
			}),
		}
	}

	/// The address this connection was opened against.
	pub fn endpoint(&self) -> &str {
		&self.inner.shared.endpoint
	}

	/// Subscription table for this connection's notifications.
	pub fn events(&self) -> &EventRouter {
		&self.inner.shared.events
	}

	pub fn options(&self) -> &ConnectionOptions {
		&self.inner.shared.options
	}

	pub fn state(&self) -> ConnectionState {
		*self.inner.shared.state.borrow()
	}

	/// Receiver observing state transitions.
	pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
		self.inner.shared.state.subscribe()
	}

	/// Resolves once the connection leaves [`ConnectionState::Open`].
	pub async fn closed(&self) -> ConnectionState {
		let mut rx = self.watch_state();
		match rx.wait_for(|state| !state.is_open()).await {
			Ok(state) => *state,
			Err(_) => ConnectionState::Closed,
		}
	}

	/// Number of commands awaiting a response.
	pub fn pending_count(&self) -> usize {
		self.inner.shared.pending.len()
	}

	/// Sends a command and waits for its result, bounded by the configured
	/// default timeout.
	pub async fn send(&self, method: &str, params: Value) -> Result<Value> {
		self.send_with_timeout(method, params, self.inner.shared.options.command_timeout)
			.await
	}

	/// Sends a command and waits at most `timeout` for its result.
	///
	/// `None` waits until the response arrives or the connection closes.
	/// Timing out, or dropping the returned future, removes the pending
	/// entry, so a late response is logged and discarded.
	///
	/// # Errors
	///
	/// - [`Error::Remote`] if the target rejected the command
	/// - [`Error::Timeout`] if no response arrived in time
	/// - [`Error::ConnectionClosed`] / [`Error::TargetCrashed`] if the
	///   connection ended first
	/// - [`Error::Transport`] if the frame could not be written
	pub async fn send_with_timeout(&self, method: &str, params: Value, timeout: Option<Duration>) -> Result<Value> {
		let (rx, mut guard) = self.write_command(method, params).await?;

		let received = match timeout {
			Some(duration) => tokio::time::timeout(duration, rx).await.map_err(|_| {
				debug!(method, "command timed out");
				Error::Timeout {
					method: method.to_string(),
					duration,
				}
			})?,
			None => rx.await,
		};
		guard.disarm();

		received.unwrap_or(Err(Error::ConnectionClosed))
	}

	/// Sends a command that is abandoned as soon as `cancel` resolves.
	///
	/// # Errors
	///
	/// Returns [`Error::Cancelled`] if `cancel` completes first; otherwise as
	/// [`Connection::send_with_timeout`] without a timeout.
	pub async fn send_until<F>(&self, method: &str, params: Value, cancel: F) -> Result<Value>
	where
		F: Future<Output = ()>,
	{
		let (rx, mut guard) = self.write_command(method, params).await?;

		tokio::select! {
			received = rx => {
				guard.disarm();
				received.unwrap_or(Err(Error::ConnectionClosed))
			}
			() = cancel => {
				debug!(method, "command cancelled");
				Err(Error::Cancelled)
			}
		}
	}

	/// Typed wrapper around [`Connection::send`].
	pub async fn call<P, R>(&self, method: &str, params: &P) -> Result<R>
	where
		P: Serialize + ?Sized,
		R: DeserializeOwned,
	{
		let params = serde_json::to_value(params)?;
		let result = self.send(method, params).await?;
		Ok(serde_json::from_value(result)?)
	}

	/// Waits for the next `name` notification and returns its parameters.
	///
	/// # Errors
	///
	/// Returns [`Error::Timeout`] if it does not arrive in time, or the close
	/// reason if the connection ends first.
	pub async fn wait_for_event(&self, name: &str, timeout: Duration) -> Result<Value> {
		let (tx, rx) = oneshot::channel();
		let slot = Arc::new(Mutex::new(Some(tx)));
		let handler = EventHandler::raw(move |params| {
			let slot = Arc::clone(&slot);
			async move {
				if let Some(tx) = slot.lock().take() {
					let _ = tx.send(params);
				}
				Ok(())
			}
		});
		self.events().subscribe(name, handler.clone());

		let outcome = tokio::select! {
			received = tokio::time::timeout(timeout, rx) => match received {
				Ok(Ok(params)) => Ok(params),
				Ok(Err(_)) => Err(Error::ConnectionClosed),
				Err(_) => Err(Error::Timeout { method: name.to_string(), duration: timeout }),
			},
			state = self.closed() => Err(match state {
				ConnectionState::Crashed => Error::TargetCrashed,
				_ => Error::ConnectionClosed,
			}),
		};

		self.events().unsubscribe(name, &handler);
		outcome
	}

	/// Closes the connection.
	///
	/// Every pending command resolves with [`Error::ConnectionClosed`] and
	/// later sends fail immediately. Idempotent.
	pub async fn close(&self) {
		self.inner.shared.shutdown(&Error::ConnectionClosed);

		let reader = self.inner.reader.lock().take();
		if let Some(handle) = reader {
			handle.abort();
		}

		match tokio::time::timeout(CLOSE_TIMEOUT, self.inner.writer.lock()).await {
			Ok(mut writer) => {
				if let Ok(Err(e)) = tokio::time::timeout(CLOSE_TIMEOUT, writer.sender.close()).await {
					debug!(error = %e, "transport close failed");
				}
			}
			Err(_) => warn!(endpoint = %self.endpoint(), "writer busy; abandoning transport close"),
		}
	}

	/// Allocates an id, records the pending entry and writes the frame.
	///
	/// All three happen under the writer lock. If the write fails the entry is
	/// removed before the error is returned.
	async fn write_command(
		&self,
		method: &str,
		params: Value,
	) -> Result<(oneshot::Receiver<Result<Value>>, pending::PendingGuard)> {
		let shared = &self.inner.shared;
		let mut writer = self.inner.writer.lock().await;

		let id = writer.next_id;
		writer.next_id += 1;

		let frame = serde_json::to_string(&Request::new(id, method, params))?;
		let rx = shared.pending.insert(id)?;
		let guard = shared.pending.guard(id);

		debug!(id, method, "sending command");
		if let Err(e) = writer.sender.send(frame).await {
			warn!(id, method, error = %e, "command write failed");
			return Err(e);
		}

		Ok((rx, guard))
	}
}

impl std::fmt::Debug for Connection {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Connection")
			.field("endpoint", &self.endpoint())
			.field("state", &self.state())
			.field("pending", &self.pending_count())
			.finish()
	}
}

async fn read_loop(mut receiver: Box<dyn TransportReceiver>, shared: Arc<Shared>) {
	let reason = read_until_fatal(&mut receiver, &shared).await;
	shared.shutdown(&reason);
}

/// Reads frames until the connection can no longer be used and returns why.
async fn read_until_fatal(receiver: &mut Box<dyn TransportReceiver>, shared: &Shared) -> Error {
	let mut malformed: u32 = 0;
	loop {
		let frame = match receiver.recv().await {
			Ok(Some(frame)) => frame,
			Ok(None) => {
				debug!(endpoint = %shared.endpoint, "transport reached end of stream");
				return Error::ConnectionClosed;
			}
			Err(e) => {
				warn!(endpoint = %shared.endpoint, error = %e, "transport read failed");
				return Error::ConnectionClosed;
			}
		};

		let message = match Message::parse(&frame) {
			Ok(message) => {
				malformed = 0;
				message
			}
			Err(e) => {
				malformed = malformed.saturating_add(1);
				warn!(error = %e, malformed, "discarding malformed frame");
				let limit = shared.options.max_malformed_frames;
				if limit > 0 && malformed >= limit {
					error!(malformed, "too many consecutive malformed frames");
					return Error::Protocol(format!("{malformed} consecutive malformed frames"));
				}
				continue;
			}
		};

		match message {
			Message::Response(response) => shared.complete(response),
			Message::Event(event) if event.is_target_crashed() => {
				error!(endpoint = %shared.endpoint, "target crashed");
				return Error::TargetCrashed;
			}
			Message::Event(event) => shared.events.dispatch(event),
			Message::Unknown(frame) => shared.complete_unrecognized(Value::Object(frame)),
		}
	}
}
