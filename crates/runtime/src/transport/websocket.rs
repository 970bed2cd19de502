use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info};

use super::{TransportFuture, TransportParts, TransportReceiver, TransportSender};
use crate::error::{Error, Result};

/// WebSocket transport to a target's control socket.
pub struct WebSocketTransport;

impl WebSocketTransport {
	/// Performs the WebSocket handshake with `url`.
	///
	/// # Errors
	///
	/// Returns [`Error::DialFailed`] if the handshake fails.
	pub async fn connect(url: &str) -> Result<TransportParts> {
		debug!(url, "connecting to control socket");

		let (stream, _) = tokio_tungstenite::connect_async(url)
			.await
			.map_err(|e| Error::DialFailed {
				url: url.to_string(),
				reason: e.to_string(),
			})?;

		info!(url, "control socket connected");
		Ok(Self::from_stream(stream))
	}

	/// Wraps an already-upgraded stream.
	pub fn from_stream<S>(stream: WebSocketStream<S>) -> TransportParts
	where
		S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send + 'static,
	{
		let (sink, stream) = stream.split();
		TransportParts {
			sender: Box::new(WebSocketSender { sink }),
			receiver: Box::new(WebSocketReceiver { stream }),
		}
	}
}

struct WebSocketSender<S> {
	sink: SplitSink<WebSocketStream<S>, Message>,
}

struct WebSocketReceiver<S> {
	stream: SplitStream<WebSocketStream<S>>,
}

impl<S> TransportSender for WebSocketSender<S>
where
	S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send + 'static,
{
	fn send(&mut self, frame: String) -> TransportFuture<'_, ()> {
		Box::pin(async move {
			self.sink
				.send(Message::Text(frame.into()))
				.await
				.map_err(|e| Error::Transport(format!("WebSocket write failed: {e}")))
		})
	}

	fn close(&mut self) -> TransportFuture<'_, ()> {
		Box::pin(async move {
			self.sink
				.close()
				.await
				.map_err(|e| Error::Transport(format!("WebSocket close failed: {e}")))
		})
	}
}

impl<S> TransportReceiver for WebSocketReceiver<S>
where
	S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send + 'static,
{
	fn recv(&mut self) -> TransportFuture<'_, Option<String>> {
		Box::pin(async move {
			while let Some(message) = self.stream.next().await {
				let message = message.map_err(|e| Error::Transport(format!("WebSocket read failed: {e}")))?;
				match message {
					Message::Text(text) => return Ok(Some(text.to_string())),
					Message::Binary(bytes) => return Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
					Message::Close(frame) => {
						debug!(?frame, "WebSocket closed by remote");
						return Ok(None);
					}
					// Ping/Pong are answered by tungstenite itself.
					_ => continue,
				}
			}
			Ok(None)
		})
	}
}
