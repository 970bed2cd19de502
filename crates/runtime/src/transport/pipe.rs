use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

use super::{TransportFuture, TransportParts, TransportReceiver, TransportSender};
use crate::error::{Error, Result};

/// Frame terminator on the pipe.
const DELIMITER: u8 = b'\0';

/// NUL-delimited JSON frames over a byte stream pair.
///
/// Each frame is the UTF-8 JSON text followed by a single `\0` byte.
pub struct PipeTransport;

impl PipeTransport {
	/// Builds a transport that reads frames from `reader` and writes to `writer`.
	pub fn new<R, W>(reader: R, writer: W) -> TransportParts
	where
		R: AsyncRead + Unpin + Send + 'static,
		W: AsyncWrite + Unpin + Send + 'static,
	{
		TransportParts {
			sender: Box::new(PipeSender { writer, closed: false }),
			receiver: Box::new(PipeReceiver {
				reader: BufReader::new(reader),
				buf: Vec::new(),
			}),
		}
	}
}

struct PipeSender<W> {
	writer: W,
	closed: bool,
}

struct PipeReceiver<R> {
	reader: BufReader<R>,
	buf: Vec<u8>,
}

impl<W> TransportSender for PipeSender<W>
where
	W: AsyncWrite + Unpin + Send + 'static,
{
	fn send(&mut self, frame: String) -> TransportFuture<'_, ()> {
		Box::pin(async move {
			if self.closed {
				return Err(Error::Transport("pipe already closed".into()));
			}
			write_frame(&mut self.writer, frame.as_bytes())
				.await
				.map_err(|e| Error::Transport(format!("pipe write failed: {e}")))
		})
	}

	fn close(&mut self) -> TransportFuture<'_, ()> {
		Box::pin(async move {
			if self.closed {
				return Ok(());
			}
			self.closed = true;
			self.writer
				.shutdown()
				.await
				.map_err(|e| Error::Transport(format!("pipe shutdown failed: {e}")))
		})
	}
}

impl<R> TransportReceiver for PipeReceiver<R>
where
	R: AsyncRead + Unpin + Send + 'static,
{
	fn recv(&mut self) -> TransportFuture<'_, Option<String>> {
		Box::pin(async move {
			self.buf.clear();
			let read = self
				.reader
				.read_until(DELIMITER, &mut self.buf)
				.await
				.map_err(|e| Error::Transport(format!("pipe read failed: {e}")))?;

			if read == 0 {
				return Ok(None);
			}
			if self.buf.last() != Some(&DELIMITER) {
				return Err(Error::Transport(format!(
					"pipe closed mid-frame after {} bytes",
					self.buf.len()
				)));
			}
			self.buf.pop();
			Ok(Some(String::from_utf8_lossy(&self.buf).into_owned()))
		})
	}
}

async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, payload: &[u8]) -> Result<()> {
	writer.write_all(payload).await?;
	writer.write_all(&[DELIMITER]).await?;
	writer.flush().await?;
	Ok(())
}
