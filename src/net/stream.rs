//! The byte stream behind a connected transport socket.
//!
//! A connection carries exactly one of a plaintext or a secured stream. The
//! socket splits it into a read half and a write half; the write half sits
//! behind a FIFO lock so that overlapping sends never interleave.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf, ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{Mutex as AsyncMutex, MutexGuard as AsyncMutexGuard};
use tokio_rustls::server::TlsStream;

/// Current stream of a connection.
#[derive(Debug)]
pub enum ConnectionStream {
    Plain(TcpStream),
    Secured(Box<TlsStream<TcpStream>>),
}

impl ConnectionStream {
    pub fn is_secured(&self) -> bool {
        matches!(self, ConnectionStream::Secured(_))
    }
}

impl AsyncRead for ConnectionStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            ConnectionStream::Plain(s) => Pin::new(s).poll_read(cx, buf),
            ConnectionStream::Secured(s) => Pin::new(s.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for ConnectionStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            ConnectionStream::Plain(s) => Pin::new(s).poll_write(cx, buf),
            ConnectionStream::Secured(s) => Pin::new(s.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            ConnectionStream::Plain(s) => Pin::new(s).poll_flush(cx),
            ConnectionStream::Secured(s) => Pin::new(s.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            ConnectionStream::Plain(s) => Pin::new(s).poll_shutdown(cx),
            ConnectionStream::Secured(s) => Pin::new(s.as_mut()).poll_shutdown(cx),
        }
    }
}

/// The two halves of a connection stream, each behind its own lock.
///
/// `None` in both slots means the stream has been taken (handshake in
/// progress, handshake failed, or socket closed).
#[derive(Debug, Default)]
pub(crate) struct StreamSlots {
    pub(crate) reader: AsyncMutex<Option<ReadHalf<ConnectionStream>>>,
    pub(crate) writer: AsyncMutex<Option<WriteHalf<ConnectionStream>>>,
}

impl StreamSlots {
    pub(crate) fn new(stream: ConnectionStream) -> Self {
        let (reader, writer) = tokio::io::split(stream);
        Self {
            reader: AsyncMutex::new(Some(reader)),
            writer: AsyncMutex::new(Some(writer)),
        }
    }

    /// Lock the write half, then the read half.
    ///
    /// Every caller that needs both halves goes through here so the lock
    /// order is fixed. Waits for in-flight reads and writes to finish.
    pub(crate) async fn lock_both(
        &self,
    ) -> (
        AsyncMutexGuard<'_, Option<WriteHalf<ConnectionStream>>>,
        AsyncMutexGuard<'_, Option<ReadHalf<ConnectionStream>>>,
    ) {
        let writer = self.writer.lock().await;
        let reader = self.reader.lock().await;
        (writer, reader)
    }
}
