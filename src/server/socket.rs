//! A uniform plain/TLS socket so the dispatcher and transfer loop don't need
//! to know which one they're holding.

use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::server::TlsStream;

/// Either a plain TCP stream or one wrapped in a server-side TLS session.
/// Used for both the control channel (after `AUTH TLS`) and data channels
/// (after `PROT P`).
pub enum Socket {
    /// Unencrypted.
    Plain(TcpStream),
    /// Encrypted via `tokio_rustls`.
    Tls(Box<TlsStream<TcpStream>>),
}

impl Socket {
    /// Wraps a freshly accepted/connected plain stream.
    pub fn plain(stream: TcpStream) -> Self {
        Socket::Plain(stream)
    }

    /// Wraps a stream that has already completed a TLS handshake.
    pub fn tls(stream: TlsStream<TcpStream>) -> Self {
        Socket::Tls(Box::new(stream))
    }

    /// Whether this socket is TLS-protected.
    pub fn is_encrypted(&self) -> bool {
        matches!(self, Socket::Tls(_))
    }

    /// The underlying plain `TcpStream`'s peer address, reaching through
    /// the TLS wrapper if present.
    pub fn peer_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        match self {
            Socket::Plain(s) => s.peer_addr(),
            Socket::Tls(s) => s.get_ref().0.peer_addr(),
        }
    }

    /// The underlying plain `TcpStream`'s local address.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        match self {
            Socket::Plain(s) => s.local_addr(),
            Socket::Tls(s) => s.get_ref().0.local_addr(),
        }
    }
}

impl AsyncRead for Socket {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            Socket::Plain(s) => Pin::new(s).poll_read(cx, buf),
            Socket::Tls(s) => Pin::new(s.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for Socket {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<std::io::Result<usize>> {
        match self.get_mut() {
            Socket::Plain(s) => Pin::new(s).poll_write(cx, buf),
            Socket::Tls(s) => Pin::new(s.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            Socket::Plain(s) => Pin::new(s).poll_flush(cx),
            Socket::Tls(s) => Pin::new(s.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            Socket::Plain(s) => Pin::new(s).poll_shutdown(cx),
            Socket::Tls(s) => Pin::new(s.as_mut()).poll_shutdown(cx),
        }
    }
}
