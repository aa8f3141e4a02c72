use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
#[cfg(not(windows))]
use tokio::net::UnixStream;

/// A connected stream over either transport kind, so the RPC client and
/// server can be written once against `AsyncRead + AsyncWrite` instead of
/// duplicating the framing logic per transport.
pub enum Conn {
    #[cfg(not(windows))]
    Unix(UnixStream),
    Tcp(TcpStream),
}

impl AsyncRead for Conn {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            #[cfg(not(windows))]
            Conn::Unix(s) => Pin::new(s).poll_read(cx, buf),
            Conn::Tcp(s) => Pin::new(s).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for Conn {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        match self.get_mut() {
            #[cfg(not(windows))]
            Conn::Unix(s) => Pin::new(s).poll_write(cx, buf),
            Conn::Tcp(s) => Pin::new(s).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            #[cfg(not(windows))]
            Conn::Unix(s) => Pin::new(s).poll_flush(cx),
            Conn::Tcp(s) => Pin::new(s).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            #[cfg(not(windows))]
            Conn::Unix(s) => Pin::new(s).poll_shutdown(cx),
            Conn::Tcp(s) => Pin::new(s).poll_shutdown(cx),
        }
    }
}

/// Dial a [`crate::transport::TransportAddress`].
pub async fn dial(address: &crate::transport::TransportAddress) -> std::io::Result<Conn> {
    match address.kind {
        #[cfg(not(windows))]
        crate::transport::NetworkKind::Unix => {
            Ok(Conn::Unix(UnixStream::connect(&address.address).await?))
        }
        #[cfg(windows)]
        crate::transport::NetworkKind::Unix => Err(std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            "unix domain sockets are not available on this platform",
        )),
        crate::transport::NetworkKind::Tcp => {
            Ok(Conn::Tcp(TcpStream::connect(&address.address).await?))
        }
    }
}
