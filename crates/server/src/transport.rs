use async_net::TcpStream;
use futures_lite::{AsyncRead, AsyncWrite};
use std::{
    io::Result,
    net::SocketAddr,
    pin::Pin,
    task::{Context, Poll},
};

/// The tcp transport served connections run over. A thin wrapper so
/// the [`freshet_http::Transport`] trait can be implemented for the
/// runtime's stream type.
#[derive(Debug, Clone)]
pub struct ServerTransport(pub TcpStream);

impl From<TcpStream> for ServerTransport {
    fn from(stream: TcpStream) -> Self {
        Self(stream)
    }
}

impl AsyncRead for ServerTransport {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut [u8],
    ) -> Poll<Result<usize>> {
        Pin::new(&mut self.0).poll_read(cx, buf)
    }
}

impl AsyncWrite for ServerTransport {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<Result<usize>> {
        Pin::new(&mut self.0).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<()>> {
        Pin::new(&mut self.0).poll_flush(cx)
    }

    fn poll_close(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<()>> {
        Pin::new(&mut self.0).poll_close(cx)
    }
}

impl freshet_http::Transport for ServerTransport {
    fn set_nodelay(&mut self, nodelay: bool) -> Result<()> {
        self.0.set_nodelay(nodelay)
    }

    fn peer_addr(&self) -> Result<Option<SocketAddr>> {
        self.0.peer_addr().map(Some)
    }
}
