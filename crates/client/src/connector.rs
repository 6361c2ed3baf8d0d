use crate::ConnectionTarget;
use async_net::TcpStream;
use freshet_http::{deadline, Error, Result};
use futures_lite::{AsyncRead, AsyncWrite};
use std::{
    io,
    pin::Pin,
    task::{Context, Poll},
    time::Duration,
};

/// The transport a client connection runs over: plain tcp, or tls
/// over tcp.
#[derive(Debug)]
pub enum ClientTransport {
    /// a plain tcp stream
    Tcp(TcpStream),

    /// a tls stream over tcp
    Tls(Box<async_native_tls::TlsStream<TcpStream>>),
}

impl ClientTransport {
    /// set tcp nodelay on the underlying stream
    pub fn set_nodelay(&self, nodelay: bool) -> io::Result<()> {
        match self {
            ClientTransport::Tcp(tcp) => tcp.set_nodelay(nodelay),
            ClientTransport::Tls(tls) => tls.get_ref().set_nodelay(nodelay),
        }
    }
}

impl AsyncRead for ClientTransport {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut [u8],
    ) -> Poll<io::Result<usize>> {
        match &mut *self {
            ClientTransport::Tcp(tcp) => Pin::new(tcp).poll_read(cx, buf),
            ClientTransport::Tls(tls) => Pin::new(&mut **tls).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for ClientTransport {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match &mut *self {
            ClientTransport::Tcp(tcp) => Pin::new(tcp).poll_write(cx, buf),
            ClientTransport::Tls(tls) => Pin::new(&mut **tls).poll_write(cx, buf),
        }
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match &mut *self {
            ClientTransport::Tcp(tcp) => Pin::new(tcp).poll_flush(cx),
            ClientTransport::Tls(tls) => Pin::new(&mut **tls).poll_flush(cx),
        }
    }

    fn poll_close(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match &mut *self {
            ClientTransport::Tcp(tcp) => Pin::new(tcp).poll_close(cx),
            ClientTransport::Tls(tls) => Pin::new(&mut **tls).poll_close(cx),
        }
    }
}

/// Open a transport to the target, within the provided total-connect
/// deadline. Connecting dials the proxy when one is configured;
/// tunneling tls through a proxy is not supported.
pub(crate) async fn connect(
    target: &ConnectionTarget,
    timeout: Duration,
) -> Result<ClientTransport> {
    if target.ssl && target.proxy.is_some() {
        return Err(Error::Io(io::Error::new(
            io::ErrorKind::Unsupported,
            "https proxying (CONNECT tunnels) is not supported",
        )));
    }

    deadline(timeout, async {
        let (host, port) = target.dial_addr();
        let tcp = TcpStream::connect((host, port)).await?;

        if target.ssl {
            let tls = async_native_tls::TlsConnector::new()
                .danger_accept_invalid_certs(!target.verified)
                .connect(&target.host, tcp)
                .await
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            Ok(ClientTransport::Tls(Box::new(tls)))
        } else {
            Ok(ClientTransport::Tcp(tcp))
        }
    })
    .await
}
