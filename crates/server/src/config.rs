use freshet_http::{HttpConfig, Stopper};
use std::net::TcpListener;

/// Primary entrypoint for configuring and running a freshet server.
///
/// The associated methods on this struct are intended to be chained.
///
/// ## Example
/// ```rust,no_run
/// freshet_server::config()
///     .with_port(8000) // the default
///     .with_host("0.0.0.0") // the default
///     .without_signals()
///     .run(|mut conn: freshet_server::Conn| async move {
///         conn.set_status(200);
///         conn.set_response_body("hello");
///         conn
///     });
/// ```
///
/// ## Socket binding
///
/// * If a `LISTEN_FD` environment variable is available on unix
///   systems, that socket is used, overriding host and port settings
/// * Otherwise, the host comes from [`Config::with_host`] or the
///   `HOST` environment variable or `0.0.0.0`, and the port from
///   [`Config::with_port`] or the `PORT` environment variable or
///   `8000`.
///
/// ## Signals
///
/// On unix systems, `SIGINT`, `SIGTERM` and `SIGQUIT` perform a
/// graceful shutdown on the first signal and an immediate exit on a
/// subsequent signal. Disable with [`Config::without_signals`].
#[derive(Debug, Clone)]
pub struct Config {
    pub(crate) host: Option<String>,
    pub(crate) port: Option<u16>,
    pub(crate) backlog: u32,
    pub(crate) nodelay: bool,
    pub(crate) register_signals: bool,
    pub(crate) max_connections: Option<usize>,
    pub(crate) stopper: Stopper,
    pub(crate) http_config: HttpConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: None,
            port: None,
            backlog: 10_000,
            nodelay: false,
            register_signals: cfg!(unix),
            max_connections: None,
            stopper: Stopper::new(),
            http_config: HttpConfig::default(),
        }
    }
}

impl Config {
    /// build a new config with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the server to listen on this host or ip address.
    /// The default is the `HOST` environment variable or `0.0.0.0`.
    pub fn with_host(mut self, host: &str) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Configures the server to listen on this port. The default is
    /// the `PORT` environment variable or `8000`.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Configures the tcp listen backlog. The default is 10000.
    pub fn with_backlog(mut self, backlog: u32) -> Self {
        self.backlog = backlog;
        self
    }

    /// Configures the tcp listener to use `TCP_NODELAY`.
    pub fn with_nodelay(mut self) -> Self {
        self.nodelay = true;
        self
    }

    /// Configures the server NOT to register for graceful-shutdown
    /// signals with the operating system.
    pub fn without_signals(mut self) -> Self {
        self.register_signals = false;
        self
    }

    /// Caps the number of concurrently served connections; further
    /// connections receive a canned 503 and are closed.
    pub fn with_max_connections(mut self, max_connections: usize) -> Self {
        self.max_connections = Some(max_connections);
        self
    }

    /// use the specific [`Stopper`] provided, for external shutdown
    /// control
    pub fn with_stopper(mut self, stopper: Stopper) -> Self {
        self.stopper = stopper;
        self
    }

    /// use the provided [`HttpConfig`] for every connection
    pub fn with_http_config(mut self, http_config: HttpConfig) -> Self {
        self.http_config = http_config;
        self
    }

    /// a clone of this config's [`Stopper`]
    pub fn stopper(&self) -> Stopper {
        self.stopper.clone()
    }

    /// the host this config resolves to
    pub fn host(&self) -> String {
        self.host
            .clone()
            .or_else(|| std::env::var("HOST").ok())
            .unwrap_or_else(|| String::from("0.0.0.0"))
    }

    /// the port this config resolves to
    pub fn port(&self) -> u16 {
        self.port
            .or_else(|| std::env::var("PORT").ok().and_then(|p| p.parse().ok()))
            .unwrap_or(8000)
    }

    /// Run the provided handler, blocking the current thread until
    /// the server shuts down.
    pub fn run<H: crate::Handler>(self, handler: H) {
        async_global_executor::block_on(self.run_async(handler));
    }

    /// Run the provided handler on an already-running executor,
    /// polling until the server shuts down.
    pub async fn run_async<H: crate::Handler>(self, handler: H) {
        crate::run_config(self, handler).await;
    }

    /// Bind a listener: `LISTEN_FD` when inherited, otherwise
    /// host/port with the configured backlog.
    pub(crate) fn build_listener(&self) -> std::io::Result<TcpListener> {
        #[cfg(unix)]
        if let Some(listener) = listenfd::ListenFd::from_env().take_tcp_listener(0)? {
            log::debug!("using inherited listener from LISTEN_FD");
            listener.set_nonblocking(true)?;
            return Ok(listener);
        }

        use socket2::{Domain, Protocol, Socket, Type};
        use std::net::ToSocketAddrs;

        let addr = (self.host(), self.port())
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| {
                std::io::Error::new(std::io::ErrorKind::AddrNotAvailable, "no address resolved")
            })?;

        let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
        socket.set_reuse_address(true)?;
        socket.bind(&addr.into())?;
        socket.listen(i32::try_from(self.backlog).unwrap_or(i32::MAX))?;

        let listener: TcpListener = socket.into();
        listener.set_nonblocking(true)?;
        Ok(listener)
    }
}

#[cfg(test)]
mod test {
    use super::Config;

    #[test]
    fn defaults() {
        let config = Config::new();
        assert_eq!(config.backlog, 10_000);
        assert!(config.max_connections.is_none());
        // env-sensitive assertions avoided; explicit settings win
        assert_eq!(config.clone().with_port(8080).port(), 8080);
        assert_eq!(config.with_host("127.0.0.1").host(), "127.0.0.1");
    }
}
