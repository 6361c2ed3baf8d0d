use crate::{Conn, ProxyConfig};
use freshet_http::{Method, Result};
use std::time::Duration;

/// Configuration shared by client conns: timeouts, proxy policy, and
/// certificate verification.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub(crate) connect_timeout: Duration,
    pub(crate) read_timeout: Duration,
    pub(crate) proxy: ProxyConfig,
    pub(crate) verified: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(10),
            proxy: ProxyConfig::Auto,
            verified: true,
        }
    }
}

impl ClientConfig {
    /// construct the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// total deadline for establishing a connection, including tls
    /// negotiation. default: 10s
    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    /// per-read deadline while receiving the response. default: 10s
    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    /// proxy selection policy. default: honor `HTTP_PROXY` /
    /// `HTTPS_PROXY`
    pub fn with_proxy(mut self, proxy: ProxyConfig) -> Self {
        self.proxy = proxy;
        self
    }

    /// disable tls certificate verification, for testing against
    /// self-signed endpoints. unverified connections pool separately
    /// from verified ones.
    pub fn with_unverified_tls(mut self) -> Self {
        self.verified = false;
        self
    }
}

macro_rules! method {
    ($fn_name:ident, $method:ident) => {
        #[doc = concat!("construct a ", stringify!($method), " conn using this client's config")]
        ///
        /// # Errors
        ///
        /// Errors when the url cannot be parsed or is not http(s).
        pub fn $fn_name(&self, url: impl AsRef<str>) -> Result<Conn> {
            self.conn(Method::$method, url)
        }
    };
}

/// A reusable front for building [`Conn`]s that share a
/// [`ClientConfig`].
#[derive(Debug, Clone, Default)]
pub struct Client {
    config: ClientConfig,
}

impl Client {
    /// construct a client with the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// construct a client with the provided configuration
    pub fn with_config(config: ClientConfig) -> Self {
        Self { config }
    }

    /// build a conn for the provided method and url
    ///
    /// # Errors
    ///
    /// Errors when the url cannot be parsed or is not http(s).
    pub fn conn(&self, method: Method, url: impl AsRef<str>) -> Result<Conn> {
        Ok(Conn::new(method, url)?.with_config(self.config.clone()))
    }

    method!(get, Get);
    method!(post, Post);
    method!(put, Put);
    method!(delete, Delete);
    method!(patch, Patch);
    method!(head, Head);
}
