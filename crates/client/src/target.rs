use freshet_http::{Error, Result};
use std::env;
use url::Url;

/// How the client selects an outbound proxy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ProxyConfig {
    /// honor the `HTTP_PROXY` / `HTTPS_PROXY` environment variables
    #[default]
    Auto,

    /// never proxy, regardless of environment
    Disabled,

    /// proxy through the provided host and port
    Explicit(String, u16),
}

/// Identifies where and how a connection points: host, port, tls,
/// optional proxy, and certificate verification. Pool lookups are a
/// pure tuple comparison on this type, so two requests share a pooled
/// connection only when every field matches.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionTarget {
    /// the destination host
    pub host: String,

    /// the destination port
    pub port: u16,

    /// whether the connection uses tls
    pub ssl: bool,

    /// the proxy host and port, if any
    pub proxy: Option<(String, u16)>,

    /// whether tls certificates are verified. carried in the pool key
    /// so an unverified connection is never handed to a caller
    /// expecting a verified one.
    pub verified: bool,
}

impl ConnectionTarget {
    /// Resolve a target from a url, applying the provided proxy
    /// policy.
    ///
    /// # Errors
    ///
    /// Errors when the scheme is not http or https or the url has no
    /// host.
    pub fn resolve(url: &Url, proxy: &ProxyConfig, verified: bool) -> Result<Self> {
        let ssl = match url.scheme() {
            "http" => false,
            "https" => true,
            scheme => {
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("unknown scheme {scheme}"),
                )))
            }
        };

        let host = url
            .host_str()
            .ok_or(Error::RequestPathMissing)?
            .to_string();
        let port = url
            .port_or_known_default()
            .unwrap_or(if ssl { 443 } else { 80 });

        let proxy = match proxy {
            ProxyConfig::Disabled => None,
            ProxyConfig::Explicit(host, port) => Some((host.clone(), *port)),
            ProxyConfig::Auto => proxy_from_env(ssl),
        };

        Ok(Self {
            host,
            port,
            ssl,
            proxy,
            verified,
        })
    }

    /// the address the client actually dials: the proxy when one is
    /// configured, the destination otherwise
    pub(crate) fn dial_addr(&self) -> (&str, u16) {
        match &self.proxy {
            Some((host, port)) => (host, *port),
            None => (&self.host, self.port),
        }
    }
}

fn proxy_from_env(ssl: bool) -> Option<(String, u16)> {
    let var = if ssl { "HTTPS_PROXY" } else { "HTTP_PROXY" };
    let url = env::var(var).ok().and_then(|v| Url::parse(&v).ok())?;
    let host = url.host_str()?.to_string();
    let port = url.port_or_known_default()?;
    Some((host, port))
}
