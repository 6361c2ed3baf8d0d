use crate::{
    connector,
    pool::{current_pool, PoolEntry, TransportPool},
    ClientConfig, ClientTransport, ConnectionTarget,
};
use encoding_rs::Encoding;
use freshet_http::{
    deadline, encoding, Atom, Body, BodyEncoder, Buffer, Error, Headers, Method, Parser,
    ReceivedBody, ReceivedBodyState, Result, Status, Version,
};
use futures_lite::{future::poll_once, AsyncReadExt, AsyncWriteExt};
use std::{
    fmt::{self, Debug, Formatter},
    io::Write,
    str::FromStr,
    time::Instant,
};
use url::Url;

const MAX_HEAD_LENGTH: usize = 8 * 1024;

/// Default user-agent header
pub const USER_AGENT: &str = concat!("freshet-client/", env!("CARGO_PKG_VERSION"));

/// A single client request/response pair.
///
/// Build one with [`Conn::get`] and friends or [`crate::Client`],
/// customize it, [`send`](Conn::send) it, then read the response
/// status, headers, and body. Connections are reused through the
/// innermost [`pooling`](crate::pooling) scope when one is active:
/// once the response body has been read to its end, the transport
/// goes back to the pool rather than closing, unless the response is
/// streaming.
pub struct Conn {
    url: Url,
    method: Method,
    config: ClientConfig,
    request_headers: Headers,
    response_headers: Headers,
    request_body: Option<Body>,
    status: Option<Status>,
    version: Option<Version>,
    transport: Option<ClientTransport>,
    buffer: Buffer,
    response_body_state: ReceivedBodyState,
    pool: Option<(TransportPool, std::time::Duration)>,
    target: Option<ConnectionTarget>,
    is_streaming: bool,
}

macro_rules! method {
    ($fn_name:ident, $method:ident) => {
        #[doc = concat!("construct a ", stringify!($method), " conn for the provided url")]
        ///
        /// # Errors
        ///
        /// Errors when the url cannot be parsed or is not http(s).
        pub fn $fn_name(url: impl AsRef<str>) -> Result<Self> {
            Self::new(Method::$method, url)
        }
    };
}

impl Debug for Conn {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Conn")
            .field("url", &self.url.as_str())
            .field("method", &self.method)
            .field("request_headers", &self.request_headers)
            .field("response_headers", &self.response_headers)
            .field("status", &self.status)
            .field("version", &self.version)
            .field("response_body_state", &self.response_body_state)
            .field("is_streaming", &self.is_streaming)
            .field("target", &self.target)
            .finish()
    }
}

impl Conn {
    /// construct a conn for the provided method and url
    ///
    /// # Errors
    ///
    /// Errors when the url cannot be parsed or is not http(s).
    pub fn new(method: Method, url: impl AsRef<str>) -> Result<Self> {
        let url = Url::from_str(url.as_ref()).map_err(|e| {
            Error::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                e.to_string(),
            ))
        })?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("unknown scheme {}", url.scheme()),
            )));
        }

        Ok(Self {
            url,
            method,
            config: ClientConfig::default(),
            request_headers: Headers::new(),
            response_headers: Headers::new(),
            request_body: None,
            status: None,
            version: None,
            transport: None,
            buffer: Buffer::default(),
            response_body_state: ReceivedBodyState::Start,
            pool: None,
            target: None,
            is_streaming: false,
        })
    }

    method!(get, Get);
    method!(post, Post);
    method!(put, Put);
    method!(delete, Delete);
    method!(patch, Patch);
    method!(head, Head);

    /// a mutable reference to the request headers, for customization
    /// before sending
    pub fn request_headers(&mut self) -> &mut Headers {
        &mut self.request_headers
    }

    /// chainable request-header insertion
    pub fn with_header(
        mut self,
        name: impl Into<freshet_http::HeaderName>,
        value: impl Into<freshet_http::HeaderValues>,
    ) -> Self {
        self.request_headers.insert(name, value);
        self
    }

    /// the response headers. empty until the conn has been sent.
    pub fn response_headers(&self) -> &Headers {
        &self.response_headers
    }

    /// set the request body
    pub fn set_request_body(&mut self, body: impl Into<Body>) {
        self.request_body = Some(body.into());
    }

    /// chainable setter for the request body
    pub fn with_request_body(mut self, body: impl Into<Body>) -> Self {
        self.set_request_body(body);
        self
    }

    /// replace the client configuration for this conn
    pub fn with_config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// attach an explicit pool, overriding any ambient
    /// [`pooling`](crate::pooling) scope
    pub fn with_pool(mut self, pool: TransportPool, idle: std::time::Duration) -> Self {
        self.pool = Some((pool, idle));
        self
    }

    /// the response status, if the conn has been sent
    pub fn status(&self) -> Option<Status> {
        self.status
    }

    /// the response protocol version, if the conn has been sent
    pub fn response_version(&self) -> Option<Version> {
        self.version
    }

    /// whether the response is being streamed: an event-stream
    /// content type or a close-delimited body. streaming connections
    /// are never returned to the pool.
    pub fn is_streaming(&self) -> bool {
        self.is_streaming
    }

    /// the target this conn resolved to, if it has been sent
    pub fn target(&self) -> Option<&ConnectionTarget> {
        self.target.as_ref()
    }

    /// the character encoding of the response, from its content-type
    /// charset
    pub fn response_encoding(&self) -> &'static Encoding {
        encoding(&self.response_headers)
    }

    /// Send the request and parse the response head. After this
    /// resolves, status and headers are available and the body can be
    /// read with [`Conn::response_body`].
    ///
    /// # Errors
    ///
    /// * `Timeout` when connecting or reading outlives its deadline
    /// * `Closed` when the peer closes before a complete response
    /// * head parse errors for malformed responses
    pub async fn send(&mut self) -> Result<()> {
        if self.pool.is_none() {
            self.pool = current_pool();
        }

        let target = ConnectionTarget::resolve(
            &self.url,
            &self.config.proxy,
            self.config.verified,
        )?;

        self.finalize_headers();
        self.connect_and_send_head(target).await?;
        self.send_body().await?;
        self.parse_head().await?;
        self.detect_streaming()?;
        Ok(())
    }

    /// [`Conn::send`], by value
    ///
    /// # Errors
    ///
    /// See [`Conn::send`].
    pub async fn execute(mut self) -> Result<Self> {
        self.send().await?;
        Ok(self)
    }

    fn finalize_headers(&mut self) {
        if !self.request_headers.has_header("host") {
            let host = self.url.host_str().unwrap_or_default().to_string();
            match self.url.port() {
                Some(port) => self.request_headers.insert("host", format!("{host}:{port}")),
                None => self.request_headers.insert("host", host),
            }
        }

        self.request_headers.try_insert("user-agent", USER_AGENT);

        if !self.request_headers.has_header("connection") {
            let value = if self.pool.is_some() { "keep-alive" } else { "close" };
            self.request_headers.insert("connection", value);
        }

        match (&self.request_body, self.method) {
            (Some(body), _) => match body.len() {
                Some(len) => self.request_headers.try_insert("content-length", len),
                None => self
                    .request_headers
                    .try_insert("transfer-encoding", "chunked"),
            },
            (None, method) if method.has_body() => {
                self.request_headers.try_insert("content-length", "0");
            }
            (None, _) => {}
        }
    }

    fn build_head(&self) -> Result<Vec<u8>> {
        let mut head = Vec::with_capacity(128);
        write!(head, "{} ", self.method)?;

        // plain http through a proxy addresses the origin server with
        // an absolute uri
        let proxied = self
            .target
            .as_ref()
            .is_some_and(|t| t.proxy.is_some() && !t.ssl);
        if proxied {
            write!(head, "{}", self.url)?;
        } else {
            write!(head, "{}", self.url.path())?;
            if let Some(query) = self.url.query() {
                write!(head, "?{query}")?;
            }
        }

        write!(head, " HTTP/1.1\r\n")?;
        write!(head, "{}", self.request_headers)?;
        write!(head, "\r\n")?;

        log::trace!(
            "sending head:\n{}",
            String::from_utf8_lossy(&head).replace("\r\n", "\r\n> ")
        );
        Ok(head)
    }

    async fn find_pool_candidate(&self, target: &ConnectionTarget, head: &[u8]) -> Option<ClientTransport> {
        let mut byte = [0];
        if let Some((pool, _)) = &self.pool {
            for mut candidate in pool.candidates(target) {
                if poll_once(candidate.read(&mut byte)).await.is_none()
                    && candidate.write_all(head).await.is_ok()
                {
                    return Some(candidate);
                }
            }
        }
        None
    }

    async fn connect_and_send_head(&mut self, target: ConnectionTarget) -> Result<()> {
        if self.transport.is_some() {
            panic!("cannot send a conn that has already connected");
        }

        self.target = Some(target);
        let head = self.build_head()?;
        let target = self.target.as_ref().unwrap();

        let transport = match self.find_pool_candidate(target, &head).await {
            Some(transport) => {
                log::debug!("reusing pooled connection to {}:{}", target.host, target.port);
                transport
            }

            None => {
                let mut transport =
                    connector::connect(target, self.config.connect_timeout).await?;
                log::debug!("opened new connection to {}:{}", target.host, target.port);
                transport.write_all(&head).await?;
                transport
            }
        };

        self.transport = Some(transport);
        Ok(())
    }

    async fn send_body(&mut self) -> Result<()> {
        if let Some(body) = self.request_body.take() {
            let transport = self.transport.as_mut().unwrap();
            futures_lite::io::copy(BodyEncoder::new(body), &mut *transport).await?;
        }
        self.transport.as_mut().unwrap().flush().await?;
        Ok(())
    }

    async fn parse_head(&mut self) -> Result<()> {
        let mut parser = Parser::response().stop_after_headers(true);
        let mut read_buf = vec![0; 1024];
        let mut response_line = None;
        let mut head_len = 0;

        'read: loop {
            let transport = self.transport.as_mut().unwrap();
            let bytes = deadline(self.config.read_timeout, async {
                transport.read(&mut read_buf).await.map_err(Error::from)
            })
            .await?;

            if bytes == 0 {
                return Err(Error::Closed);
            }

            head_len += bytes;
            if head_len > MAX_HEAD_LENGTH {
                return Err(Error::HeadersTooLong);
            }

            let (atoms, consumed) = parser.feed(&read_buf[..bytes])?;
            for atom in atoms {
                match atom {
                    Atom::ResponseLine(line) => response_line = Some(line),
                    Atom::Headers(headers) => {
                        let line = response_line.take().ok_or(Error::InvalidHead)?;
                        self.status = Some(Status::try_from(line.code)?);
                        self.version = Some(line.version);
                        self.response_headers = headers;
                        self.buffer.extend_from_slice(&read_buf[consumed..bytes]);
                        break 'read;
                    }
                    _ => {}
                }
            }
        }

        log::trace!(
            "received head: {:?} {:?}\n{}",
            self.version,
            self.status,
            self.response_headers
        );
        Ok(())
    }

    fn detect_streaming(&mut self) -> Result<()> {
        if self.response_headers.has_header("content-length")
            && self.response_headers.is_chunked()
        {
            return Err(Error::UnexpectedHeader("content-length".into()));
        }

        let event_stream = self
            .response_headers
            .get_str("content-type")
            .is_some_and(|ct| ct.starts_with("text/event-stream"));

        let close_delimited = !self.response_headers.is_chunked()
            && self.response_headers.content_length()?.is_none()
            && self.method != Method::Head;

        self.is_streaming = event_stream || close_delimited;
        Ok(())
    }

    fn response_content_length(&self) -> Option<u64> {
        if self.method == Method::Head {
            Some(0)
        } else if self.response_headers.is_chunked() {
            None
        } else {
            self.response_headers.content_length().ok().flatten()
        }
    }

    fn is_close_delimited(&self) -> bool {
        self.method != Method::Head
            && !self.response_headers.is_chunked()
            && !self.response_headers.has_header("content-length")
    }

    /// A reader over the response body. The body can only be read
    /// once; afterwards the conn either recycles its transport into
    /// the pool (on drop, when keep-alive held and the body was read
    /// to its end) or closes it.
    pub fn response_body(&mut self) -> ReceivedBody<'_, ClientTransport> {
        let content_length = self.response_content_length();
        let close_delimited = self.is_close_delimited();
        let encoding = encoding(&self.response_headers);
        let body = ReceivedBody::new(
            content_length,
            &mut self.buffer,
            self.transport.as_mut().unwrap(),
            &mut self.response_body_state,
            None,
            encoding,
        )
        .with_read_timeout(Some(self.config.read_timeout));

        if close_delimited {
            body.with_close_delimited()
        } else {
            body
        }
    }

    fn is_keep_alive(&self) -> bool {
        self.version == Some(Version::Http1_1)
            && !self
                .response_headers
                .eq_ignore_ascii_case("connection", "close")
            && !self.is_streaming
    }

    /// Finish reading the response body, discarding the remainder, so
    /// the transport can be recycled to the pool. Dropping an
    /// unfinished conn closes its connection instead.
    pub async fn recycle(mut self) {
        if self.is_keep_alive() && self.transport.is_some() && self.pool.is_some() {
            if self.response_body_state != ReceivedBodyState::End {
                match self.response_body().drain().await {
                    Ok(drained) => log::debug!("drained {drained} bytes"),
                    Err(e) => log::warn!("failed to drain response body: {e}"),
                }
            }
        }
    }
}

impl Drop for Conn {
    fn drop(&mut self) {
        if self.response_body_state == ReceivedBodyState::End
            && self.is_keep_alive()
            && self.transport.is_some()
            && self.pool.is_some()
            && self.target.is_some()
        {
            let (pool, idle) = self.pool.take().unwrap();
            let transport = self.transport.take().unwrap();
            let target = self.target.take().unwrap();
            pool.insert(target, PoolEntry::new(transport, Some(Instant::now() + idle)));
        }
    }
}

impl From<Conn> for ReceivedBody<'static, ClientTransport> {
    fn from(mut conn: Conn) -> Self {
        let content_length = conn.response_content_length();
        let close_delimited = conn.is_close_delimited();
        let encoding = conn.response_encoding();
        let keep_alive = conn.is_keep_alive();
        let buffer = std::mem::take(&mut conn.buffer);
        let transport = conn.transport.take().unwrap();
        let state = std::mem::replace(&mut conn.response_body_state, ReceivedBodyState::End);

        let on_completion = match (conn.pool.take(), conn.target.take()) {
            (Some((pool, idle)), Some(target)) if keep_alive => {
                Some(Box::new(move |transport: ClientTransport| {
                    pool.insert(
                        target.clone(),
                        PoolEntry::new(transport, Some(Instant::now() + idle)),
                    );
                }) as Box<dyn Fn(ClientTransport) + Send + Sync>)
            }
            _ => None,
        };

        let read_timeout = conn.config.read_timeout;
        let body = ReceivedBody::new(
            content_length,
            buffer,
            transport,
            state,
            on_completion,
            encoding,
        )
        .with_read_timeout(Some(read_timeout));

        if close_delimited {
            body.with_close_delimited()
        } else {
            body
        }
    }
}

impl From<Conn> for Body {
    fn from(conn: Conn) -> Body {
        let received_body: ReceivedBody<'static, _> = conn.into();
        received_body.into()
    }
}
