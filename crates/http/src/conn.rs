use crate::{
    after_send::{AfterSend, SendStatus},
    copy,
    http_config::DEFAULT_CONFIG,
    received_body::ReceivedBodyState,
    util::{deadline, encoding},
    Atom, Body, Buffer, BufWriter, ConnectionStatus, Error, Headers, HttpConfig, Method, Parser,
    ReceivedBody, RequestLine, Result, StateSet, Status, Version, BAD_REQUEST, SERVER_ERROR,
};
use encoding_rs::Encoding;
use futures_lite::{
    future,
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
};
use std::{
    fmt::{self, Debug, Formatter},
    future::Future,
    net::IpAddr,
    pin::{pin, Pin},
    task::{Context, Poll},
    time::{Instant, SystemTime},
};
use stopper::Stopper;

/// Default Server header
pub const SERVER: &str = concat!("freshet/", env!("CARGO_PKG_VERSION"));

/// A server-side http connection.
///
/// This struct represents both the request and the response of the
/// current request/response pair, and holds the transport over which
/// subsequent pipelined or keep-alive requests will arrive.
pub struct Conn<Transport> {
    pub(crate) request_headers: Headers,
    pub(crate) response_headers: Headers,
    pub(crate) path: String,
    pub(crate) query: String,
    pub(crate) method: Method,
    pub(crate) status: Option<Status>,
    pub(crate) version: Version,
    pub(crate) state: StateSet,
    pub(crate) response_body: Option<Body>,
    pub(crate) transport: Transport,
    pub(crate) buffer: Buffer,
    pub(crate) request_body_state: ReceivedBodyState,
    pub(crate) stopper: Stopper,
    pub(crate) after_send: AfterSend,
    pub(crate) start_time: Instant,
    pub(crate) peer_ip: Option<IpAddr>,
    pub(crate) http_config: HttpConfig,
}

impl<Transport> Debug for Conn<Transport> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Conn")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("query", &self.query)
            .field("version", &self.version)
            .field("status", &self.status)
            .field("request_headers", &self.request_headers)
            .field("response_headers", &self.response_headers)
            .field("response_body", &self.response_body)
            .field("request_body_state", &self.request_body_state)
            .field("transport", &"..")
            .field("buffer", &"..")
            .field("start_time", &self.start_time)
            .field("peer_ip", &self.peer_ip)
            .field("http_config", &self.http_config)
            .finish()
    }
}

impl<Transport> Conn<Transport>
where
    Transport: AsyncRead + AsyncWrite + Unpin + Send + Sync + 'static,
{
    /// Read any number of requests from the transport and call the
    /// provided handler function for each, writing the response back
    /// before parsing the next, until the connection is no longer
    /// keep-alive or the peer goes away.
    ///
    /// Provides a default [`HttpConfig`].
    ///
    /// # Errors
    ///
    /// This will return an error variant if:
    ///
    /// * there is an io error when reading from or writing to the
    ///   underlying transport
    /// * the head is longer than allowed or cannot be parsed
    /// * the headers cannot be reconciled, such as a
    ///   `content-length` header alongside a
    ///   `transfer-encoding: chunked` header
    ///
    /// An idle timeout or a connection closed between requests is a
    /// normal exit, not an error.
    pub async fn map<F, Fut>(transport: Transport, stopper: Stopper, handler: F) -> Result<()>
    where
        F: FnMut(Conn<Transport>) -> Fut,
        Fut: Future<Output = Conn<Transport>>,
    {
        Self::map_with_config(DEFAULT_CONFIG, transport, stopper, handler).await
    }

    /// Identical to [`Conn::map`] with a provided [`HttpConfig`].
    ///
    /// # Errors
    ///
    /// See [`Conn::map`].
    pub async fn map_with_config<F, Fut>(
        http_config: HttpConfig,
        transport: Transport,
        stopper: Stopper,
        mut handler: F,
    ) -> Result<()>
    where
        F: FnMut(Conn<Transport>) -> Fut,
        Fut: Future<Output = Conn<Transport>>,
    {
        let mut conn = match Conn::new_internal(
            http_config,
            transport,
            Buffer::with_capacity(http_config.request_buffer_initial_len),
            stopper,
        )
        .await
        {
            Ok(conn) => conn,
            Err(Error::Closed | Error::Timeout) => return Ok(()),
            Err(e) => return Err(e),
        };

        loop {
            conn = match handler(conn).await.send().await? {
                ConnectionStatus::Close => return Ok(()),
                ConnectionStatus::Conn(next) => next,
            }
        }
    }

    async fn send(mut self) -> Result<ConnectionStatus<Transport>> {
        let copy_loops_per_yield = self.http_config.copy_loops_per_yield;
        let mut output_buffer = Vec::with_capacity(self.http_config.response_buffer_len);
        self.write_headers(&mut output_buffer)?;

        let write_body = self.method != Method::Head
            && !matches!(self.status, Some(Status::NotModified | Status::NoContent));

        let body = if write_body {
            self.response_body.take()
        } else {
            None
        };

        let mut bufwriter = BufWriter::new_with_buffer(output_buffer, &mut self.transport);

        let result = async {
            if let Some(body) = body {
                copy(body, &mut bufwriter, copy_loops_per_yield).await?;
            }
            bufwriter.flush().await
        }
        .await;

        match result {
            Ok(()) => {
                self.after_send.call(SendStatus::Success);
                self.finish().await
            }

            Err(e) => {
                log::error!("error serializing response: {e}");
                // if the head never reached the wire, a canned 500 is
                // still possible; otherwise close to signal failure
                if !bufwriter.has_written_to_inner() {
                    drop(bufwriter);
                    let _ = self.transport.write_all(SERVER_ERROR).await;
                    let _ = self.transport.flush().await;
                }
                Err(e.into())
            }
        }
    }

    /// returns a reference to the request headers
    pub fn request_headers(&self) -> &Headers {
        &self.request_headers
    }

    /// returns a mutable reference to the request headers
    pub fn request_headers_mut(&mut self) -> &mut Headers {
        &mut self.request_headers
    }

    /// returns a reference to the response headers
    pub fn response_headers(&self) -> &Headers {
        &self.response_headers
    }

    /// returns a mutable reference to the response headers
    pub fn response_headers_mut(&mut self) -> &mut Headers {
        &mut self.response_headers
    }

    /// sets the http status code from any `TryInto<Status>`
    pub fn set_status(&mut self, status: impl TryInto<Status>) {
        self.status = Some(status.try_into().unwrap_or_else(|_| {
            log::error!("attempted to set an invalid status code");
            Status::InternalServerError
        }));
    }

    /// retrieves the current response status code for this conn, if
    /// it has been set
    pub fn status(&self) -> Option<Status> {
        self.status
    }

    /// retrieves the path part of the request target, up to and
    /// excluding any query component. The path is raw: no url
    /// decoding is performed.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// retrieves the raw query component of the request target, empty
    /// when absent
    pub fn querystring(&self) -> &str {
        &self.query
    }

    /// get the host header for this conn, if it exists
    pub fn host(&self) -> Option<&str> {
        self.request_headers.get_str("host")
    }

    /// Sets the response body to anything that is
    /// [`impl Into<Body>`][Body]
    pub fn set_response_body(&mut self, body: impl Into<Body>) {
        self.response_body = Some(body.into());
    }

    /// returns a reference to the current response body, if set
    pub fn response_body(&self) -> Option<&Body> {
        self.response_body.as_ref()
    }

    /// removes the response body from this conn and returns it
    pub fn take_response_body(&mut self) -> Option<Body> {
        self.response_body.take()
    }

    /// returns the http method for this conn's request
    pub fn method(&self) -> Method {
        self.method
    }

    /// returns the http version for this conn
    pub fn http_version(&self) -> Version {
        self.version
    }

    /// returns a read-only reference to the state typemap for this
    /// conn
    pub fn state(&self) -> &StateSet {
        &self.state
    }

    /// returns a mutable reference to the state typemap for this conn
    pub fn state_mut(&mut self) -> &mut StateSet {
        &mut self.state
    }

    /// Cancels and drops the provided future if the peer disconnects
    /// before it resolves, returning `None` in that case.
    ///
    /// Note that the inner future cannot borrow conn, so clone or
    /// take whatever it needs before calling this.
    ///
    /// The use of this method is not advised if your connected http
    /// client employs pipelining, as it will buffer an unbounded
    /// number of requests.
    pub async fn cancel_on_disconnect<'a, Fut>(&'a mut self, fut: Fut) -> Option<Fut::Output>
    where
        Fut: Future + Send + 'a,
    {
        let mut fut = pin!(fut);
        future::poll_fn(|cx| {
            if let Poll::Ready(output) = fut.as_mut().poll(cx) {
                return Poll::Ready(Some(output));
            }

            match self.poll_disconnect_probe(cx) {
                Poll::Ready(()) => Poll::Ready(None),
                Poll::Pending => Poll::Pending,
            }
        })
        .await
    }

    /// Check if the transport is connected by attempting to read from
    /// it, without consuming request content
    pub async fn is_disconnected(&mut self) -> bool {
        future::poll_once(future::poll_fn(|cx| self.poll_disconnect_probe(cx)))
            .await
            .is_some()
    }

    /// Ready once the peer has disconnected. Request bytes that
    /// arrive while probing are appended to the conn's read buffer,
    /// so probing does not disturb the protocol; a pipelining peer
    /// can keep this pending indefinitely by sending requests.
    fn poll_disconnect_probe(&mut self, cx: &mut Context<'_>) -> Poll<()> {
        let mut probe = [0u8; 64];
        loop {
            match Pin::new(&mut self.transport).poll_read(cx, &mut probe) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(Ok(0)) | Poll::Ready(Err(_)) => return Poll::Ready(()),
                Poll::Ready(Ok(bytes)) => self.buffer.extend_from_slice(&probe[..bytes]),
            }
        }
    }

    /// returns the [`encoding_rs::Encoding`] for this request, as
    /// determined from the mime-type charset, if available
    pub fn request_encoding(&self) -> &'static Encoding {
        encoding(&self.request_headers)
    }

    /// returns the [`encoding_rs::Encoding`] for this response, as
    /// determined from the mime-type charset, if available
    pub fn response_encoding(&self) -> &'static Encoding {
        encoding(&self.response_headers)
    }

    /// returns a [`ReceivedBody`] that references this conn. the conn
    /// retains all data and holds the singular transport, but the
    /// `ReceivedBody` provides an interface to read body content
    pub fn request_body(&mut self) -> ReceivedBody<'_, Transport> {
        self.build_request_body()
    }

    /// Registers a function to call after the http response has been
    /// completely transferred, or after the connection is aborted,
    /// whichever happens first — exactly once either way. Please note
    /// that this is a sync function and should be computationally
    /// lightweight. If your application needs additional async
    /// processing, use your runtime's task spawn within this hook.
    pub fn on_close<F>(&mut self, hook: F)
    where
        F: FnOnce(SendStatus) + Send + Sync + 'static,
    {
        self.after_send.append(hook);
    }

    /// The [`Instant`] that the head of this conn's request was
    /// received
    pub fn start_time(&self) -> Instant {
        self.start_time
    }

    /// returns a clone of the [`Stopper`] for this conn. use this to
    /// gracefully stop long-running futures and streams inside of
    /// handler functions
    pub fn stopper(&self) -> Stopper {
        self.stopper.clone()
    }

    /// sets the remote ip address for this conn, if available
    pub fn set_peer_ip(&mut self, peer_ip: Option<IpAddr>) {
        self.peer_ip = peer_ip;
    }

    /// retrieves the remote ip address for this conn, if available
    pub fn peer_ip(&self) -> Option<IpAddr> {
        self.peer_ip
    }

    /// Get a reference to the transport.
    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    fn build_request_body(&mut self) -> ReceivedBody<'_, Transport> {
        ReceivedBody::new_with_config(
            self.request_content_length().ok().flatten(),
            &mut self.buffer,
            &mut self.transport,
            &mut self.request_body_state,
            None,
            encoding(&self.request_headers),
            &self.http_config,
        )
    }

    fn request_content_length(&self) -> Result<Option<u64>> {
        if self.request_headers.is_chunked() {
            Ok(None)
        } else {
            match self.request_headers.content_length()? {
                Some(length) => Ok(Some(length)),
                None => Ok(Some(0)),
            }
        }
    }

    fn validate_headers(request_headers: &Headers) -> Result<()> {
        if request_headers.has_header("content-length") && request_headers.is_chunked() {
            Err(Error::UnexpectedHeader("content-length".into()))
        } else {
            Ok(())
        }
    }

    /// # Create a new `Conn` by reading a request head from the
    /// transport
    ///
    /// The `stopper` is used to interrupt the initial read on
    /// graceful shutdown.
    ///
    /// # Errors
    ///
    /// This will return an error variant if the head cannot be read
    /// or parsed; see [`Conn::map`].
    pub async fn new(transport: Transport, stopper: Stopper) -> Result<Self> {
        Self::new_internal(DEFAULT_CONFIG, transport, Buffer::default(), stopper).await
    }

    async fn new_internal(
        http_config: HttpConfig,
        mut transport: Transport,
        mut buffer: Buffer,
        stopper: Stopper,
    ) -> Result<Self> {
        match Self::head(&mut transport, &mut buffer, &stopper, &http_config).await {
            Ok((request_line, request_headers, start_time)) => {
                Self::validate_headers(&request_headers)?;

                log::trace!(
                    "received:\n{} {} {}\n{}",
                    request_line.method,
                    request_line.path,
                    request_line.version,
                    request_headers
                );

                let mut response_headers = Headers::new();
                response_headers.insert("server", SERVER);

                Ok(Self {
                    transport,
                    request_headers,
                    method: request_line.method,
                    version: request_line.version,
                    path: request_line.path,
                    query: request_line.query,
                    buffer,
                    response_headers,
                    status: None,
                    state: StateSet::new(),
                    response_body: None,
                    request_body_state: ReceivedBodyState::Start,
                    stopper,
                    after_send: AfterSend::default(),
                    start_time,
                    peer_ip: None,
                    http_config,
                })
            }

            Err(e) => {
                if e.is_bad_format() {
                    log::debug!("rejecting malformed request: {e}");
                    let _ = transport.write_all(BAD_REQUEST).await;
                    let _ = transport.flush().await;
                }
                Err(e)
            }
        }
    }

    /// Drive the request parser over the transport until the head is
    /// complete. Body bytes read past the head stay in `buffer`.
    async fn head(
        transport: &mut Transport,
        buffer: &mut Buffer,
        stopper: &Stopper,
        http_config: &HttpConfig,
    ) -> Result<(RequestLine, Headers, Instant)> {
        let mut parser = Parser::request().stop_after_headers(true);
        let mut request_line = None;
        let mut head_len = 0;
        let mut read_buf = vec![0; 1024];
        let mut start_time = None;

        loop {
            if !buffer.is_empty() {
                head_len += buffer.len();
                if head_len > http_config.head_max_len {
                    return Err(Error::HeadersTooLong);
                }

                let (atoms, consumed) = parser.feed(&buffer[..])?;
                buffer.ignore_front(consumed);

                for atom in atoms {
                    match atom {
                        Atom::RequestLine(line) => request_line = Some(line),
                        Atom::Headers(headers) => {
                            let request_line = request_line.take().ok_or(Error::InvalidHead)?;
                            return Ok((
                                request_line,
                                headers,
                                start_time.unwrap_or_else(Instant::now),
                            ));
                        }
                        _ => {}
                    }
                }
            }

            let is_first_byte = request_line.is_none() && parser.is_at_message_boundary();
            let bytes = deadline(http_config.keep_alive_timeout, async {
                if is_first_byte {
                    match stopper.stop_future(transport.read(&mut read_buf)).await {
                        Some(result) => result.map_err(Error::from),
                        None => Err(Error::Closed),
                    }
                } else {
                    transport.read(&mut read_buf).await.map_err(Error::from)
                }
            })
            .await?;

            if start_time.is_none() {
                start_time = Some(Instant::now());
            }

            if bytes == 0 {
                return if is_first_byte {
                    Err(Error::Closed)
                } else {
                    Err(Error::InvalidHead)
                };
            }

            buffer.extend_from_slice(&read_buf[..bytes]);
        }
    }

    /// calculates any auto-generated headers for this conn prior to
    /// sending it
    pub fn finalize_headers(&mut self) {
        self.response_headers
            .try_insert_with("date", || httpdate::fmt_http_date(SystemTime::now()));

        if !matches!(self.status, Some(Status::NotModified | Status::NoContent)) {
            match self.body_len() {
                Some(len) => {
                    self.response_headers.try_insert("content-length", len);
                }
                // a streaming response is delimited by connection
                // close rather than framed
                None => {
                    self.response_headers.insert("connection", "close");
                }
            }
        }

        if self.response_body.is_some() {
            self.response_headers
                .try_insert("content-type", "text/plain");
        }

        if self.version < Version::Http1_1 || self.stopper.is_stopped() {
            self.response_headers.insert("connection", "close");
        }
    }

    async fn next(mut self) -> Result<Self> {
        self.build_request_body().drain().await?;
        Conn::new_internal(self.http_config, self.transport, self.buffer, self.stopper).await
    }

    fn should_close(&self) -> bool {
        if self.version < Version::Http1_1 {
            return true;
        }

        self.request_headers
            .eq_ignore_ascii_case("connection", "close")
            || self
                .response_headers
                .eq_ignore_ascii_case("connection", "close")
    }

    async fn finish(self) -> Result<ConnectionStatus<Transport>> {
        if self.should_close() {
            Ok(ConnectionStatus::Close)
        } else {
            match self.next().await {
                Err(Error::Closed) => {
                    log::trace!("connection closed by client");
                    Ok(ConnectionStatus::Close)
                }
                Err(Error::Timeout) => {
                    log::trace!("closing idle keep-alive connection");
                    Ok(ConnectionStatus::Close)
                }
                Err(Error::Io(e)) if e.kind() == std::io::ErrorKind::TimedOut => {
                    log::trace!("closing connection with unread request body");
                    Ok(ConnectionStatus::Close)
                }
                Err(e) => Err(e),
                Ok(conn) => Ok(ConnectionStatus::Conn(conn)),
            }
        }
    }

    fn body_len(&self) -> Option<u64> {
        match self.response_body {
            Some(ref body) => body.len(),
            None => Some(0),
        }
    }

    fn write_headers(&mut self, output_buffer: &mut Vec<u8>) -> Result<()> {
        use std::io::Write;
        let status = self.status().unwrap_or(Status::NotFound);

        write!(
            output_buffer,
            "{} {} {}\r\n",
            self.version,
            status as u16,
            status.canonical_reason()
        )?;

        self.finalize_headers();

        log::trace!(
            "sending:\n{} {}\n{}",
            self.version,
            status,
            &self.response_headers
        );

        for (name, values) in self.response_headers.iter() {
            if name.is_valid() {
                for value in values {
                    if value.is_valid() {
                        write!(output_buffer, "{name}: ")?;
                        output_buffer.extend_from_slice(value.as_ref());
                        write!(output_buffer, "\r\n")?;
                    } else {
                        log::error!("skipping invalid header value {value:?} for header {name}");
                    }
                }
            } else {
                log::error!("skipping invalid header with name {name:?}");
            }
        }

        write!(output_buffer, "\r\n")?;
        Ok(())
    }

    /// applies a mapping function from one transport to another. This
    /// is particularly useful for boxing the transport.
    pub fn map_transport<T: AsyncRead + AsyncWrite + Send + Sync + Unpin + 'static>(
        self,
        f: impl Fn(Transport) -> T,
    ) -> Conn<T> {
        let Conn {
            request_headers,
            response_headers,
            path,
            query,
            status,
            version,
            state,
            transport,
            buffer,
            request_body_state,
            method,
            response_body,
            stopper,
            after_send,
            start_time,
            peer_ip,
            http_config,
        } = self;

        Conn {
            request_headers,
            response_headers,
            method,
            response_body,
            path,
            query,
            status,
            version,
            state,
            transport: f(transport),
            buffer,
            request_body_state,
            stopper,
            after_send,
            start_time,
            peer_ip,
            http_config,
        }
    }
}

impl<Transport> Conn<Transport> {
    /// Get a mutable reference to the transport.
    ///
    /// Reading from or writing to the transport will disrupt the http
    /// protocol; this exists for transport-level configuration calls
    /// only.
    pub fn transport_mut(&mut self) -> &mut Transport {
        &mut self.transport
    }
}
