use crate::{
    codec::ChunkedDecoder, headers::parse_header_line, Error, Headers, LineParser, Method, Result,
    Version,
};

const CRLF: &[u8] = b"\r\n";
const LF: &[u8] = b"\n";

/// The first line of a request. The target is carried raw: the path
/// is not url-decoded, and the query is everything after the first
/// `?`, possibly empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLine {
    /// the request method
    pub method: Method,

    /// the raw, not-url-decoded path component of the request target
    pub path: String,

    /// the raw query component of the request target, empty when
    /// absent
    pub query: String,

    /// the protocol version token
    pub version: Version,
}

/// The first line of a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseLine {
    /// the protocol version token
    pub version: Version,

    /// the numeric status, 100..=599. Rendering maps registered codes
    /// to their canonical reason phrases via [`crate::Status`].
    pub code: u16,

    /// the reason phrase as sent by the peer, possibly empty
    pub reason: String,
}

/// A typed value produced by the [`Parser`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Atom {
    /// a parsed request line
    RequestLine(RequestLine),

    /// a parsed response line
    ResponseLine(ResponseLine),

    /// the complete header block
    Headers(Headers),

    /// a run of decoded body bytes
    BodyChunk(Vec<u8>),

    /// the message is complete. the parser has already reset itself
    /// for the next message on the connection.
    Complete,
}

#[derive(Debug)]
enum State {
    Line,
    Headers,
    BodyLength { expected: u64, read: u64 },
    BodyChunked { decoder: ChunkedDecoder },
    BodyEos,
    BodyUntilClose,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Request,
    Response,
}

/// An incremental, reentrant HTTP/1.1 message parser.
///
/// Feed it bytes as they arrive; it emits typed [`Atom`]s: a request
/// or response line, a header block, zero or more body chunks, and a
/// completion marker. After `Complete` the parser has reset itself,
/// so pipelined messages on one connection parse in sequence from the
/// same feed loop.
///
/// With [`stop_after_headers`](Parser::stop_after_headers) set, the
/// parser pauses consumption at the body boundary and reports how
/// many bytes it consumed, letting a pull-based reader like
/// [`crate::ReceivedBody`] take over the transport for the body.
///
/// Body selection for requests follows the method: only POST, PUT and
/// PATCH carry bodies. `Transfer-Encoding: chunked` wins over
/// `Content-Length`; with neither present, a body-carrying request
/// falls back to reading a single LF-terminated segment. Responses
/// without framing headers are read until end of input, signalled
/// with [`Parser::eof`].
#[derive(Debug)]
pub struct Parser {
    kind: Kind,
    state: State,
    line: LineParser,
    headers: Headers,
    method: Option<Method>,
    stop_after_headers: bool,
}

impl Parser {
    /// construct a parser for requests, as read by a server
    pub fn request() -> Self {
        Self::new(Kind::Request)
    }

    /// construct a parser for responses, as read by a client
    pub fn response() -> Self {
        Self::new(Kind::Response)
    }

    fn new(kind: Kind) -> Self {
        Self {
            kind,
            state: State::Line,
            line: LineParser::new(),
            headers: Headers::new(),
            method: None,
            stop_after_headers: false,
        }
    }

    /// when set, [`feed`](Parser::feed) stops consuming input at the
    /// transition from head to body, so the caller can hand the
    /// transport to a pull-based body reader
    pub fn stop_after_headers(mut self, stop: bool) -> Self {
        self.stop_after_headers = stop;
        self
    }

    /// restore the parser to its initial state, permitting reuse of
    /// the parser (and its connection) for the next message
    pub fn reset(&mut self) {
        self.state = State::Line;
        self.line.reset(CRLF);
        self.headers = Headers::new();
        self.method = None;
    }

    /// whether the parser is between messages: nothing fed since
    /// construction, the last reset, or the last `Complete`
    pub fn is_at_message_boundary(&self) -> bool {
        matches!(self.state, State::Line) && self.line.pending().is_empty()
    }

    /// Feed bytes to the parser, returning the atoms that completed
    /// and the number of bytes consumed.
    ///
    /// Everything is consumed unless `stop_after_headers` pauses the
    /// parser at a body boundary; unconsumed bytes should be fed
    /// again (or handed to the body reader) by the caller.
    ///
    /// # Errors
    ///
    /// Malformed request lines, header names, and chunk framing are
    /// terminal errors for the connection.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<(Vec<Atom>, usize)> {
        let mut atoms = Vec::new();
        let mut consumed = 0;

        while consumed < chunk.len() {
            match &mut self.state {
                State::Line => {
                    let (line, n) = self.line.feed(chunk, consumed);
                    consumed += n;
                    if let Some(line) = line {
                        match self.kind {
                            Kind::Request => {
                                let request_line = parse_request_line(&line)?;
                                self.method = Some(request_line.method);
                                atoms.push(Atom::RequestLine(request_line));
                            }
                            Kind::Response => {
                                atoms.push(Atom::ResponseLine(parse_response_line(&line)?));
                            }
                        }
                        self.state = State::Headers;
                    }
                }

                State::Headers => {
                    let (line, n) = self.line.feed(chunk, consumed);
                    consumed += n;
                    let Some(line) = line else { continue };

                    if line.is_empty() {
                        let headers = std::mem::take(&mut self.headers);
                        let body_state = self.select_body_state(&headers)?;
                        atoms.push(Atom::Headers(headers));

                        match body_state {
                            None => {
                                atoms.push(Atom::Complete);
                                self.reset();
                            }
                            Some(state) => {
                                if matches!(state, State::BodyEos) {
                                    self.line.reset(LF);
                                }
                                self.state = state;
                            }
                        }

                        if self.stop_after_headers {
                            return Ok((atoms, consumed));
                        }
                    } else if let Some((name, value)) = parse_header_line(&line)? {
                        self.headers.append(name, value);
                    }
                    // lines without a colon are ignored
                }

                State::BodyLength { expected, read } => {
                    let available = chunk.len() - consumed;
                    let want = usize::try_from(*expected - *read)
                        .unwrap_or(usize::MAX)
                        .min(available);
                    atoms.push(Atom::BodyChunk(chunk[consumed..consumed + want].to_vec()));
                    *read += want as u64;
                    consumed += want;
                    if read == expected {
                        atoms.push(Atom::Complete);
                        self.reset();
                    }
                }

                State::BodyChunked { decoder } => {
                    if let Some(bytes) = decoder.feed(&chunk[consumed..])? {
                        atoms.push(Atom::BodyChunk(bytes));
                    }
                    if decoder.is_done() {
                        let remainder = decoder.take_remainder();
                        consumed = chunk.len() - remainder.len();
                        atoms.push(Atom::Complete);
                        self.reset();
                    } else {
                        consumed = chunk.len();
                    }
                }

                State::BodyEos => {
                    let (line, n) = self.line.feed(chunk, consumed);
                    consumed += n;
                    if let Some(line) = line {
                        atoms.push(Atom::BodyChunk(line));
                        atoms.push(Atom::Complete);
                        self.reset();
                    }
                }

                State::BodyUntilClose => {
                    atoms.push(Atom::BodyChunk(chunk[consumed..].to_vec()));
                    consumed = chunk.len();
                }
            }
        }

        Ok((atoms, consumed))
    }

    /// Signal that the peer closed the connection.
    ///
    /// Close-delimited response bodies complete here; any other
    /// mid-message state is a premature close.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Closed`] when the message was incomplete.
    pub fn eof(&mut self) -> Result<Vec<Atom>> {
        if matches!(self.state, State::BodyUntilClose) {
            self.reset();
            return Ok(vec![Atom::Complete]);
        }

        if self.is_at_message_boundary() {
            Ok(Vec::new())
        } else {
            Err(Error::Closed)
        }
    }

    /// `None` means no body: the message is complete at the end of
    /// the head.
    fn select_body_state(&self, headers: &Headers) -> Result<Option<State>> {
        if self.kind == Kind::Request && !self.method.is_some_and(|m| m.has_body()) {
            return Ok(None);
        }

        if headers.is_chunked() {
            if headers.content_length()?.is_some() {
                return Err(Error::UnexpectedHeader("content-length".into()));
            }
            return Ok(Some(State::BodyChunked {
                decoder: ChunkedDecoder::new(),
            }));
        }

        match headers.content_length()? {
            Some(0) => Ok(None),
            Some(expected) => Ok(Some(State::BodyLength { expected, read: 0 })),
            None => match self.kind {
                Kind::Request => Ok(Some(State::BodyEos)),
                Kind::Response => Ok(Some(State::BodyUntilClose)),
            },
        }
    }
}

fn parse_request_line(line: &[u8]) -> Result<RequestLine> {
    if !line.is_ascii() {
        return Err(Error::InvalidHead);
    }

    let first_space = memchr::memchr(b' ', line).ok_or(Error::MissingMethod)?;
    let last_space = memchr::memrchr(b' ', line).ok_or(Error::MissingMethod)?;
    if first_space == last_space {
        return Err(Error::InvalidHead);
    }

    let method = Method::parse(&line[..first_space])?;
    let target = &line[first_space + 1..last_space];
    if target.is_empty() {
        return Err(Error::RequestPathMissing);
    }

    let (path, query) = match memchr::memchr(b'?', target) {
        Some(index) => (&target[..index], &target[index + 1..]),
        None => (target, &target[target.len()..]),
    };

    let version = Version::parse(&line[last_space + 1..])?;
    if !matches!(version, Version::Http1_0 | Version::Http1_1) {
        return Err(Error::UnsupportedVersion(version));
    }

    Ok(RequestLine {
        method,
        path: String::from_utf8_lossy(path).to_string(),
        query: String::from_utf8_lossy(query).to_string(),
        version,
    })
}

fn parse_response_line(line: &[u8]) -> Result<ResponseLine> {
    if !line.is_ascii() {
        return Err(Error::InvalidHead);
    }

    let first_space = memchr::memchr(b' ', line).ok_or(Error::InvalidHead)?;
    let version = Version::parse(&line[..first_space])?;

    let rest = &line[first_space + 1..];
    let (code, reason) = match memchr::memchr(b' ', rest) {
        Some(index) => (&rest[..index], &rest[index + 1..]),
        None => (rest, &rest[rest.len()..]),
    };

    let code: u16 = std::str::from_utf8(code)
        .ok()
        .and_then(|c| c.parse().ok())
        .ok_or(Error::InvalidStatus)?;

    if !(100..=599).contains(&code) {
        return Err(Error::InvalidStatus);
    }

    Ok(ResponseLine {
        version,
        code,
        reason: String::from_utf8_lossy(reason).to_string(),
    })
}
