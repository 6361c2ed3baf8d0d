use crate::{copy, http_config::DEFAULT_CONFIG, Body, Buffer, Error, HttpConfig, MutCow, Result};
use async_io::Timer;
use encoding_rs::Encoding;
use futures_lite::{ready, AsyncRead, AsyncReadExt, AsyncWrite};
use std::{
    fmt::{self, Debug, Formatter},
    future::Future,
    io::{self, ErrorKind, Seek, SeekFrom, Write},
    pin::Pin,
    task::{Context, Poll},
    time::Duration,
};
use tempfile::SpooledTempFile;
use Poll::{Pending, Ready};
use ReceivedBodyState::{Chunked, CloseDelimited, End, FixedLength, PartialChunkSize, Start};

/// bodies above this size spill from memory to disk when spooled
pub const SPOOL_THRESHOLD: usize = 8 * 1024 * 1024;

/// A received http body.
///
/// This type represents a body that will be pulled from the
/// underlying transport, which it may either borrow from a
/// [`Conn`](crate::Conn) or own. Bytes that were read past the head
/// are returned first; the rest is read from the transport on demand,
/// decoding chunked framing when the message declares it.
///
/// ## Bounds checking
///
/// Every `ReceivedBody` has a maximum length beyond which
/// [`read_bytes`](ReceivedBody::read_bytes) and
/// [`read_string`](ReceivedBody::read_string) will return an error,
/// configured with [`HttpConfig::with_received_body_max_len`].
/// [`spool`](ReceivedBody::spool) is exempt from this bound, since it
/// does not hold the content in memory.
///
/// ## Read deadlines
///
/// Each individual read from the transport is subject to the
/// configured read timeout (default 1s), surfacing
/// [`Error::Timeout`]-equivalent `TimedOut` io errors.
pub struct ReceivedBody<'conn, Transport> {
    content_length: Option<u64>,
    buffer: MutCow<'conn, Buffer>,
    transport: Option<MutCow<'conn, Transport>>,
    state: MutCow<'conn, ReceivedBodyState>,
    on_completion: Option<Box<dyn Fn(Transport) + Send + Sync + 'static>>,
    encoding: &'static Encoding,
    max_len: u64,
    initial_len: usize,
    copy_loops_per_yield: usize,
    max_preallocate: usize,
    read_timeout: Option<Duration>,
    timer: Option<Timer>,
    close_delimited: bool,
}

impl<'conn, Transport> ReceivedBody<'conn, Transport>
where
    Transport: AsyncRead + Unpin + Send + Sync + 'static,
{
    #[allow(missing_docs)]
    #[doc(hidden)]
    pub fn new(
        content_length: Option<u64>,
        buffer: impl Into<MutCow<'conn, Buffer>>,
        transport: impl Into<MutCow<'conn, Transport>>,
        state: impl Into<MutCow<'conn, ReceivedBodyState>>,
        on_completion: Option<Box<dyn Fn(Transport) + Send + Sync + 'static>>,
        encoding: &'static Encoding,
    ) -> Self {
        Self::new_with_config(
            content_length,
            buffer,
            transport,
            state,
            on_completion,
            encoding,
            &DEFAULT_CONFIG,
        )
    }

    pub(crate) fn new_with_config(
        content_length: Option<u64>,
        buffer: impl Into<MutCow<'conn, Buffer>>,
        transport: impl Into<MutCow<'conn, Transport>>,
        state: impl Into<MutCow<'conn, ReceivedBodyState>>,
        on_completion: Option<Box<dyn Fn(Transport) + Send + Sync + 'static>>,
        encoding: &'static Encoding,
        config: &HttpConfig,
    ) -> Self {
        Self {
            content_length,
            buffer: buffer.into(),
            transport: Some(transport.into()),
            state: state.into(),
            on_completion,
            encoding,
            max_len: config.received_body_max_len,
            initial_len: config.received_body_initial_len,
            copy_loops_per_yield: config.copy_loops_per_yield,
            max_preallocate: config.received_body_max_preallocate,
            read_timeout: Some(config.read_timeout),
            timer: None,
            close_delimited: false,
        }
    }

    /// Treat a body without a content-length as delimited by
    /// connection close instead of chunked transfer encoding. Bodies
    /// with a content-length are unaffected.
    #[must_use]
    pub fn with_close_delimited(mut self) -> Self {
        self.close_delimited = true;
        self
    }

    /// Returns the content-length of this body, if available. This
    /// usually is derived from the content-length header. If the http
    /// request or response that this body is attached to uses
    /// transfer-encoding chunked, this will be None.
    pub fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    /// returns the character encoding of this body, usually
    /// determined from the content type (mime-type) of the associated
    /// message
    pub fn encoding(&self) -> &'static Encoding {
        self.encoding
    }

    /// Set the maximum length that can be read from this body into
    /// memory before error
    pub fn set_max_len(&mut self, max_len: u64) {
        self.max_len = max_len;
    }

    /// chainable setter for the maximum length that can be read from
    /// this body into memory before error
    #[must_use]
    pub fn with_max_len(mut self, max_len: u64) -> Self {
        self.set_max_len(max_len);
        self
    }

    /// override the per-read deadline, or disable it with None
    pub fn set_read_timeout(&mut self, read_timeout: Option<Duration>) {
        self.read_timeout = read_timeout;
    }

    /// chainable setter for the per-read deadline
    #[must_use]
    pub fn with_read_timeout(mut self, read_timeout: Option<Duration>) -> Self {
        self.set_read_timeout(read_timeout);
        self
    }

    /// # Reads the entire body to String.
    ///
    /// This uses the encoding determined by the content-type (mime)
    /// charset. If an encoding problem is encountered, the String
    /// returned will contain utf8 replacement characters.
    ///
    /// Note that this can only be performed once, as the underlying
    /// data is not cached anywhere. This is the only copy of the body
    /// contents.
    ///
    /// # Errors
    ///
    /// This will return an error if there is an io error on the
    /// underlying transport, such as a disconnect, or if the length
    /// exceeds the configured maximum.
    pub async fn read_string(self) -> Result<String> {
        let encoding = self.encoding();
        let bytes = self.read_bytes().await?;
        let (s, _, _) = encoding.decode(&bytes);
        Ok(s.to_string())
    }

    /// Similar to [`ReceivedBody::read_string`], but returns the raw
    /// bytes. This is useful for bodies that are not text.
    ///
    /// # Errors
    ///
    /// This will return an error if there is an io error on the
    /// underlying transport, such as a disconnect, or if the length
    /// exceeds the configured maximum.
    pub async fn read_bytes(mut self) -> Result<Vec<u8>> {
        let mut vec = if let Some(len) = self.content_length {
            if len > self.max_len {
                return Err(Error::ReceivedBodyTooLong(self.max_len));
            }

            let len = usize::try_from(len).map_err(|_| Error::ReceivedBodyTooLong(self.max_len))?;

            Vec::with_capacity(len.min(self.max_preallocate))
        } else {
            Vec::with_capacity(self.initial_len)
        };

        self.read_to_end(&mut vec).await?;
        Ok(vec)
    }

    /// Read the entire body into a spooled temporary file: contents
    /// stay in memory up to [`SPOOL_THRESHOLD`] and spill to disk
    /// beyond it. The returned file is rewound to the start. This is
    /// the safer way to accept bodies of unbounded size, and is what
    /// the multipart decoder uses for part contents.
    ///
    /// # Errors
    ///
    /// This will return an error if there is an io error on the
    /// underlying transport, such as a disconnect
    pub async fn spool(mut self) -> Result<SpooledTempFile> {
        self.max_len = u64::MAX;
        let mut spool = SpooledTempFile::new(SPOOL_THRESHOLD);
        let mut buf = vec![0; 16 * 1024];
        loop {
            let bytes = self.read(&mut buf).await?;
            if bytes == 0 {
                break;
            }
            spool.write_all(&buf[..bytes])?;
        }
        spool.seek(SeekFrom::Start(0))?;
        Ok(spool)
    }

    fn owns_transport(&self) -> bool {
        self.transport.as_ref().is_some_and(MutCow::is_owned)
    }

    fn read_raw(&mut self, cx: &mut Context<'_>, buf: &mut [u8]) -> Poll<io::Result<usize>> {
        if let Some(transport) = self.transport.as_deref_mut() {
            read_buffered(&mut self.buffer, transport, cx, buf)
        } else {
            Ready(Err(ErrorKind::NotConnected.into()))
        }
    }

    /// Consumes the remainder of this body from the underlying
    /// transport by reading it to the end and discarding the
    /// contents. This is important for http1.1 keepalive, but most of
    /// the time you do not need to directly call this. It returns the
    /// number of bytes consumed.
    ///
    /// # Errors
    ///
    /// This will return an [`std::io::Result::Err`] if there is an io
    /// error on the underlying transport, such as a disconnect
    pub async fn drain(self) -> io::Result<u64> {
        let copy_loops_per_yield = self.copy_loops_per_yield;
        copy(self, futures_lite::io::sink(), copy_loops_per_yield).await
    }
}

impl<T> ReceivedBody<'static, T> {
    /// takes the static transport from this received body
    pub fn take_transport(&mut self) -> Option<T> {
        self.transport.take().map(MutCow::unwrap_owned)
    }
}

pub(crate) fn read_buffered<Transport>(
    buffer: &mut Buffer,
    transport: &mut Transport,
    cx: &mut Context<'_>,
    buf: &mut [u8],
) -> Poll<io::Result<usize>>
where
    Transport: AsyncRead + Unpin,
{
    if buffer.is_empty() {
        Pin::new(transport).poll_read(cx, buf)
    } else if buffer.len() >= buf.len() {
        let len = buf.len();
        buf.copy_from_slice(&buffer[..len]);
        buffer.ignore_front(len);
        Ready(Ok(len))
    } else {
        let buffered = buffer.len();
        buf[..buffered].copy_from_slice(buffer);
        buffer.truncate(0);
        match Pin::new(transport).poll_read(cx, &mut buf[buffered..]) {
            Ready(Ok(additional)) => Ready(Ok(additional + buffered)),
            Pending => Ready(Ok(buffered)),
            other @ Ready(_) => other,
        }
    }
}

/// Decode the chunked framing in `buf` in place.
///
/// Two cursors walk the buffer: `scan` is the next unexamined byte,
/// and `filled` is where decoded payload is compacted at the front —
/// payload only ever moves backwards, so the two regions never
/// collide. Framing that cannot be resolved yet (a size line split
/// across reads) and anything after the terminating chunk (the next
/// pipelined message) is stashed in `carry`.
///
/// `chunk_remaining` counts the bytes still owed to the current
/// chunk, *including* its two closing CRLF bytes, so a chunk split
/// anywhere — even inside its trailing CRLF — resumes correctly on
/// the next call.
pub(crate) fn decode_chunked_frames(
    carry: &mut Buffer,
    mut chunk_remaining: u64,
    mut total: u64,
    buf: &mut [u8],
    max_len: u64,
) -> io::Result<(ReceivedBodyState, usize)> {
    if buf.is_empty() {
        // eof mid-body
        return Err(io::Error::from(ErrorKind::ConnectionAborted));
    }

    let mut scan = 0;
    let mut filled = 0;

    loop {
        // drain the current chunk: payload first, then its closing crlf
        while chunk_remaining > 0 {
            let unread = buf.len() - scan;
            if unread == 0 {
                return Ok((
                    Chunked {
                        remaining: chunk_remaining,
                        total,
                    },
                    filled,
                ));
            }

            let payload_left =
                usize::try_from(chunk_remaining.saturating_sub(2)).unwrap_or(usize::MAX);
            if payload_left > 0 {
                let take = payload_left.min(unread);
                buf.copy_within(scan..scan + take, filled);
                filled += take;
                scan += take;
                chunk_remaining -= take as u64;

                total += take as u64;
                if total > max_len {
                    return Err(io::Error::new(
                        ErrorKind::Unsupported,
                        "chunked body longer than allowed",
                    ));
                }
            } else {
                let take = usize::try_from(chunk_remaining).unwrap_or(2).min(unread);
                scan += take;
                chunk_remaining -= take as u64;
            }
        }

        if scan == buf.len() {
            return Ok((Chunked { remaining: 0, total }, filled));
        }

        match httparse::parse_chunk_size(&buf[scan..]) {
            Ok(httparse::Status::Complete((framing, 0))) => {
                scan += framing;
                // the terminating chunk closes with one more crlf;
                // trailers are not supported. bytes beyond it belong
                // to the next message on this connection.
                scan += 2.min(buf.len() - scan);
                if scan < buf.len() {
                    carry.extend_from_slice(&buf[scan..]);
                }
                return Ok((End, filled));
            }

            Ok(httparse::Status::Complete((framing, size))) => {
                scan += framing;
                chunk_remaining = size.checked_add(2).ok_or_else(|| {
                    io::Error::new(ErrorKind::InvalidData, "chunk size overflow")
                })?;
            }

            Ok(httparse::Status::Partial) => {
                carry.extend_from_slice(&buf[scan..]);
                return Ok((PartialChunkSize { total }, filled));
            }

            Err(_) => {
                return Err(io::Error::new(ErrorKind::InvalidData, "invalid chunk size"));
            }
        }
    }
}

type StateOutput = Poll<io::Result<(ReceivedBodyState, usize)>>;

impl<'conn, Transport> ReceivedBody<'conn, Transport>
where
    Transport: AsyncRead + Unpin + Send + Sync + 'static,
{
    #[inline]
    fn handle_start(&mut self) -> StateOutput {
        Ready(Ok((
            match self.content_length {
                Some(0) => End,

                Some(total_length) if total_length < self.max_len => FixedLength {
                    current_index: 0,
                    total: total_length,
                },

                Some(_) => {
                    return Ready(Err(io::Error::new(
                        ErrorKind::Unsupported,
                        "content too long",
                    )));
                }

                None if self.close_delimited => CloseDelimited,

                None => Chunked {
                    remaining: 0,
                    total: 0,
                },
            },
            0,
        )))
    }

    #[inline]
    fn handle_chunked(
        &mut self,
        cx: &mut Context<'_>,
        buf: &mut [u8],
        remaining: u64,
        total: u64,
    ) -> StateOutput {
        let bytes = ready!(self.read_raw(cx, buf)?);
        Ready(decode_chunked_frames(
            &mut self.buffer,
            remaining,
            total,
            &mut buf[..bytes],
            self.max_len,
        ))
    }

    /// A size line was split across reads: the fragment lives in the
    /// conn buffer, so read fresh transport bytes, append, and try
    /// the parse again.
    #[inline]
    fn handle_partial_size(
        &mut self,
        cx: &mut Context<'_>,
        buf: &mut [u8],
        total: u64,
    ) -> StateOutput {
        let transport = self
            .transport
            .as_deref_mut()
            .ok_or_else(|| io::Error::from(ErrorKind::NotConnected))?;
        let bytes = ready!(Pin::new(transport).poll_read(cx, buf))?;
        if bytes == 0 {
            return Ready(Err(io::Error::from(ErrorKind::ConnectionAborted)));
        }

        self.buffer.extend_from_slice(&buf[..bytes]);

        Ready(match httparse::parse_chunk_size(&self.buffer) {
            Ok(httparse::Status::Complete((framing, 0))) => {
                self.buffer.ignore_front(framing);
                // past the terminating chunk's final crlf, remaining
                // buffered bytes belong to the next message
                let skip = 2.min(self.buffer.len());
                self.buffer.ignore_front(skip);
                Ok((End, 0))
            }

            Ok(httparse::Status::Complete((framing, size))) => {
                self.buffer.ignore_front(framing);
                match size.checked_add(2) {
                    Some(remaining) => Ok((Chunked { remaining, total }, 0)),
                    None => Err(io::Error::new(ErrorKind::InvalidData, "chunk size overflow")),
                }
            }

            Ok(httparse::Status::Partial) => Ok((PartialChunkSize { total }, 0)),

            Err(_) => Err(io::Error::new(ErrorKind::InvalidData, "invalid chunk size")),
        })
    }

    #[inline]
    fn handle_fixed_length(
        &mut self,
        cx: &mut Context<'_>,
        buf: &mut [u8],
        current_index: u64,
        total: u64,
    ) -> StateOutput {
        let want = usize::try_from(total - current_index)
            .unwrap_or(usize::MAX)
            .min(buf.len());
        let bytes = ready!(self.read_raw(cx, &mut buf[..want])?);
        if bytes == 0 {
            return Ready(Err(io::Error::from(ErrorKind::ConnectionAborted)));
        }

        let current_index = current_index + bytes as u64;
        Ready(Ok(if current_index == total {
            (End, bytes)
        } else {
            (
                FixedLength {
                    current_index,
                    total,
                },
                bytes,
            )
        }))
    }

    #[inline]
    fn handle_close_delimited(&mut self, cx: &mut Context<'_>, buf: &mut [u8]) -> StateOutput {
        let bytes = ready!(self.read_raw(cx, buf)?);
        if bytes == 0 {
            Ready(Ok((End, 0)))
        } else {
            Ready(Ok((CloseDelimited, bytes)))
        }
    }

    fn poll_step(&mut self, cx: &mut Context<'_>, buf: &mut [u8]) -> StateOutput {
        match *self.state {
            Start => self.handle_start(),
            Chunked { remaining, total } => self.handle_chunked(cx, buf, remaining, total),
            PartialChunkSize { total } => self.handle_partial_size(cx, buf, total),
            FixedLength {
                current_index,
                total,
            } => self.handle_fixed_length(cx, buf, current_index, total),
            CloseDelimited => self.handle_close_delimited(cx, buf),
            End => Ready(Ok((End, 0))),
        }
    }
}

impl<'conn, Transport> AsyncRead for ReceivedBody<'conn, Transport>
where
    Transport: AsyncRead + Unpin + Send + Sync + 'static,
{
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut [u8],
    ) -> Poll<io::Result<usize>> {
        for _ in 0..self.copy_loops_per_yield {
            let (new_body_state, bytes) = match self.poll_step(cx, buf) {
                Ready(result) => result?,
                Pending => {
                    // the transport had nothing for us; arm the read
                    // deadline and surface a timeout if it elapses
                    // before the transport wakes us again
                    if let Some(read_timeout) = self.read_timeout {
                        let timer = self
                            .timer
                            .get_or_insert_with(|| Timer::after(read_timeout));
                        if Pin::new(timer).poll(cx).is_ready() {
                            self.timer = None;
                            return Ready(Err(io::Error::new(
                                ErrorKind::TimedOut,
                                "body read timed out",
                            )));
                        }
                    }
                    return Pending;
                }
            };

            self.timer = None;
            *self.state = new_body_state;

            if *self.state == End {
                if self.on_completion.is_some() && self.owns_transport() {
                    let transport = self.transport.take().unwrap().unwrap_owned();
                    let on_completion = self.on_completion.take().unwrap();
                    on_completion(transport);
                }
                return Ready(Ok(bytes));
            } else if bytes != 0 {
                return Ready(Ok(bytes));
            }
        }

        cx.waker().wake_by_ref();
        Pending
    }
}

impl<'conn, Transport> Debug for ReceivedBody<'conn, Transport> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReceivedBody")
            .field("state", &*self.state)
            .field("content_length", &self.content_length)
            .field("buffer", &"..")
            .field("on_completion", &self.on_completion.is_some())
            .field("read_timeout", &self.read_timeout)
            .finish()
    }
}

/// the read state of a [`ReceivedBody`]
#[derive(Debug, Clone, Copy, Eq, PartialEq, Default)]
#[allow(missing_docs)]
pub enum ReceivedBodyState {
    /// initial state
    #[default]
    Start,

    /// read state for a chunked-encoded body. the number of bytes
    /// that have been read from the current chunk is the difference
    /// between remaining and total.
    Chunked {
        /// remaining indicates the bytes left _in the current
        /// chunk_, including the two framing bytes that close the
        /// chunk. initial state is zero.
        remaining: u64,

        /// total indicates the absolute number of payload bytes read
        /// from all chunks
        total: u64,
    },

    /// a chunk size line was split across reads and is being
    /// accumulated
    PartialChunkSize {
        /// total payload bytes read from all chunks
        total: u64,
    },

    /// read state for a fixed-length body.
    FixedLength {
        /// current index represents the bytes that have already been
        /// read. initial state is zero
        current_index: u64,

        /// total length indicates the claimed length, usually
        /// determined by the content-length header
        total: u64,
    },

    /// read state for a body without framing, delimited by the peer
    /// closing the connection
    CloseDelimited,

    /// the terminal read state
    End,
}

impl<Transport> From<ReceivedBody<'static, Transport>> for Body
where
    Transport: AsyncRead + AsyncWrite + Send + Sync + Unpin + 'static,
{
    fn from(rb: ReceivedBody<'static, Transport>) -> Self {
        let len = rb.content_length;
        Body::new_streaming(rb, len)
    }
}

#[cfg(test)]
mod tests {
    use super::{decode_chunked_frames, ReceivedBody, ReceivedBodyState};
    use crate::{http_config::DEFAULT_CONFIG, Buffer, HttpConfig};
    use encoding_rs::UTF_8;
    use futures_lite::{future::block_on, io::Cursor, AsyncRead, AsyncReadExt};

    fn body_for(
        input: &str,
        content_length: Option<u64>,
        config: &HttpConfig,
    ) -> ReceivedBody<'static, Cursor<String>> {
        ReceivedBody::new_with_config(
            content_length,
            Buffer::with_capacity(64),
            Cursor::new(String::from(input)),
            ReceivedBodyState::Start,
            None,
            UTF_8,
            config,
        )
    }

    async fn drip_read<R: AsyncRead + Unpin>(reader: &mut R, step: usize) -> crate::Result<Vec<u8>> {
        let mut out = Vec::new();
        let mut buf = vec![0; step];
        loop {
            match reader.read(&mut buf).await? {
                0 => return Ok(out),
                bytes => out.extend_from_slice(&buf[..bytes]),
            }
        }
    }

    /// chunk-frame each part, close with the terminator
    fn frame(parts: &[&str]) -> String {
        let mut framed = String::new();
        for part in parts {
            framed.push_str(&format!("{:X}\r\n{part}\r\n", part.len()));
        }
        framed.push_str("0\r\n\r\n");
        framed
    }

    #[test]
    fn chunked_bodies_reassemble_at_any_read_granularity() {
        block_on(async {
            let framed = frame(&["fre", "shet ", "toolkit"]);
            for step in 1..=32 {
                let mut body = body_for(&framed, None, &DEFAULT_CONFIG);
                let out = drip_read(&mut body, step).await.unwrap();
                assert_eq!(out, b"freshet toolkit", "step: {step}");
            }
        });
    }

    #[test]
    fn chunk_extensions_are_skipped() {
        block_on(async {
            let framed = "4;ext=a\r\nnets\r\n3; x=\"y\"\r\nuit\r\n0;last\r\n\r\n";
            for step in 1..=16 {
                let mut body = body_for(framed, None, &DEFAULT_CONFIG);
                let out = drip_read(&mut body, step).await.unwrap();
                assert_eq!(out, b"netsuit", "step: {step}");
            }
        });
    }

    #[test]
    fn decode_compacts_payload_to_the_front() {
        let mut carry = Buffer::with_capacity(64);
        let mut buf = b"2\r\nab\r\n3\r\ncde\r\n".to_vec();
        let (state, filled) =
            decode_chunked_frames(&mut carry, 0, 0, &mut buf, u64::MAX).unwrap();

        assert_eq!(&buf[..filled], b"abcde");
        assert_eq!(state, ReceivedBodyState::Chunked { remaining: 0, total: 5 });
        assert!(carry.is_empty());
    }

    #[test]
    fn decode_resumes_inside_a_chunk() {
        // a previous read stopped four payload bytes (+ crlf) short
        let mut carry = Buffer::with_capacity(64);
        let mut buf = b"shet\r\n0\r\n\r\n".to_vec();
        let (state, filled) =
            decode_chunked_frames(&mut carry, 4 + 2, 3, &mut buf, u64::MAX).unwrap();

        assert_eq!(&buf[..filled], b"shet");
        assert_eq!(state, ReceivedBodyState::End);
    }

    #[test]
    fn decode_resumes_inside_a_trailing_crlf() {
        let mut carry = Buffer::with_capacity(64);
        let mut buf = b"\n5\r\nhello".to_vec();
        let (state, filled) =
            decode_chunked_frames(&mut carry, 1, 2, &mut buf, u64::MAX).unwrap();

        assert_eq!(&buf[..filled], b"hello");
        assert_eq!(
            state,
            ReceivedBodyState::Chunked {
                remaining: 2,
                total: 7
            }
        );
    }

    #[test]
    fn bytes_after_the_terminator_are_carried_for_the_next_message() {
        let mut carry = Buffer::with_capacity(64);
        let mut buf = b"3\r\nabc\r\n0\r\n\r\nDELETE /next HTTP/1.1\r\n".to_vec();
        let (state, filled) =
            decode_chunked_frames(&mut carry, 0, 0, &mut buf, u64::MAX).unwrap();

        assert_eq!(&buf[..filled], b"abc");
        assert_eq!(state, ReceivedBodyState::End);
        assert_eq!(&carry[..], b"DELETE /next HTTP/1.1\r\n");
    }

    #[test]
    fn split_size_lines_are_carried() {
        let mut carry = Buffer::with_capacity(64);
        let mut buf = b"2\r\nhi\r\n1A".to_vec();
        let (state, filled) =
            decode_chunked_frames(&mut carry, 0, 0, &mut buf, u64::MAX).unwrap();

        assert_eq!(&buf[..filled], b"hi");
        assert_eq!(state, ReceivedBodyState::PartialChunkSize { total: 2 });
        assert_eq!(&carry[..], b"1A");
    }

    #[test]
    fn malformed_sizes_are_rejected() {
        let mut carry = Buffer::with_capacity(64);
        let mut buf = b"nope\r\ndata\r\n".to_vec();
        assert!(decode_chunked_frames(&mut carry, 0, 0, &mut buf, u64::MAX).is_err());
    }

    #[test]
    fn chunked_bodies_respect_the_length_bound() {
        block_on(async {
            let framed = frame(&["0123456789"]);
            let config = DEFAULT_CONFIG.with_received_body_max_len(4);
            for step in 1..=16 {
                let mut body = body_for(&framed, None, &config);
                assert!(drip_read(&mut body, step).await.is_err(), "step: {step}");
            }
        });
    }

    #[test]
    fn eof_before_the_terminator_is_an_error() {
        block_on(async {
            let mut body = body_for("3\r\nabc\r\n", None, &DEFAULT_CONFIG);
            assert!(drip_read(&mut body, 16).await.is_err());

            let mut body = body_for("", None, &DEFAULT_CONFIG);
            assert!(drip_read(&mut body, 16).await.is_err());
        });
    }

    #[test]
    fn chunked_read_string_and_read_bytes() {
        block_on(async {
            let content = frame(&["freshet "; 40]);

            assert_eq!(
                body_for(&content, None, &DEFAULT_CONFIG)
                    .read_string()
                    .await
                    .unwrap(),
                "freshet ".repeat(40)
            );

            assert_eq!(
                body_for(&content, None, &DEFAULT_CONFIG)
                    .read_bytes()
                    .await
                    .unwrap()
                    .len(),
                320
            );

            assert!(body_for(&content, None, &DEFAULT_CONFIG)
                .with_max_len(100)
                .read_string()
                .await
                .is_err());
        });
    }

    #[test]
    fn spooling_is_not_length_bounded() {
        block_on(async {
            let content = frame(&["freshet "; 40]);
            let mut spooled = body_for(&content, None, &DEFAULT_CONFIG.with_received_body_max_len(100))
                .spool()
                .await
                .unwrap();

            use std::io::Read;
            let mut contents = String::new();
            spooled.read_to_string(&mut contents).unwrap();
            assert_eq!(contents.len(), 320);
        });
    }

    #[test]
    fn fixed_length_bodies_read_exactly() {
        block_on(async {
            for step in 1..=16 {
                let mut body = body_for("0123456789", Some(10), &DEFAULT_CONFIG);
                let out = drip_read(&mut body, step).await.unwrap();
                assert_eq!(out, b"0123456789", "step: {step}");
            }
        });
    }

    #[test]
    fn empty_fixed_length_bodies_are_complete_immediately() {
        block_on(async {
            let mut body = body_for("anything buffered", Some(0), &DEFAULT_CONFIG);
            let mut buf = [0u8; 8];
            assert_eq!(body.read(&mut buf).await.unwrap(), 0);
        });
    }

    #[test]
    fn reader_returns_none_after_expected_bytes() {
        block_on(async {
            // the transport holds more bytes than the declared
            // length; reads stop at the declared length and the
            // surplus stays put
            let mut body = body_for("hello surplus", Some(5), &DEFAULT_CONFIG);
            let mut buf = vec![0; 64];
            assert_eq!(body.read(&mut buf).await.unwrap(), 5);
            assert_eq!(&buf[..5], b"hello");
            assert_eq!(body.read(&mut buf).await.unwrap(), 0);
            assert_eq!(body.read(&mut buf).await.unwrap(), 0);
        });
    }

    #[test]
    fn eof_short_of_the_declared_length_is_an_error() {
        block_on(async {
            let mut body = body_for("short", Some(20), &DEFAULT_CONFIG);
            assert!(drip_read(&mut body, 8).await.is_err());
        });
    }

    #[test]
    fn declared_lengths_past_the_bound_error_upfront() {
        block_on(async {
            let config = DEFAULT_CONFIG.with_received_body_max_len(8);
            let mut body = body_for("far too much content here", Some(25), &config);
            let mut buf = [0u8; 8];
            assert!(body.read(&mut buf).await.is_err());

            assert!(body_for("far too much content here", Some(25), &config)
                .read_bytes()
                .await
                .is_err());
        });
    }
}
