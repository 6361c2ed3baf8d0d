use futures_lite::{io::Cursor, ready, AsyncRead, AsyncReadExt, Stream};
use std::{
    borrow::Cow,
    fmt::Debug,
    io::{Error, ErrorKind, Result},
    path::Path,
    pin::Pin,
    task::{Context, Poll},
};
use BodyType::{Empty, Static, Streaming};

/// The freshet representation of an http body. This can contain
/// in-memory content (`&'static [u8]` or `Vec<u8>`), a
/// filesystem-backed reader, or any boxed [`AsyncRead`] source such
/// as a channel-fed event stream.
///
/// Bodies with a known length serialize with a `Content-Length`;
/// bodies without one are streamed and delimited by connection close
/// on responses (or chunked transfer encoding on client requests).
#[derive(Debug, Default)]
pub struct Body(BodyType);

impl Body {
    /// Construct a new body from a streaming [`AsyncRead`] source. If
    /// you have the body content in memory already, prefer
    /// [`Body::new_static`] or one of the From conversions.
    pub fn new_streaming(
        async_read: impl AsyncRead + Send + Sync + 'static,
        len: Option<u64>,
    ) -> Self {
        Self(Streaming {
            async_read: Box::pin(async_read),
            len,
            done: false,
            progress: 0,
        })
    }

    /// Construct a fixed-length Body from a `Vec<u8>` or `&'static
    /// [u8]`.
    pub fn new_static(content: impl Into<Cow<'static, [u8]>>) -> Self {
        Self(Static {
            content: content.into(),
            cursor: 0,
        })
    }

    /// Construct a filesystem-backed body. The file length is
    /// captured at open time and becomes the `Content-Length`;
    /// content is streamed from disk in 64kb reads rather than loaded
    /// into memory.
    ///
    /// # Errors
    ///
    /// Returns an io error if the file cannot be opened or its
    /// metadata read.
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let file = async_fs::File::open(path.as_ref()).await?;
        let len = file.metadata().await?.len();
        Ok(Self::new_streaming(file, Some(len)))
    }

    /// Construct a streaming body from a synchronous iterator of
    /// chunks. The length is unknown, so responses carrying this body
    /// are close-delimited.
    pub fn from_iter<I, C>(iter: I) -> Self
    where
        I: IntoIterator<Item = C>,
        I::IntoIter: Send + Sync + 'static,
        C: AsRef<[u8]>,
    {
        Self::from_stream(futures_lite::stream::iter(iter.into_iter()))
    }

    /// Construct a streaming body from an async [`Stream`] of chunks.
    /// The length is unknown, so responses carrying this body are
    /// close-delimited. Dropping the body drops the stream, running
    /// any producer-side finalizers.
    pub fn from_stream<S, C>(stream: S) -> Self
    where
        S: Stream<Item = C> + Unpin + Send + Sync + 'static,
        C: AsRef<[u8]>,
    {
        Self::new_streaming(StreamBody::new(stream), None)
    }

    /// Retrieve a borrow of the static content in this body. If this
    /// body is a streaming body or an empty body, this will return
    /// None.
    pub fn static_bytes(&self) -> Option<&[u8]> {
        match &self.0 {
            Static { content, .. } => Some(content.as_ref()),
            _ => None,
        }
    }

    /// Transform this Body into a dyn `AsyncRead`. This will wrap
    /// static content in a [`Cursor`].
    pub fn into_reader(self) -> Pin<Box<dyn AsyncRead + Send + Sync>> {
        match self.0 {
            Streaming { async_read, .. } => async_read,
            Static { content, .. } => Box::pin(Cursor::new(content)),
            Empty => Box::pin(Cursor::new("")),
        }
    }

    /// Consume this body and return the full content. If the body was
    /// constructed with [`Body::new_streaming`], this reads the
    /// entire streaming body into memory, awaiting the streaming
    /// source's completion.
    ///
    /// # Errors
    ///
    /// This returns an error variant if there is an io error when
    /// reading from the underlying source, or if the body has already
    /// been partially read.
    pub async fn into_bytes(self) -> Result<Cow<'static, [u8]>> {
        match self.0 {
            Static { content, .. } => Ok(content),

            Streaming {
                mut async_read,
                len,
                progress: 0,
                done: false,
            } => {
                let mut buf = len
                    .and_then(|c| c.try_into().ok())
                    .map(Vec::with_capacity)
                    .unwrap_or_default();

                async_read.read_to_end(&mut buf).await?;

                Ok(Cow::Owned(buf))
            }

            Empty => Ok(Cow::Borrowed(b"")),

            Streaming { .. } => Err(Error::new(
                ErrorKind::Other,
                "body already read to completion",
            )),
        }
    }

    /// Retrieve the number of bytes that have been read from this
    /// body
    pub fn bytes_read(&self) -> u64 {
        match self.0 {
            Empty => 0,
            Static { cursor, .. } => cursor as u64,
            Streaming { progress, .. } => progress,
        }
    }

    /// returns the content length of this body, if known. Streaming
    /// bodies return None, which is what marks a response as
    /// close-delimited.
    pub fn len(&self) -> Option<u64> {
        match self.0 {
            Empty => Some(0),
            Static { ref content, .. } => Some(content.len() as u64),
            Streaming { len, .. } => len,
        }
    }

    /// determine if this body represents no data
    pub fn is_empty(&self) -> bool {
        match self.0 {
            Empty => true,
            Static { ref content, .. } => content.is_empty(),
            Streaming { len, .. } => len == Some(0),
        }
    }

    /// determine if this body represents static content
    pub fn is_static(&self) -> bool {
        matches!(self.0, Static { .. })
    }

    /// determine if this body represents streaming content
    pub fn is_streaming(&self) -> bool {
        matches!(self.0, Streaming { .. })
    }
}

impl AsyncRead for Body {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut [u8],
    ) -> Poll<Result<usize>> {
        match &mut self.0 {
            Empty => Poll::Ready(Ok(0)),

            Static { content, cursor } => {
                let length = content.len();
                if length == *cursor {
                    return Poll::Ready(Ok(0));
                }
                let bytes = (length - *cursor).min(buf.len());
                buf[0..bytes].copy_from_slice(&content[*cursor..*cursor + bytes]);
                *cursor += bytes;
                Poll::Ready(Ok(bytes))
            }

            Streaming {
                async_read,
                len,
                done,
                progress,
            } => {
                if *done {
                    return Poll::Ready(Ok(0));
                }

                let limit = match len {
                    Some(len) => (*len - *progress)
                        .try_into()
                        .unwrap_or(buf.len())
                        .min(buf.len()),
                    None => buf.len(),
                };

                let bytes = ready!(async_read.as_mut().poll_read(cx, &mut buf[..limit]))?;

                if bytes == 0 {
                    *done = true;
                } else {
                    *progress += bytes as u64;
                }

                Poll::Ready(Ok(bytes))
            }
        }
    }
}

#[derive(Default)]
enum BodyType {
    #[default]
    Empty,

    Static {
        content: Cow<'static, [u8]>,
        cursor: usize,
    },

    Streaming {
        async_read: Pin<Box<dyn AsyncRead + Send + Sync + 'static>>,
        progress: u64,
        len: Option<u64>,
        done: bool,
    },
}

impl Debug for BodyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Empty => f.debug_tuple("BodyType::Empty").finish(),
            Static { content, cursor } => f
                .debug_struct("BodyType::Static")
                .field("content", &String::from_utf8_lossy(content))
                .field("cursor", cursor)
                .finish(),
            Streaming {
                len,
                done,
                progress,
                ..
            } => f
                .debug_struct("BodyType::Streaming")
                .field("async_read", &"..")
                .field("len", &len)
                .field("done", &done)
                .field("progress", &progress)
                .finish(),
        }
    }
}

/// adapts a stream of chunks into an `AsyncRead`, buffering the
/// current chunk between reads
struct StreamBody<S> {
    stream: S,
    buffer: Vec<u8>,
    offset: usize,
}

impl<S> StreamBody<S> {
    fn new(stream: S) -> Self {
        Self {
            stream,
            buffer: Vec::new(),
            offset: 0,
        }
    }
}

impl<S, C> AsyncRead for StreamBody<S>
where
    S: Stream<Item = C> + Unpin + Send + Sync + 'static,
    C: AsRef<[u8]>,
{
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut [u8],
    ) -> Poll<Result<usize>> {
        let this = &mut *self;

        if this.offset == this.buffer.len() {
            match ready!(Pin::new(&mut this.stream).poll_next(cx)) {
                None => return Poll::Ready(Ok(0)),
                Some(chunk) => {
                    this.buffer.clear();
                    this.buffer.extend_from_slice(chunk.as_ref());
                    this.offset = 0;
                    if this.buffer.is_empty() {
                        cx.waker().wake_by_ref();
                        return Poll::Pending;
                    }
                }
            }
        }

        let bytes = (this.buffer.len() - this.offset).min(buf.len());
        buf[..bytes].copy_from_slice(&this.buffer[this.offset..this.offset + bytes]);
        this.offset += bytes;
        Poll::Ready(Ok(bytes))
    }
}

impl From<String> for Body {
    fn from(s: String) -> Self {
        s.into_bytes().into()
    }
}

impl From<&'static str> for Body {
    fn from(s: &'static str) -> Self {
        s.as_bytes().into()
    }
}

impl From<&'static [u8]> for Body {
    fn from(content: &'static [u8]) -> Self {
        Self::new_static(content)
    }
}

impl From<Vec<u8>> for Body {
    fn from(content: Vec<u8>) -> Self {
        Self::new_static(content)
    }
}

impl From<Cow<'static, [u8]>> for Body {
    fn from(value: Cow<'static, [u8]>) -> Self {
        Self::new_static(value)
    }
}

impl From<Cow<'static, str>> for Body {
    fn from(value: Cow<'static, str>) -> Self {
        match value {
            Cow::Borrowed(b) => b.into(),
            Cow::Owned(o) => o.into(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::Body;
    use futures_lite::{future::block_on, AsyncReadExt};

    #[test]
    fn static_bodies_know_their_length() {
        let body = Body::from("hello");
        assert_eq!(body.len(), Some(5));
        assert!(body.is_static());
        assert!(!body.is_streaming());
        assert_eq!(body.static_bytes(), Some(&b"hello"[..]));
    }

    #[test]
    fn streaming_reads_raw_bytes() {
        block_on(async {
            let mut body = Body::from_iter(["event: t\ndata: 1\n\n", "event: t\ndata: 2\n\n"]);
            assert_eq!(body.len(), None);
            assert!(body.is_streaming());

            let mut content = String::new();
            body.read_to_string(&mut content).await.unwrap();
            assert_eq!(content, "event: t\ndata: 1\n\nevent: t\ndata: 2\n\n");
        });
    }

    #[test]
    fn into_bytes_after_partial_read_errors() {
        block_on(async {
            let mut body = Body::new_streaming(futures_lite::io::Cursor::new("12345"), Some(5));
            let mut buf = [0u8; 2];
            body.read(&mut buf).await.unwrap();
            assert!(body.into_bytes().await.is_err());
        });
    }

    #[test]
    fn length_capped_streaming() {
        block_on(async {
            let body = Body::new_streaming(futures_lite::io::Cursor::new("1234567890"), Some(4));
            let mut content = Vec::new();
            let mut reader = body;
            reader.read_to_end(&mut content).await.unwrap();
            assert_eq!(content, b"1234");
        });
    }
}
