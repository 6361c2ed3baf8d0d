use crate::{
    headers::parse_header_line, received_body::SPOOL_THRESHOLD, Error, Headers, LineParser, Result,
};
use futures_lite::{AsyncRead, AsyncReadExt};
use memchr::memmem::Finder;
use mime::Mime;
use std::{
    io::{Read, Seek, SeekFrom, Write},
    str::FromStr,
};
use tempfile::SpooledTempFile;

/// Extract the `boundary` parameter from a multipart content-type
/// header, if there is one.
pub fn boundary(headers: &Headers) -> Option<String> {
    headers
        .get_str("content-type")
        .and_then(|c| Mime::from_str(c).ok())
        .filter(|m| m.type_() == mime::MULTIPART)
        .and_then(|m| m.get_param(mime::BOUNDARY).map(|b| b.as_str().to_string()))
}

/// One decoded part of a multipart body: its headers and its content,
/// spooled to a temporary file that spills to disk past the spool
/// threshold.
pub struct Part {
    /// the part's header block
    pub headers: Headers,

    /// the part content, rewound to the start
    pub file: SpooledTempFile,

    /// the content length of this part
    pub len: u64,
}

impl std::fmt::Debug for Part {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Part")
            .field("headers", &self.headers)
            .field("file", &"..")
            .field("len", &self.len)
            .finish()
    }
}

impl Part {
    /// read the full part content into memory. prefer reading from
    /// [`Part::file`] for parts that may be large.
    ///
    /// # Errors
    ///
    /// Returns an io error if the spool cannot be read.
    pub fn into_bytes(mut self) -> Result<Vec<u8>> {
        let mut bytes = Vec::with_capacity(usize::try_from(self.len)?);
        self.file.read_to_end(&mut bytes).map_err(Error::Io)?;
        Ok(bytes)
    }
}

/// An incremental decoder for `multipart/form-data` (and other
/// multipart) bodies.
///
/// Reads are sized `buffer + boundary` so a boundary marker split
/// across two reads is always detectable once the following read
/// completes. Part contents never accumulate in memory beyond the
/// spool threshold.
pub struct MultipartParser<R> {
    reader: R,
    marker: Vec<u8>,
    buffer: Vec<u8>,
    read_size: usize,
    spool_threshold: usize,
    started: bool,
    done: bool,
}

impl<R> std::fmt::Debug for MultipartParser<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultipartParser")
            .field("marker", &String::from_utf8_lossy(&self.marker))
            .field("buffered", &self.buffer.len())
            .field("started", &self.started)
            .field("done", &self.done)
            .finish()
    }
}

impl<R> MultipartParser<R>
where
    R: AsyncRead + Unpin,
{
    /// construct a parser for the provided body reader and boundary
    /// (without the leading dashes, as it appears in the content-type
    /// parameter)
    pub fn new(reader: R, boundary: &str) -> Self {
        let marker = format!("--{boundary}").into_bytes();
        Self {
            reader,
            read_size: 64 * 1024 + marker.len(),
            marker,
            buffer: Vec::new(),
            spool_threshold: SPOOL_THRESHOLD,
            started: false,
            done: false,
        }
    }

    /// construct a parser, extracting the boundary from the provided
    /// headers
    ///
    /// # Errors
    ///
    /// Errors when the content-type is not multipart or carries no
    /// boundary parameter.
    pub fn from_headers(reader: R, headers: &Headers) -> Result<Self> {
        let boundary = boundary(headers).ok_or_else(|| {
            Error::InvalidHeaderValue("content-type".into())
        })?;
        Ok(Self::new(reader, &boundary))
    }

    /// override the memory-to-disk spill threshold for part contents
    #[must_use]
    pub fn with_spool_threshold(mut self, spool_threshold: usize) -> Self {
        self.spool_threshold = spool_threshold;
        self
    }

    async fn read_more(&mut self) -> Result<usize> {
        let mut chunk = vec![0; self.read_size];
        let bytes = self.reader.read(&mut chunk).await?;
        self.buffer.extend_from_slice(&chunk[..bytes]);
        Ok(bytes)
    }

    async fn require(&mut self, len: usize) -> Result<()> {
        while self.buffer.len() < len {
            if self.read_more().await? == 0 {
                return Err(Error::Closed);
            }
        }
        Ok(())
    }

    /// consume input up to and including the first boundary marker
    async fn seek_first_boundary(&mut self) -> Result<()> {
        loop {
            if let Some(index) = Finder::new(&self.marker).find(&self.buffer) {
                self.buffer.drain(..index + self.marker.len());
                self.started = true;
                return Ok(());
            }

            // discard preamble, keeping enough bytes to catch a
            // marker split across reads
            let keep = (self.marker.len() - 1).min(self.buffer.len());
            let discard = self.buffer.len() - keep;
            self.buffer.drain(..discard);

            if self.read_more().await? == 0 {
                return Err(Error::Closed);
            }
        }
    }

    async fn read_part_headers(&mut self) -> Result<Headers> {
        let mut headers = Headers::new();
        let mut line_parser = LineParser::new();
        loop {
            let (line, consumed) = line_parser.feed(&self.buffer, 0);
            self.buffer.drain(..consumed);
            match line {
                Some(line) if line.is_empty() => return Ok(headers),
                Some(line) => {
                    if let Some((name, value)) = parse_header_line(&line)? {
                        headers.append(name, value);
                    }
                }
                None => {
                    if self.read_more().await? == 0 {
                        return Err(Error::Closed);
                    }
                }
            }
        }
    }

    /// Decode the next part, streaming its content into a spooled
    /// temp file.
    ///
    /// Returns `None` once the terminating `--boundary--` marker has
    /// been consumed.
    ///
    /// # Errors
    ///
    /// Errors on malformed part headers, on io failure, and on input
    /// that ends before the terminating marker.
    pub async fn next_part(&mut self) -> Result<Option<Part>> {
        if self.done {
            return Ok(None);
        }

        if !self.started {
            self.seek_first_boundary().await?;
        }

        // directly after a boundary marker: `--` closes the body,
        // CRLF opens another part
        self.require(2).await?;
        if &self.buffer[..2] == b"--" {
            self.done = true;
            return Ok(None);
        }
        if &self.buffer[..2] != b"\r\n" {
            return Err(Error::InvalidHead);
        }
        self.buffer.drain(..2);

        let headers = self.read_part_headers().await?;

        let delimiter = [b"\r\n", self.marker.as_slice()].concat();
        let finder = Finder::new(&delimiter);
        let mut file = SpooledTempFile::new(self.spool_threshold);
        let mut len = 0u64;

        loop {
            if let Some(index) = finder.find(&self.buffer) {
                file.write_all(&self.buffer[..index]).map_err(Error::Io)?;
                len += index as u64;
                self.buffer.drain(..index + delimiter.len());
                break;
            }

            // everything except a possibly-split delimiter tail is
            // part content
            let keep = (delimiter.len() - 1).min(self.buffer.len());
            let spill = self.buffer.len() - keep;
            if spill > 0 {
                file.write_all(&self.buffer[..spill]).map_err(Error::Io)?;
                len += spill as u64;
                self.buffer.drain(..spill);
            }

            if self.read_more().await? == 0 {
                return Err(Error::Closed);
            }
        }

        file.seek(SeekFrom::Start(0)).map_err(Error::Io)?;
        Ok(Some(Part { headers, file, len }))
    }
}

#[cfg(test)]
mod test {
    use super::{boundary, MultipartParser};
    use crate::Headers;
    use futures_lite::{future::block_on, io::Cursor, AsyncRead};
    use std::{
        pin::Pin,
        task::{Context, Poll},
    };

    /// wraps a reader, capping each read at `limit` bytes, to
    /// exercise markers split across reads
    struct Dribble<R> {
        inner: R,
        limit: usize,
    }

    impl<R: AsyncRead + Unpin> AsyncRead for Dribble<R> {
        fn poll_read(
            mut self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &mut [u8],
        ) -> Poll<std::io::Result<usize>> {
            let limit = self.limit.min(buf.len());
            Pin::new(&mut self.inner).poll_read(cx, &mut buf[..limit])
        }
    }

    const BODY: &[u8] = b"--xYzZY\r\n\
Content-Disposition: form-data; name=\"field\"\r\n\
\r\n\
value one\r\n\
--xYzZY\r\n\
Content-Disposition: form-data; name=\"upload\"; filename=\"a.txt\"\r\n\
Content-Type: text/plain\r\n\
\r\n\
file contents\r\nwith an embedded line break\r\n\
--xYzZY--\r\n";

    #[test]
    fn two_parts() {
        block_on(async {
            let mut parser = MultipartParser::new(Cursor::new(BODY), "xYzZY");

            let part = parser.next_part().await.unwrap().unwrap();
            assert_eq!(
                part.headers.get_str("content-disposition"),
                Some("form-data; name=\"field\"")
            );
            assert_eq!(part.into_bytes().unwrap(), b"value one");

            let part = parser.next_part().await.unwrap().unwrap();
            assert_eq!(part.headers.get_str("content-type"), Some("text/plain"));
            assert_eq!(
                part.into_bytes().unwrap(),
                b"file contents\r\nwith an embedded line break"
            );

            assert!(parser.next_part().await.unwrap().is_none());
            assert!(parser.next_part().await.unwrap().is_none());
        });
    }

    #[test]
    fn split_boundaries_are_found() {
        block_on(async {
            for limit in 1..16 {
                let reader = Dribble {
                    inner: Cursor::new(BODY),
                    limit,
                };
                let mut parser = MultipartParser::new(reader, "xYzZY");
                let mut parts = vec![];
                while let Some(part) = parser.next_part().await.unwrap() {
                    parts.push(part.into_bytes().unwrap());
                }
                assert_eq!(parts.len(), 2, "limit: {limit}");
                assert_eq!(parts[0], b"value one", "limit: {limit}");
            }
        });
    }

    #[test]
    fn large_parts_spill_to_disk() {
        block_on(async {
            let content = "x".repeat(1024);
            let body = format!(
                "--b\r\nContent-Disposition: form-data; name=\"big\"\r\n\r\n{content}\r\n--b--\r\n"
            );
            let mut parser =
                MultipartParser::new(Cursor::new(body), "b").with_spool_threshold(64);
            let part = parser.next_part().await.unwrap().unwrap();
            assert_eq!(part.len, 1024);
            assert!(part.file.is_rolled());
        });
    }

    #[test]
    fn unterminated_input_errors() {
        block_on(async {
            let body = b"--b\r\n\r\ncontent without a closing marker".to_vec();
            let mut parser = MultipartParser::new(Cursor::new(body), "b");
            assert!(parser.next_part().await.is_err());
        });
    }

    #[test]
    fn boundary_extraction() {
        let mut headers = Headers::new();
        headers.insert(
            "content-type",
            "multipart/form-data; boundary=----delimiter1234",
        );
        assert_eq!(boundary(&headers).as_deref(), Some("----delimiter1234"));

        headers.insert("content-type", "text/plain");
        assert_eq!(boundary(&headers), None);
    }
}
