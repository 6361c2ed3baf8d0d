use crate::{Error, Result};
use futures_lite::{io::BufReader, AsyncRead};
use httparse::Status;
use std::{
    pin::Pin,
    task::{Context, Poll},
};

/// An [`AsyncRead`] adapter that gzip-compresses the inner reader
/// (rfc 1952 framing).
#[derive(Debug)]
pub struct GzipEncoder<R>(async_compression::futures::bufread::GzipEncoder<BufReader<R>>);

impl<R: AsyncRead + Unpin> GzipEncoder<R> {
    /// Compress the provided reader.
    pub fn new(reader: R) -> Self {
        Self(async_compression::futures::bufread::GzipEncoder::new(
            BufReader::new(reader),
        ))
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for GzipEncoder<R> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut [u8],
    ) -> Poll<std::io::Result<usize>> {
        Pin::new(&mut self.0).poll_read(cx, buf)
    }
}

/// An [`AsyncRead`] adapter that gzip-decompresses the inner reader.
/// Multi-member streams are accepted: a payload assembled from
/// several gzip members decodes to their concatenation.
#[derive(Debug)]
pub struct GzipDecoder<R>(async_compression::futures::bufread::GzipDecoder<BufReader<R>>);

impl<R: AsyncRead + Unpin> GzipDecoder<R> {
    /// Decompress the provided reader.
    pub fn new(reader: R) -> Self {
        let mut decoder =
            async_compression::futures::bufread::GzipDecoder::new(BufReader::new(reader));
        decoder.multiple_members(true);
        Self(decoder)
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for GzipDecoder<R> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut [u8],
    ) -> Poll<std::io::Result<usize>> {
        Pin::new(&mut self.0).poll_read(cx, buf)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChunkState {
    Size,
    Data { remaining: u64 },
    DataEnd,
    Trailer,
    End,
}

/// An incremental decoder for chunked transfer encoding
/// (rfc 7230 §4.1, without trailer support).
///
/// Feed it framed bytes as they arrive; it returns decoded payload
/// bytes as chunks complete. The terminating zero-length chunk moves
/// the decoder to its end state, after which
/// [`is_done`](ChunkedDecoder::is_done) reports true and remaining
/// bytes are left unconsumed for the caller (pipelining).
#[derive(Debug)]
pub struct ChunkedDecoder {
    buffer: Vec<u8>,
    state: ChunkState,
}

impl Default for ChunkedDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ChunkedDecoder {
    /// construct a decoder at the start of a chunked stream
    pub fn new() -> Self {
        Self {
            buffer: Vec::new(),
            state: ChunkState::Size,
        }
    }

    /// has the terminating chunk been consumed?
    pub fn is_done(&self) -> bool {
        self.state == ChunkState::End
    }

    /// bytes fed after the terminating chunk, which belong to the
    /// next message on the connection
    pub fn take_remainder(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.buffer)
    }

    /// Feed framed bytes, returning any payload bytes that completed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidChunkSize`] when a size line is not
    /// valid hex or chunk framing is otherwise malformed.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Option<Vec<u8>>> {
        self.buffer.extend_from_slice(chunk);
        let mut output = Vec::new();

        loop {
            match self.state {
                ChunkState::Size => {
                    match httparse::parse_chunk_size(&self.buffer) {
                        Ok(Status::Complete((used, size))) => {
                            self.buffer.drain(..used);
                            self.state = if size == 0 {
                                ChunkState::Trailer
                            } else {
                                ChunkState::Data { remaining: size }
                            };
                        }
                        Ok(Status::Partial) => break,
                        Err(_) => return Err(Error::InvalidChunkSize),
                    };
                }

                ChunkState::Data { remaining } => {
                    if self.buffer.is_empty() {
                        break;
                    }
                    let take = usize::try_from(remaining)
                        .unwrap_or(usize::MAX)
                        .min(self.buffer.len());
                    output.extend(self.buffer.drain(..take));
                    let remaining = remaining - take as u64;
                    self.state = if remaining == 0 {
                        ChunkState::DataEnd
                    } else {
                        ChunkState::Data { remaining }
                    };
                }

                ChunkState::DataEnd => {
                    if self.buffer.len() < 2 {
                        break;
                    }
                    if &self.buffer[..2] != b"\r\n" {
                        return Err(Error::InvalidChunkSize);
                    }
                    self.buffer.drain(..2);
                    self.state = ChunkState::Size;
                }

                ChunkState::Trailer => {
                    if self.buffer.len() < 2 {
                        break;
                    }
                    // trailers are not supported; the only thing
                    // permitted after the zero chunk is the final CRLF
                    if &self.buffer[..2] != b"\r\n" {
                        return Err(Error::InvalidChunkSize);
                    }
                    self.buffer.drain(..2);
                    self.state = ChunkState::End;
                }

                ChunkState::End => break,
            }
        }

        if output.is_empty() {
            Ok(None)
        } else {
            Ok(Some(output))
        }
    }

    /// Signal end of input.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Closed`] if the stream ended before the
    /// terminating chunk.
    pub fn flush(&mut self) -> Result<Option<Vec<u8>>> {
        if self.is_done() {
            Ok(None)
        } else {
            Err(Error::Closed)
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use futures_lite::{future::block_on, io::Cursor, AsyncReadExt};

    #[test]
    fn gzip_round_trip() {
        block_on(async {
            let input = b"the quick brown fox jumps over the lazy dog".repeat(100);

            let mut compressed = Vec::new();
            GzipEncoder::new(Cursor::new(input.clone()))
                .read_to_end(&mut compressed)
                .await
                .unwrap();
            assert!(compressed.len() < input.len());
            assert_eq!(&compressed[..2], &[0x1f, 0x8b]); // gzip magic

            let mut decompressed = Vec::new();
            GzipDecoder::new(Cursor::new(compressed))
                .read_to_end(&mut decompressed)
                .await
                .unwrap();
            assert_eq!(decompressed, input);
        });
    }

    #[test]
    fn gzip_multi_member() {
        block_on(async {
            let mut compressed = Vec::new();
            for member in ["first ", "second"] {
                GzipEncoder::new(Cursor::new(member))
                    .read_to_end(&mut compressed)
                    .await
                    .unwrap();
            }

            let mut decompressed = Vec::new();
            GzipDecoder::new(Cursor::new(compressed))
                .read_to_end(&mut decompressed)
                .await
                .unwrap();
            assert_eq!(decompressed, b"first second");
        });
    }

    #[test]
    fn chunked_decode_whole() {
        let mut decoder = ChunkedDecoder::new();
        let decoded = decoder
            .feed(b"5\r\nhello\r\n6\r\n world\r\n0\r\n\r\n")
            .unwrap()
            .unwrap();
        assert_eq!(decoded, b"hello world");
        assert!(decoder.is_done());
        assert!(decoder.flush().unwrap().is_none());
    }

    #[test]
    fn chunked_decode_byte_at_a_time() {
        let framed = b"5\r\nhello\r\n6\r\n world\r\n0\r\n\r\n";
        let mut decoder = ChunkedDecoder::new();
        let mut decoded = Vec::new();
        for byte in framed {
            if let Some(bytes) = decoder.feed(std::slice::from_ref(byte)).unwrap() {
                decoded.extend(bytes);
            }
        }
        assert_eq!(decoded, b"hello world");
        assert!(decoder.is_done());
    }

    #[test]
    fn malformed_size_is_rejected() {
        let mut decoder = ChunkedDecoder::new();
        assert!(matches!(
            decoder.feed(b"zz\r\nhello\r\n"),
            Err(Error::InvalidChunkSize)
        ));
    }

    #[test]
    fn incomplete_stream_fails_flush() {
        let mut decoder = ChunkedDecoder::new();
        decoder.feed(b"5\r\nhel").unwrap();
        assert!(matches!(decoder.flush(), Err(Error::Closed)));
    }

    #[test]
    fn pipelined_remainder_is_preserved() {
        let mut decoder = ChunkedDecoder::new();
        let decoded = decoder
            .feed(b"1\r\n_\r\n0\r\n\r\nGET / HTTP/1.1\r\n")
            .unwrap()
            .unwrap();
        assert_eq!(decoded, b"_");
        assert!(decoder.is_done());
        assert_eq!(decoder.take_remainder(), b"GET / HTTP/1.1\r\n");
    }

    #[test]
    fn encoder_decoder_round_trip() {
        block_on(async {
            let input: Vec<u8> = (0..10_000).map(|i| (i % 251) as u8).collect();
            let mut framed = Vec::new();
            crate::ChunkedEncoder::new(Cursor::new(input.clone()))
                .read_to_end(&mut framed)
                .await
                .unwrap();

            let mut decoder = ChunkedDecoder::new();
            let decoded = decoder.feed(&framed).unwrap().unwrap();
            assert_eq!(decoded, input);
            assert!(decoder.is_done());
        });
    }
}
