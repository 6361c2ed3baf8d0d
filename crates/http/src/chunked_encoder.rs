use futures_lite::{io::AsyncRead, ready};
use std::{
    io::Write,
    pin::Pin,
    task::{Context, Poll},
};

/// payload bytes framed per chunk
const FRAME_PAYLOAD_LEN: usize = 4 * 1024;

/// An [`AsyncRead`] adapter that frames the inner reader's bytes with
/// chunked transfer encoding: each frame is `HEXLEN CRLF payload
/// CRLF`, and the stream closes with the terminating `0\r\n\r\n` once
/// the inner reader is exhausted.
///
/// Each frame is staged in an internal buffer and served out through
/// reads of any size, so callers are free to read a byte at a time
/// without disturbing the framing.
#[derive(Debug)]
pub struct ChunkedEncoder<R> {
    reader: R,
    frame: Vec<u8>,
    served: usize,
    done: bool,
}

impl<R: Unpin + AsyncRead> ChunkedEncoder<R> {
    /// Frame the provided reader.
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            frame: Vec::new(),
            served: 0,
            done: false,
        }
    }

    /// stage the next frame: one read's worth of payload, or the
    /// terminator when the payload is exhausted
    fn refill(&mut self, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        let mut payload = [0; FRAME_PAYLOAD_LEN];
        let bytes = ready!(Pin::new(&mut self.reader).poll_read(cx, &mut payload))?;

        self.frame.clear();
        self.served = 0;

        if bytes == 0 {
            self.done = true;
            self.frame.extend_from_slice(b"0\r\n\r\n");
        } else {
            write!(self.frame, "{bytes:X}\r\n")?;
            self.frame.extend_from_slice(&payload[..bytes]);
            self.frame.extend_from_slice(b"\r\n");
        }

        Poll::Ready(Ok(()))
    }
}

impl<R: Unpin + AsyncRead> AsyncRead for ChunkedEncoder<R> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut [u8],
    ) -> Poll<std::io::Result<usize>> {
        loop {
            let unserved = self.frame.len() - self.served;
            if unserved > 0 {
                let len = unserved.min(buf.len());
                buf[..len].copy_from_slice(&self.frame[self.served..self.served + len]);
                self.served += len;
                return Poll::Ready(Ok(len));
            }

            if self.done {
                return Poll::Ready(Ok(0));
            }

            ready!(self.refill(cx))?;
        }
    }
}

#[cfg(test)]
mod test {
    use super::ChunkedEncoder;
    use futures_lite::{future::block_on, io::Cursor, AsyncReadExt};

    async fn encode(input: impl AsRef<[u8]>) -> Vec<u8> {
        let mut framed = Vec::new();
        ChunkedEncoder::new(Cursor::new(input.as_ref().to_vec()))
            .read_to_end(&mut framed)
            .await
            .unwrap();
        framed
    }

    #[test]
    fn frames_payload_with_hex_lengths() {
        block_on(async {
            assert_eq!(encode("freshet").await, b"7\r\nfreshet\r\n0\r\n\r\n");
            assert_eq!(
                encode(vec![b'x'; 0x1a]).await,
                [b"1A\r\n".to_vec(), vec![b'x'; 0x1a], b"\r\n0\r\n\r\n".to_vec()].concat()
            );
        });
    }

    #[test]
    fn empty_input_is_just_the_terminator() {
        block_on(async {
            assert_eq!(encode("").await, b"0\r\n\r\n");
        });
    }

    #[test]
    fn large_payloads_split_into_multiple_frames() {
        block_on(async {
            let input: Vec<u8> = (0..10_000).map(|i| (i % 251) as u8).collect();
            let framed = encode(&input).await;

            // the first frame carries one staging buffer's worth
            assert!(framed.starts_with(b"1000\r\n"));
            assert!(framed.ends_with(b"0\r\n\r\n"));

            let mut decoder = crate::ChunkedDecoder::new();
            let decoded = decoder.feed(&framed).unwrap().unwrap();
            assert!(decoder.is_done());
            assert_eq!(decoded, input);
        });
    }

    #[test]
    fn single_byte_reads_preserve_framing() {
        block_on(async {
            let whole = encode("one two three").await;

            let mut encoder = ChunkedEncoder::new(Cursor::new("one two three"));
            let mut dribbled = Vec::new();
            let mut byte = [0u8; 1];
            loop {
                match encoder.read(&mut byte).await.unwrap() {
                    0 => break,
                    n => dribbled.extend_from_slice(&byte[..n]),
                }
            }

            assert_eq!(dribbled, whole);
        });
    }
}
