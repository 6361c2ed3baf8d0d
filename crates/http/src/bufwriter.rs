use futures_lite::AsyncWrite;
use std::{
    fmt,
    io::{Error, ErrorKind, IoSlice, Result},
    pin::Pin,
    task::{ready, Context, Poll},
};

/// Write-buffering wrapper over a transport. The head is assembled
/// into the buffer without syscalls, and small body writes coalesce
/// with it; large writes go through vectored io alongside whatever is
/// still pending.
pub(crate) struct BufWriter<W> {
    inner: W,
    buffer: Vec<u8>,
    written_to_inner: usize,
}

impl<W: AsyncWrite + Unpin> BufWriter<W> {
    pub(crate) fn new_with_buffer(buffer: Vec<u8>, inner: W) -> Self {
        Self {
            inner,
            buffer,
            written_to_inner: 0,
        }
    }

    /// whether any bytes have reached the wrapped transport. while
    /// false, everything is still buffered and can be discarded.
    pub(crate) fn has_written_to_inner(&self) -> bool {
        self.written_to_inner > 0
    }

    fn poll_flush_buf(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<usize>> {
        let Self {
            inner,
            buffer,
            written_to_inner,
        } = &mut *self;

        let len = buffer.len();
        let mut ret = Ok(0);

        while *written_to_inner < len {
            let buf = &buffer[*written_to_inner..];
            match ready!(Pin::new(&mut *inner).poll_write(cx, buf)) {
                Ok(0) => {
                    ret = Err(Error::new(
                        ErrorKind::WriteZero,
                        "failed to write buffered data",
                    ));
                    break;
                }
                Ok(n) => *written_to_inner += n,
                Err(ref e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => {
                    ret = Err(e);
                    break;
                }
            }
        }

        Poll::Ready(ret)
    }
}

impl<W: fmt::Debug> fmt::Debug for BufWriter<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufWriter")
            .field("writer", &self.inner)
            .field("buffered", &self.buffer.len())
            .field("written", &self.written_to_inner)
            .finish()
    }
}

impl<W: AsyncWrite + Unpin> AsyncWrite for BufWriter<W> {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        additional: &[u8],
    ) -> Poll<Result<usize>> {
        let Self {
            inner,
            buffer,
            written_to_inner,
        } = &mut *self;
        loop {
            let len = buffer.len();
            let pending_buffer = &buffer[len.min(*written_to_inner)..];
            let pending_bytes = pending_buffer.len();
            let new_len_would_be = len + additional.len();
            if *written_to_inner == 0 && new_len_would_be <= buffer.capacity() {
                buffer.extend_from_slice(additional);
                return Poll::Ready(Ok(additional.len()));
            } else if !pending_buffer.is_empty() {
                let written = ready!(Pin::new(&mut *inner).poll_write_vectored(
                    cx,
                    &[IoSlice::new(pending_buffer), IoSlice::new(additional)]
                ))?;
                *written_to_inner += written;
                let written_from_additional = written.saturating_sub(pending_bytes);
                if written_from_additional != 0 {
                    return Poll::Ready(Ok(written_from_additional));
                }
            } else {
                let written = ready!(Pin::new(&mut *inner).poll_write(cx, additional))?;
                *written_to_inner += written;
                return Poll::Ready(Ok(written));
            }
        }
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<()>> {
        ready!(self.as_mut().poll_flush_buf(cx))?;
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_close(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<()>> {
        ready!(self.as_mut().poll_flush_buf(cx))?;
        Pin::new(&mut self.inner).poll_close(cx)
    }
}
