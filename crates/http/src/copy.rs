use futures_lite::{io::BufReader, ready, AsyncBufRead, AsyncRead, AsyncWrite};
use std::{
    future::Future,
    io::{ErrorKind, Result},
    pin::Pin,
    task::{Context, Poll},
};

/// Copy from `reader` to `writer`, yielding back to the runtime every
/// `loops_per_yield` iterations so a fast peer cannot starve other
/// tasks on the executor.
///
/// The writer is flushed when the reader is exhausted. Backpressure
/// propagates naturally: a writer that returns `Pending` suspends the
/// producing side.
///
/// # Errors
///
/// This returns any io error encountered in reading or writing
pub async fn copy<R, W>(reader: R, writer: W, loops_per_yield: usize) -> Result<u64>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    struct CopyFuture<R, W> {
        reader: BufReader<R>,
        writer: W,
        amount: u64,
        loops_per_yield: usize,
    }

    impl<R, W> Future for CopyFuture<R, W>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        type Output = Result<u64>;

        fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
            for _ in 0..self.loops_per_yield {
                let CopyFuture {
                    reader,
                    writer,
                    amount,
                    ..
                } = &mut *self;

                let writer = Pin::new(writer);
                let mut reader = Pin::new(reader);
                let buffer = ready!(reader.as_mut().poll_fill_buf(cx))?;
                if buffer.is_empty() {
                    ready!(writer.poll_flush(cx))?;
                    return Poll::Ready(Ok(self.amount));
                }

                let written = ready!(writer.poll_write(cx, buffer))?;
                if written == 0 {
                    return Poll::Ready(Err(ErrorKind::WriteZero.into()));
                }
                *amount += written as u64;
                reader.consume(written);
            }

            cx.waker().wake_by_ref();
            Poll::Pending
        }
    }

    CopyFuture {
        reader: BufReader::with_capacity(64 * 1024, reader),
        writer,
        amount: 0,
        loops_per_yield,
    }
    .await
}
