use event_listener::{Event, EventListener};
use std::{
    future::Future,
    pin::Pin,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    task::{Context, Poll},
};

#[derive(Default)]
struct CloneCounterInner {
    count: AtomicUsize,
    event: Event,
}

/// A counter that increments on clone and decrements on drop, and can
/// be awaited: the future resolves when every clone has been dropped.
/// The server hands a clone to each connection task and awaits the
/// original at shutdown to drain outstanding requests.
#[derive(Default)]
pub struct CloneCounter {
    inner: Arc<CloneCounterInner>,
    counted: bool,
    listener: Option<Pin<Box<EventListener>>>,
}

impl std::fmt::Debug for CloneCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloneCounter")
            .field("current", &self.current())
            .finish()
    }
}

impl CloneCounter {
    /// constructs a new counter. the original handle is not counted;
    /// only clones are.
    pub fn new() -> Self {
        Self::default()
    }

    /// the current number of live clones
    pub fn current(&self) -> usize {
        self.inner.count.load(Ordering::SeqCst)
    }
}

impl Clone for CloneCounter {
    fn clone(&self) -> Self {
        self.inner.count.fetch_add(1, Ordering::SeqCst);
        Self {
            inner: Arc::clone(&self.inner),
            counted: true,
            listener: None,
        }
    }
}

impl Drop for CloneCounter {
    fn drop(&mut self) {
        if self.counted {
            let previously = self.inner.count.fetch_sub(1, Ordering::SeqCst);
            log::trace!("clone counter: {} -> {}", previously, previously - 1);
            self.inner.event.notify(usize::MAX);
        }
    }
}

impl Future for CloneCounter {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        loop {
            if self.current() == 0 {
                return Poll::Ready(());
            }

            match &mut self.listener {
                Some(listener) => match listener.as_mut().poll(cx) {
                    Poll::Ready(()) => {
                        self.listener = None;
                    }
                    Poll::Pending => return Poll::Pending,
                },

                None => {
                    self.listener = Some(self.inner.event.listen());
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::CloneCounter;
    use futures_lite::future::{block_on, poll_once};

    #[test]
    fn counts_clones() {
        let counter = CloneCounter::new();
        assert_eq!(counter.current(), 0);

        let clone = counter.clone();
        assert_eq!(counter.current(), 1);
        let clone2 = clone.clone();
        assert_eq!(counter.current(), 2);

        drop(clone);
        assert_eq!(counter.current(), 1);
        drop(clone2);
        assert_eq!(counter.current(), 0);

        block_on(counter); // resolves immediately at zero
    }

    #[test]
    fn pending_while_clones_live() {
        let counter = CloneCounter::new();
        let clone = counter.clone();
        block_on(async {
            let mut counter = counter;
            assert_eq!(poll_once(&mut counter).await, None);
            drop(clone);
            assert_eq!(poll_once(&mut counter).await, Some(()));
        });
    }
}
