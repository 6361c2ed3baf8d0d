/// The outcome passed to an after-send (on-close) hook.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum SendStatus {
    /// the response was fully transferred
    Success,
    /// the connection was aborted before the response completed
    Failure,
}

impl From<bool> for SendStatus {
    fn from(success: bool) -> Self {
        if success {
            Self::Success
        } else {
            Self::Failure
        }
    }
}

impl SendStatus {
    /// was the response fully transferred?
    pub fn is_success(self) -> bool {
        SendStatus::Success == self
    }
}

/// Hooks registered to run exactly once after the response has been
/// written (or the connection aborted). The Drop impl guarantees the
/// exactly-once property on every exit path: if nothing called the
/// hook with a success status, dropping the conn calls it with
/// `Failure`.
#[derive(Default)]
pub(crate) struct AfterSend(Option<Box<dyn FnOnce(SendStatus) + Send + Sync + 'static>>);

impl AfterSend {
    pub(crate) fn call(&mut self, send_status: SendStatus) {
        if let Some(after_send) = self.0.take() {
            after_send(send_status);
        }
    }

    pub(crate) fn append<F>(&mut self, after_send: F)
    where
        F: FnOnce(SendStatus) + Send + Sync + 'static,
    {
        self.0 = Some(match self.0.take() {
            Some(existing_after_send) => Box::new(move |ss| {
                existing_after_send(ss);
                after_send(ss);
            }),
            None => Box::new(after_send),
        });
    }
}

impl Drop for AfterSend {
    fn drop(&mut self) {
        self.call(SendStatus::Failure);
    }
}

#[cfg(test)]
mod test {
    use super::{AfterSend, SendStatus};
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    #[test]
    fn fires_exactly_once() {
        let count = Arc::new(AtomicUsize::new(0));

        let mut after_send = AfterSend::default();
        let count_ = count.clone();
        after_send.append(move |_| {
            count_.fetch_add(1, Ordering::SeqCst);
        });

        after_send.call(SendStatus::Success);
        after_send.call(SendStatus::Success);
        drop(after_send);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn fires_on_drop_when_never_called() {
        let count = Arc::new(AtomicUsize::new(0));

        let mut after_send = AfterSend::default();
        let count_ = count.clone();
        after_send.append(move |status| {
            assert!(!status.is_success());
            count_.fetch_add(1, Ordering::SeqCst);
        });

        drop(after_send);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
