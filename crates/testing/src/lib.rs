#![forbid(unsafe_code)]
#![deny(
    missing_copy_implementations,
    rustdoc::missing_crate_level_docs,
    missing_debug_implementations,
    nonstandard_style,
    unused_qualifications
)]
#![warn(missing_docs)]

/*!
Testing tools for the freshet toolkit: an in-memory duplex transport
that behaves like a socket pair, and executor helpers so tests can
drive async code without standing up a runtime of their own.
*/

mod test_transport;
pub use test_transport::{CloseableCursor, TestTransport};

use std::future::Future;

/// block the current thread on a future, using the same executor the
/// freshet server runs on
pub fn block_on<Fut: Future>(future: Fut) -> Fut::Output {
    async_global_executor::block_on(future)
}

/// spawn and detach a future on the shared executor
pub fn spawn<Fut>(future: Fut)
where
    Fut: Future + Send + 'static,
    Fut::Output: Send + 'static,
{
    async_global_executor::spawn(future).detach();
}

/// initialize env_logger once, ignoring repeat calls from other tests
/// in the same process
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
