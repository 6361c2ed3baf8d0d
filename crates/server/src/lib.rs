#![forbid(unsafe_code)]
#![deny(
    rustdoc::missing_crate_level_docs,
    missing_debug_implementations,
    nonstandard_style,
    unused_qualifications
)]
#![warn(missing_docs)]

/*!
Runtime adapter for the freshet http toolkit, on the smol stack
(async-global-executor, async-net, async-io).

## Default / 12-factor applications

```rust,no_run
freshet_server::run(|mut conn: freshet_server::Conn| async move {
    conn.set_status(200);
    conn.set_response_body("hello");
    conn
});
```

## Server configuration

```rust,no_run
use freshet_http::Stopper;
let stopper = Stopper::new();
freshet_server::config()
    .with_port(0)
    .with_host("127.0.0.1")
    .without_signals()
    .with_nodelay()
    .with_stopper(stopper)
    .run(|mut conn: freshet_server::Conn| async move {
        conn.set_status(200);
        conn.set_response_body("hello");
        conn
    });
```
*/

use freshet_http::{Stopper, Transport, SERVICE_UNAVAILABLE};
use futures_lite::{AsyncReadExt, AsyncWriteExt, StreamExt};
use std::{future::Future, sync::Arc};

mod clone_counter;
pub use clone_counter::CloneCounter;

mod config;
pub use config::Config;

mod transport;
pub use transport::ServerTransport;

pub use freshet_http::{self as http, Body, Headers, HttpConfig, Method, Status, Version};

/// The conn type handlers receive: a
/// [`freshet_http::Conn`] over the server's tcp transport.
pub type Conn = freshet_http::Conn<ServerTransport>;

/// A request handler: anything that asynchronously maps a [`Conn`] to
/// a [`Conn`]. Implemented for async closures and fns.
pub trait Handler: Send + Sync + 'static {
    /// process one request/response pair
    fn run(&self, conn: Conn) -> impl Future<Output = Conn> + Send;
}

impl<F, Fut> Handler for F
where
    F: Fn(Conn) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Conn> + Send + 'static,
{
    fn run(&self, conn: Conn) -> impl Future<Output = Conn> + Send {
        self(conn)
    }
}

/// Runs a handler with the default config. Blocks the current thread
/// until the server shuts down.
pub fn run(handler: impl Handler) {
    config().run(handler)
}

/// Runs a handler with the default config on an already-running
/// executor. Polls until the server shuts down.
pub async fn run_async(handler: impl Handler) {
    config().run_async(handler).await
}

/// Configures a server before running it. See [`Config`].
pub fn config() -> Config {
    Config::new()
}

/// spawn and detach a future on the shared executor
pub fn spawn<Fut: Future<Output = ()> + Send + 'static>(future: Fut) {
    async_global_executor::spawn(future).detach();
}

#[cfg(unix)]
async fn handle_signals(stop: Stopper) {
    use signal_hook::consts::signal::{SIGINT, SIGQUIT, SIGTERM};
    use signal_hook_async_std::Signals;

    match Signals::new([SIGINT, SIGTERM, SIGQUIT]) {
        Ok(signals) => {
            let mut signals = signals.fuse();
            while signals.next().await.is_some() {
                if stop.is_stopped() {
                    eprintln!("second interrupt, shutting down harshly");
                    std::process::exit(1);
                } else {
                    log::info!("shutting down gracefully");
                    stop.stop();
                }
            }
        }
        Err(e) => log::error!("unable to register signal handler: {e}"),
    }
}

pub(crate) async fn run_config<H: Handler>(config: Config, handler: H) {
    if config.register_signals {
        #[cfg(unix)]
        spawn(handle_signals(config.stopper()));
        #[cfg(not(unix))]
        log::warn!("signal handling is not supported on this platform");
    }

    let listener = match config.build_listener() {
        Ok(listener) => match async_net::TcpListener::try_from(listener) {
            Ok(listener) => listener,
            Err(e) => {
                log::error!("unable to register listener: {e}");
                return;
            }
        },
        Err(e) => {
            log::error!("unable to bind {}:{}: {e}", config.host(), config.port());
            return;
        }
    };

    if let Ok(local_addr) = listener.local_addr() {
        log::info!("listening on http://{local_addr}");
    }

    let handler = Arc::new(handler);
    let counter = CloneCounter::new();
    let mut incoming = config.stopper.stop_stream(listener.incoming());

    while let Some(Ok(stream)) = incoming.next().await {
        let over_capacity = config
            .max_connections
            .is_some_and(|max| counter.current() >= max);
        let config = config.clone();
        let handler = Arc::clone(&handler);
        let counter = counter.clone();
        spawn(async move {
            handle_stream(config, stream, handler, over_capacity).await;
            drop(counter);
        });
    }

    log::info!("accept loop ended, draining {} connections", counter.current());
    counter.await;
}

async fn handle_stream<H: Handler>(
    config: Config,
    stream: async_net::TcpStream,
    handler: Arc<H>,
    over_capacity: bool,
) {
    let mut transport = ServerTransport::from(stream);

    if over_capacity {
        // wait for the client to start requesting, then turn it away
        let mut byte = [0u8];
        let _ = transport.read(&mut byte).await;
        let _ = transport.write_all(SERVICE_UNAVAILABLE).await;
        return;
    }

    if let Err(e) = transport.set_nodelay(config.nodelay) {
        log::warn!("unable to set nodelay: {e}");
    }

    let peer_ip = transport.peer_addr().ok().flatten().map(|addr| addr.ip());

    let result = freshet_http::Conn::map_with_config(
        config.http_config,
        transport,
        config.stopper.clone(),
        |mut conn| {
            let handler = Arc::clone(&handler);
            async move {
                conn.set_peer_ip(peer_ip);
                handler.run(conn).await
            }
        },
    )
    .await;

    match result {
        Ok(()) => {
            log::debug!("closing connection");
        }

        Err(freshet_http::Error::Io(e))
            if matches!(
                e.kind(),
                std::io::ErrorKind::ConnectionReset | std::io::ErrorKind::BrokenPipe
            ) =>
        {
            log::debug!("connection reset by peer");
        }

        Err(e) => {
            log::error!("http error: {e:?}");
        }
    }
}
