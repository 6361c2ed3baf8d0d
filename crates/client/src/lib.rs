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
A streaming http/1.1 client with scope-based connection pooling.

```rust,no_run
# freshet_testing::block_on(async {
use freshet_client::{pooling, Conn};

// connections opened within the scope are parked and reused
let scope = pooling();

let mut first = Conn::get("http://example.com/a")?.execute().await?;
let body = first.response_body().read_string().await?;
drop(first); // transport returns to the pool

let mut second = Conn::get("http://example.com/b")?.execute().await?;
// same underlying connection, no second dial
# let _ = (body, second);

drop(scope); // every pooled connection is closed
# freshet_http::Result::Ok(()) }).unwrap();
```

Streaming responses (`text/event-stream`, or bodies delimited by
connection close) are never pooled; their connections close when the
body is dropped or finishes.
*/

mod client;
pub use client::{Client, ClientConfig};

mod conn;
pub use conn::{Conn, USER_AGENT};

mod connector;
pub use connector::ClientTransport;

mod pool;
pub use pool::{pooling, pooling_with_idle, Pool, PoolEntry, PoolScope};

mod target;
pub use target::{ConnectionTarget, ProxyConfig};

pub use freshet_http::{
    Body, Error, HeaderName, HeaderValue, HeaderValues, Headers, Method, Result, Status, Version,
};
