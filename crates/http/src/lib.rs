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
This crate represents the http/1.1 implementation for the freshet
toolkit: the incremental wire-format parser, the body model with its
encoders and decoders, and the per-connection server loop.

If you are looking to build an application, you want a handler running
on freshet-server; if you are looking to issue requests, you want
freshet-client. This crate is the shared engine underneath both.

## Example

```rust
# futures_lite::future::block_on(async {
use freshet_http::{Conn, Stopper};
use freshet_testing::TestTransport;

let stopper = Stopper::new();
let (client, server) = TestTransport::new();
client.write_all("GET / HTTP/1.1\r\nHost: example\r\nConnection: close\r\n\r\n");

Conn::map(server, stopper, |mut conn: Conn<TestTransport>| async move {
    conn.set_status(200);
    conn.set_response_body("hello");
    conn
})
.await
.unwrap();

let response = client.read_available_string().await;
assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
assert!(response.ends_with("\r\n\r\nhello"));
# });
```
*/

mod after_send;
pub use after_send::SendStatus;
pub(crate) use after_send::AfterSend;

mod body;
pub use body::Body;

mod body_encoder;
pub use body_encoder::BodyEncoder;

mod buffer;
pub use buffer::Buffer;

mod bufwriter;
pub(crate) use bufwriter::BufWriter;

mod chunked_encoder;
pub use chunked_encoder::ChunkedEncoder;

mod codec;
pub use codec::{ChunkedDecoder, GzipDecoder, GzipEncoder};

mod conn;
pub use conn::{Conn, SERVER};

mod connection_status;
pub use connection_status::ConnectionStatus;

mod copy;
pub use copy::copy;

mod error;
pub use error::{Error, Result};

mod header_name;
pub use header_name::HeaderName;

mod header_value;
pub use header_value::HeaderValue;

mod header_values;
pub use header_values::HeaderValues;

mod headers;
pub use headers::Headers;

mod http_config;
pub use http_config::HttpConfig;

mod line_parser;
pub use line_parser::LineParser;

mod method;
pub use method::Method;

pub mod multipart;

mod mut_cow;
pub use mut_cow::MutCow;

mod parser;
pub use parser::{Atom, Parser, RequestLine, ResponseLine};

mod received_body;
pub use received_body::{ReceivedBody, ReceivedBodyState, SPOOL_THRESHOLD};

mod state_set;
pub use state_set::StateSet;

mod status;
pub use status::Status;

pub mod transport;
pub use transport::Transport;

mod util;
pub use util::{deadline, encoding};

mod version;
pub use version::Version;

pub use stopper::Stopper;

/// A canned bad-request response, sent when a request head cannot be
/// parsed and nothing has been written yet.
pub const BAD_REQUEST: &[u8] = b"HTTP/1.1 400 Bad Request\r\n\
Content-Type: text/plain\r\n\
Content-Length: 11\r\n\
Connection: close\r\n\
\r\n\
Bad Request";

/// A canned internal-server-error response, sent when response
/// serialization fails before any bytes have been written.
pub const SERVER_ERROR: &[u8] = b"HTTP/1.1 500 Internal Server Error\r\n\
Content-Type: text/plain\r\n\
Content-Length: 21\r\n\
Connection: close\r\n\
\r\n\
Internal server error";

/// A canned service-unavailable response, for servers that enforce a
/// connection cap.
pub const SERVICE_UNAVAILABLE: &[u8] = b"HTTP/1.1 503 Service Unavailable\r\n\
Content-Type: text/plain\r\n\
Content-Length: 19\r\n\
Connection: close\r\n\
\r\n\
Service unavailable";
