use freshet_client::{pooling, Conn as ClientConn};
use freshet_http::{multipart, Body, Stopper};
use freshet_server::Conn;
use freshet_testing::{block_on, spawn};
use std::time::Duration;

async fn handler(mut conn: Conn) -> Conn {
    match conn.path() {
        "/" => {
            conn.set_status(200);
            conn.set_response_body("hello");
        }

        "/echo" => {
            match conn.request_body().read_string().await {
                Ok(body) => {
                    conn.set_status(200);
                    conn.set_response_body(body);
                }
                Err(e) => {
                    log::error!("echo error: {e}");
                    conn.set_status(400);
                }
            };
        }

        "/upload" => {
            let boundary = multipart::boundary(conn.request_headers());
            match boundary {
                Some(boundary) => {
                    let summary = {
                        let mut parser =
                            multipart::MultipartParser::new(conn.request_body(), &boundary);
                        let mut parts = Vec::new();
                        while let Some(part) = parser.next_part().await.unwrap() {
                            let name = part
                                .headers
                                .get_str("content-disposition")
                                .unwrap_or("")
                                .to_string();
                            parts.push(format!("{} bytes ({name})", part.len));
                        }
                        parts
                    };
                    conn.set_status(200);
                    conn.set_response_body(summary.join("; "));
                }
                None => conn.set_status(400),
            }
        }

        "/events" => {
            conn.response_headers_mut()
                .insert("content-type", "text/event-stream");
            conn.set_response_body(Body::from_iter([
                "event: t\ndata: 1\n\n",
                "event: t\ndata: 2\n\n",
            ]));
            conn.set_status(200);
        }

        _ => {}
    }
    conn
}

/// start a server on an ephemeral port, returning its base url
fn start_server() -> String {
    // ambient proxy configuration would redirect the client away from
    // the local server
    std::env::remove_var("HTTP_PROXY");

    let port = {
        let probe = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        probe.local_addr().unwrap().port()
    };

    let stopper = Stopper::new();
    let config = freshet_server::config()
        .with_host("127.0.0.1")
        .with_port(port)
        .without_signals()
        .with_stopper(stopper);

    spawn(async move { config.run_async(handler).await });

    // wait for the listener to come up
    block_on(async {
        for _ in 0..100 {
            if async_net::TcpStream::connect(("127.0.0.1", port)).await.is_ok() {
                return;
            }
            async_io::Timer::after(Duration::from_millis(10)).await;
        }
        panic!("server did not start listening");
    });

    format!("http://127.0.0.1:{port}")
}

#[test]
fn get_hello() {
    let url = start_server();
    block_on(async {
        let mut conn = ClientConn::get(&url).unwrap().execute().await.unwrap();
        assert_eq!(u16::from(conn.status().unwrap()), 200);
        assert_eq!(conn.response_body().read_string().await.unwrap(), "hello");
    });
}

#[test]
fn post_with_content_length_echoes() {
    let url = start_server();
    block_on(async {
        let mut conn = ClientConn::post(format!("{url}/echo"))
            .unwrap()
            .with_request_body("hello world")
            .execute()
            .await
            .unwrap();
        assert_eq!(conn.response_body().read_string().await.unwrap(), "hello world");
    });
}

#[test]
fn streaming_request_bodies_are_chunked_and_decoded() {
    let url = start_server();
    block_on(async {
        let mut conn = ClientConn::post(format!("{url}/echo"))
            .unwrap()
            .with_request_body(Body::from_iter(["hello", " ", "world"]))
            .execute()
            .await
            .unwrap();
        assert_eq!(conn.response_body().read_string().await.unwrap(), "hello world");
    });
}

#[test]
fn multipart_uploads_decode_into_parts() {
    let url = start_server();
    block_on(async {
        let body = "--XX\r\n\
                    Content-Disposition: form-data; name=\"one\"\r\n\
                    \r\n\
                    first part\r\n\
                    --XX\r\n\
                    Content-Disposition: form-data; name=\"two\"\r\n\
                    \r\n\
                    second\r\n\
                    --XX--\r\n";

        let mut conn = ClientConn::post(format!("{url}/upload"))
            .unwrap()
            .with_header("content-type", "multipart/form-data; boundary=XX")
            .with_request_body(body)
            .execute()
            .await
            .unwrap();

        assert_eq!(
            conn.response_body().read_string().await.unwrap(),
            "10 bytes (form-data; name=\"one\"); 6 bytes (form-data; name=\"two\")"
        );
    });
}

#[test]
fn server_sent_events_stream_to_the_client() {
    let url = start_server();
    block_on(async {
        let scope = pooling();

        let mut conn = ClientConn::get(format!("{url}/events"))
            .unwrap()
            .execute()
            .await
            .unwrap();

        assert!(conn.is_streaming());
        assert_eq!(
            conn.response_headers().get_str("connection"),
            Some("close")
        );

        let body = conn.response_body().read_string().await.unwrap();
        assert_eq!(body, "event: t\ndata: 1\n\nevent: t\ndata: 2\n\n");

        drop(conn);
        assert!(scope.is_empty(), "streaming connections are not pooled");
    });
}

#[test]
fn keep_alive_reuses_connections_through_the_pool() {
    let url = start_server();
    block_on(async {
        let _scope = pooling();

        for _ in 0..3 {
            let mut conn = ClientConn::get(&url).unwrap().execute().await.unwrap();
            assert_eq!(conn.response_body().read_string().await.unwrap(), "hello");
        }
    });
}
