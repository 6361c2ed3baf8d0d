use freshet_http::{Conn, Error, HttpConfig, Stopper};
use freshet_testing::{block_on, spawn, TestTransport};
use pretty_assertions::assert_eq;
use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

type ServerConn = Conn<TestTransport>;

async fn handle(mut conn: ServerConn) -> ServerConn {
    match conn.path() {
        "/events" => {
            conn.response_headers_mut()
                .insert("content-type", "text/event-stream");
            conn.set_response_body(freshet_http::Body::from_iter([
                "event: t\ndata: 1\n\n",
                "event: t\ndata: 2\n\n",
            ]));
            conn.set_status(200);
        }

        path => {
            // respond with the last letter of the path, uppercased
            let letter = path
                .chars()
                .last()
                .unwrap_or('_')
                .to_ascii_uppercase()
                .to_string();
            conn.set_status(200);
            conn.set_response_body(letter);
        }
    }
    conn
}

fn serve<F, Fut>(handler: F) -> (TestTransport, async_channel::Receiver<freshet_http::Result<()>>)
where
    F: FnMut(ServerConn) -> Fut + Send + 'static,
    Fut: std::future::Future<Output = ServerConn> + Send,
{
    let (client, server) = TestTransport::new();
    let (tx, rx) = async_channel::bounded(1);
    spawn(async move {
        let result = Conn::map(server, Stopper::new(), handler).await;
        tx.send(result).await.ok();
    });
    (client, rx)
}

async fn read_until(client: &TestTransport, needle: &[u8]) -> Vec<u8> {
    let mut received = Vec::new();
    loop {
        received.extend(client.read_available().await);
        if memchr::memmem::find(&received, needle).is_some() {
            return received;
        }
    }
}

#[test]
fn keep_alive_pipelining() {
    block_on(async {
        let (mut client, rx) = serve(handle);
        client.write_all(
            "GET /a HTTP/1.1\r\nHost: x\r\n\r\nGET /b HTTP/1.1\r\nHost: x\r\n\r\n",
        );

        let mut received = Vec::new();
        while bytecount(&received, b"HTTP/1.1 200 OK") < 2 {
            received.extend(client.read_available().await);
        }

        let response = String::from_utf8(received).unwrap();
        let first = response.find("\r\n\r\nA").expect("first body");
        let second = response.find("\r\n\r\nB").expect("second body");
        assert!(first < second, "responses out of order: {response}");

        client.close();
        rx.recv().await.unwrap().unwrap();
    });
}

fn bytecount(haystack: &[u8], needle: &[u8]) -> usize {
    memchr::memmem::find_iter(haystack, needle).count()
}

#[test]
fn post_with_content_length() {
    block_on(async {
        let (mut client, rx) = serve(|mut conn: ServerConn| async move {
            let body = conn.request_body().read_string().await.unwrap();
            assert_eq!(body, "hello world");
            conn.set_status(200);
            conn.set_response_body("ok");
            conn
        });

        client.write_all(
            "POST /u HTTP/1.1\r\nHost: x\r\nContent-Length: 11\r\nConnection: close\r\n\r\nhello world",
        );

        let received = read_until(&client, b"\r\n\r\nok").await;
        let response = String::from_utf8(received).unwrap();
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(response.contains("Content-Length: 2\r\n"));

        client.close();
        rx.recv().await.unwrap().unwrap();
    });
}

#[test]
fn chunked_request_body() {
    block_on(async {
        let (mut client, rx) = serve(|mut conn: ServerConn| async move {
            let body = conn.request_body().read_string().await.unwrap();
            assert_eq!(body, "hello world");
            conn.set_status(200);
            conn.set_response_body("ok");
            conn
        });

        client.write_all(
            "POST /u HTTP/1.1\r\nHost: x\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n\
             5\r\nhello\r\n6\r\n world\r\n0\r\n\r\n",
        );

        let received = read_until(&client, b"\r\n\r\nok").await;
        assert!(received.starts_with(b"HTTP/1.1 200 OK\r\n"));

        client.close();
        rx.recv().await.unwrap().unwrap();
    });
}

#[test]
fn streaming_response_closes_connection_and_fires_on_close_once() {
    block_on(async {
        let close_count = Arc::new(AtomicUsize::new(0));
        let close_count_ = close_count.clone();

        let (mut client, rx) = serve(move |mut conn: ServerConn| {
            let close_count = close_count_.clone();
            async move {
                conn.on_close(move |status| {
                    assert!(status.is_success());
                    close_count.fetch_add(1, Ordering::SeqCst);
                });
                handle(conn).await
            }
        });

        client.write_all("GET /events HTTP/1.1\r\nHost: x\r\n\r\n");

        let mut received = Vec::new();
        loop {
            let bytes = client.read_available().await;
            let done = bytes.is_empty();
            received.extend(bytes);
            if memchr::memmem::find(&received, b"data: 2\n\n").is_some() || done {
                break;
            }
        }

        let response = String::from_utf8(received).unwrap();
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(response.contains("Connection: close\r\n"));
        assert!(response.contains("Content-Type: text/event-stream\r\n"));
        assert!(!response.contains("Content-Length"));

        let first = response.find("data: 1").unwrap();
        let second = response.find("data: 2").unwrap();
        assert!(first < second);

        // the server loop ends because streaming responses force close
        rx.recv().await.unwrap().unwrap();
        assert_eq!(close_count.load(Ordering::SeqCst), 1);
    });
}

#[test]
fn head_requests_suppress_the_body() {
    block_on(async {
        let (mut client, rx) = serve(handle);
        client.write_all("HEAD /a HTTP/1.1\r\nHost: x\r\nConnection: close\r\n\r\n");

        let received = read_until(&client, b"\r\n\r\n").await;
        let response = String::from_utf8(received).unwrap();
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(response.contains("Content-Length: 1\r\n"));
        assert!(response.ends_with("\r\n\r\n"));

        client.close();
        rx.recv().await.unwrap().unwrap();
    });
}

#[test]
fn http_1_0_closes() {
    block_on(async {
        let (mut client, rx) = serve(handle);
        client.write_all("GET /a HTTP/1.0\r\nHost: x\r\n\r\n");

        let received = read_until(&client, b"\r\n\r\nA").await;
        assert!(received.starts_with(b"HTTP/1.0 200 OK\r\n"));

        // no close from our side: the server loop exits on its own
        rx.recv().await.unwrap().unwrap();
        client.close();
    });
}

#[test]
fn malformed_head_gets_a_canned_400() {
    block_on(async {
        let (mut client, rx) = serve(handle);
        client.write_all("junk GET / HTTP/1.1\r\nHost: x\r\n\r\n");

        let received = read_until(&client, b"Bad Request").await;
        assert!(received.starts_with(b"HTTP/1.1 400 Bad Request\r\n"));

        assert!(matches!(rx.recv().await.unwrap(), Err(Error::UnrecognizedMethod(_))));
        client.close();
    });
}

#[test]
fn responses_carry_date_server_and_default_content_type() {
    block_on(async {
        let (mut client, rx) = serve(handle);
        client.write_all("GET /a HTTP/1.1\r\nHost: x\r\nConnection: close\r\n\r\n");

        let response = String::from_utf8(read_until(&client, b"\r\n\r\nA").await).unwrap();
        assert!(response.contains("Date: "));
        assert!(response.contains(&format!("Server: {}\r\n", freshet_http::SERVER)));
        assert!(response.contains("Content-Type: text/plain\r\n"));

        client.close();
        rx.recv().await.unwrap().unwrap();
    });
}

#[test]
fn idle_keep_alive_times_out() {
    block_on(async {
        let (client, server) = TestTransport::new();
        let config = HttpConfig::default().with_keep_alive_timeout(Duration::from_millis(50));

        client.write_all("GET /a HTTP/1.1\r\nHost: x\r\n\r\n");
        // no second request and no close: the loop should end on its own
        Conn::map_with_config(config, server, Stopper::new(), handle)
            .await
            .unwrap();

        let response = client.read_available_string().await;
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
    });
}

#[test]
fn graceful_stop_interrupts_an_idle_connection() {
    block_on(async {
        let (client, server) = TestTransport::new();
        let stopper = Stopper::new();
        stopper.stop();

        Conn::map(server, stopper, handle).await.unwrap();
        drop(client);
    });
}
