use freshet_server::{Body, Conn};

async fn handler(mut conn: Conn) -> Conn {
    match conn.path() {
        "/sse" => {
            conn.response_headers_mut()
                .insert("content-type", "text/event-stream");
            conn.set_response_body(Body::from_iter(
                (0..5).map(|n| format!("event: count\ndata: {n}\n\n")),
            ));
            conn.set_status(200);
        }

        _ => {
            conn.set_status(200);
            conn.set_response_body("open /sse for an event stream");
        }
    }
    conn
}

fn main() {
    env_logger::init();
    freshet_server::run(handler);
}
