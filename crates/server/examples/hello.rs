fn main() {
    env_logger::init();
    freshet_server::run(|mut conn: freshet_server::Conn| async move {
        conn.set_status(200);
        conn.set_response_body("hello world");
        conn
    });
}
