use freshet_client::{pooling, Conn, Result};

pub fn main() -> Result<()> {
    env_logger::init();
    let url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| String::from("http://example.com"));

    async_global_executor::block_on(async {
        let _scope = pooling();

        let mut conn = Conn::get(&url)?.execute().await?;
        println!("status: {:?}", conn.status());
        for (name, values) in conn.response_headers().iter() {
            for value in values {
                println!("{name}: {value}");
            }
        }

        let body = conn.response_body().read_string().await?;
        println!("\n{body}");
        Ok(())
    })
}
