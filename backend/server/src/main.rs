#[tokio::main]
async fn main() -> std::io::Result<()> {
    eggs::start_server().await
}
