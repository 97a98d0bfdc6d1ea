#[tokio::main]
async fn main() {
    if let Err(e) = lunadine_lib::run().await {
        eprintln!("lunadine: {}", e);
        std::process::exit(1);
    }
}
