#[tokio::main]
async fn main() {
    if let Err(e) = raidmaster::run().await {
        tracing::error!(error = %e, "raidmaster exited with an error");
        eprintln!("raidmaster: {e}");
        std::process::exit(1);
    }
}
