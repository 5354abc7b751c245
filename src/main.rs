use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    parley::cli::run_cli().await
}
