use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    docchat::run().await
}
