use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    codequery_cli::main_entry().await
}
