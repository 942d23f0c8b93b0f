use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    lore_cli::main_entry().await
}
