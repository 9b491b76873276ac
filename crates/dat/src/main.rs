mod cli;

use anyhow::Result;
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env before parsing so it can feed argument defaults.
    dotenvy::dotenv().ok();

    let cli = cli::Cli::parse();
    cli.execute().await
}
