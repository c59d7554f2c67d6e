// src/main.rs

use clap::Parser;

use noderelay::cli::CliArgs;
use noderelay::logging::init_logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();
    init_logging(args.log_level)?;
    noderelay::run(args).await?;
    Ok(())
}
