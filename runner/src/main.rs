//! Subsidy sync CLI
//!
//! Run with: `cargo run -p subsidy-sync -- --help`

use clap::Parser;
use subsidy_sync::{cli::Cli, logging::init_logging};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(&cli.logging)?;

    if let Err(e) = subsidy_sync::execute(cli).await {
        if e.is_config() {
            tracing::error!(error = %e, "invalid configuration");
        } else {
            tracing::error!(error = %e, "subsidy sync failed");
        }
        return Err(e.into());
    }
    Ok(())
}
