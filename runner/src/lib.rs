//! Trigger surfaces for the subsidy sync pipeline.
//!
//! # Overview
//! `subsidy-sync run` executes one run, `schedule` runs daily at a fixed local
//! time, `serve` exposes a manual HTTP trigger. All three build one
//! `SyncOrchestrator` from flags and environment variables and translate its
//! result into a success or failure signal.

pub mod cli;
pub mod error;
pub mod logging;
pub mod schedule;
pub mod server;
pub mod trigger;

use std::sync::Arc;

use subsidy_core::SyncOrchestrator;
use tokio::net::TcpListener;
use tracing::info;

use crate::cli::{Cli, Command};
use crate::error::Result;
use crate::trigger::Shutdown;

pub async fn execute(cli: Cli) -> Result<()> {
    let config = cli.sync.to_config()?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        base_url = %config.base_url,
        container = %config.container,
        store = ?config.connection,
        acceptance = %config.query.acceptance,
        concurrency = config.concurrency,
        max_items = ?config.max_items,
        skip_empty = config.skip_empty,
        "subsidy sync configured"
    );
    let orchestrator = Arc::new(SyncOrchestrator::connect(&config)?);
    let shutdown = Shutdown::on_ctrl_c();

    match cli.command {
        Command::Run => {
            let outcome = trigger::run_until_shutdown(orchestrator, &shutdown).await?;
            println!("{outcome}");
            if !outcome.failed_ids.is_empty() {
                println!("failed: {}", outcome.failed_ids.join(", "));
            }
        }
        Command::Schedule(args) => {
            schedule::run_schedule(
                orchestrator,
                args.at,
                args.utc_offset,
                args.run_on_startup,
                shutdown,
            )
            .await?
        }
        Command::Serve(args) => {
            let listener = TcpListener::bind(args.listen).await?;
            server::serve(listener, server::AppState::new(orchestrator), shutdown).await?
        }
    }
    Ok(())
}
