//! Daily scheduled trigger.

use std::sync::Arc;

use chrono::{DateTime, Duration, FixedOffset, NaiveTime, Utc};
use subsidy_core::SyncOrchestrator;
use tracing::{error, info, warn};

use crate::error::Result;
use crate::trigger::{run_until_shutdown, Shutdown};

/// Ticks later than this are reported as past due.
const PAST_DUE_AFTER_SECS: i64 = 60;

/// First instant strictly after `now` whose wall-clock time at `offset` is
/// `at`.
pub fn next_run_after(now: DateTime<Utc>, at: NaiveTime, offset: FixedOffset) -> DateTime<Utc> {
    let local_today = now.with_timezone(&offset).date_naive().and_time(at);
    let utc_naive = local_today - Duration::seconds(i64::from(offset.local_minus_utc()));
    let candidate = DateTime::<Utc>::from_naive_utc_and_offset(utc_naive, Utc);
    if candidate <= now {
        candidate + Duration::days(1)
    } else {
        candidate
    }
}

/// Run the pipeline every day at `at` (local to `offset`) until `shutdown`
/// is raised, including while a run is in progress. Failed runs are logged
/// and the schedule continues.
pub async fn run_schedule(
    orchestrator: Arc<SyncOrchestrator>,
    at: NaiveTime,
    offset: FixedOffset,
    run_on_startup: bool,
    shutdown: Shutdown,
) -> Result<()> {
    if run_on_startup {
        info!("running on startup");
        run_logged(&orchestrator, &shutdown).await;
    }

    loop {
        if shutdown.is_triggered() {
            info!("stopping schedule");
            return Ok(());
        }

        let next = next_run_after(Utc::now(), at, offset);
        info!(next_run = %next.with_timezone(&offset), "waiting for next scheduled run");
        let wait = (next - Utc::now()).to_std().unwrap_or_default();

        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = shutdown.wait() => continue,
        }

        let late = Utc::now() - next;
        if late.num_seconds() > PAST_DUE_AFTER_SECS {
            warn!(late_secs = late.num_seconds(), "the timer is past due");
        }
        run_logged(&orchestrator, &shutdown).await;
    }
}

async fn run_logged(orchestrator: &Arc<SyncOrchestrator>, shutdown: &Shutdown) {
    info!("scheduled sync starting");
    match run_until_shutdown(orchestrator.clone(), shutdown).await {
        Ok(outcome) => info!(%outcome, "scheduled sync completed"),
        Err(e) => error!(error = %e, "scheduled sync failed"),
    }
}
