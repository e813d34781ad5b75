//! Shared plumbing for the trigger surfaces: every trigger runs the blocking
//! pipeline on tokio's blocking pool, and one process-wide `Shutdown` signal
//! turns Ctrl-C into cooperative cancellation.

use std::sync::Arc;

use subsidy_core::{CancelToken, RunOutcome, SyncOrchestrator};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::error::{Result, RunnerError};

/// Process-wide stop signal. Once raised it stays raised, so every trigger
/// loop sees it no matter when it was sent.
#[derive(Debug, Clone)]
pub struct Shutdown(Arc<watch::Sender<bool>>);

impl Default for Shutdown {
    fn default() -> Self {
        Self(Arc::new(watch::channel(false).0))
    }
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// A signal raised by the first Ctrl-C. Must be called inside a runtime.
    pub fn on_ctrl_c() -> Self {
        let shutdown = Self::new();
        let raise = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupt received");
                raise.trigger();
            }
        });
        shutdown
    }

    pub fn trigger(&self) {
        self.0.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolves once the signal is raised.
    pub async fn wait(&self) {
        let mut raised = self.0.subscribe();
        let _ = raised.wait_for(|raised| *raised).await;
    }
}

/// Run once on the blocking pool.
pub async fn run_blocking(orchestrator: Arc<SyncOrchestrator>, cancel: CancelToken) -> Result<RunOutcome> {
    tokio::task::spawn_blocking(move || orchestrator.run(&cancel))
        .await
        .map_err(|e| RunnerError::Task(e.to_string()))?
        .map_err(RunnerError::from)
}

/// Run once; `shutdown` cancels the run between items and waits for the
/// in-flight items to finish. Callers check `shutdown.is_triggered()`
/// afterwards to tell an interrupted run from a finished one.
pub async fn run_until_shutdown(
    orchestrator: Arc<SyncOrchestrator>,
    shutdown: &Shutdown,
) -> Result<RunOutcome> {
    let cancel = CancelToken::new();
    let mut task = tokio::spawn(run_blocking(orchestrator, cancel.clone()));

    tokio::select! {
        joined = &mut task => joined.map_err(|e| RunnerError::Task(e.to_string()))?,
        _ = shutdown.wait() => {
            warn!("shutting down, finishing in-flight items");
            cancel.cancel();
            task.await.map_err(|e| RunnerError::Task(e.to_string()))?
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn raised_signal_stays_raised() {
        let shutdown = Shutdown::new();
        assert!(!shutdown.is_triggered());

        let waiter = shutdown.clone();
        let waiting = tokio::spawn(async move { waiter.wait().await });
        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(5), waiting)
            .await
            .unwrap()
            .unwrap();

        assert!(shutdown.is_triggered());
        // Late waiters return immediately.
        tokio::time::timeout(Duration::from_secs(5), shutdown.wait())
            .await
            .unwrap();
    }
}
