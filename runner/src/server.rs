//! On-demand HTTP trigger.
//!
//! `GET` or `POST /api/fetch_subsidy_manual` runs the pipeline and answers
//! 200 with the run summary, or 500 with the error. Only one run at a time:
//! a request arriving while a run is in progress gets 409.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Router};
use subsidy_core::{CancelToken, SyncOrchestrator};
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tracing::{error, info};

use crate::error::Result;
use crate::trigger::{run_blocking, Shutdown};

pub const MANUAL_TRIGGER_PATH: &str = "/api/fetch_subsidy_manual";

#[derive(Clone)]
pub struct AppState {
    orchestrator: Arc<SyncOrchestrator>,
    running: Arc<Mutex<()>>,
    cancel: CancelToken,
}

impl AppState {
    pub fn new(orchestrator: Arc<SyncOrchestrator>) -> Self {
        Self {
            orchestrator,
            running: Arc::new(Mutex::new(())),
            cancel: CancelToken::new(),
        }
    }

    /// Token cancelled on shutdown; in-flight runs stop between items.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(MANUAL_TRIGGER_PATH, get(manual_sync).post(manual_sync))
        .route("/healthz", get(|| async { "ok" }))
        .with_state(state)
}

/// Serve until `shutdown` is raised. Runs still in progress are cancelled
/// between items.
pub async fn serve(listener: TcpListener, state: AppState, shutdown: Shutdown) -> Result<()> {
    let cancel = state.cancel_token();
    info!(addr = %listener.local_addr()?, "manual trigger listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            shutdown.wait().await;
            info!("shutting down manual trigger");
            cancel.cancel();
        })
        .await?;
    Ok(())
}

async fn manual_sync(State(state): State<AppState>) -> (StatusCode, String) {
    let Ok(_guard) = state.running.try_lock() else {
        return (
            StatusCode::CONFLICT,
            "a sync run is already in progress".to_string(),
        );
    };

    info!("manual sync triggered");
    match run_blocking(state.orchestrator.clone(), state.cancel.clone()).await {
        Ok(outcome) => {
            info!(%outcome, "manual sync completed");
            (StatusCode::OK, format!("sync completed: {outcome}"))
        }
        Err(e) => {
            error!(error = %e, "manual sync failed");
            (StatusCode::INTERNAL_SERVER_ERROR, format!("sync failed: {e}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use subsidy_core::{StoreConnection, SyncConfig};
    use tower::ServiceExt;

    fn state() -> AppState {
        let mut config = SyncConfig::new(StoreConnection::Memory);
        config.base_url = "http://127.0.0.1:9".to_string();
        AppState::new(Arc::new(SyncOrchestrator::connect(&config).unwrap()))
    }

    #[tokio::test]
    async fn busy_trigger_answers_conflict() {
        let state = state();
        let _held = state.running.clone().try_lock_owned().unwrap();

        let resp = router(state)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(MANUAL_TRIGGER_PATH)
                    .body(axum::body::Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn shutdown_stops_serving_and_cancels_runs() {
        let state = state();
        let cancel = state.cancel_token();
        let shutdown = Shutdown::new();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let serving = tokio::spawn(serve(listener, state, shutdown.clone()));

        shutdown.trigger();
        tokio::time::timeout(std::time::Duration::from_secs(5), serving)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert!(cancel.is_cancelled());
    }

    #[tokio::test]
    async fn healthz() {
        let resp = router(state())
            .oneshot(Request::builder().uri("/healthz").body(axum::body::Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
