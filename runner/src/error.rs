use subsidy_core::{ConfigError, SyncError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RunnerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error("invalid log filter: {0}")]
    LogFilter(String),

    #[error("could not install log subscriber: {0}")]
    LogInit(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("sync task failed: {0}")]
    Task(String),
}

pub type Result<T> = std::result::Result<T, RunnerError>;

impl RunnerError {
    /// Bad flags or environment, as opposed to a run that failed.
    pub fn is_config(&self) -> bool {
        match self {
            RunnerError::Config(_) => true,
            RunnerError::Sync(e) => e.is_config(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use subsidy_core::ApiError;

    #[test]
    fn classifies_config_errors() {
        let missing = ConfigError::Missing("STORAGE_CONNECTION_STRING");
        assert!(RunnerError::from(missing.clone()).is_config());
        assert!(RunnerError::from(SyncError::from(missing)).is_config());

        let listing = SyncError::Listing(ApiError::Transport("refused".to_string()));
        assert!(!RunnerError::from(listing).is_config());
        assert!(!RunnerError::Task("panicked".to_string()).is_config());
    }
}
