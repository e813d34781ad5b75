//! Process-wide `tracing` subscriber.
//!
//! `RUST_LOG` wins over `--log-level` when set, so module-level filters such
//! as `subsidy_core=debug,ureq=warn` work without extra flags.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::cli::{LogArgs, LogFormat};
use crate::error::{Result, RunnerError};

pub fn init_logging(args: &LogArgs) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&args.log_level)
            .map_err(|e| RunnerError::LogFilter(format!("{}: {e}", args.log_level)))?,
    };

    let registry = tracing_subscriber::registry().with(filter);
    let installed = match args.log_format {
        LogFormat::Pretty => registry.with(fmt::layer().pretty()).try_init(),
        LogFormat::Compact => registry.with(fmt::layer().compact()).try_init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_current_span(true).with_span_list(false))
            .try_init(),
    };
    installed.map_err(|e| RunnerError::LogInit(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_malformed_level() {
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        let args = LogArgs {
            log_format: LogFormat::Compact,
            log_level: "subsidy_core=verbose".to_string(),
        };
        assert!(matches!(init_logging(&args), Err(RunnerError::LogFilter(_))));
    }
}
