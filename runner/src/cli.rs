//! Command-line and environment configuration.

use std::net::SocketAddr;
use std::time::Duration;

use chrono::{FixedOffset, NaiveTime};
use clap::{Args, Parser, Subcommand, ValueEnum};
use subsidy_core::client::DEFAULT_BASE_URL;
use subsidy_core::config::DEFAULT_CONTAINER;
use subsidy_core::query::DEFAULT_KEYWORD;
use subsidy_core::transport::DEFAULT_MAX_BODY_BYTES;
use subsidy_core::{
    Acceptance, ConfigError, FieldExclusion, ListingQuery, SortField, SortOrder, SyncConfig,
};

#[derive(Debug, Parser)]
#[command(name = "subsidy-sync", version, about = "Incrementally mirror public subsidy records into a record store")]
pub struct Cli {
    #[command(flatten)]
    pub logging: LogArgs,

    #[command(flatten)]
    pub sync: SyncArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the pipeline once and print the summary.
    Run,
    /// Run the pipeline every day at a fixed local time.
    Schedule(ScheduleArgs),
    /// Serve an HTTP endpoint that runs the pipeline on demand.
    Serve(ServeArgs),
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable multi-line output
    #[default]
    Pretty,
    /// Single-line output
    Compact,
    /// Structured JSON for log collectors
    Json,
}

#[derive(Debug, Clone, Args)]
pub struct LogArgs {
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty, global = true)]
    pub log_format: LogFormat,

    /// Used when RUST_LOG is unset.
    #[arg(long, env = "LOG_LEVEL", default_value = "info", global = true)]
    pub log_level: String,
}

#[derive(Debug, Clone, Args)]
pub struct SyncArgs {
    /// Record store connection: `file://<dir>`, a directory path, or `memory:`.
    #[arg(long, env = "STORAGE_CONNECTION_STRING", hide_env_values = true, global = true)]
    pub connection: Option<String>,

    #[arg(long, env = "BLOB_CONTAINER_NAME", default_value = DEFAULT_CONTAINER, global = true)]
    pub container: String,

    #[arg(long, env = "JGRANTS_BASE_URL", default_value = DEFAULT_BASE_URL, global = true)]
    pub base_url: String,

    #[arg(long, env = "SUBSIDY_KEYWORD", default_value = DEFAULT_KEYWORD, global = true)]
    pub keyword: String,

    /// created-date, acceptance-start or acceptance-end
    #[arg(long, env = "SUBSIDY_SORT", default_value = "created-date", global = true)]
    pub sort: SortField,

    /// asc or desc
    #[arg(long, env = "SUBSIDY_ORDER", default_value = "desc", global = true)]
    pub order: SortOrder,

    /// open (currently accepting) or all
    #[arg(long, env = "SUBSIDY_ACCEPTANCE", default_value = "open", global = true)]
    pub acceptance: Acceptance,

    #[arg(long, env = "SUBSIDY_TARGET_AREA", global = true)]
    pub target_area: Option<String>,

    /// Process at most this many new subsidies per run.
    #[arg(long, env = "SYNC_MAX_ITEMS", global = true)]
    pub max_items: Option<usize>,

    /// Detail fields stripped before saving. Defaults to the attachment fields.
    #[arg(long = "exclude-field", env = "SYNC_EXCLUDE_FIELDS", value_delimiter = ',', global = true)]
    pub exclude_fields: Vec<String>,

    /// Count records without attachments as skipped instead of saving them.
    #[arg(long, env = "SYNC_SKIP_EMPTY", global = true)]
    pub skip_empty: bool,

    #[arg(long, env = "SYNC_CONCURRENCY", default_value_t = subsidy_core::config::DEFAULT_CONCURRENCY, global = true)]
    pub concurrency: usize,

    /// Per-request timeout in seconds.
    #[arg(long, env = "SYNC_TIMEOUT_SECS", default_value_t = 30, global = true)]
    pub timeout_secs: u64,

    /// Largest response body accepted from the API.
    #[arg(long, env = "SYNC_MAX_BODY_BYTES", default_value_t = DEFAULT_MAX_BODY_BYTES, global = true)]
    pub max_body_bytes: u64,
}

impl SyncArgs {
    pub fn to_config(&self) -> Result<SyncConfig, ConfigError> {
        let mut config = SyncConfig::from_connection(self.connection.as_deref())?;
        config.base_url = self.base_url.clone();
        config.container = self.container.trim().to_string();
        config.query = ListingQuery {
            keyword: self.keyword.clone(),
            sort_field: self.sort,
            sort_order: self.order,
            acceptance: self.acceptance,
            target_area_search: self.target_area.clone().filter(|a| !a.trim().is_empty()),
        };
        config.max_items = self.max_items;
        if !self.exclude_fields.is_empty() {
            config.exclusion = FieldExclusion::new(&self.exclude_fields)?;
        }
        config.skip_empty = self.skip_empty;
        config.concurrency = self.concurrency;
        config.request_timeout = Duration::from_secs(self.timeout_secs);
        config.max_body_bytes = self.max_body_bytes;
        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug, Clone, Args)]
pub struct ScheduleArgs {
    /// Local time of day (HH:MM) to run at.
    #[arg(long, env = "SYNC_SCHEDULE_AT", default_value = "02:00", value_parser = parse_time_of_day)]
    pub at: NaiveTime,

    /// Offset of the local time zone from UTC.
    #[arg(long, env = "SYNC_UTC_OFFSET", default_value = "+09:00", value_parser = parse_utc_offset, allow_hyphen_values = true)]
    pub utc_offset: FixedOffset,

    /// Also run once immediately at startup.
    #[arg(long)]
    pub run_on_startup: bool,
}

#[derive(Debug, Clone, Args)]
pub struct ServeArgs {
    #[arg(long, env = "SYNC_LISTEN", default_value = "127.0.0.1:7071")]
    pub listen: SocketAddr,
}

fn parse_time_of_day(s: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(s, "%H:%M").map_err(|e| format!("expected HH:MM: {e}"))
}

fn parse_utc_offset(s: &str) -> Result<FixedOffset, String> {
    s.parse::<FixedOffset>()
        .map_err(|e| format!("expected an offset like +09:00, got {s:?}: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["subsidy-sync"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn run_with_defaults() {
        let cli = parse(&["run", "--connection", "memory:"]);
        assert!(matches!(cli.command, Command::Run));
        let config = cli.sync.to_config().unwrap();
        assert_eq!(config.container, "subsidies");
        assert_eq!(config.query, ListingQuery::default());
        assert_eq!(config.exclusion, FieldExclusion::default());
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.max_body_bytes, 64 * 1024 * 1024);
    }

    #[test]
    fn flags_map_onto_config() {
        let cli = parse(&[
            "run",
            "--connection",
            "file:///tmp/subsidies",
            "--container",
            "grants",
            "--acceptance",
            "all",
            "--sort",
            "acceptance-end",
            "--order",
            "asc",
            "--target-area",
            "富山県",
            "--max-items",
            "10",
            "--exclude-field",
            "application_form,outline_of_grant",
            "--skip-empty",
            "--concurrency",
            "8",
            "--max-body-bytes",
            "1048576",
        ]);
        let config = cli.sync.to_config().unwrap();
        assert_eq!(config.container, "grants");
        assert_eq!(config.query.acceptance, Acceptance::All);
        assert_eq!(config.query.sort_field, SortField::AcceptanceEnd);
        assert_eq!(config.query.sort_order, SortOrder::Asc);
        assert_eq!(config.query.target_area_search.as_deref(), Some("富山県"));
        assert_eq!(config.max_items, Some(10));
        assert_eq!(
            config.exclusion.fields(),
            ["application_form".to_string(), "outline_of_grant".to_string()]
        );
        assert!(config.skip_empty);
        assert_eq!(config.concurrency, 8);
        assert_eq!(config.max_body_bytes, 1_048_576);
    }

    #[test]
    fn invalid_values_are_config_errors() {
        let cli = parse(&["run", "--connection", "memory:", "--concurrency", "0"]);
        assert!(cli.sync.to_config().is_err());

        let cli = parse(&["run", "--connection", "memory:", "--exclude-field", "id"]);
        assert!(cli.sync.to_config().is_err());

        assert!(Cli::try_parse_from(["subsidy-sync", "run", "--order", "sideways"]).is_err());
    }

    #[test]
    fn schedule_defaults_to_two_am_jst() {
        let cli = parse(&["schedule"]);
        let Command::Schedule(args) = cli.command else {
            panic!("expected schedule");
        };
        assert_eq!(args.at, NaiveTime::from_hms_opt(2, 0, 0).unwrap());
        assert_eq!(args.utc_offset.local_minus_utc(), 9 * 3600);
        assert!(!args.run_on_startup);
    }

    #[test]
    fn parses_utc_offsets() {
        assert_eq!(parse_utc_offset("+09:00").unwrap().local_minus_utc(), 32400);
        assert_eq!(parse_utc_offset("-05:30").unwrap().local_minus_utc(), -19800);
        assert_eq!(parse_utc_offset("+00:00").unwrap().local_minus_utc(), 0);
        assert!(parse_utc_offset("09:00").is_err());
        assert!(parse_utc_offset("+25:00").is_err());
    }

    #[test]
    fn serve_listen_address() {
        let cli = parse(&["serve", "--listen", "0.0.0.0:8080"]);
        let Command::Serve(args) = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(args.listen.port(), 8080);
    }
}
