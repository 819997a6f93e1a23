use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};

/// Command-line arguments for the timeledger binary.
#[derive(Debug, Parser)]
#[command(name = "timeledger", version, about = "Timeledger time-tracking API")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "TIMELEDGER_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the HTTP API.
    Serve(Box<ServeArgs>),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,

    /// Override the database pool size.
    #[arg(long = "database-max-connections", value_name = "COUNT")]
    pub database_max_connections: Option<u32>,

    /// Toggle the result cache.
    #[arg(
        long = "cache-enabled",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub cache_enabled: Option<bool>,

    /// Override the maximum number of cached entries.
    #[arg(long = "cache-max-entries", value_name = "COUNT")]
    pub cache_max_entries: Option<usize>,

    /// Override the default cache TTL; negative keeps entries until flushed.
    #[arg(
        long = "cache-default-ttl-seconds",
        value_name = "SECONDS",
        allow_negative_numbers = true
    )]
    pub cache_default_ttl_seconds: Option<i64>,

    /// Override the invalidation consumer interval.
    #[arg(long = "cache-auto-consume-interval-ms", value_name = "MILLISECONDS")]
    pub cache_auto_consume_interval_ms: Option<u64>,

    /// Override the maximum events per consumption batch.
    #[arg(long = "cache-consume-batch-limit", value_name = "COUNT")]
    pub cache_consume_batch_limit: Option<usize>,

    /// Override the default page size.
    #[arg(long = "pagination-default-size", value_name = "COUNT")]
    pub pagination_default_size: Option<u32>,

    /// Override the maximum page size.
    #[arg(long = "pagination-max-size", value_name = "COUNT")]
    pub pagination_max_size: Option<u32>,
}
