use std::env::var;

use tracing::level_filters::LevelFilter;
use tracing_subscriber::{
    Layer, filter::EnvFilter, layer::SubscriberExt, util::SubscriberInitExt,
    util::TryInitError,
};

/// Output format of log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

impl LogFormat {
    /// Format selected by `RUST_LOG_FORMAT`, compact when unset or unknown
    pub fn from_env() -> Self {
        var("RUST_LOG_FORMAT").map(|value| Self::parse(&value)).unwrap_or_default()
    }

    fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Compact,
        }
    }
}

/// Install the global subscriber at `info`, ignoring a second installation
pub fn init_tracing() {
    init_tracing_with_level(LevelFilter::INFO);
}

/// Install the global subscriber with `level` as the default directive
pub fn init_tracing_with_level(level: LevelFilter) {
    if let Err(error) = try_init_tracing(level, LogFormat::from_env()) {
        eprintln!("Tracing already initialized: {error}");
    }
}

/// Install the global subscriber, failing if one is already set
pub fn try_init_tracing(level: LevelFilter, format: LogFormat) -> Result<(), TryInitError> {
    let env_filter = EnvFilter::builder().with_default_directive(level.into()).from_env_lossy();

    // Logs go to stderr, stdout is reserved for program output
    let log_layer = match format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_filter(env_filter)
            .boxed(),
        LogFormat::Compact => tracing_subscriber::fmt::layer()
            .compact()
            .without_time()
            .with_writer(std::io::stderr)
            .with_filter(env_filter)
            .boxed(),
    };

    tracing_subscriber::registry().with(log_layer).try_init()
}
