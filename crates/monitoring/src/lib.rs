//! Monitoring - multi-protocol health checks for Uppe
//!
//! Given a [`MonitorConfig`] describing a remote endpoint and its protocol,
//! a [`Checker`] probes it and returns a single [`CheckResult`]. The
//! [`CheckerRegistry`] maps monitor type strings to checkers and exposes the
//! catalog of supported types.
//!
//! ```rust,ignore
//! use monitoring::{CheckerRegistry, MonitorConfig};
//!
//! let registry = CheckerRegistry::global();
//! let config = MonitorConfig::new("tcp").with_hostname("example.com").with_port(443);
//! let result = registry.check(&config).await?;
//! println!("{} in {}ms", result.status(), result.response_time_ms());
//! ```

pub mod catalog;
pub mod checker;
pub mod checkers;
pub mod error;
pub mod registry;
pub mod types;
pub mod validation;
pub mod wire;

// Re-export main types
pub use catalog::MonitorTypeInfo;
pub use checker::Checker;
pub use error::{CheckError, RegistryError};
pub use registry::CheckerRegistry;
pub use types::{CheckResult, MonitorConfig, MonitorStatus};
pub use validation::{ValidationError, validate_monitor_config};

/// Timeout applied when a monitor does not set one, in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// User agent sent by HTTP based checkers
pub const USER_AGENT: &str = concat!("uppe-monitoring/", env!("CARGO_PKG_VERSION"));
