//! Monitor configuration validation.
//!
//! Runs before a monitor is dispatched so that configuration mistakes are
//! reported as such instead of as failing checks.

use thiserror::Error;
use url::Url;

use crate::checkers::dns::SUPPORTED_RECORD_TYPES;
use crate::registry::CheckerRegistry;
use crate::types::MonitorConfig;

const MIN_TIMEOUT: u64 = 1;
const MAX_TIMEOUT: u64 = 300; // 5 minutes

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Unsupported monitor type: {0}")]
    UnsupportedType(String),
    #[error("Monitor type {0} requires a {1}")]
    MissingField(String, &'static str),
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    #[error("Invalid scheme for HTTP monitor: {0}")]
    InvalidScheme(String),
    #[error("Port 0 is not valid")]
    InvalidPort,
    #[error("Timeout out of range: {0} seconds (allowed: 1-300)")]
    TimeoutOutOfRange(u64),
    #[error("Unsupported DNS record type: {0}")]
    UnsupportedRecordType(String),
}

/// Validate a monitor against the checkers known to `registry`
pub fn validate_monitor_config(
    registry: &CheckerRegistry,
    config: &MonitorConfig,
) -> Result<(), ValidationError> {
    let monitor_type = config.monitor_type.as_str();
    if !registry.is_supported(monitor_type) {
        return Err(ValidationError::UnsupportedType(monitor_type.to_string()));
    }

    match monitor_type {
        "http" | "https" => validate_http_target(config)?,
        _ => {
            if config.host().is_none() {
                return Err(ValidationError::MissingField(monitor_type.to_string(), "hostname"));
            }
        }
    }

    if monitor_type == "udp" && config.port.is_none() {
        return Err(ValidationError::MissingField(monitor_type.to_string(), "port"));
    }
    if config.port == Some(0) || config.voice_port == Some(0) {
        return Err(ValidationError::InvalidPort);
    }

    if let Some(timeout) = config.timeout {
        validate_timeout(timeout)?;
    }

    if let Some(record_type) = &config.dns_record_type {
        let normalized = record_type.trim().to_uppercase();
        if !SUPPORTED_RECORD_TYPES.contains(&normalized.as_str()) {
            return Err(ValidationError::UnsupportedRecordType(record_type.clone()));
        }
    }

    Ok(())
}

/// HTTP monitors need a URL with an http(s) scheme, or at least a hostname
fn validate_http_target(config: &MonitorConfig) -> Result<(), ValidationError> {
    let Some(target) = config.url.as_deref() else {
        return match config.hostname.as_deref() {
            Some(host) if !host.trim().is_empty() => Ok(()),
            _ => Err(ValidationError::MissingField(config.monitor_type.clone(), "url")),
        };
    };

    let url = Url::parse(target).map_err(|e| ValidationError::InvalidUrl(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => {}
        other => return Err(ValidationError::InvalidScheme(other.to_string())),
    }

    if url.port() == Some(0) {
        return Err(ValidationError::InvalidPort);
    }

    Ok(())
}

fn validate_timeout(timeout_seconds: u64) -> Result<(), ValidationError> {
    if !(MIN_TIMEOUT..=MAX_TIMEOUT).contains(&timeout_seconds) {
        return Err(ValidationError::TimeoutOutOfRange(timeout_seconds));
    }
    Ok(())
}
