use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use url::Url;

use crate::DEFAULT_TIMEOUT_SECS;

/// Status of a monitoring check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitorStatus {
    Up,
    Down,
}

impl std::fmt::Display for MonitorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MonitorStatus::Up => write!(f, "up"),
            MonitorStatus::Down => write!(f, "down"),
        }
    }
}

/// Monitor definition handed to a checker.
///
/// Every field except the type is optional; checkers fall back to their own
/// protocol defaults. Checkers only ever read this value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Monitor type, e.g. `http`, `minecraft`, `dns`
    #[serde(rename = "type")]
    pub monitor_type: String,

    /// Host name or IP address of the target
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,

    /// Full URL of the target (HTTP based monitors)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// Timeout in seconds for the whole check
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_status_code: Option<u16>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_keyword: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dns_record_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssl_expiry_warn_days: Option<i64>,

    /// TeamSpeak voice port used to select the virtual server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice_port: Option<u16>,
}

impl MonitorConfig {
    /// Create a config for the given monitor type with every field unset
    pub fn new(monitor_type: impl Into<String>) -> Self {
        Self { monitor_type: monitor_type.into(), ..Self::default() }
    }

    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = Some(hostname.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Set the timeout in seconds
    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout = Some(seconds);
        self
    }

    pub fn with_expected_status_code(mut self, code: u16) -> Self {
        self.expected_status_code = Some(code);
        self
    }

    pub fn with_expected_keyword(mut self, keyword: impl Into<String>) -> Self {
        self.expected_keyword = Some(keyword.into());
        self
    }

    pub fn with_dns_record_type(mut self, record_type: impl Into<String>) -> Self {
        self.dns_record_type = Some(record_type.into());
        self
    }

    pub fn with_ssl_expiry_warn_days(mut self, days: i64) -> Self {
        self.ssl_expiry_warn_days = Some(days);
        self
    }

    pub fn with_voice_port(mut self, port: u16) -> Self {
        self.voice_port = Some(port);
        self
    }

    /// Flat time budget for the whole check
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout.unwrap_or(DEFAULT_TIMEOUT_SECS))
    }

    /// Target host: `hostname`, or the host part of `url`
    pub fn host(&self) -> Option<String> {
        if let Some(hostname) = self.hostname.as_deref().map(str::trim) {
            if !hostname.is_empty() {
                return Some(hostname.to_string());
            }
        }

        let url = Url::parse(self.url.as_deref()?).ok()?;
        url.host_str().map(|host| host.trim_matches(|c| c == '[' || c == ']').to_string())
    }

    /// Configured port, or `default` when unset
    pub fn port_or(&self, default: u16) -> u16 {
        self.port.unwrap_or(default)
    }
}

/// Result of a monitoring check.
///
/// Built once per check and handed back to the caller; there are no setters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    status: MonitorStatus,

    /// Elapsed wall-clock time in milliseconds, set on failures too
    #[serde(rename = "response_time")]
    response_time_ms: u64,

    /// Protocol status code (HTTP only)
    status_code: Option<u16>,

    error_message: Option<String>,

    /// Protocol specific telemetry
    data: Option<Map<String, Value>>,
}

impl CheckResult {
    /// Successful check
    pub fn up(
        response_time_ms: u64,
        status_code: Option<u16>,
        data: Option<Map<String, Value>>,
    ) -> Self {
        Self { status: MonitorStatus::Up, response_time_ms, status_code, error_message: None, data }
    }

    /// Failed check
    pub fn down(
        response_time_ms: u64,
        error_message: impl Into<String>,
        status_code: Option<u16>,
        data: Option<Map<String, Value>>,
    ) -> Self {
        Self {
            status: MonitorStatus::Down,
            response_time_ms,
            status_code,
            error_message: Some(error_message.into()),
            data,
        }
    }

    pub fn status(&self) -> MonitorStatus {
        self.status
    }

    pub fn is_up(&self) -> bool {
        self.status == MonitorStatus::Up
    }

    pub fn response_time_ms(&self) -> u64 {
        self.response_time_ms
    }

    pub fn status_code(&self) -> Option<u16> {
        self.status_code
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn data(&self) -> Option<&Map<String, Value>> {
        self.data.as_ref()
    }

    /// Look up a single telemetry value
    pub fn data_value(&self, key: &str) -> Option<&Value> {
        self.data.as_ref()?.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_prefers_hostname() {
        let config = MonitorConfig::new("tcp")
            .with_hostname(" example.org ")
            .with_url("https://example.com/health");
        assert_eq!(config.host().as_deref(), Some("example.org"));
    }

    #[test]
    fn test_host_falls_back_to_url() {
        let config = MonitorConfig::new("ssl").with_url("https://example.com:8443/health");
        assert_eq!(config.host().as_deref(), Some("example.com"));

        let config = MonitorConfig::new("ssl").with_url("http://[::1]:8080/");
        assert_eq!(config.host().as_deref(), Some("::1"));

        assert_eq!(MonitorConfig::new("ssl").host(), None);
    }

    #[test]
    fn test_timeout_default() {
        assert_eq!(MonitorConfig::new("tcp").timeout(), Duration::from_secs(10));
        assert_eq!(MonitorConfig::new("tcp").with_timeout(3).timeout(), Duration::from_secs(3));
    }

    #[test]
    fn test_config_deserializes_type_key() {
        let config: MonitorConfig =
            serde_json::from_str(r#"{"type":"minecraft","hostname":"mc.example.com","port":25566}"#)
                .unwrap();
        assert_eq!(config.monitor_type, "minecraft");
        assert_eq!(config.port_or(25565), 25566);
    }

    #[test]
    fn test_result_serializes_response_time() {
        let result = CheckResult::down(12, "Host unreachable", None, None);
        let json = serde_json::to_value(&result).unwrap();

        assert_eq!(json["status"], "down");
        assert_eq!(json["response_time"], 12);
        assert_eq!(json["error_message"], "Host unreachable");
    }
}
