//! HTTP/HTTPS checker.

use reqwest::redirect::Policy;
use tracing::debug;

use crate::catalog::MonitorTypeInfo;
use crate::checker::{Checker, Probe, run_probe};
use crate::error::CheckError;
use crate::types::{CheckResult, MonitorConfig};
use crate::USER_AGENT;

const MAX_REDIRECTS: usize = 5;
const DEFAULT_EXPECTED_STATUS: u16 = 200;

const HTTP_TYPES: &[MonitorTypeInfo] = &[
    MonitorTypeInfo {
        monitor_type: "http",
        name: "HTTP",
        description: "Monitor a website or API endpoint over HTTP",
        icon: "globe",
        fields: &["url", "timeout", "expected_status_code", "expected_keyword"],
        default_port: Some(80),
        is_game_server: false,
    },
    MonitorTypeInfo {
        monitor_type: "https",
        name: "HTTPS",
        description: "Monitor a website or API endpoint over HTTPS with certificate verification",
        icon: "lock",
        fields: &["url", "timeout", "expected_status_code", "expected_keyword"],
        default_port: Some(443),
        is_game_server: false,
    },
];

/// HTTP/HTTPS checker
#[derive(Debug, Default, Clone, Copy)]
pub struct HttpChecker;

impl HttpChecker {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl Checker for HttpChecker {
    fn supported_types(&self) -> &'static [MonitorTypeInfo] {
        HTTP_TYPES
    }

    async fn check(&self, config: &MonitorConfig) -> CheckResult {
        run_probe(config.timeout(), probe_http(config)).await
    }
}

async fn probe_http(config: &MonitorConfig) -> Result<Probe, CheckError> {
    let url = target_url(config)?;
    let verify_tls = config.monitor_type == "https";
    debug!("HTTP check: GET {} (verify tls: {})", url, verify_tls);

    let client = reqwest::Client::builder()
        .timeout(config.timeout())
        .redirect(Policy::limited(MAX_REDIRECTS))
        .danger_accept_invalid_certs(!verify_tls)
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| CheckError::connection(format!("Failed to build HTTP client: {e}")))?;

    let response = client
        .get(&url)
        .send()
        .await
        .map_err(|e| CheckError::connection(format!("HTTP request failed: {e}")))?;

    let status_code = response.status().as_u16();
    let expected = config.expected_status_code.unwrap_or(DEFAULT_EXPECTED_STATUS);
    if !status_matches(status_code, expected) {
        return Err(CheckError::UnexpectedStatus(status_code));
    }

    let final_url = response.url().to_string();

    if let Some(keyword) = config.expected_keyword.as_deref().filter(|k| !k.is_empty()) {
        let body = response
            .text()
            .await
            .map_err(|e| CheckError::connection(format!("Failed to read response body: {e}")))?;
        if !contains_keyword(&body, keyword) {
            return Err(CheckError::KeywordNotFound { status_code });
        }
    }

    Ok(Probe::new().with_status_code(status_code).insert("url", url).insert("final_url", final_url))
}

/// Configured URL, or one built from hostname and port
fn target_url(config: &MonitorConfig) -> Result<String, CheckError> {
    if let Some(url) = config.url.as_deref().map(str::trim).filter(|u| !u.is_empty()) {
        return Ok(url.to_string());
    }

    let host = config
        .hostname
        .as_deref()
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .ok_or_else(|| CheckError::validation("No URL configured"))?;
    let scheme = if config.monitor_type == "https" { "https" } else { "http" };

    Ok(match config.port {
        Some(port) => format!("{scheme}://{host}:{port}/"),
        None => format!("{scheme}://{host}/"),
    })
}

/// Exact match, or any 2xx when the default 200 is expected
fn status_matches(status_code: u16, expected: u16) -> bool {
    status_code == expected
        || (expected == DEFAULT_EXPECTED_STATUS && (200..300).contains(&status_code))
}

fn contains_keyword(body: &str, keyword: &str) -> bool {
    body.to_lowercase().contains(&keyword.to_lowercase())
}
