use futures::stream::{self, StreamExt};
use monitoring::{CheckResult, CheckerRegistry, MonitorStatus, validate_monitor_config};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::MonitorEntry;

/// Outcome of one configured monitor, printed as a JSON line
#[derive(Debug, Serialize)]
pub struct MonitorReport {
    pub name: String,
    #[serde(rename = "type")]
    pub monitor_type: String,
    #[serde(flatten)]
    pub outcome: Outcome,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum Outcome {
    Checked(CheckResult),
    /// Rejected before dispatch
    Invalid { invalid: String },
}

impl MonitorReport {
    pub fn is_up(&self) -> bool {
        matches!(&self.outcome, Outcome::Checked(result) if result.is_up())
    }
}

/// Check every monitor once, at most `concurrency` at a time.
///
/// Reports come back in the order of `monitors`.
pub async fn run_monitors(
    registry: &CheckerRegistry,
    monitors: Vec<MonitorEntry>,
    concurrency: usize,
) -> Vec<MonitorReport> {
    info!("Running {} monitors", monitors.len());
    stream::iter(monitors)
        .map(|entry| run_monitor(registry, entry))
        .buffered(concurrency.max(1))
        .collect()
        .await
}

async fn run_monitor(registry: &CheckerRegistry, entry: MonitorEntry) -> MonitorReport {
    let outcome = match validate_monitor_config(registry, &entry.monitor) {
        Err(error) => {
            warn!("Skipping monitor {}: {}", entry.name, error);
            Outcome::Invalid { invalid: error.to_string() }
        }
        Ok(()) => match registry.check(&entry.monitor).await {
            Ok(result) => {
                log_result(&entry.name, &result);
                Outcome::Checked(result)
            }
            Err(error) => Outcome::Invalid { invalid: error.to_string() },
        },
    };

    MonitorReport { name: entry.name, monitor_type: entry.monitor.monitor_type, outcome }
}

fn log_result(name: &str, result: &CheckResult) {
    match result.status() {
        MonitorStatus::Up => debug!("Monitor {} up in {}ms", name, result.response_time_ms()),
        MonitorStatus::Down => warn!(
            "Monitor {} down after {}ms: {}",
            name,
            result.response_time_ms(),
            result.error_message().unwrap_or("unknown error")
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use monitoring::MonitorConfig;
    use tokio::net::TcpListener;

    fn entry(name: &str, monitor: MonitorConfig) -> MonitorEntry {
        MonitorEntry { name: name.into(), enabled: true, monitor }
    }

    #[tokio::test]
    async fn test_run_keeps_order_and_skips_invalid() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            loop {
                let _ = listener.accept().await;
            }
        });

        let monitors = vec![
            entry("no-host", MonitorConfig::new("minecraft")),
            entry("local", MonitorConfig::new("tcp").with_hostname("127.0.0.1").with_port(port)),
            entry("bogus", MonitorConfig::new("gopher").with_hostname("127.0.0.1")),
        ];

        let reports = run_monitors(CheckerRegistry::global(), monitors, 2).await;

        let names: Vec<&str> = reports.iter().map(|report| report.name.as_str()).collect();
        assert_eq!(names, vec!["no-host", "local", "bogus"]);
        assert!(matches!(&reports[0].outcome, Outcome::Invalid { invalid } if invalid.contains("hostname")));
        assert!(reports[1].is_up());
        assert!(matches!(&reports[2].outcome, Outcome::Invalid { invalid } if invalid.contains("gopher")));
    }

    #[test]
    fn test_report_json_shape() {
        let report = MonitorReport {
            name: "api".into(),
            monitor_type: "http".into(),
            outcome: Outcome::Checked(CheckResult::down(12, "Unexpected status code: 500", Some(500), None)),
        };

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["name"], "api");
        assert_eq!(json["type"], "http");
        assert_eq!(json["status"], "down");
        assert_eq!(json["response_time"], 12);
        assert_eq!(json["status_code"], 500);
        assert!(!report.is_up());

        let invalid = MonitorReport {
            name: "broken".into(),
            monitor_type: "udp".into(),
            outcome: Outcome::Invalid { invalid: "Monitor type udp requires a port".into() },
        };
        let json = serde_json::to_value(&invalid).unwrap();
        assert_eq!(json["invalid"], "Monitor type udp requires a port");
        assert!(json.get("status").is_none());
    }
}
