//! ICMP ping checker.
//!
//! Raw ICMP sockets need elevated privileges, so this shells out to the
//! system `ping` utility with a single echo request.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use tokio::process::Command;
use tracing::debug;

use crate::catalog::MonitorTypeInfo;
use crate::checker::{Checker, Probe, require_host, run_probe};
use crate::error::CheckError;
use crate::types::{CheckResult, MonitorConfig};

static ROUND_TRIP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"time[=<]\s*([0-9]+(?:\.[0-9]+)?)\s*ms").expect("round trip pattern is valid")
});

const PING_TYPES: &[MonitorTypeInfo] = &[MonitorTypeInfo {
    monitor_type: "ping",
    name: "Ping",
    description: "Send an ICMP echo request to a host",
    icon: "activity",
    fields: &["hostname", "timeout"],
    default_port: None,
    is_game_server: false,
}];

/// ICMP ping checker
#[derive(Debug, Default, Clone, Copy)]
pub struct PingChecker;

impl PingChecker {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl Checker for PingChecker {
    fn supported_types(&self) -> &'static [MonitorTypeInfo] {
        PING_TYPES
    }

    async fn check(&self, config: &MonitorConfig) -> CheckResult {
        run_probe(config.timeout(), probe_ping(config)).await
    }
}

async fn probe_ping(config: &MonitorConfig) -> Result<Probe, CheckError> {
    let host = require_host(config)?;
    if host.starts_with('-') {
        return Err(CheckError::validation(format!("Invalid hostname: {host}")));
    }

    let args = ping_args(&host, config.timeout());
    debug!("Ping check: ping {}", args.join(" "));

    let output = Command::new("ping")
        .args(&args)
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| CheckError::connection(format!("Failed to run ping: {e}")))?;

    let round_trip =
        interpret_output(output.status.success(), &String::from_utf8_lossy(&output.stdout))?;

    let mut probe = Probe::new().insert("host", host);
    if let Some(rtt) = round_trip {
        probe = probe.insert("round_trip_ms", rtt).with_round_trip(rtt.round() as u64);
    }

    Ok(probe)
}

/// Arguments for a single echo request on the current platform
fn ping_args(host: &str, timeout: Duration) -> Vec<String> {
    let secs = timeout.as_secs().max(1);

    if cfg!(target_os = "windows") {
        vec!["-n".into(), "1".into(), "-w".into(), (secs * 1000).to_string(), host.into()]
    } else if cfg!(target_os = "macos") {
        vec!["-c".into(), "1".into(), "-W".into(), (secs * 1000).to_string(), host.into()]
    } else {
        vec!["-c".into(), "1".into(), "-W".into(), secs.to_string(), host.into()]
    }
}

/// Non-zero exit means no echo reply; otherwise the round trip, if printed
fn interpret_output(success: bool, stdout: &str) -> Result<Option<f64>, CheckError> {
    if !success {
        return Err(CheckError::connection("Host unreachable"));
    }
    Ok(parse_round_trip(stdout))
}

/// Round trip time in milliseconds from ping output (`time=12.3 ms`)
fn parse_round_trip(output: &str) -> Option<f64> {
    ROUND_TRIP.captures(output)?.get(1)?.as_str().parse().ok()
}
