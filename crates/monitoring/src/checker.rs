use std::future::Future;
use std::time::{Duration, Instant};

use serde_json::{Map, Value};
use tokio::time::timeout;
use tracing::debug;

use crate::catalog::MonitorTypeInfo;
use crate::error::CheckError;
use crate::types::{CheckResult, MonitorConfig};

/// Checker trait for the different protocols a monitor can use.
///
/// Implementations are stateless: one instance may run any number of checks
/// concurrently. `check` never fails; every problem becomes a `down` result.
#[async_trait::async_trait]
pub trait Checker: Send + Sync {
    /// Monitor types served by this checker, with their catalog metadata
    fn supported_types(&self) -> &'static [MonitorTypeInfo];

    /// Perform the check described by `config`
    async fn check(&self, config: &MonitorConfig) -> CheckResult;
}

/// Successful outcome of a probe, before timing is attached
#[derive(Debug, Default)]
pub struct Probe {
    pub status_code: Option<u16>,
    pub data: Map<String, Value>,
    /// Measured round trip that replaces the wall-clock time
    pub round_trip_ms: Option<u64>,
}

impl Probe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_status_code(mut self, code: u16) -> Self {
        self.status_code = Some(code);
        self
    }

    pub fn with_round_trip(mut self, millis: u64) -> Self {
        self.round_trip_ms = Some(millis);
        self
    }

    /// Add a telemetry value
    pub fn insert(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.data.insert(key.to_string(), value.into());
        self
    }
}

/// Run `probe` under a single flat time budget and turn its outcome into a
/// [`CheckResult`].
///
/// The future owns every socket it opens, so dropping it on timeout releases
/// them.
pub async fn run_probe<F>(budget: Duration, probe: F) -> CheckResult
where
    F: Future<Output = Result<Probe, CheckError>>,
{
    run_probe_with_context(budget, Map::new(), probe).await
}

/// Like [`run_probe`], with `context` in the result's data on success and
/// failure alike
pub async fn run_probe_with_context<F>(
    budget: Duration,
    context: Map<String, Value>,
    probe: F,
) -> CheckResult
where
    F: Future<Output = Result<Probe, CheckError>>,
{
    measure(context, async move {
        match timeout(budget, probe).await {
            Ok(outcome) => outcome,
            Err(_) => Err(CheckError::Timeout(budget)),
        }
    })
    .await
}

/// Time `probe` and convert its outcome. The probe enforces its own budget.
pub(crate) async fn measure<F>(context: Map<String, Value>, probe: F) -> CheckResult
where
    F: Future<Output = Result<Probe, CheckError>>,
{
    let start = Instant::now();
    let outcome = probe.await;
    let elapsed = start.elapsed().as_millis() as u64;

    match outcome {
        Ok(probe) => {
            let mut data = context;
            data.extend(probe.data);
            let data = if data.is_empty() { None } else { Some(data) };
            CheckResult::up(probe.round_trip_ms.unwrap_or(elapsed), probe.status_code, data)
        }
        Err(error) => {
            debug!("Check failed after {}ms: {}", elapsed, error);
            let data = if context.is_empty() { None } else { Some(context) };
            CheckResult::down(elapsed, error.to_string(), error.status_code(), data)
        }
    }
}

/// `host` and `port` of the target, empty when no host is configured
pub(crate) fn target_context(config: &MonitorConfig, port: Option<u16>) -> Map<String, Value> {
    let mut context = Map::new();
    if let Some(host) = config.host() {
        context.insert("host".to_string(), host.into());
        if let Some(port) = port {
            context.insert("port".to_string(), port.into());
        }
    }
    context
}

/// Host of the monitor, or a validation error when none is configured
pub(crate) fn require_host(config: &MonitorConfig) -> Result<String, CheckError> {
    config.host().ok_or_else(|| CheckError::validation("No hostname configured"))
}
