//! TCP port checker.

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::debug;

use crate::catalog::MonitorTypeInfo;
use crate::checker::{
    Checker, Probe, require_host, run_probe_with_context, target_context,
};
use crate::error::CheckError;
use crate::types::{CheckResult, MonitorConfig};

const DEFAULT_PORT: u16 = 80;

const TCP_TYPES: &[MonitorTypeInfo] = &[MonitorTypeInfo {
    monitor_type: "tcp",
    name: "TCP Port",
    description: "Check that a TCP port accepts connections",
    icon: "plug",
    fields: &["hostname", "port", "timeout"],
    default_port: Some(DEFAULT_PORT),
    is_game_server: false,
}];

/// TCP port checker
#[derive(Debug, Default, Clone, Copy)]
pub struct TcpChecker;

impl TcpChecker {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl Checker for TcpChecker {
    fn supported_types(&self) -> &'static [MonitorTypeInfo] {
        TCP_TYPES
    }

    async fn check(&self, config: &MonitorConfig) -> CheckResult {
        let context = target_context(config, Some(config.port_or(DEFAULT_PORT)));
        run_probe_with_context(config.timeout(), context, probe_tcp(config)).await
    }
}

async fn probe_tcp(config: &MonitorConfig) -> Result<Probe, CheckError> {
    let host = require_host(config)?;
    let port = config.port_or(DEFAULT_PORT);
    debug!("TCP check: connecting to {}:{}", host, port);

    let mut stream = TcpStream::connect((host.as_str(), port))
        .await
        .map_err(|e| CheckError::connection(format!("TCP connection failed: {e}")))?;

    // Close right away; only the handshake matters
    let _ = stream.shutdown().await;
    drop(stream);

    Ok(Probe::new())
}
