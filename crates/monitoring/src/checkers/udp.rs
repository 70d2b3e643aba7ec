//! UDP port checker.
//!
//! UDP has no handshake, so a check is `up` as soon as the probe datagram is
//! sent. A reply is waited for briefly and reported in `data`, but its absence
//! does not fail the check: many UDP services never answer unknown payloads.

use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::time::timeout;
use tracing::debug;

use crate::catalog::MonitorTypeInfo;
use crate::checker::{
    Checker, Probe, require_host, run_probe_with_context, target_context,
};
use crate::error::CheckError;
use crate::types::{CheckResult, MonitorConfig};

const PROBE_PAYLOAD: [u8; 4] = [0xFF, 0xFF, 0xFF, 0xFF];

/// Longest wait for a reply, capped further by the monitor timeout
const REPLY_WAIT: Duration = Duration::from_secs(2);

const UDP_TYPES: &[MonitorTypeInfo] = &[MonitorTypeInfo {
    monitor_type: "udp",
    name: "UDP Port",
    description: "Send a datagram to a UDP port",
    icon: "radio",
    fields: &["hostname", "port", "timeout"],
    default_port: None,
    is_game_server: false,
}];

/// UDP port checker
#[derive(Debug, Default, Clone, Copy)]
pub struct UdpChecker;

impl UdpChecker {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl Checker for UdpChecker {
    fn supported_types(&self) -> &'static [MonitorTypeInfo] {
        UDP_TYPES
    }

    async fn check(&self, config: &MonitorConfig) -> CheckResult {
        let context = target_context(config, config.port);
        run_probe_with_context(config.timeout(), context, probe_udp(config)).await
    }
}

async fn probe_udp(config: &MonitorConfig) -> Result<Probe, CheckError> {
    let host = require_host(config)?;
    let port = config.port.ok_or_else(|| CheckError::validation("No port configured"))?;
    debug!("UDP check: sending probe to {}:{}", host, port);

    let socket = connect_udp(&host, port).await?;
    socket
        .send(&PROBE_PAYLOAD)
        .await
        .map_err(|e| CheckError::connection(format!("UDP send failed: {e}")))?;

    let wait = REPLY_WAIT.min(config.timeout() / 2);
    let mut buf = [0u8; 1500];
    let reply = match timeout(wait, socket.recv(&mut buf)).await {
        Ok(Ok(len)) => Some(len),
        Ok(Err(e)) => {
            debug!("UDP check: no reply from {}:{}: {}", host, port, e);
            None
        }
        Err(_) => None,
    };

    Ok(Probe::new()
        .insert("response_received", reply.is_some())
        .insert("response_bytes", reply.unwrap_or(0)))
}

/// Bind an ephemeral socket of the right family and connect it to the target
pub(crate) async fn connect_udp(host: &str, port: u16) -> Result<UdpSocket, CheckError> {
    let addr = tokio::net::lookup_host((host, port))
        .await
        .map_err(|e| CheckError::connection(format!("Failed to resolve {host}: {e}")))?
        .next()
        .ok_or_else(|| CheckError::connection(format!("No address found for {host}")))?;

    let bind_addr = if addr.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
    let socket = UdpSocket::bind(bind_addr).await?;
    socket
        .connect(addr)
        .await
        .map_err(|e| CheckError::connection(format!("UDP connect to {addr} failed: {e}")))?;

    Ok(socket)
}
