//! TeamSpeak 3 ServerQuery checker.
//!
//! ServerQuery is a line based text protocol: every command answers with zero
//! or more data lines followed by an `error id=<n> msg=<text>` line.

use std::collections::HashMap;
use std::time::Duration;

use serde_json::Map;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::{Instant, timeout, timeout_at};
use tracing::debug;

use crate::catalog::MonitorTypeInfo;
use crate::checker::{Checker, Probe, measure, require_host};
use crate::error::CheckError;
use crate::types::{CheckResult, MonitorConfig};

const DEFAULT_QUERY_PORT: u16 = 10011;
const DEFAULT_VOICE_PORT: u16 = 9987;
const FALLBACK_NAME: &str = "TeamSpeak 3 Server";

/// Time allowed for `quit` once the query itself is over
const QUIT_GRACE: Duration = Duration::from_secs(1);

const TEAMSPEAK_TYPES: &[MonitorTypeInfo] = &[MonitorTypeInfo {
    monitor_type: "teamspeak",
    name: "TeamSpeak 3",
    description: "Query a TeamSpeak 3 server through ServerQuery",
    icon: "headphones",
    fields: &["hostname", "port", "voice_port", "timeout"],
    default_port: Some(DEFAULT_QUERY_PORT),
    is_game_server: true,
}];

/// TeamSpeak 3 ServerQuery checker
#[derive(Debug, Default, Clone, Copy)]
pub struct TeamSpeakChecker;

impl TeamSpeakChecker {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl Checker for TeamSpeakChecker {
    fn supported_types(&self) -> &'static [MonitorTypeInfo] {
        TEAMSPEAK_TYPES
    }

    async fn check(&self, config: &MonitorConfig) -> CheckResult {
        // The budget is enforced inside so that `quit` still goes out on timeout
        measure(Map::new(), probe_teamspeak(config, config.timeout())).await
    }
}

/// Reply to one ServerQuery command
#[derive(Debug, Clone, PartialEq, Eq)]
struct QueryReply {
    error_id: u32,
    message: String,
    lines: Vec<String>,
}

impl QueryReply {
    fn is_ok(&self) -> bool {
        self.error_id == 0
    }
}

/// ServerQuery session over any byte stream
struct QueryConnection<S> {
    stream: BufReader<S>,
}

impl<S> QueryConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    fn new(stream: S) -> Self {
        Self { stream: BufReader::new(stream) }
    }

    async fn read_line(&mut self) -> Result<String, CheckError> {
        let mut line = String::new();
        if self.stream.read_line(&mut line).await? == 0 {
            return Err(CheckError::protocol("Connection closed by server"));
        }
        Ok(line.trim_matches(|c: char| c == '\r' || c == '\n').to_string())
    }

    /// Check the two greeting lines
    async fn read_greeting(&mut self) -> Result<(), CheckError> {
        let banner = self.read_line().await?;
        if !banner.contains("TS3") {
            return Err(CheckError::protocol("Not a TeamSpeak 3 server"));
        }
        self.read_line().await?;
        Ok(())
    }

    async fn command(&mut self, command: &str) -> Result<QueryReply, CheckError> {
        self.stream.get_mut().write_all(format!("{command}\n").as_bytes()).await?;

        let mut lines = Vec::new();
        loop {
            let line = self.read_line().await?;
            if line.contains("error id=") {
                let fields = parse_fields(line.trim_start_matches("error").trim());
                return Ok(QueryReply {
                    error_id: fields.get("id").and_then(|id| id.parse().ok()).unwrap_or(u32::MAX),
                    message: fields.get("msg").cloned().unwrap_or_default(),
                    lines,
                });
            }
            if !line.is_empty() {
                lines.push(line);
            }
        }
    }

    async fn quit(&mut self) {
        let stream = self.stream.get_mut();
        let _ = timeout(QUIT_GRACE, async {
            let _ = stream.write_all(b"quit\n").await;
            let _ = stream.shutdown().await;
        })
        .await;
    }
}

async fn probe_teamspeak(config: &MonitorConfig, budget: Duration) -> Result<Probe, CheckError> {
    let deadline = Instant::now() + budget;
    let host = require_host(config)?;
    let port = config.port_or(DEFAULT_QUERY_PORT);
    let voice_port = config.voice_port.unwrap_or(DEFAULT_VOICE_PORT);
    debug!("TeamSpeak check: querying {}:{} (voice port {})", host, port, voice_port);

    let stream = timeout_at(deadline, TcpStream::connect((host.as_str(), port)))
        .await
        .map_err(|_| CheckError::Timeout(budget))?
        .map_err(|e| CheckError::connection(format!("Connection failed: {e}")))?;

    let mut connection = QueryConnection::new(stream);
    let outcome = timeout_at(deadline, query_server(&mut connection, voice_port)).await;
    connection.quit().await;

    let probe = outcome.map_err(|_| CheckError::Timeout(budget))??;
    Ok(probe.insert("host", host).insert("port", port).insert("voice_port", voice_port))
}

async fn query_server<S>(
    connection: &mut QueryConnection<S>,
    voice_port: u16,
) -> Result<Probe, CheckError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    connection.read_greeting().await?;

    // Past the banner the server is known to be up; details are best effort
    match read_server_info(connection, voice_port).await {
        Ok(fields) => Ok(server_info_probe(&fields)),
        Err(error) => {
            debug!("TeamSpeak check: no server info: {}", error);
            Ok(Probe::new().insert("server_name", FALLBACK_NAME))
        }
    }
}

async fn read_server_info<S>(
    connection: &mut QueryConnection<S>,
    voice_port: u16,
) -> Result<HashMap<String, String>, CheckError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let selected = connection.command(&format!("use port={voice_port}")).await?;
    if !selected.is_ok() {
        return Err(CheckError::protocol(format!(
            "use port={voice_port} failed: {}",
            selected.message
        )));
    }

    let info = connection.command("serverinfo").await?;
    if !info.is_ok() {
        return Err(CheckError::protocol(format!("serverinfo failed: {}", info.message)));
    }

    Ok(parse_fields(&info.lines.join(" ")))
}

fn server_info_probe(fields: &HashMap<String, String>) -> Probe {
    let number = |key: &str| fields.get(key).and_then(|v| v.parse::<i64>().ok()).unwrap_or(0);
    let text = |key: &str| fields.get(key).cloned().unwrap_or_default();

    let name = fields.get("virtualserver_name").cloned().unwrap_or_else(|| FALLBACK_NAME.to_string());

    Probe::new()
        .insert("server_name", name)
        // The query connection counts as a client
        .insert("players_online", (number("virtualserver_clientsonline") - 1).max(0))
        .insert("players_max", number("virtualserver_maxclients"))
        .insert("version", text("virtualserver_version"))
        .insert("platform", text("virtualserver_platform"))
        .insert("uptime", number("virtualserver_uptime"))
        .insert("channels", number("virtualserver_channelsonline"))
}

/// Split `key=value` pairs separated by spaces, unescaping the values
fn parse_fields(line: &str) -> HashMap<String, String> {
    line.split(' ')
        .filter(|token| !token.is_empty())
        .map(|token| match token.split_once('=') {
            Some((key, value)) => (key.to_string(), unescape(value)),
            None => (token.to_string(), String::new()),
        })
        .collect()
}

/// Undo ServerQuery escaping (`\s` space, `\p` pipe, `\/` slash, ...)
fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('s') => out.push(' '),
            Some('p') => out.push('|'),
            Some('/') => out.push('/'),
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('a') => out.push('\u{07}'),
            Some('b') => out.push('\u{08}'),
            Some('f') => out.push('\u{0C}'),
            Some('v') => out.push('\u{0B}'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}
