//! Minecraft Server List Ping checker (1.7+ protocol).
//!
//! Sends a handshake and a status request, then reads a single framed status
//! response whose payload is a JSON document.

use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

use crate::catalog::MonitorTypeInfo;
use crate::checker::{Checker, Probe, require_host, run_probe};
use crate::error::CheckError;
use crate::types::{CheckResult, MonitorConfig};
use crate::wire::{ByteCursor, VarIntDecoder, encode_varint};

const DEFAULT_PORT: u16 = 25565;

/// Protocol version sent in the handshake (1.8)
const HANDSHAKE_PROTOCOL_VERSION: i32 = 47;
/// Next state requested by the handshake: status
const NEXT_STATE_STATUS: i32 = 1;
const PACKET_ID_STATUS: i32 = 0x00;

/// Upper bound on a status packet; real responses stay well under this
const MAX_PACKET_LEN: usize = 2 * 1024 * 1024;
const MAX_SAMPLE_PLAYERS: usize = 12;

const MINECRAFT_TYPES: &[MonitorTypeInfo] = &[MonitorTypeInfo {
    monitor_type: "minecraft",
    name: "Minecraft",
    description: "Query a Minecraft Java Edition server for players and MOTD",
    icon: "box",
    fields: &["hostname", "port", "timeout"],
    default_port: Some(DEFAULT_PORT),
    is_game_server: true,
}];

/// Minecraft Java Edition checker
#[derive(Debug, Default, Clone, Copy)]
pub struct MinecraftChecker;

impl MinecraftChecker {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl Checker for MinecraftChecker {
    fn supported_types(&self) -> &'static [MonitorTypeInfo] {
        MINECRAFT_TYPES
    }

    async fn check(&self, config: &MonitorConfig) -> CheckResult {
        run_probe(config.timeout(), probe_minecraft(config)).await
    }
}

async fn probe_minecraft(config: &MonitorConfig) -> Result<Probe, CheckError> {
    let host = require_host(config)?;
    let port = config.port_or(DEFAULT_PORT);
    debug!("Minecraft check: pinging {}:{}", host, port);

    let mut stream = TcpStream::connect((host.as_str(), port))
        .await
        .map_err(|e| CheckError::connection(format!("Connection failed: {e}")))?;

    stream.write_all(&handshake_packet(&host, port)).await?;
    stream.write_all(&status_request_packet()).await?;

    let packet = read_packet(&mut stream).await?;
    let _ = stream.shutdown().await;

    let json = parse_status_packet(&packet)?;
    let status = parse_status_json(&json)?;

    Ok(status.insert("host", host).insert("port", port))
}

/// Prefix `body` with its VarInt length
fn frame(body: Vec<u8>) -> Vec<u8> {
    let mut packet = Vec::with_capacity(body.len() + 5);
    encode_varint(body.len() as i32, &mut packet);
    packet.extend_from_slice(&body);
    packet
}

fn handshake_packet(host: &str, port: u16) -> Vec<u8> {
    let mut body = Vec::with_capacity(host.len() + 16);
    encode_varint(PACKET_ID_STATUS, &mut body);
    encode_varint(HANDSHAKE_PROTOCOL_VERSION, &mut body);
    encode_varint(host.len() as i32, &mut body);
    body.extend_from_slice(host.as_bytes());
    body.extend_from_slice(&port.to_be_bytes());
    encode_varint(NEXT_STATE_STATUS, &mut body);
    frame(body)
}

fn status_request_packet() -> Vec<u8> {
    frame(vec![PACKET_ID_STATUS as u8])
}

/// Read one length-prefixed packet body
async fn read_packet<R>(reader: &mut R) -> Result<Vec<u8>, CheckError>
where
    R: AsyncRead + Unpin,
{
    let mut decoder = VarIntDecoder::default();
    let len = loop {
        if let Some(value) = decoder.push(reader.read_u8().await?)? {
            break value;
        }
    };

    let len = usize::try_from(len)
        .ok()
        .filter(|&len| len > 0 && len <= MAX_PACKET_LEN)
        .ok_or_else(|| CheckError::protocol(format!("Invalid packet length: {len}")))?;

    let mut packet = vec![0u8; len];
    reader.read_exact(&mut packet).await?;
    Ok(packet)
}

/// JSON payload of a status response packet body
fn parse_status_packet(packet: &[u8]) -> Result<String, CheckError> {
    let mut cursor = ByteCursor::new(packet);
    let packet_id = cursor.read_varint()?;
    if packet_id != PACKET_ID_STATUS {
        return Err(CheckError::protocol(format!("Unexpected packet id: {packet_id:#04x}")));
    }
    cursor.read_prefixed_string()
}

fn parse_status_json(json: &str) -> Result<Probe, CheckError> {
    let status: Value = serde_json::from_str(json)
        .map_err(|e| CheckError::protocol(format!("Invalid status JSON: {e}")))?;

    let players = &status["players"];
    let sample: Vec<String> = players["sample"]
        .as_array()
        .map(|sample| {
            sample
                .iter()
                .filter_map(|player| player["name"].as_str())
                .take(MAX_SAMPLE_PLAYERS)
                .map(String::from)
                .collect()
        })
        .unwrap_or_default();

    let motd = strip_formatting(&flatten_description(&status["description"]));

    Ok(Probe::new()
        .insert("players_online", players["online"].as_i64().unwrap_or(0))
        .insert("players_max", players["max"].as_i64().unwrap_or(0))
        .insert("players_sample", sample)
        .insert("version", status["version"]["name"].as_str().unwrap_or("Unknown"))
        .insert("protocol", status["version"]["protocol"].as_i64().unwrap_or(0))
        .insert("motd", motd.trim())
        .insert("has_favicon", status["favicon"].as_str().is_some_and(|f| !f.is_empty())))
}

/// Concatenate a chat component tree (`text` plus nested `extra` parts)
fn flatten_description(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Array(parts) => parts.iter().map(flatten_description).collect(),
        Value::Object(component) => {
            let mut text = component.get("text").and_then(Value::as_str).unwrap_or("").to_string();
            if let Some(Value::Array(extra)) = component.get("extra") {
                for part in extra {
                    text.push_str(&flatten_description(part));
                }
            }
            text
        }
        _ => String::new(),
    }
}

/// Drop `§x` colour and format codes
fn strip_formatting(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '§' {
            if chars.peek().is_some_and(|next| is_format_code(*next)) {
                chars.next();
            }
            continue;
        }
        out.push(c);
    }
    out
}

fn is_format_code(c: char) -> bool {
    matches!(c.to_ascii_lowercase(), '0'..='9' | 'a'..='f' | 'k'..='o' | 'r' | 'x')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::varint_bytes;
    use serde_json::json;

    #[test]
    fn test_handshake_layout() {
        let packet = handshake_packet("mc.local", 25565);
        let mut cursor = ByteCursor::new(&packet);

        assert_eq!(cursor.read_varint().unwrap() as usize, cursor.remaining());
        assert_eq!(cursor.read_varint().unwrap(), 0x00);
        assert_eq!(cursor.read_varint().unwrap(), 47);
        assert_eq!(cursor.read_prefixed_string().unwrap(), "mc.local");
        assert_eq!(cursor.take(2).unwrap(), &[0x63, 0xDD]);
        assert_eq!(cursor.read_varint().unwrap(), 1);
        assert!(cursor.is_empty());
    }

    #[test]
    fn test_status_request_is_empty_packet() {
        assert_eq!(status_request_packet(), vec![0x01, 0x00]);
    }

    #[test]
    fn test_flatten_description_with_extra() {
        let description = json!({"text": "Hello", "extra": [{"text": " World"}]});
        assert_eq!(flatten_description(&description), "Hello World");

        let nested = json!({"text": "", "extra": ["A", {"text": "B", "extra": [{"text": "C"}]}]});
        assert_eq!(flatten_description(&nested), "ABC");
    }

    #[test]
    fn test_strip_formatting() {
        assert_eq!(strip_formatting("§aGreen §lBold§r text"), "Green Bold text");
        assert_eq!(strip_formatting("§6§lGold"), "Gold");
        assert_eq!(strip_formatting("no codes"), "no codes");
    }

    #[test]
    fn test_parse_status_json() {
        let json = json!({
            "version": {"name": "1.20.4", "protocol": 765},
            "players": {"online": 3, "max": 20, "sample": [{"name": "Steve", "id": "x"}]},
            "description": "§bA Minecraft Server",
            "favicon": "data:image/png;base64,AAAA"
        });
        let probe = parse_status_json(&json.to_string()).unwrap();

        assert_eq!(probe.data["players_online"], 3);
        assert_eq!(probe.data["players_max"], 20);
        assert_eq!(probe.data["players_sample"][0], "Steve");
        assert_eq!(probe.data["version"], "1.20.4");
        assert_eq!(probe.data["protocol"], 765);
        assert_eq!(probe.data["motd"], "A Minecraft Server");
        assert_eq!(probe.data["has_favicon"], true);
    }

    #[test]
    fn test_invalid_json_is_protocol_error() {
        assert!(matches!(parse_status_json("not json"), Err(CheckError::Protocol(_))));
    }

    #[test]
    fn test_parse_status_packet_rejects_wrong_id() {
        let mut packet = varint_bytes(0x01);
        packet.extend(varint_bytes(2));
        packet.extend_from_slice(b"{}");
        assert!(parse_status_packet(&packet).is_err());
    }

    #[tokio::test]
    async fn test_read_packet_handles_short_stream() {
        let mut data: &[u8] = &[0x05, 0x00, 0x01];
        let error = read_packet(&mut data).await.unwrap_err();
        assert!(matches!(error, CheckError::Protocol(_)));
    }

    #[tokio::test]
    async fn test_read_packet_across_chunks() {
        // 300-byte body: length VarInt split between reads, body in pieces
        let body = vec![0x2A; 300];
        let mut stream = tokio_test::io::Builder::new()
            .read(&[0xAC])
            .read(&[0x02])
            .read(&body[..100])
            .read(&body[100..])
            .build();

        let packet = read_packet(&mut stream).await.unwrap();
        assert_eq!(packet, body);
    }

    #[tokio::test]
    async fn test_read_packet_rejects_oversized_length() {
        let mut data: &[u8] = &[0xFF, 0xFF, 0xFF, 0x7F];
        let error = read_packet(&mut data).await.unwrap_err();
        assert!(error.to_string().starts_with("Invalid packet length"));
    }
}
