//! Source engine A2S_INFO checker.
//!
//! Works for Source and GoldSource servers (CS2, TF2, Rust, ARK, ...).
//! Servers may answer the first query with a challenge; the query is then
//! resent once with the challenge appended.

use tokio::net::UdpSocket;
use tracing::debug;

use super::udp::connect_udp;
use crate::catalog::MonitorTypeInfo;
use crate::checker::{Checker, Probe, require_host, run_probe};
use crate::error::CheckError;
use crate::types::{CheckResult, MonitorConfig};
use crate::wire::ByteCursor;

const DEFAULT_PORT: u16 = 27015;

const SIMPLE_HEADER: [u8; 4] = [0xFF, 0xFF, 0xFF, 0xFF];
const SPLIT_HEADER: [u8; 4] = [0xFE, 0xFF, 0xFF, 0xFF];
const A2S_INFO: u8 = 0x54;
const A2S_INFO_PAYLOAD: &[u8] = b"Source Engine Query\0";

const S2C_CHALLENGE: u8 = 0x41;
const S2A_INFO_SOURCE: u8 = 0x49;
const S2A_INFO_GOLDSOURCE: u8 = 0x6D;

// Extra data flags trailing a Source response
const EDF_PORT: u8 = 0x80;
const EDF_STEAM_ID: u8 = 0x10;

const MAX_DATAGRAM: usize = 4096;

const SOURCE_TYPES: &[MonitorTypeInfo] = &[MonitorTypeInfo {
    monitor_type: "source",
    name: "Source Engine",
    description: "Query a Source or GoldSource game server (A2S_INFO)",
    icon: "gamepad",
    fields: &["hostname", "port", "timeout"],
    default_port: Some(DEFAULT_PORT),
    is_game_server: true,
}];

/// Source engine A2S_INFO checker
#[derive(Debug, Default, Clone, Copy)]
pub struct SourceChecker;

impl SourceChecker {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl Checker for SourceChecker {
    fn supported_types(&self) -> &'static [MonitorTypeInfo] {
        SOURCE_TYPES
    }

    async fn check(&self, config: &MonitorConfig) -> CheckResult {
        run_probe(config.timeout(), probe_source(config)).await
    }
}

/// Parsed A2S_INFO reply
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ServerInfo {
    pub protocol: u8,
    pub name: String,
    pub map: String,
    pub folder: String,
    pub game: String,
    pub app_id: Option<u16>,
    pub players: u8,
    pub max_players: u8,
    pub bots: Option<u8>,
    pub server_type: Option<char>,
    pub environment: Option<char>,
    pub password_protected: Option<bool>,
    pub vac_secured: Option<bool>,
    pub version: Option<String>,
    pub game_port: Option<u16>,
    pub steam_id: Option<u64>,
    /// Server address, GoldSource replies only
    pub address: Option<String>,
}

async fn probe_source(config: &MonitorConfig) -> Result<Probe, CheckError> {
    let host = require_host(config)?;
    let port = config.port_or(DEFAULT_PORT);
    debug!("Source check: A2S_INFO to {}:{}", host, port);

    let socket = connect_udp(&host, port).await?;
    let reply = query_info(&socket).await?;
    let info = parse_info(&reply)?;

    Ok(info_probe(info).insert("host", host).insert("port", port))
}

/// Send A2S_INFO, answering at most one challenge
async fn query_info(socket: &UdpSocket) -> Result<Vec<u8>, CheckError> {
    let mut buf = vec![0u8; MAX_DATAGRAM];

    socket.send(&info_request(None)).await?;
    let mut len = socket.recv(&mut buf).await?;

    if let Some(challenge) = challenge_from(&buf[..len]) {
        debug!("Source check: answering challenge {:02x?}", challenge);
        socket.send(&info_request(Some(challenge))).await?;
        len = socket.recv(&mut buf).await?;
    }

    buf.truncate(len);
    Ok(buf)
}

/// A2S_INFO request, with the challenge appended when one was issued
pub fn info_request(challenge: Option<[u8; 4]>) -> Vec<u8> {
    let mut request = Vec::with_capacity(29);
    request.extend_from_slice(&SIMPLE_HEADER);
    request.push(A2S_INFO);
    request.extend_from_slice(A2S_INFO_PAYLOAD);
    if let Some(challenge) = challenge {
        request.extend_from_slice(&challenge);
    }
    request
}

/// Challenge bytes if `reply` is an S2C_CHALLENGE packet
pub fn challenge_from(reply: &[u8]) -> Option<[u8; 4]> {
    if reply.len() < 9 || reply[4] != S2C_CHALLENGE {
        return None;
    }
    let mut challenge = [0u8; 4];
    challenge.copy_from_slice(&reply[5..9]);
    Some(challenge)
}

/// Parse an A2S_INFO reply in either the Source or GoldSource layout
pub fn parse_info(reply: &[u8]) -> Result<ServerInfo, CheckError> {
    let mut cursor = ByteCursor::new(reply);
    let header = cursor.take(4)?;
    if header == SPLIT_HEADER {
        return Err(CheckError::protocol("Split A2S responses are not supported"));
    }
    if header != SIMPLE_HEADER {
        return Err(CheckError::protocol("Invalid A2S response header"));
    }

    match cursor.read_u8()? {
        S2A_INFO_SOURCE => parse_source_info(&mut cursor),
        S2A_INFO_GOLDSOURCE => parse_goldsource_info(&mut cursor),
        other => Err(CheckError::protocol(format!("Unknown A2S response type: {other:#04x}"))),
    }
}

fn parse_source_info(cursor: &mut ByteCursor<'_>) -> Result<ServerInfo, CheckError> {
    let mut info = ServerInfo {
        protocol: cursor.read_u8()?,
        name: cursor.read_cstring()?,
        map: cursor.read_cstring()?,
        folder: cursor.read_cstring()?,
        game: cursor.read_cstring()?,
        app_id: Some(cursor.read_u16_le()?),
        players: cursor.read_u8()?,
        max_players: cursor.read_u8()?,
        bots: Some(cursor.read_u8()?),
        server_type: Some(char::from(cursor.read_u8()?)),
        environment: Some(char::from(cursor.read_u8()?)),
        password_protected: Some(cursor.read_u8()? == 1),
        vac_secured: Some(cursor.read_u8()? == 1),
        ..ServerInfo::default()
    };

    // Trailing fields are optional on older servers
    if cursor.is_empty() {
        return Ok(info);
    }
    info.version = cursor.read_cstring().ok();

    if let Ok(edf) = cursor.read_u8() {
        if edf & EDF_PORT != 0 {
            info.game_port = cursor.read_u16_le().ok();
        }
        if edf & EDF_STEAM_ID != 0 {
            info.steam_id = cursor.read_u64_le().ok();
        }
    }

    Ok(info)
}

fn parse_goldsource_info(cursor: &mut ByteCursor<'_>) -> Result<ServerInfo, CheckError> {
    Ok(ServerInfo {
        address: Some(cursor.read_cstring()?),
        name: cursor.read_cstring()?,
        map: cursor.read_cstring()?,
        folder: cursor.read_cstring()?,
        game: cursor.read_cstring()?,
        players: cursor.read_u8()?,
        max_players: cursor.read_u8()?,
        protocol: cursor.read_u8()?,
        ..ServerInfo::default()
    })
}

fn info_probe(info: ServerInfo) -> Probe {
    let mut probe = Probe::new()
        .insert("server_name", info.name)
        .insert("map", info.map)
        .insert("game", info.game)
        .insert("folder", info.folder)
        .insert("players_online", info.players)
        .insert("players_max", info.max_players)
        .insert("protocol", info.protocol);

    if let Some(app_id) = info.app_id {
        probe = probe.insert("app_id", app_id);
    }
    if let Some(bots) = info.bots {
        probe = probe.insert("bots", bots);
    }
    if let Some(server_type) = info.server_type {
        probe = probe.insert("server_type", server_type_name(server_type));
    }
    if let Some(environment) = info.environment {
        probe = probe.insert("environment", environment_name(environment));
    }
    if let Some(password) = info.password_protected {
        probe = probe.insert("password_protected", password);
    }
    if let Some(vac) = info.vac_secured {
        probe = probe.insert("vac_secured", vac);
    }
    if let Some(version) = info.version {
        probe = probe.insert("version", version);
    }
    if let Some(address) = info.address {
        probe = probe.insert("address", address);
    }
    if let Some(game_port) = info.game_port {
        probe = probe.insert("game_port", game_port);
    }
    if let Some(steam_id) = info.steam_id {
        probe = probe.insert("steam_id", steam_id.to_string());
    }
    probe
}

fn server_type_name(code: char) -> &'static str {
    match code.to_ascii_lowercase() {
        'd' => "dedicated",
        'l' => "listen",
        'p' => "sourcetv",
        _ => "unknown",
    }
}

fn environment_name(code: char) -> &'static str {
    match code.to_ascii_lowercase() {
        'l' => "linux",
        'w' => "windows",
        'm' | 'o' => "mac",
        _ => "unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source_reply(online: u8, max: u8) -> Vec<u8> {
        let mut reply = SIMPLE_HEADER.to_vec();
        reply.push(S2A_INFO_SOURCE);
        reply.push(17);
        for field in ["My Server", "de_dust2", "csgo", "Counter-Strike"] {
            reply.extend_from_slice(field.as_bytes());
            reply.push(0);
        }
        reply.extend_from_slice(&730u16.to_le_bytes());
        reply.extend_from_slice(&[online, max, 2, b'd', b'l', 0, 1]);
        reply
    }

    #[test]
    fn test_parse_source_reply() {
        let info = parse_info(&source_reply(5, 10)).unwrap();

        assert_eq!(info.name, "My Server");
        assert_eq!(info.map, "de_dust2");
        assert_eq!(info.app_id, Some(730));
        assert_eq!(info.players, 5);
        assert_eq!(info.max_players, 10);
        assert_eq!(info.bots, Some(2));
        assert_eq!(info.server_type, Some('d'));
        assert_eq!(info.password_protected, Some(false));
        assert_eq!(info.vac_secured, Some(true));
        assert_eq!(info.version, None);

        let probe = info_probe(info);
        assert_eq!(probe.data["players_online"], 5);
        assert_eq!(probe.data["players_max"], 10);
        assert_eq!(probe.data["environment"], "linux");
    }

    #[test]
    fn test_parse_source_reply_with_trailer() {
        let mut reply = source_reply(1, 8);
        reply.extend_from_slice(b"1.38.7.9\0");
        reply.push(EDF_PORT | EDF_STEAM_ID);
        reply.extend_from_slice(&27016u16.to_le_bytes());
        reply.extend_from_slice(&90_071_992_547_409_921u64.to_le_bytes());

        let info = parse_info(&reply).unwrap();
        assert_eq!(info.version.as_deref(), Some("1.38.7.9"));
        assert_eq!(info.game_port, Some(27016));
        assert_eq!(info.steam_id, Some(90_071_992_547_409_921));

        let probe = info_probe(info);
        assert_eq!(probe.data["game_port"], 27016);
        assert_eq!(probe.data["steam_id"], "90071992547409921");
    }

    #[test]
    fn test_parse_goldsource_reply() {
        let mut reply = SIMPLE_HEADER.to_vec();
        reply.push(S2A_INFO_GOLDSOURCE);
        for field in ["1.2.3.4:27015", "Old Server", "crossfire", "valve", "Half-Life"] {
            reply.extend_from_slice(field.as_bytes());
            reply.push(0);
        }
        reply.extend_from_slice(&[3, 16, 47]);

        let info = parse_info(&reply).unwrap();
        assert_eq!(info.address.as_deref(), Some("1.2.3.4:27015"));
        assert_eq!(info.name, "Old Server");
        assert_eq!(info.players, 3);
        assert_eq!(info.max_players, 16);
        assert_eq!(info.protocol, 47);
        assert_eq!(info.app_id, None);
    }

    #[test]
    fn test_unknown_type_rejected() {
        let reply = [0xFF, 0xFF, 0xFF, 0xFF, 0x99, 0x00];
        let error = parse_info(&reply).unwrap_err();
        assert!(error.to_string().contains("Unknown A2S response type"));
    }

    #[test]
    fn test_split_header_rejected() {
        let reply = [0xFE, 0xFF, 0xFF, 0xFF, 0x49, 0x00];
        assert!(parse_info(&reply).is_err());
    }

    #[test]
    fn test_truncated_reply_rejected() {
        let reply = source_reply(5, 10);
        assert!(parse_info(&reply[..20]).is_err());
    }

    #[test]
    fn test_challenge_detection() {
        let reply = [0xFF, 0xFF, 0xFF, 0xFF, 0x41, 0x0A, 0x0B, 0x0C, 0x0D];
        assert_eq!(challenge_from(&reply), Some([0x0A, 0x0B, 0x0C, 0x0D]));
        assert_eq!(challenge_from(&source_reply(0, 0)), None);
        assert_eq!(challenge_from(&reply[..7]), None);
    }

    #[test]
    fn test_info_request_layout() {
        let request = info_request(None);
        assert_eq!(&request[..5], &[0xFF, 0xFF, 0xFF, 0xFF, 0x54]);
        assert!(request.ends_with(b"Query\0"));

        let request = info_request(Some([1, 2, 3, 4]));
        assert_eq!(request.len(), 29);
        assert!(request.ends_with(&[1, 2, 3, 4]));
    }
}
