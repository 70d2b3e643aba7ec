//! FiveM / RedM checker.
//!
//! CitizenFX servers expose their state over plain HTTP. `/info.json` decides
//! whether the server is up; `/players.json` and `/dynamic.json` only enrich
//! the result and may fail without affecting the status.

use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::catalog::MonitorTypeInfo;
use crate::checker::{Checker, Probe, require_host, run_probe};
use crate::error::CheckError;
use crate::types::{CheckResult, MonitorConfig};
use crate::USER_AGENT;

const DEFAULT_PORT: u16 = 30120;
const DEFAULT_MAX_PLAYERS: u64 = 32;
const MAX_LISTED_PLAYERS: usize = 50;

const FIVEM_FIELDS: &[&str] = &["hostname", "port", "timeout"];

const FIVEM_TYPES: &[MonitorTypeInfo] = &[
    MonitorTypeInfo {
        monitor_type: "fivem",
        name: "FiveM",
        description: "Query a FiveM (GTA V) server",
        icon: "car",
        fields: FIVEM_FIELDS,
        default_port: Some(DEFAULT_PORT),
        is_game_server: true,
    },
    MonitorTypeInfo {
        monitor_type: "redm",
        name: "RedM",
        description: "Query a RedM (Red Dead Redemption 2) server",
        icon: "horse",
        fields: FIVEM_FIELDS,
        default_port: Some(DEFAULT_PORT),
        is_game_server: true,
    },
];

/// FiveM / RedM checker
#[derive(Debug, Default, Clone, Copy)]
pub struct FiveMChecker;

impl FiveMChecker {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl Checker for FiveMChecker {
    fn supported_types(&self) -> &'static [MonitorTypeInfo] {
        FIVEM_TYPES
    }

    async fn check(&self, config: &MonitorConfig) -> CheckResult {
        run_probe(config.timeout(), probe_fivem(config)).await
    }
}

async fn probe_fivem(config: &MonitorConfig) -> Result<Probe, CheckError> {
    let host = require_host(config)?;
    let port = config.port_or(DEFAULT_PORT);
    let base = base_url(&host, port);
    debug!("FiveM check: querying {}", base);

    let client = reqwest::Client::builder()
        .timeout(config.timeout())
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| CheckError::connection(format!("Failed to build HTTP client: {e}")))?;

    let response = client
        .get(format!("{base}/info.json"))
        .send()
        .await
        .map_err(|e| CheckError::connection(format!("Failed to query server info: {e}")))?;
    let status_code = response.status().as_u16();
    if status_code != 200 {
        return Err(CheckError::UnexpectedStatus(status_code));
    }
    let info: Value = response
        .json()
        .await
        .map_err(|e| CheckError::protocol(format!("Invalid info.json: {e}")))?;

    let players = fetch_optional(&client, &format!("{base}/players.json")).await;
    let dynamic = fetch_optional(&client, &format!("{base}/dynamic.json")).await;

    Ok(summarize(&info, players.as_ref(), dynamic.as_ref())
        .with_status_code(status_code)
        .insert("host", host)
        .insert("port", port))
}

fn base_url(host: &str, port: u16) -> String {
    if host.contains(':') {
        format!("http://[{host}]:{port}")
    } else {
        format!("http://{host}:{port}")
    }
}

/// Best-effort GET; failures are logged and dropped
async fn fetch_optional(client: &reqwest::Client, url: &str) -> Option<Value> {
    let response = match client.get(url).send().await {
        Ok(response) if response.status().is_success() => response,
        Ok(response) => {
            debug!("FiveM check: {} returned {}", url, response.status());
            return None;
        }
        Err(e) => {
            warn!("FiveM check: {} failed: {}", url, e);
            return None;
        }
    };

    response.json().await.inspect_err(|e| debug!("FiveM check: bad JSON from {}: {}", url, e)).ok()
}

fn summarize(info: &Value, players: Option<&Value>, dynamic: Option<&Value>) -> Probe {
    let vars = &info["vars"];
    let dynamic = dynamic.unwrap_or(&Value::Null);

    let server_name = string_field(&vars["sv_projectName"])
        .or_else(|| string_field(&dynamic["hostname"]))
        .or_else(|| string_field(&vars["sv_hostname"]))
        .unwrap_or_else(|| "FiveM Server".to_string());
    let gametype = string_field(&vars["gametype"]).or_else(|| string_field(&dynamic["gametype"]));
    let map = string_field(&vars["mapname"]).or_else(|| string_field(&dynamic["mapname"]));

    let player_list: &[Value] = players.and_then(Value::as_array).map(Vec::as_slice).unwrap_or(&[]);
    let listed: Vec<Value> = player_list
        .iter()
        .take(MAX_LISTED_PLAYERS)
        .map(|player| json!({ "name": player["name"], "id": player["id"], "ping": player["ping"] }))
        .collect();

    let players_max = number_field(&dynamic["sv_maxclients"])
        .or_else(|| number_field(&vars["sv_maxClients"]))
        .unwrap_or(DEFAULT_MAX_PLAYERS);

    let resource_count = info["resources"].as_array().map(Vec::len).unwrap_or(0);
    let onesync = matches!(
        string_field(&vars["onesync_enabled"]).as_deref(),
        Some("true") | Some("on") | Some("1")
    ) || string_field(&vars["onesync"]).is_some_and(|mode| mode != "off");

    Probe::new()
        .insert("server_name", server_name)
        .insert("gametype", gametype)
        .insert("map", map)
        .insert("players_online", player_list.len())
        .insert("players_max", players_max)
        .insert("players", listed)
        .insert("resource_count", resource_count)
        .insert("onesync", onesync)
        .insert("server_version", string_field(&info["server"]))
}

fn string_field(value: &Value) -> Option<String> {
    value.as_str().map(str::trim).filter(|s| !s.is_empty()).map(String::from)
}

/// Numbers arrive both as JSON numbers and as strings
fn number_field(value: &Value) -> Option<u64> {
    match value {
        Value::Number(number) => number.as_u64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summarize_full() {
        let info = json!({
            "server": "FXServer-master SERVER v1.0.0.7290 win32",
            "resources": ["mapmanager", "chat", "spawnmanager"],
            "vars": {"sv_projectName": "Los Santos RP", "gametype": "Roleplay", "mapname": "San Andreas", "sv_maxClients": "48", "onesync_enabled": "true"}
        });
        let players = json!([{"name": "Alice", "id": 1, "ping": 40, "identifiers": []}]);
        let dynamic = json!({"hostname": "ignored", "sv_maxclients": "64"});

        let probe = summarize(&info, Some(&players), Some(&dynamic));

        assert_eq!(probe.data["server_name"], "Los Santos RP");
        assert_eq!(probe.data["gametype"], "Roleplay");
        assert_eq!(probe.data["players_online"], 1);
        assert_eq!(probe.data["players_max"], 64);
        assert_eq!(probe.data["players"][0]["name"], "Alice");
        assert!(probe.data["players"][0].get("identifiers").is_none());
        assert_eq!(probe.data["resource_count"], 3);
        assert_eq!(probe.data["onesync"], true);
    }

    #[test]
    fn test_summarize_without_optional_endpoints() {
        let info = json!({"vars": {"sv_maxClients": "48"}});
        let probe = summarize(&info, None, None);

        assert_eq!(probe.data["server_name"], "FiveM Server");
        assert_eq!(probe.data["players_online"], 0);
        assert_eq!(probe.data["players_max"], 48);
        assert_eq!(probe.data["onesync"], false);
    }

    #[test]
    fn test_max_players_default() {
        let probe = summarize(&json!({}), None, None);
        assert_eq!(probe.data["players_max"], 32);
    }

    #[test]
    fn test_player_list_truncated() {
        let players: Vec<Value> =
            (0..80).map(|i| json!({"name": format!("p{i}"), "id": i, "ping": 10})).collect();
        let probe = summarize(&json!({}), Some(&Value::Array(players)), None);

        assert_eq!(probe.data["players_online"], 80);
        assert_eq!(probe.data["players"].as_array().unwrap().len(), 50);
    }

    #[test]
    fn test_base_url() {
        assert_eq!(base_url("127.0.0.1", 30120), "http://127.0.0.1:30120");
        assert_eq!(base_url("::1", 30120), "http://[::1]:30120");
    }
}
