//! DNS record checker.

use hickory_resolver::TokioAsyncResolver;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::error::ResolveErrorKind;
use hickory_resolver::proto::rr::{RData, RecordType};
use hickory_resolver::system_conf::read_system_conf;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::catalog::MonitorTypeInfo;
use crate::checker::{Checker, Probe, require_host, run_probe};
use crate::error::CheckError;
use crate::types::{CheckResult, MonitorConfig};

/// Record types a DNS monitor may ask for
pub const SUPPORTED_RECORD_TYPES: &[&str] = &["A", "AAAA", "CNAME", "MX", "TXT", "NS"];

const DNS_TYPES: &[MonitorTypeInfo] = &[MonitorTypeInfo {
    monitor_type: "dns",
    name: "DNS",
    description: "Resolve a DNS record and check that it exists",
    icon: "server",
    fields: &["hostname", "dns_record_type", "timeout"],
    default_port: None,
    is_game_server: false,
}];

/// DNS record checker
#[derive(Debug, Default, Clone, Copy)]
pub struct DnsChecker;

impl DnsChecker {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl Checker for DnsChecker {
    fn supported_types(&self) -> &'static [MonitorTypeInfo] {
        DNS_TYPES
    }

    async fn check(&self, config: &MonitorConfig) -> CheckResult {
        run_probe(config.timeout(), probe_dns(config)).await
    }
}

async fn probe_dns(config: &MonitorConfig) -> Result<Probe, CheckError> {
    let host = require_host(config)?;
    let record_type = parse_record_type(config.dns_record_type.as_deref().unwrap_or("A"))?;
    debug!("DNS check: {} lookup for {}", record_type, host);

    let (resolver_config, mut opts) = match read_system_conf() {
        Ok(conf) => conf,
        Err(e) => {
            warn!("Failed to read system resolver config, using defaults: {}", e);
            (ResolverConfig::default(), ResolverOpts::default())
        }
    };
    opts.timeout = config.timeout();
    opts.attempts = 1;
    let resolver = TokioAsyncResolver::tokio(resolver_config, opts);

    let records: Vec<(u32, RData)> = match resolver.lookup(host.as_str(), record_type).await {
        Ok(lookup) => lookup
            .record_iter()
            .filter(|record| record.record_type() == record_type)
            .filter_map(|record| record.data().map(|data| (record.ttl(), data.clone())))
            .collect(),
        Err(e) if matches!(e.kind(), ResolveErrorKind::NoRecordsFound { .. }) => Vec::new(),
        Err(e) => return Err(CheckError::connection(format!("DNS lookup failed: {e}"))),
    };

    summarize_records(&host, record_type, &records)
}

fn parse_record_type(value: &str) -> Result<RecordType, CheckError> {
    match value.trim().to_uppercase().as_str() {
        "A" => Ok(RecordType::A),
        "AAAA" => Ok(RecordType::AAAA),
        "CNAME" => Ok(RecordType::CNAME),
        "MX" => Ok(RecordType::MX),
        "TXT" => Ok(RecordType::TXT),
        "NS" => Ok(RecordType::NS),
        other => Err(CheckError::validation(format!("Unsupported DNS record type: {other}"))),
    }
}

/// Build the check outcome from the records of one lookup
fn summarize_records(
    host: &str,
    record_type: RecordType,
    records: &[(u32, RData)],
) -> Result<Probe, CheckError> {
    let Some((first_ttl, _)) = records.first() else {
        return Err(CheckError::validation(format!("No {record_type} records found for {host}")));
    };

    let projected: Vec<Value> =
        records.iter().filter_map(|(_, data)| project_record(data)).collect();

    Ok(Probe::new()
        .insert("hostname", host)
        .insert("record_type", record_type.to_string())
        .insert("record_count", records.len())
        .insert("ttl", *first_ttl)
        .insert("records", projected))
}

/// Type specific view of a single record
fn project_record(data: &RData) -> Option<Value> {
    match data {
        RData::A(a) => Some(json!({ "ip": a.0.to_string() })),
        RData::AAAA(aaaa) => Some(json!({ "ipv6": aaaa.0.to_string() })),
        RData::CNAME(cname) => Some(json!({ "target": trim_root(&cname.0.to_string()) })),
        RData::NS(ns) => Some(json!({ "target": trim_root(&ns.0.to_string()) })),
        RData::MX(mx) => Some(json!({
            "host": trim_root(&mx.exchange().to_string()),
            "priority": mx.preference(),
        })),
        RData::TXT(txt) => {
            let text: String =
                txt.txt_data().iter().map(|part| String::from_utf8_lossy(part)).collect();
            Some(json!({ "text": text }))
        }
        _ => None,
    }
}

fn trim_root(name: &str) -> String {
    name.strip_suffix('.').unwrap_or(name).to_string()
}
