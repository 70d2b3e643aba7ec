//! Monitor type to checker dispatch.
//!
//! The registry is built once from an ordered list of checkers and is
//! read-only afterwards, so it can be shared between tasks without locking.
//! When two checkers claim the same type string the one registered last
//! wins.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use tracing::{debug, info};

use crate::catalog::MonitorTypeInfo;
use crate::checker::Checker;
use crate::checkers::{
    DnsChecker, FiveMChecker, HttpChecker, MinecraftChecker, PingChecker, SourceChecker,
    SslChecker, TcpChecker, TeamSpeakChecker, UdpChecker,
};
use crate::error::RegistryError;
use crate::types::{CheckResult, MonitorConfig};

static GLOBAL_REGISTRY: OnceLock<CheckerRegistry> = OnceLock::new();

struct Entry {
    checker: Arc<dyn Checker>,
    info: MonitorTypeInfo,
}

/// Lookup table from monitor type to checker
pub struct CheckerRegistry {
    entries: HashMap<&'static str, Entry>,
    /// Type strings in first-registration order
    order: Vec<&'static str>,
}

impl CheckerRegistry {
    /// Registry with every built-in checker
    pub fn new() -> Self {
        Self::from_checkers(builtin_checkers())
    }

    /// Process-wide registry, built on first use
    pub fn global() -> &'static CheckerRegistry {
        GLOBAL_REGISTRY.get_or_init(Self::new)
    }

    /// Build a registry from `checkers`, in order
    pub fn from_checkers(checkers: Vec<Arc<dyn Checker>>) -> Self {
        let mut entries = HashMap::new();
        let mut order = Vec::new();

        for checker in checkers {
            for info in checker.supported_types() {
                let previous =
                    entries.insert(info.monitor_type, Entry { checker: checker.clone(), info: *info });
                if previous.is_some() {
                    debug!("Monitor type {} re-registered, last registration wins", info.monitor_type);
                } else {
                    order.push(info.monitor_type);
                }
            }
        }

        info!("Checker registry built with {} monitor types", order.len());
        Self { entries, order }
    }

    /// Checker serving `monitor_type`
    pub fn get(&self, monitor_type: &str) -> Result<&dyn Checker, RegistryError> {
        self.entries
            .get(monitor_type)
            .map(|entry| entry.checker.as_ref())
            .ok_or_else(|| RegistryError::UnknownMonitorType(monitor_type.to_string()))
    }

    /// Run the check for `config` with the checker of its type
    pub async fn check(&self, config: &MonitorConfig) -> Result<CheckResult, RegistryError> {
        let checker = self.get(&config.monitor_type)?;
        Ok(checker.check(config).await)
    }

    pub fn is_supported(&self, monitor_type: &str) -> bool {
        self.entries.contains_key(monitor_type)
    }

    /// Catalog of every registered type
    pub fn list_supported_types(&self) -> Vec<MonitorTypeInfo> {
        self.order.iter().filter_map(|t| self.entries.get(t)).map(|entry| entry.info).collect()
    }

    pub fn type_info(&self, monitor_type: &str) -> Option<MonitorTypeInfo> {
        self.entries.get(monitor_type).map(|entry| entry.info)
    }

    pub fn is_game_server(&self, monitor_type: &str) -> bool {
        self.type_info(monitor_type).is_some_and(|info| info.is_game_server)
    }

    pub fn default_port(&self, monitor_type: &str) -> Option<u16> {
        self.type_info(monitor_type).and_then(|info| info.default_port)
    }
}

impl Default for CheckerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Built-in checkers in registration order
fn builtin_checkers() -> Vec<Arc<dyn Checker>> {
    vec![
        Arc::new(HttpChecker::new()),
        Arc::new(TcpChecker::new()),
        Arc::new(UdpChecker::new()),
        Arc::new(PingChecker::new()),
        Arc::new(MinecraftChecker::new()),
        Arc::new(SourceChecker::new()),
        Arc::new(FiveMChecker::new()),
        Arc::new(TeamSpeakChecker::new()),
        Arc::new(DnsChecker::new()),
        Arc::new(SslChecker::new()),
    ]
}
