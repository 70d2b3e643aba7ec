//! Descriptive metadata for every monitor type.
//!
//! Configuration UIs render their per-type forms from this catalog.

use serde::Serialize;

/// Catalog entry for one monitor type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MonitorTypeInfo {
    /// Type string stored on monitors, e.g. `minecraft`
    #[serde(rename = "type")]
    pub monitor_type: &'static str,

    /// Display name
    pub name: &'static str,

    pub description: &'static str,

    /// Icon identifier for the UI
    pub icon: &'static str,

    /// Config fields the form should show
    pub fields: &'static [&'static str],

    pub default_port: Option<u16>,

    pub is_game_server: bool,
}

impl MonitorTypeInfo {
    /// Whether the form for this type shows `field`
    pub fn has_field(&self, field: &str) -> bool {
        self.fields.contains(&field)
    }
}
