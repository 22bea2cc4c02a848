use serde::{Deserialize, Serialize};

/// Persisted form of a discovered element.
///
/// One record per distinct `name`; the store keeps them in discovery order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryRecord {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emoji: Option<String>,
    #[serde(default)]
    pub is_first_discovery: bool,
}

impl DiscoveryRecord {
    pub fn new(name: impl Into<String>, emoji: Option<&str>, is_first_discovery: bool) -> Self {
        Self {
            name: name.into(),
            emoji: emoji.map(ToString::to_string),
            is_first_discovery,
        }
    }
}

/// The four elements every game starts with, in seed order.
#[must_use]
pub fn starting_discoveries() -> Vec<DiscoveryRecord> {
    vec![
        DiscoveryRecord::new("Water", Some("💧"), false),
        DiscoveryRecord::new("Fire", Some("🔥"), false),
        DiscoveryRecord::new("Wind", Some("🌬️"), false),
        DiscoveryRecord::new("Earth", Some("🌍"), false),
    ]
}
