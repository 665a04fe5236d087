//! Raw configuration schema (as parsed from TOML)

use serde::{Deserialize, Serialize};

/// Raw configuration as parsed from TOML
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfig {
    /// Config schema version
    pub config_version: u32,

    /// Backend connection settings
    #[serde(default)]
    pub client: RawClientConfig,

    /// Home card behaviour
    #[serde(default)]
    pub cards: RawCardsConfig,
}

/// Backend connection settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RawClientConfig {
    /// Backend base URL (default: http://localhost:8080)
    pub base_url: Option<String>,

    /// Per-request timeout
    pub timeout_seconds: Option<u64>,

    /// How long a fetched home bundle counts as fresh
    pub cache_ttl_seconds: Option<u64>,
}

/// Home card settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RawCardsConfig {
    /// Drag distance a swipe must exceed to change cards
    pub swipe_threshold: Option<f64>,

    /// Re-derivation interval for `petlog watch`
    pub refresh_interval_seconds: Option<u64>,
}
