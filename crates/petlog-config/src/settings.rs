//! Validated settings structures

use crate::schema::{RawCardsConfig, RawClientConfig, RawConfig};
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CACHE_TTL_SECS: u64 = 60;
pub const DEFAULT_SWIPE_THRESHOLD: f64 = 50.0;
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 60;

/// Validated settings ready for use by the client and the CLI
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Settings {
    pub client: ClientConfig,
    pub cards: CardsConfig,
}

impl Settings {
    /// Convert from raw config (after validation)
    pub fn from_raw(raw: RawConfig) -> Self {
        Self {
            client: ClientConfig::from_raw(raw.client),
            cards: CardsConfig::from_raw(raw.cards),
        }
    }
}

/// Backend connection settings
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Base URL without a trailing slash
    pub base_url: String,
    pub timeout: Duration,
    pub cache_ttl: Duration,
}

impl ClientConfig {
    fn from_raw(raw: RawClientConfig) -> Self {
        Self {
            base_url: normalize_base_url(raw.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)),
            timeout: Duration::from_secs(raw.timeout_seconds.unwrap_or(DEFAULT_TIMEOUT_SECS)),
            cache_ttl: Duration::from_secs(
                raw.cache_ttl_seconds.unwrap_or(DEFAULT_CACHE_TTL_SECS),
            ),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::from_raw(RawClientConfig::default())
    }
}

/// Home card settings
#[derive(Debug, Clone, PartialEq)]
pub struct CardsConfig {
    pub swipe_threshold: f64,
    pub refresh_interval: Duration,
}

impl CardsConfig {
    fn from_raw(raw: RawCardsConfig) -> Self {
        Self {
            swipe_threshold: raw.swipe_threshold.unwrap_or(DEFAULT_SWIPE_THRESHOLD),
            refresh_interval: Duration::from_secs(
                raw.refresh_interval_seconds
                    .unwrap_or(DEFAULT_REFRESH_INTERVAL_SECS),
            ),
        }
    }
}

impl Default for CardsConfig {
    fn default() -> Self {
        Self::from_raw(RawCardsConfig::default())
    }
}

/// Strip trailing slashes so endpoint paths can be appended directly.
pub fn normalize_base_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let settings = Settings::default();
        assert_eq!(settings.client.base_url, "http://localhost:8080");
        assert_eq!(settings.client.timeout, Duration::from_secs(30));
        assert_eq!(settings.client.cache_ttl, Duration::from_secs(60));
        assert_eq!(settings.cards.swipe_threshold, 50.0);
        assert_eq!(settings.cards.refresh_interval, Duration::from_secs(60));
    }

    #[test]
    fn trailing_slashes_are_stripped() {
        assert_eq!(normalize_base_url("https://api.petlog.app/"), "https://api.petlog.app");
        assert_eq!(normalize_base_url(" http://h:1/v1// "), "http://h:1/v1");
    }
}
