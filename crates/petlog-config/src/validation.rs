//! Configuration validation

use crate::schema::{RawCardsConfig, RawClientConfig, RawConfig};
use thiserror::Error;
use url::Url;

/// Validation error
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Invalid base_url '{value}': {message}")]
    InvalidBaseUrl { value: String, message: String },

    #[error("{field} must be greater than zero")]
    ZeroDuration { field: &'static str },

    #[error("swipe_threshold must be a finite, non-negative number (got {0})")]
    InvalidSwipeThreshold(f64),
}

/// Validate a raw configuration, reporting every problem found
pub fn validate_config(config: &RawConfig) -> Vec<ValidationError> {
    let mut errors = validate_client(&config.client);
    errors.extend(validate_cards(&config.cards));
    errors
}

fn validate_client(client: &RawClientConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if let Some(base_url) = &client.base_url
        && let Err(message) = check_base_url(base_url)
    {
        errors.push(ValidationError::InvalidBaseUrl {
            value: base_url.clone(),
            message,
        });
    }

    if client.timeout_seconds == Some(0) {
        errors.push(ValidationError::ZeroDuration {
            field: "client.timeout_seconds",
        });
    }

    // cache_ttl_seconds = 0 is allowed: every load goes to the server

    errors
}

fn validate_cards(cards: &RawCardsConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if let Some(threshold) = cards.swipe_threshold
        && !(threshold.is_finite() && threshold >= 0.0)
    {
        errors.push(ValidationError::InvalidSwipeThreshold(threshold));
    }

    if cards.refresh_interval_seconds == Some(0) {
        errors.push(ValidationError::ZeroDuration {
            field: "cards.refresh_interval_seconds",
        });
    }

    errors
}

/// Check that a base URL is an absolute http(s) URL
pub fn check_base_url(s: &str) -> Result<(), String> {
    let url = Url::parse(s.trim()).map_err(|e| e.to_string())?;

    match url.scheme() {
        "http" | "https" => {}
        other => return Err(format!("unsupported scheme '{}'", other)),
    }
    if url.host_str().is_none() {
        return Err("missing host".into());
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err("must not carry a query or fragment".into());
    }

    Ok(())
}
