//! HTTP backend for petlog
//!
//! Provides:
//! - [`HttpBackend`], the reqwest implementation of `PetLogBackend`
//! - Sign-in flows (provider login, registration, Kakao code exchange)
//! - [`Session`], the explicit credential context every request reads from

mod client;
mod session;

pub use client::*;
pub use session::*;

use thiserror::Error;

/// Errors building a client; request failures are reported as `ApiError`
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Invalid base URL '{url}': {source}")]
    InvalidBaseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type ClientResult<T> = Result<T, ClientError>;
