//! Error types for petlog

use thiserror::Error;

/// Input rejected before it reaches the backend
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PetLogError {
    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl PetLogError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, PetLogError>;
