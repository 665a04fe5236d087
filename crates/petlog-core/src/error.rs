//! Errors surfaced by home model operations

use petlog_api::ApiError;
use petlog_util::PetLogError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Invalid(#[from] PetLogError),
}

pub type CoreResult<T> = Result<T, CoreError>;
