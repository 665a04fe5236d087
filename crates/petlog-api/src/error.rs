//! Error taxonomy for remote calls

use thiserror::Error;

/// Classified failure of a backend call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("Network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Server rejected request ({code}): {message}")]
    ServerRejected { code: u16, message: String },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The server has nothing for us yet, most often "no group joined".
    #[error("Not found: {0}")]
    NotFound(String),
}

/// Fieldless tag of an [`ApiError`], for matching without the payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NetworkUnreachable,
    MalformedResponse,
    ServerRejected,
    Unauthorized,
    NotFound,
}

impl ApiError {
    pub fn network(msg: impl Into<String>) -> Self {
        Self::NetworkUnreachable(msg.into())
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedResponse(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Classify an HTTP error status and its body.
    pub fn from_status(code: u16, body: impl Into<String>) -> Self {
        let message = body.into();
        match code {
            401 | 403 => Self::Unauthorized(message),
            404 => Self::NotFound(message),
            _ => Self::ServerRejected { code, message },
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NetworkUnreachable(_) => ErrorKind::NetworkUnreachable,
            Self::MalformedResponse(_) => ErrorKind::MalformedResponse,
            Self::ServerRejected { .. } => ErrorKind::ServerRejected,
            Self::Unauthorized(_) => ErrorKind::Unauthorized,
            Self::NotFound(_) => ErrorKind::NotFound,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.kind() == ErrorKind::Unauthorized
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        Self::MalformedResponse(e.to_string())
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_map_to_kinds() {
        assert_eq!(ApiError::from_status(401, "").kind(), ErrorKind::Unauthorized);
        assert_eq!(ApiError::from_status(403, "").kind(), ErrorKind::Unauthorized);
        assert_eq!(ApiError::from_status(404, "no group").kind(), ErrorKind::NotFound);
        assert_eq!(
            ApiError::from_status(500, "boom"),
            ApiError::ServerRejected {
                code: 500,
                message: "boom".into()
            }
        );
    }

    #[test]
    fn decode_errors_are_malformed() {
        let err: ApiError = serde_json::from_str::<u32>("\"nope\"").unwrap_err().into();
        assert_eq!(err.kind(), ErrorKind::MalformedResponse);
    }
}
