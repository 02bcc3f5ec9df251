//! Error types for Planeja+

use thiserror::Error;

/// Main error type for Planeja+
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Duplicate: {0}")]
    Duplicate(String),

    #[error("Too many attempts, wait {retry_after_secs} seconds before trying again")]
    RateLimited { retry_after_secs: u64 },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invitation is no longer pending (status: {0})")]
    NotPending(String),

    #[error("Invitation expired")]
    Expired,

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias for Planeja+
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Error::Config(_) => 500,
            Error::Database(_) => 500,
            Error::Storage(_) => 500,
            Error::Auth(_) => 401,
            Error::Validation(_) => 422,
            Error::Duplicate(_) => 409,
            Error::RateLimited { .. } => 429,
            Error::NotFound(_) => 404,
            Error::NotPending(_) => 409,
            Error::Expired => 410,
            Error::PermissionDenied(_) => 403,
            Error::Internal(_) => 500,
            Error::Other(_) => 500,
        }
    }

    /// Returns the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Error::Config(_) => "CONFIG_ERROR",
            Error::Database(_) => "DATABASE_ERROR",
            Error::Storage(_) => "STORAGE_ERROR",
            Error::Auth(_) => "UNAUTHORIZED",
            Error::Validation(_) => "VALIDATION_ERROR",
            Error::Duplicate(_) => "DUPLICATE",
            Error::RateLimited { .. } => "RATE_LIMITED",
            Error::NotFound(_) => "NOT_FOUND",
            Error::NotPending(_) => "NOT_PENDING",
            Error::Expired => "EXPIRED",
            Error::PermissionDenied(_) => "FORBIDDEN",
            Error::Internal(_) => "INTERNAL_ERROR",
            Error::Other(_) => "INTERNAL_ERROR",
        }
    }

    /// Seconds the caller should wait before retrying, if any
    pub fn retry_after(&self) -> Option<u64> {
        match self {
            Error::RateLimited { retry_after_secs } => Some(*retry_after_secs),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limited_message_mentions_wait() {
        let err = Error::RateLimited {
            retry_after_secs: 27,
        };
        assert_eq!(err.status_code(), 429);
        assert_eq!(err.retry_after(), Some(27));
        assert!(err.to_string().contains("wait 27 seconds"));
    }

    #[test]
    fn test_taxonomy_codes() {
        assert_eq!(Error::Duplicate("x".into()).status_code(), 409);
        assert_eq!(Error::Expired.code(), "EXPIRED");
        assert_eq!(Error::Validation("bad".into()).status_code(), 422);
        assert_eq!(Error::NotFound("x".into()).retry_after(), None);
    }
}
