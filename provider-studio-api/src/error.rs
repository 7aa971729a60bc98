//! Error types for the studio API provider

use bridge_traits::error::BridgeError;
use thiserror::Error;

/// Studio API provider errors
#[derive(Error, Debug)]
pub enum StudioApiError {
    /// Token missing, expired or lacking permission
    #[error("Authentication failed (status {status_code}): {message}")]
    AuthenticationFailed { status_code: u16, message: String },

    /// API request returned an error
    #[error("Studio API error (status {status_code}): {message}")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limit exceeded, retry after {retry_after_seconds} seconds")]
    RateLimitExceeded { retry_after_seconds: u64 },

    #[error("Resource not found: {resource}")]
    NotFound { resource: String },

    /// Response body is not valid JSON for the expected shape
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Response parsed but does not describe a known job state
    #[error("Invalid job status payload: {0}")]
    InvalidStatus(String),

    #[error(transparent)]
    BridgeError(#[from] BridgeError),
}

pub type Result<T> = std::result::Result<T, StudioApiError>;

impl From<StudioApiError> for BridgeError {
    fn from(error: StudioApiError) -> Self {
        match error {
            StudioApiError::AuthenticationFailed {
                status_code,
                message,
            } => BridgeError::HttpStatus {
                status: status_code,
                message: format!("authentication failed: {}", message),
            },
            StudioApiError::ApiError {
                status_code,
                message,
            } => BridgeError::HttpStatus {
                status: status_code,
                message,
            },
            StudioApiError::RateLimitExceeded {
                retry_after_seconds,
            } => BridgeError::HttpStatus {
                status: 429,
                message: format!("rate limited, retry after {}s", retry_after_seconds),
            },
            StudioApiError::NotFound { resource } => BridgeError::HttpStatus {
                status: 404,
                message: format!("{} not found", resource),
            },
            StudioApiError::ParseError(msg) | StudioApiError::InvalidStatus(msg) => {
                BridgeError::InvalidPayload(msg)
            }
            StudioApiError::BridgeError(e) => e,
        }
    }
}
