//! API error types

use thiserror::Error;

/// API error types
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("API response error: code={code}, message={message}")]
    ApiResponseError { code: String, message: String },

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("No data returned for {0}")]
    NoData(String),
}

impl ApiError {
    /// Transport failures are worth retrying; API answers are not
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::RequestFailed(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.status().map_or(false, |s| s.is_server_error() || s.as_u16() == 429)
            }
            _ => false,
        }
    }
}

/// Result type for API operations
pub type ApiResult<T> = Result<T, ApiError>;
