use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// The remote rejected the request. Never retried.
    #[error("DCT API rejected the request with HTTP {status}: {body}")]
    Client { status: u16, body: String },

    /// The retry budget ran out, or the failure was not safe to repeat.
    #[error("DCT API unavailable after {attempts} attempt(s): {detail}")]
    Transient {
        status: Option<u16>,
        detail: String,
        attempts: u32,
    },

    #[error("Config error: {0}")]
    ConfigError(String),
}

impl ApiError {
    /// Stable name surfaced to callers in error envelopes.
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Client { .. } => "ClientApiError",
            ApiError::Transient { .. } => "TransientApiError",
            ApiError::ConfigError(_) => "ConfigurationError",
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Client { status, .. } => Some(*status),
            ApiError::Transient { status, .. } => *status,
            ApiError::ConfigError(_) => None,
        }
    }
}
