use thiserror::Error;

/// Terminal outcome of a failed API call, after the failover loop gave up.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("authentication failed: {message}")]
    AuthenticationFailure { status: u16, message: String },

    #[error("{message}")]
    ServerError { status: u16, message: String },

    #[error("{message}")]
    Unreachable { message: String },

    #[error("failed to encode request body: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("unexpected response payload: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("response did not include a payload")]
    EmptyPayload,
}

impl ApiError {
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, ApiError::AuthenticationFailure { .. })
    }
}

/// Connection-level failure reported by a transport.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct TransportError(pub String);

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        Self(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("session store i/o failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("session store is not valid json: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
