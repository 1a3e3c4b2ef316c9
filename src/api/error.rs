use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("network error: {0}")]
    Transport(#[source] reqwest::Error),
    /// Non-success status; `message` is the server's `message` field or `HTTP error <status>`.
    #[error("{message}")]
    Status { status: u16, message: String },
    #[error("invalid response body: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("server returned an empty body")]
    EmptyBody,
    #[error("entry {0} not found")]
    NotFound(i64),
    #[error("local storage error: {0:#}")]
    Local(anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            ApiError::NotFound(_) => Some(404),
            _ => None,
        }
    }
}
