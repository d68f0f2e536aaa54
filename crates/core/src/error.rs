use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("connection details request failed with status {0}")]
    Status(reqwest::StatusCode),

    #[error("invalid connection details: {0}")]
    BadResponse(String),

    #[error("connection previously failed for this scope")]
    Unavailable,
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("search request failed: {0}")]
    Request(String),
}

pub type Result<T, E = SearchError> = std::result::Result<T, E>;
