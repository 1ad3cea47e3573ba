/// Result type alias for page and feed fetches.
pub type Result<T> = std::result::Result<T, ArchiveError>;

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Unexpected status {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Unfetchable url {url}: {reason}")]
    Unfetchable { url: String, reason: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<reqwest::Error> for ArchiveError {
    fn from(err: reqwest::Error) -> Self {
        ArchiveError::Network(err.to_string())
    }
}

/// Errors from single-id ancestor lookups.
#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    /// Deleted, suspended, protected or never existed.
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized (status {0})")]
    Unauthorized(u16),

    #[error("Rate limited")]
    RateLimited,

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("No lookup client configured for {0}")]
    Unsupported(String),
}

impl From<reqwest::Error> for LookupError {
    fn from(err: reqwest::Error) -> Self {
        LookupError::Network(err.to_string())
    }
}

impl LookupError {
    /// Map a non-success HTTP status to a lookup error.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        match status {
            401 => LookupError::Unauthorized(status),
            403 | 404 => LookupError::NotFound(message.into()),
            429 => LookupError::RateLimited,
            _ => LookupError::Api {
                status,
                message: message.into(),
            },
        }
    }
}
