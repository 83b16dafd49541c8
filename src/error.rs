use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("cannot prepare store location: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success status; `detail` is whatever body the service sent back.
    #[error("service returned {status}: {detail}")]
    Status { status: u16, detail: String },

    #[error("undecodable response: {0}")]
    Decode(String),

    #[error("authorization failed: {0}")]
    Auth(String),

    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("continuation token {0:?} returned twice")]
    RepeatedPageToken(String),
}

impl TransportError {
    /// Rate limiting, server-side failures and network hiccups.
    pub fn is_transient(&self) -> bool {
        match self {
            TransportError::Http(e) => e.is_timeout() || e.is_connect(),
            TransportError::Status { status, .. } => *status == 429 || *status >= 500,
            TransportError::Decode(_)
            | TransportError::Auth(_)
            | TransportError::InvalidEndpoint(_)
            | TransportError::RepeatedPageToken(_) => false,
        }
    }
}

#[derive(Debug, Error)]
pub enum EnrichmentFailure {
    #[error("{0}")]
    Transport(#[from] TransportError),

    #[error("no From header")]
    MissingFrom,

    #[error("malformed From header {0:?}")]
    Malformed(String),
}

#[derive(Debug, Error)]
#[error("cannot resolve sender of message {message_id}: {failure}")]
pub struct EnrichmentError {
    pub message_id: String,
    pub failure: EnrichmentFailure,
}

impl EnrichmentError {
    pub fn new(message_id: impl Into<String>, failure: impl Into<EnrichmentFailure>) -> Self {
        Self {
            message_id: message_id.into(),
            failure: failure.into(),
        }
    }
}
