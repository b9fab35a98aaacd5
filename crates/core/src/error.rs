//! Unified error types for shellcache.
//!
//! Every variant carries an uppercase code prefix in its display string and a
//! stable numeric code so hosts can report failures without matching on text.

use tokio_rusqlite::rusqlite;

/// Unified error types for the offline cache engine.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input parameters (e.g., an empty URL).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// Invalid URL.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// A manifest asset could not be fetched during installation.
    #[error("ASSET_UNAVAILABLE: {url}: {reason}")]
    AssetUnavailable { url: String, reason: String },

    /// The network request was rejected (offline, DNS failure, connection reset).
    #[error("NETWORK_ERROR: {0}")]
    Network(String),

    /// Fetch response too large.
    #[error("FETCH_TOO_LARGE: {0}")]
    FetchTooLarge(String),

    /// Store operation failed.
    #[error("STORE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("STORE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// A stored entry could not be encoded or decoded.
    #[error("STORE_ERROR: corrupt entry: {0}")]
    CorruptEntry(String),

    /// This instance was replaced by a newer generation.
    #[error("SUPERSEDED: generation {0} no longer controls clients")]
    Superseded(String),

    /// Activation was requested for a generation whose install never completed.
    #[error("NOT_INSTALLED: generation {0} has not finished installing")]
    NotInstalled(String),
}

impl Error {
    /// Stable numeric code for host-facing reports.
    ///
    /// Grouped by tens: 1x input, 2x network, 3x store, 4x lifecycle.
    pub fn code(&self) -> i32 {
        match self {
            Error::InvalidInput(_) => 10,
            Error::InvalidUrl(_) => 11,
            Error::AssetUnavailable { .. } => 20,
            Error::Network(_) => 21,
            Error::FetchTooLarge(_) => 22,
            Error::Database(_) | Error::MigrationFailed(_) | Error::CorruptEntry(_) => 30,
            Error::Superseded(_) => 40,
            Error::NotInstalled(_) => 41,
        }
    }

    /// Whether this error means the network rejected the request.
    pub fn is_network(&self) -> bool {
        matches!(self, Error::Network(_) | Error::FetchTooLarge(_))
    }
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}
