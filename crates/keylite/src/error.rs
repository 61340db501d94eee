//! Unified error types for the cache store.

use tokio_rusqlite::rusqlite;

use crate::config::ConfigError;

/// Unified error type for every store and facade operation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Missing or invalid configuration; raised at construction, before any
    /// statement runs.
    #[error("invalid configuration: {0}")]
    Configuration(#[from] ConfigError),

    /// Underlying database failure (I/O, corruption, lock-wait exhausted).
    #[error("storage engine failure: {0}")]
    Storage(tokio_rusqlite::Error),

    /// An operation was issued after `disconnect`.
    #[error("connection closed: the store has been disconnected")]
    ConnectionClosed,

    /// A value could not be encoded to, or decoded from, its stored form.
    #[error("serialization failure: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::ConnectionClosed,
            tokio_rusqlite::Error::Close(c) => Error::Storage(tokio_rusqlite::Error::Close(c)),
            _ => Error::ConnectionClosed,
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        match err {
            tokio_rusqlite::Error::ConnectionClosed => Error::ConnectionClosed,
            other => Error::Storage(other),
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Storage(tokio_rusqlite::Error::Error(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_closed_display() {
        let err = Error::ConnectionClosed;
        assert!(err.to_string().contains("disconnected"));
    }

    #[test]
    fn test_configuration_display() {
        let err = Error::Configuration(ConfigError::Missing {
            field: "uri".into(),
            hint: "set KEYLITE_URI".into(),
        });
        assert!(err.to_string().contains("uri"));
    }

    #[test]
    fn test_closed_channel_maps_to_connection_closed() {
        let err: Error = tokio_rusqlite::Error::<rusqlite::Error>::ConnectionClosed.into();
        assert!(matches!(err, Error::ConnectionClosed));
    }
}
