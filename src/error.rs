//! Error types for the chat store bootstrap layer
//!
//! The library reports failures through a small typed taxonomy so callers
//! can tell connection problems (abort startup) apart from schema or index
//! rejections. Nothing here retries or swallows an error; retry policy, if
//! any, belongs to the caller.

use std::io;
use thiserror::Error;

/// Errors produced while bootstrapping or maintaining the chat store
#[derive(Error, Debug)]
pub enum StoreError {
    /// The store could not be reached or rejected the connection
    /// (host resolution, I/O, or authentication failure)
    #[error("cannot connect to chat store at {address}: {source}")]
    Connection {
        address: String,
        #[source]
        source: mongodb::error::Error,
    },

    /// The embedded server process could not be started
    #[error("embedded server on port {port}: {source}")]
    Embedded {
        port: u16,
        #[source]
        source: io::Error,
    },

    /// Collection or database creation/removal was rejected by the store
    #[error("schema operation on '{collection}' failed: {source}")]
    Schema {
        collection: String,
        #[source]
        source: mongodb::error::Error,
    },

    /// An index build or drop was rejected by the store
    #[error("index operation on '{collection}' failed: {source}")]
    Index {
        collection: String,
        #[source]
        source: mongodb::error::Error,
    },

    /// Invalid or incomplete configuration
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type alias for chat store operations
pub type Result<T> = std::result::Result<T, StoreError>;

impl StoreError {
    /// Create a connection error for the given server address
    pub fn connection(address: impl Into<String>, source: mongodb::error::Error) -> Self {
        Self::Connection {
            address: address.into(),
            source,
        }
    }

    /// Create an embedded-server error for the given port
    pub fn embedded(port: u16, source: io::Error) -> Self {
        Self::Embedded { port, source }
    }

    /// Create a schema error for the given collection
    pub fn schema(collection: impl Into<String>, source: mongodb::error::Error) -> Self {
        Self::Schema {
            collection: collection.into(),
            source,
        }
    }

    /// Create an index error for the given collection
    pub fn index(collection: impl Into<String>, source: mongodb::error::Error) -> Self {
        Self::Index {
            collection: collection.into(),
            source,
        }
    }

    /// Create a configuration error
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config(reason.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StoreError::config("db_user is required when db_authentication is enabled");
        assert_eq!(
            err.to_string(),
            "configuration error: db_user is required when db_authentication is enabled"
        );

        let io_err = io::Error::new(io::ErrorKind::NotFound, "no mongod binary in PATH");
        let err = StoreError::embedded(27017, io_err);
        assert!(err.to_string().contains("embedded server on port 27017"));
    }
}
