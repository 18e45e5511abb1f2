//! Error types for the cmdbc core library.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::cloud::HttpStatus;

#[derive(Error, Debug)]
pub enum Error {
    /// The request never produced a response (connection refused, DNS, reset).
    #[error("{operation} failed to reach server: {source}")]
    Transport {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// Response headers did not arrive within the configured wait.
    #[error("{operation} timed out after {after:?} waiting for a response")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    /// The exchange completed but the server rejected the request.
    #[error("{operation} not accepted - {status}: {message}")]
    Protocol {
        operation: &'static str,
        status: HttpStatus,
        message: String,
    },

    #[error("serial number not generated - server returned an empty value")]
    EmptySerialNumber,

    /// No baseline has been persisted for this device yet.
    #[error("device {identity} has no previous state")]
    NotFound { identity: String },

    #[error("malformed device state: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("device {vendor_id}-{product_id} has no serial number")]
    Identity {
        vendor_id: String,
        product_id: String,
    },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config error: {0}")]
    Config(String),
}

impl Error {
    /// True for failures where no HTTP status was ever received.
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport { .. } | Error::Timeout { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    pub fn is_protocol(&self) -> bool {
        matches!(self, Error::Protocol { .. } | Error::EmptySerialNumber)
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
