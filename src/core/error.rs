use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for protocol and session operations
pub type TransferResult<T> = Result<T, TransferError>;

/// Errors raised while speaking the transfer protocol
#[derive(Error, Debug)]
pub enum TransferError {
    #[error("Connection error: {0}")]
    Connection(#[source] io::Error),

    #[error("Connection closed by peer")]
    ConnectionClosed,

    #[error("Malformed {field}: {value:?}")]
    Parse { field: &'static str, value: String },

    #[error("Unknown command {0:?}")]
    UnknownCommand(String),

    #[error("Invalid file name {name:?}: {reason}")]
    InvalidFilename { name: String, reason: &'static str },

    #[error("Filesystem error on {}: {source}", .path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write received data: {0}")]
    LocalWrite(#[source] io::Error),

    #[error("Incomplete transfer: expected {expected} bytes, received {received}")]
    ShortTransfer { expected: u64, received: u64 },
}

impl TransferError {
    pub fn parse(field: &'static str, value: impl Into<String>) -> Self {
        Self::Parse {
            field,
            value: value.into(),
        }
    }

    pub fn filesystem(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Filesystem {
            path: path.into(),
            source,
        }
    }

    /// Whether the transport can no longer be used after this error
    pub fn is_connection_lost(&self) -> bool {
        matches!(
            self,
            Self::Connection(_) | Self::ConnectionClosed | Self::ShortTransfer { .. }
        )
    }
}

impl From<io::Error> for TransferError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::UnexpectedEof => Self::ConnectionClosed,
            _ => Self::Connection(err),
        }
    }
}
