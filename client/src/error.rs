use crate::session::SessionState;
use shared::{DecodeError, FrameError};
use std::io;
use std::time::Duration;
use thiserror::Error;

/// Everything a session operation can fail with.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("could not connect to {address}: {source}")]
    ConnectFailed {
        address: String,
        #[source]
        source: io::Error,
    },
    #[error("write failed: {0}")]
    WriteFailed(#[source] io::Error),
    #[error("no frame received within {0:?}")]
    ReadTimedOut(Duration),
    #[error("connection closed")]
    ConnectionClosed,
    #[error("read failed: {0}")]
    ReadFailed(#[source] io::Error),
    #[error("protocol decode error: {0}")]
    ProtocolDecode(#[from] DecodeError),
    #[error("cannot build frame: {0}")]
    Frame(#[from] FrameError),
    #[error("{operation} is not allowed while {state}")]
    InvalidStateTransition {
        operation: &'static str,
        state: SessionState,
    },
    #[error("parts configuration has not been set")]
    PartsNotConfigured,
}

impl ClientError {
    /// True when the error left the session without a usable connection.
    pub fn is_connection_lost(&self) -> bool {
        matches!(
            self,
            ClientError::WriteFailed(_)
                | ClientError::ReadTimedOut(_)
                | ClientError::ConnectionClosed
                | ClientError::ReadFailed(_)
        )
    }
}
