use std::path::PathBuf;

use thiserror::Error;

use crate::format::Format;
use crate::host::HostKind;

/// Why a conversion did not produce its target. Every variant leaves the
/// viewer usable; host handles are released before one of these is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConvertError {
    /// `missing` is set when the application could not be found at all, as
    /// opposed to one that was found but failed to come up.
    #[error("{kind} is not available: {reason}")]
    HostUnavailable {
        kind: HostKind,
        reason: String,
        missing: bool,
    },

    #[error("could not open {}: {reason}", .path.display())]
    OpenFailed { path: PathBuf, reason: String },

    #[error("could not save {}: {reason}", .path.display())]
    SaveFailed { path: PathBuf, reason: String },

    #[error("automation host failed: {0}")]
    HostFailure(String),

    #[error("another conversion is already running")]
    Busy,

    #[error("converting {from} to {to} is not supported")]
    Unsupported { from: Format, to: Format },

    #[error("conversion was cancelled")]
    Cancelled,
}

/// Transport-level failure talking to an automation host.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("no automation bridge is configured for {0}")]
    NotConfigured(HostKind),

    #[error("failed to launch automation bridge: {0}")]
    Launch(#[source] std::io::Error),

    #[error("automation bridge did not become ready: {0}")]
    Handshake(String),

    #[error("automation bridge i/o failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed automation message: {0}")]
    Protocol(#[from] serde_json::Error),

    #[error("{0}")]
    Remote(String),

    #[error("automation bridge exited")]
    Disconnected,

    #[error("automation bridge was interrupted")]
    Interrupted,
}

impl HostError {
    /// Whether the host application is absent rather than broken.
    pub fn is_missing_host(&self) -> bool {
        match self {
            HostError::NotConfigured(_) => true,
            HostError::Launch(err) => err.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}
