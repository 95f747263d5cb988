use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ScopeError>;

#[derive(Error, Debug)]
pub enum ScopeError {
    #[error("No instrument resource matching '{filter}' (found: {found:?})")]
    ResourceNotFound { filter: String, found: Vec<String> },

    #[error("No reply to '{command}' within {timeout:?}")]
    TransportTimeout { command: String, timeout: Duration },

    #[error("Transport failure during '{command}': {source}")]
    Transport {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("Trigger did not complete within {timeout:?} (last status '{last_status}')")]
    TriggerTimeout { timeout: Duration, last_status: String },

    #[error("Acquisition cancelled while waiting for trigger")]
    Cancelled,

    #[error("Malformed reply to '{command}': {detail}")]
    Protocol { command: String, detail: String },

    #[error("Invalid block header: {0}")]
    InvalidBlockHeader(String),

    #[error("Truncated payload: block declares {declared} bytes but only {available} arrived")]
    TruncatedPayload { declared: usize, available: usize },

    #[error("Unable to write capture to {}: {source}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid calibration: {0}")]
    InvalidCalibration(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Feature '{0}' is not enabled. Please build with --features {0}")]
    FeatureNotEnabled(String),
}

impl ScopeError {
    // Timeouts at the socket or device level come back as io errors, everything
    // else stays a generic transport failure tagged with the command
    pub fn from_io(command: &str, timeout: Duration, e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => ScopeError::TransportTimeout {
                command: command.to_owned(),
                timeout,
            },
            _ => ScopeError::Transport { command: command.to_owned(), source: e },
        }
    }

    pub fn protocol(command: &str, detail: impl Into<String>) -> Self {
        ScopeError::Protocol { command: command.to_owned(), detail: detail.into() }
    }

    pub fn persistence(path: impl Into<PathBuf>, source: io::Error) -> Self {
        ScopeError::Persistence { path: path.into(), source }
    }
}
