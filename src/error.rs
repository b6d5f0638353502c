use std::io;
use std::time::Duration;
use thiserror::Error;

/// Error type for the sensor provider
#[derive(Error, Debug)]
pub enum SensorError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Fetch timed out after {0:?}")]
    Timeout(Duration),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unknown target: {0}")]
    UnknownTarget(String),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for the sensor provider
pub type Result<T> = std::result::Result<T, SensorError>;

impl SensorError {
    /// Create a config error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        SensorError::Config(msg.into())
    }

    /// Create a transport error
    pub fn transport<S: Into<String>>(msg: S) -> Self {
        SensorError::Transport(msg.into())
    }

    /// Create a parse error
    pub fn parse<S: Into<String>>(msg: S) -> Self {
        SensorError::Parse(msg.into())
    }

    pub fn unknown_target<S: Into<String>>(name: S) -> Self {
        SensorError::UnknownTarget(name.into())
    }

    /// Create a generic error
    pub fn other<S: Into<String>>(msg: S) -> Self {
        SensorError::Other(msg.into())
    }

    /// True for failures that happened before a response body was available.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            SensorError::Transport(_) | SensorError::Timeout(_) | SensorError::Http(_) | SensorError::Io(_)
        )
    }
}
