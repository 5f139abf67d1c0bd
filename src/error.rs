use thiserror::Error;

/// Main error type for the trade bot
#[derive(Error, Debug)]
pub enum TraderError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Connectivity errors
    #[error("G-Earth is not open (nothing answered on {host}:{port})")]
    HostUnreachable { host: String, port: u16 },

    #[error("{0}")]
    SessionLeft(String),

    #[error("You left room")]
    LeftRoom,

    // Trade orchestration errors
    #[error("User {username} selected to trade left room")]
    TargetLeft { username: String },

    #[error("Furniture {furniture} selected to trade has run out")]
    ItemExhausted { furniture: String },

    // Process coordination errors
    #[error("Maximum processes opened ({running} already running)")]
    TooManyProcesses { running: usize },

    #[error("Synchronization gate error: {0}")]
    Gate(String),

    // Operator interaction errors
    #[error("Selection failed: {0}")]
    Selection(String),

    // Bridge errors
    #[error("Protocol error: {0}")]
    Protocol(String),

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl TraderError {
    /// Expected run-ending conditions, reported to the operator with their short message only.
    pub fn is_operational(&self) -> bool {
        matches!(
            self,
            TraderError::HostUnreachable { .. }
                | TraderError::SessionLeft(_)
                | TraderError::LeftRoom
                | TraderError::TargetLeft { .. }
                | TraderError::ItemExhausted { .. }
                | TraderError::TooManyProcesses { .. }
                | TraderError::Cancelled
        )
    }
}

/// Result type alias for TraderError
pub type Result<T> = std::result::Result<T, TraderError>;
