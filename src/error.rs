//! Error types for the session lifecycle.

use thiserror::Error;

/// Result type for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;

/// Errors that can occur while negotiating, running, or tearing down a session.
#[derive(Error, Debug)]
pub enum SessionError {
    /// Credential negotiation failed (bad response, missing credential field).
    #[error("Negotiation failed: {0}")]
    Negotiation(String),

    /// Transport setup failed (media, connection, or description-exchange failure).
    #[error("Transport setup failed: {0}")]
    TransportSetup(String),

    /// Tool execution failed.
    #[error("Tool failed: {0}")]
    Tool(String),

    /// Malformed inbound control message.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Transport is not connected.
    #[error("Transport not connected")]
    NotConnected,

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SessionError {
    /// Create a new negotiation error.
    pub fn negotiation<S: Into<String>>(msg: S) -> Self {
        Self::Negotiation(msg.into())
    }

    /// Create a new transport setup error.
    pub fn transport<S: Into<String>>(msg: S) -> Self {
        Self::TransportSetup(msg.into())
    }

    /// Create a new tool error.
    pub fn tool<S: Into<String>>(msg: S) -> Self {
        Self::Tool(msg.into())
    }

    /// Create a new protocol error.
    pub fn protocol<S: Into<String>>(msg: S) -> Self {
        Self::Protocol(msg.into())
    }

    /// Create a new configuration error.
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }
}
