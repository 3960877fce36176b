//! Error types for rapidtree

use thiserror::Error;

/// Result type alias for rapidtree operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for rapidtree
#[derive(Error, Debug)]
pub enum Error {
    /// Network I/O error
    #[error("Network I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration, fatal at startup
    #[error("Configuration error: {0}")]
    Config(String),

    /// Protocol-level error
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Frame could not be parsed
    #[error("Packet parsing error: {0}")]
    PacketParsing(String),

    /// Port index outside the bridge's port vector
    #[error("Port {port} out of range (bridge has {count} ports)")]
    PortOutOfRange { port: usize, count: usize },

    /// Interface not found
    #[error("Interface '{0}' not found")]
    InterfaceNotFound(String),

    /// Interface error
    #[error("Interface error: {0}")]
    Interface(String),
}

impl Error {
    /// Create a configuration error with a custom message
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::Config(msg.into())
    }

    /// Create a protocol error with a custom message
    pub fn protocol<S: Into<String>>(msg: S) -> Self {
        Error::Protocol(msg.into())
    }

    /// Create a packet parsing error with a custom message
    pub fn parsing<S: Into<String>>(msg: S) -> Self {
        Error::PacketParsing(msg.into())
    }
}
