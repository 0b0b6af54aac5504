//! Error handling module
//!
//! This module defines the error types and result type aliases used in the application.

use std::io;
use thiserror::Error;

/// Retry relay error type
#[derive(Error, Debug)]
pub enum ProxyError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// OpenSSL error
    #[error("OpenSSL error: {0}")]
    Ssl(#[from] openssl::error::ErrorStack),

    /// Configuration error (bad arguments, unreadable config file)
    #[error("Configuration error: {0}")]
    Config(String),

    /// The listening socket could not be bound
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        /// Address the proxy tried to listen on
        addr: String,
        /// Underlying socket error
        #[source]
        source: io::Error,
    },

    /// The destination could not be reached
    #[error("Failed to connect to {addr}: {source}")]
    Connect {
        /// Destination address
        addr: String,
        /// Underlying socket error
        #[source]
        source: io::Error,
    },

    /// Read or write failure on an established socket
    #[error("Transport error: {0}")]
    Transport(String),

    /// The private key could not be loaded
    #[error("Key load error: {0}")]
    KeyLoad(String),

    /// A payload does not fit in a 16-bit length header
    #[error("Frame too large: {0} bytes (maximum is 65535)")]
    FrameTooLarge(usize),

    /// A request was resent until the retry budget ran out
    #[error("No valid reply after {attempts} attempts")]
    RetryExhausted {
        /// Number of send attempts made
        attempts: u32,
    },

    /// The session owning a request is gone
    #[error("Session closed")]
    SessionClosed,
}

impl ProxyError {
    /// Whether this error must stop the process
    ///
    /// Everything except bad configuration and a failed bind is contained
    /// at the component that raised it.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Bind { .. })
    }
}

/// Result type alias
///
/// This is a `Result` type alias that uses our custom `ProxyError`.
pub type Result<T> = std::result::Result<T, ProxyError>;
