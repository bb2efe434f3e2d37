//! Common error types for bmcctl.
//!
//! This module provides a centralized Error enum using thiserror,
//! with conversions from underlying error types used throughout the crate.

use thiserror::Error;

use crate::mgmt_protocol::CompletionCode;
use crate::transport::TransportError;

/// Main error type for bmcctl operations.
#[derive(Error, Debug)]
pub enum Error {
    /// A frame or payload was shorter than its fixed header requires
    #[error("Malformed frame: need at least {need} bytes, got {have}")]
    MalformedFrame { need: usize, have: usize },

    /// A payload does not fit the frame's length field
    #[error("Frame too long: at most {max} data bytes, got {have}")]
    FrameTooLong { max: usize, have: usize },

    /// The BMC answered with a non-zero completion code
    #[error("Protocol error: {0}")]
    Protocol(CompletionCode),

    /// The transport could not deliver the request or its response
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Decoding for this device is intentionally not implemented
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors from std
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Completion code carried by a protocol error, if any.
    pub fn completion_code(&self) -> Option<CompletionCode> {
        match self {
            Error::Protocol(code) => Some(*code),
            _ => None,
        }
    }
}

/// Convenience type alias for Results using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
