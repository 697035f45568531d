//! Error types for board operations.
//!
//! This module defines error types specific to board device operations,
//! covering disconnection, unsupported capabilities, bad arguments and
//! bus communication failures.

/// Result type alias for board operations.
pub type Result<T> = std::result::Result<T, HardwareError>;

/// Errors that can occur during board operations.
#[derive(Debug, thiserror::Error)]
pub enum HardwareError {
    /// Board is not plugged in or has been unplugged.
    #[error("Device disconnected: {device}")]
    Disconnected { device: String },

    /// Operation is not supported by this board.
    #[error("Unsupported operation: {operation}")]
    Unsupported { operation: String },

    /// Board communication error.
    #[error("Communication error: {message}")]
    CommunicationError { message: String },

    /// Invalid argument, such as an LED index past the end of the ring.
    #[error("Invalid data: {message}")]
    InvalidData { message: String },

    /// Board initialisation failed.
    #[error("Initialization failed: {message}")]
    InitializationFailed { message: String },
}

impl HardwareError {
    /// Create a new disconnected error.
    pub fn disconnected(device: impl Into<String>) -> Self {
        Self::Disconnected {
            device: device.into(),
        }
    }

    /// Create a new unsupported operation error.
    pub fn unsupported(operation: impl Into<String>) -> Self {
        Self::Unsupported {
            operation: operation.into(),
        }
    }

    /// Create a new communication error.
    pub fn communication(message: impl Into<String>) -> Self {
        Self::CommunicationError {
            message: message.into(),
        }
    }

    /// Create a new invalid data error.
    pub fn invalid_data(message: impl Into<String>) -> Self {
        Self::InvalidData {
            message: message.into(),
        }
    }

    /// Create a new initialization failed error.
    pub fn initialization_failed(message: impl Into<String>) -> Self {
        Self::InitializationFailed {
            message: message.into(),
        }
    }

    /// Whether the error means the capability does not exist on the board.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported { .. })
    }
}
