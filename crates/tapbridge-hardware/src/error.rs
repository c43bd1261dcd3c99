//! Error types for line source operations.
//!
//! This module defines error types specific to the scanner side of the
//! bridge: opening the serial port, reading from it, and sources that run
//! out of input.

/// Result type alias for hardware operations.
pub type Result<T> = std::result::Result<T, HardwareError>;

/// Errors that can occur while reading scanner output.
#[derive(Debug, thiserror::Error)]
pub enum HardwareError {
    /// Device is not connected or its reader has stopped.
    #[error("Device disconnected: {device}")]
    Disconnected { device: String },

    /// Source reached end of input (stdin closed, replay file finished).
    #[error("Source exhausted: {source_name}")]
    Exhausted { source_name: String },

    /// Device communication error.
    #[error("Communication error: {message}")]
    CommunicationError { message: String },

    /// Device could not be opened.
    #[error("Initialization failed: {message}")]
    InitializationFailed { message: String },

    /// Invalid source configuration.
    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl HardwareError {
    /// Create a new disconnected error.
    pub fn disconnected(device: impl Into<String>) -> Self {
        Self::Disconnected {
            device: device.into(),
        }
    }

    /// Create a new exhausted error.
    pub fn exhausted(source_name: impl Into<String>) -> Self {
        Self::Exhausted {
            source_name: source_name.into(),
        }
    }

    /// Create a new communication error.
    pub fn communication(message: impl Into<String>) -> Self {
        Self::CommunicationError {
            message: message.into(),
        }
    }

    /// Create a new initialization failed error.
    pub fn initialization_failed(message: impl Into<String>) -> Self {
        Self::InitializationFailed {
            message: message.into(),
        }
    }

    /// Create a new configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::ConfigurationError {
            message: message.into(),
        }
    }

    /// Returns `true` if the source will never yield another line.
    ///
    /// A disconnected serial worker or an exhausted reader are terminal;
    /// communication errors are not.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Disconnected { .. } | Self::Exhausted { .. })
    }
}

impl From<HardwareError> for tapbridge_core::Error {
    fn from(error: HardwareError) -> Self {
        match error {
            HardwareError::ConfigurationError { message } => tapbridge_core::Error::Config(message),
            HardwareError::Io(e) => tapbridge_core::Error::Io(e),
            other => tapbridge_core::Error::Transport(other.to_string()),
        }
    }
}
