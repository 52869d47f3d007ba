//! Error types for voxline.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum VoxlineError {
    // Configuration errors — surface synchronously, before any thread starts
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Credential / token errors
    #[error("Authentication failed: {message}")]
    Auth { message: String },

    // Session errors
    #[error("Connection failed: {message}")]
    Connection { message: String },

    #[error("Protocol error: {message}")]
    Protocol { message: String },

    #[error("Session starved: {message}")]
    Starvation { message: String },

    // Audio source errors
    #[error("Audio device not found: {device}")]
    AudioDeviceNotFound { device: String },

    #[error("Audio format mismatch: expected {expected}, got {actual}")]
    AudioFormatMismatch { expected: String, actual: String },

    #[error("Audio capture failed: {message}")]
    AudioCapture { message: String },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, VoxlineError>;
