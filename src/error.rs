/// Error types for ir-manager
///
/// This module defines all possible errors that can occur in the library.
/// Uses thiserror for ergonomic error handling.

use thiserror::Error;

/// Main error type for ir-manager operations
#[derive(Error, Debug)]
pub enum IrError {
    /// Malformed wire text, capture bytes or interchange text
    #[error("Format error: {0}")]
    Format(String),

    /// Any failure along the wire -> interchange pipeline
    #[error("Conversion failed: {0}")]
    Conversion(#[source] Box<IrError>),

    /// Codec rejected the code while adding or updating a record
    #[error("Validation error: {0}")]
    Validation(String),

    /// I/O errors (file operations, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Capture device reported a failure
    #[error("Device error: {0}")]
    Device(String),

    /// Generic error with message
    #[error("{0}")]
    Generic(String),
}

/// Result type alias for ir-manager operations
pub type Result<T> = std::result::Result<T, IrError>;

impl IrError {
    /// Wrap a pipeline stage failure, keeping the original as the source
    pub fn conversion(cause: IrError) -> Self {
        IrError::Conversion(Box::new(cause))
    }

    /// Convert IrError to a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            IrError::Format(msg) => format!("The code is not in a recognised format: {}", msg),
            IrError::Conversion(cause) => {
                format!("Could not convert the code. Details: {}", cause)
            }
            IrError::Validation(msg) => format!("The code was rejected: {}", msg),
            IrError::Io(e) => {
                format!("File system error. Check permissions. Details: {}", e)
            }
            IrError::Serialization(e) => format!("Data format error: {}", e),
            IrError::Config(msg) => format!("Configuration issue: {}", msg),
            IrError::Device(msg) => format!("The capture device failed: {}", msg),
            IrError::Generic(msg) => msg.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_error_user_messages() {
        let err = IrError::Format("too short".to_string());
        assert!(err.user_message().contains("too short"));

        let err = IrError::Device("timed out".to_string());
        assert!(err.user_message().contains("capture device"));
    }

    #[test]
    fn test_conversion_keeps_cause() {
        let err = IrError::conversion(IrError::Format("not an IR capture".to_string()));
        let display = format!("{}", err);
        assert!(display.contains("Conversion failed"));
        assert!(display.contains("not an IR capture"));

        let source = err.source().expect("conversion error has a source");
        assert!(source.to_string().contains("not an IR capture"));
    }

    #[test]
    fn test_error_display() {
        let err = IrError::Validation("empty timing list".to_string());
        let display = format!("{}", err);
        assert!(display.contains("Validation error"));
    }
}
