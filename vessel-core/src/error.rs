//! Error types for Vessel

use thiserror::Error;

/// Vessel error types
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Root filesystem staging or mount-table operation failed
    #[error("RootFs error: {message}")]
    RootFs {
        /// Error message
        message: String,
    },

    /// Namespace operation failed
    #[error("Namespace error: {message}")]
    Namespace {
        /// Error message
        message: String,
    },

    /// Network fabric or namespace network configuration failed
    #[error("Network error: {message}")]
    Network {
        /// Error message
        message: String,
    },

    /// Invalid configuration
    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        /// Error message
        message: String,
    },

    /// A bounded wait elapsed before the condition held
    #[error("Timeout: {message}")]
    Timeout {
        /// Error message
        message: String,
    },

    /// System error from nix
    #[error("System error: {0}")]
    System(#[from] nix::Error),
}

/// Result type alias for Vessel operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_includes_phase() {
        let err = Error::Network {
            message: "bridge creation failed".to_string(),
        };
        assert!(err.to_string().contains("Network error"));
        assert!(err.to_string().contains("bridge creation failed"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_nix_error_conversion() {
        let err: Error = nix::Error::EPERM.into();
        assert!(matches!(err, Error::System(_)));
    }
}
