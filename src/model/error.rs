//! Structured error types for remote upload operations

use std::fmt;

/// Errors a gateway operation can fail with.
///
/// None of these ever escape an upload driver: they are recorded on the upload
/// as its failure reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// Transient network or connectivity problem
    Network(String),
    /// The transfer noticed the cancellation signal and stopped
    Cancelled(String),
    /// The remote side answered but refused the operation
    Rejected(String),
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayError::Network(msg) => write!(f, "{}", msg),
            GatewayError::Cancelled(msg) => write!(f, "{}", msg),
            GatewayError::Rejected(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for GatewayError {}

impl GatewayError {
    /// Returns true if the error reports an observed cancellation
    pub fn is_cancellation(&self) -> bool {
        matches!(self, GatewayError::Cancelled(_))
    }
}

/// Result type for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_cancelled_is_a_cancellation() {
        assert!(GatewayError::Cancelled("Upload cancelled".into()).is_cancellation());
        assert!(!GatewayError::Network("timeout".into()).is_cancellation());
        assert!(!GatewayError::Rejected("quota exceeded".into()).is_cancellation());
    }

    #[test]
    fn test_display_is_the_bare_message() {
        let err = GatewayError::Network("Upload failed - network error".into());
        assert_eq!(format!("{}", err), "Upload failed - network error");
    }
}
