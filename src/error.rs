//! Error handling for Declick
//!
//! Search failures are not errors: an exhausted click search is an ordinary
//! outcome reported by the length finder. Everything here is either a
//! precondition failure detected before any state is touched, or a fatal
//! numerical condition that aborts a scan.

use thiserror::Error;

use crate::engine::ChannelTag;

/// Result type alias for Declick operations
pub type Result<T> = std::result::Result<T, DeclickError>;

/// Main error type for Declick operations
#[derive(Error, Debug)]
pub enum DeclickError {
    // Settings / precondition errors
    #[error("Signal too short: {samples} samples (at least {required} required)")]
    SignalTooShort { samples: usize, required: usize },

    #[error("Invalid settings: {reason}")]
    InvalidSettings { reason: String },

    #[error("Non-finite sample at position {position}")]
    NonFiniteSample { position: usize },

    #[error("Channel {channel} does not exist in a {layout} signal")]
    ChannelNotFound {
        channel: ChannelTag,
        layout: &'static str,
    },

    // Processing errors
    #[error("Numerical failure in the predictor at position {position}")]
    NumericalFailure { position: usize },

    #[error("Channel {channel} has not been preprocessed")]
    NotPreprocessed { channel: ChannelTag },

    // Click registry errors
    #[error("No click at index {index} (channel holds {count})")]
    ClickNotFound { index: usize, count: usize },

    #[error("Click handle belongs to another signal")]
    ForeignClick,

    #[error("Invalid click resize: {reason}")]
    InvalidResize { reason: String },

    // File errors
    #[error("Unsupported audio format: {format}")]
    UnsupportedFormat { format: String },

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DeclickError {
    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            DeclickError::SignalTooShort { .. } => "SIGNAL_TOO_SHORT",
            DeclickError::InvalidSettings { .. } => "INVALID_SETTINGS",
            DeclickError::NonFiniteSample { .. } => "NON_FINITE_SAMPLE",
            DeclickError::ChannelNotFound { .. } => "CHANNEL_NOT_FOUND",
            DeclickError::NumericalFailure { .. } => "NUMERICAL_FAILURE",
            DeclickError::NotPreprocessed { .. } => "NOT_PREPROCESSED",
            DeclickError::ClickNotFound { .. } => "CLICK_NOT_FOUND",
            DeclickError::ForeignClick => "FOREIGN_CLICK",
            DeclickError::InvalidResize { .. } => "INVALID_RESIZE",
            DeclickError::UnsupportedFormat { .. } => "UNSUPPORTED_FORMAT",
            DeclickError::Wav(_) => "WAV_ERROR",
            DeclickError::Io(_) => "IO_ERROR",
            DeclickError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Whether the caller can fix the condition and retry
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            DeclickError::NumericalFailure { .. } | DeclickError::Io(_)
        )
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            DeclickError::SignalTooShort { .. } => vec![
                "Use a longer recording",
                "Lower the history length (must stay a multiple of 16)",
            ],
            DeclickError::InvalidSettings { .. } => vec![
                "History length must be a positive multiple of 16 above the predictor order",
                "Detection threshold must be a positive finite number",
                "Maximum correction length must be at least 1",
            ],
            DeclickError::NonFiniteSample { .. } => vec![
                "The decoded audio contains NaN or infinite values",
                "Re-export the file from its source",
            ],
            DeclickError::InvalidResize { .. } => vec![
                "A click must keep at least one sample",
                "Clicks cannot grow into the history lead-in or past the end of the signal",
            ],
            DeclickError::UnsupportedFormat { .. } => vec![
                "Convert to a mono or stereo WAV file",
                "Supported sample formats: 8/16/24/32-bit integer, 32-bit float",
            ],
            _ => vec![],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = DeclickError::SignalTooShort {
            samples: 100,
            required: 1024,
        };
        assert_eq!(err.error_code(), "SIGNAL_TOO_SHORT");
        assert!(err.to_string().contains("1024"));
    }

    #[test]
    fn test_recovery_suggestions() {
        let err = DeclickError::InvalidSettings {
            reason: "threshold".to_string(),
        };
        assert!(!err.recovery_suggestions().is_empty());
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_numerical_failure_is_fatal() {
        let err = DeclickError::NumericalFailure { position: 42 };
        assert!(!err.is_recoverable());
        assert_eq!(err.error_code(), "NUMERICAL_FAILURE");
    }
}
