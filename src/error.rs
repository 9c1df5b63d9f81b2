use thiserror::Error;

/// Rejected configuration values.
///
/// Raised at the configuration boundary so that packing and normalization
/// only ever see validated input.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// Padding must be zero or positive
    #[error("Padding must be >= 0, got {0}")]
    NegativePadding(f64),

    /// A size-like field must be strictly positive
    #[error("{field} must be > 0, got {value}")]
    NonPositive { field: &'static str, value: f64 },

    /// NaN or infinite input
    #[error("{field} must be a finite number")]
    NotFinite { field: &'static str },

    /// Line-break threshold outside of [0, 1]
    #[error("Line-break threshold must be within [0, 1], got {0}")]
    ThresholdOutOfRange(f64),

    /// Zoom smoothing exponent outside of (0, 1]
    #[error("Zoom smoothing exponent must be within (0, 1], got {0}")]
    SmoothingExponentOutOfRange(f64),
}

/// Errors reported by a media provider.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MediaError {
    /// The source item could not be probed or opened
    #[error("Media unavailable: {id}: {reason}")]
    Unavailable { id: String, reason: String },

    /// Decoding or post-processing failed
    #[error("Failed to decode {id}: {reason}")]
    DecodeFailed { id: String, reason: String },

    /// The decode request was dropped before it produced a result
    #[error("Decode request cancelled")]
    Cancelled,
}

impl MediaError {
    pub fn unavailable(id: impl Into<String>, reason: impl ToString) -> Self {
        Self::Unavailable {
            id: id.into(),
            reason: reason.to_string(),
        }
    }

    pub fn decode_failed(id: impl Into<String>, reason: impl ToString) -> Self {
        Self::DecodeFailed {
            id: id.into(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_messages() {
        let err = ConfigError::NonPositive {
            field: "viewport_width",
            value: 0.0,
        };
        assert_eq!(err.to_string(), "viewport_width must be > 0, got 0");
        assert_eq!(
            ConfigError::NegativePadding(-2.0).to_string(),
            "Padding must be >= 0, got -2"
        );
    }

    #[test]
    fn test_media_error_helpers() {
        let err = MediaError::unavailable("a.jpg", "no such file");
        assert_eq!(err.to_string(), "Media unavailable: a.jpg: no such file");
        assert!(matches!(
            MediaError::decode_failed("b.png", "truncated"),
            MediaError::DecodeFailed { .. }
        ));
    }
}
