use thiserror::Error;

/// Result type for voice transformation operations.
pub type Result<T> = std::result::Result<T, VoiceError>;

#[derive(Debug, Error)]
pub enum VoiceError {
    /// A scale, period or size is outside its valid range.
    #[error("invalid parameter '{name}': {message}")]
    InvalidParameter { name: String, message: String },

    /// Frame arrays handed to the checked constructor disagree on shape.
    #[error("shape mismatch in {what}: expected {expected}, found {found}")]
    ShapeMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },

    /// The engine refused a frame, had nothing to drain and did not report a lock.
    #[error("synthesizer stalled at frame {frame_index}")]
    EngineStalled { frame_index: usize },

    #[error("config parse error: {0}")]
    Config(#[from] serde_json::Error),
}

impl VoiceError {
    pub(crate) fn invalid(name: &str, message: impl Into<String>) -> Self {
        VoiceError::InvalidParameter {
            name: name.to_string(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_parameter_message() {
        let e = VoiceError::invalid("pitchScale", "must be positive, got -1");
        assert_eq!(
            e.to_string(),
            "invalid parameter 'pitchScale': must be positive, got -1"
        );
    }

    #[test]
    fn config_error_wraps_serde() {
        let err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let e: VoiceError = err.into();
        assert!(e.to_string().starts_with("config parse error"));
    }
}
