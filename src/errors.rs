use thiserror::Error;

/// Typed error hierarchy for voxrelay.
///
/// Used at module boundaries (synthesis, transport sends, search, command
/// input validation). Internal/leaf functions can continue using
/// `anyhow::Result`; the `Internal` variant allows seamless conversion via
/// the `?` operator.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Synthesis error: {provider}: {message}")]
    Synthesis { provider: String, message: String },

    /// Every segment exhausted the adapter chain, or the input produced no
    /// usable text. The voice-relay path turns this into silence; the
    /// text-to-speech command turns it into a user-facing failure reply.
    #[error("no audio produced")]
    NoAudio,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Search error: {0}")]
    Search(String),

    /// Malformed user input, surfaced as a usage reply in chat.
    #[error("{0}")]
    Usage(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Convenience alias for results using RelayError.
pub type RelayResult<T> = std::result::Result<T, RelayError>;

impl RelayError {
    /// Whether this is the expected "nothing to send" outcome rather than a
    /// genuine fault. Callers stay silent on this; anything else degrades to
    /// a tagged text fallback.
    pub fn is_no_audio(&self) -> bool {
        matches!(self, RelayError::NoAudio)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display() {
        let err = RelayError::Config("missing operator id".into());
        assert_eq!(err.to_string(), "Configuration error: missing operator id");
    }

    #[test]
    fn synthesis_error_display() {
        let err = RelayError::Synthesis {
            provider: "voicerss".into(),
            message: "timeout".into(),
        };
        assert_eq!(err.to_string(), "Synthesis error: voicerss: timeout");
        assert!(!err.is_no_audio());
    }

    #[test]
    fn no_audio_is_silent_outcome() {
        assert!(RelayError::NoAudio.is_no_audio());
    }

    #[test]
    fn internal_from_anyhow() {
        let err: RelayError = anyhow::anyhow!("something broke").into();
        assert!(matches!(err, RelayError::Internal(_)));
    }
}
