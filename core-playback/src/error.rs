//! # Session Error Types
//!
//! Failures surfaced by session commands and pending results.

use bridge_traits::{effects::EffectType, engine::EngineErrorKind, BridgeError};
use thiserror::Error;

/// Errors returned by [`PlaybackSession`](crate::PlaybackSession) commands.
#[derive(Error, Debug)]
pub enum SessionError {
    // ========================================================================
    // Command Errors
    // ========================================================================
    /// The source descriptor is malformed or names an unknown variant.
    #[error("Invalid source descriptor: {0}")]
    InvalidDescriptor(String),

    /// The command is not valid in the current processing state.
    #[error("Illegal state: {0}")]
    IllegalState(String),

    /// A command argument is out of range.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The session has been torn down.
    #[error("Session disposed")]
    Disposed,

    // ========================================================================
    // Engine Errors
    // ========================================================================
    /// The engine reported a playback failure.
    #[error("Engine {kind} error: {message}")]
    Engine {
        kind: EngineErrorKind,
        message: String,
    },

    /// The pending result was displaced by a newer request or by teardown.
    #[error("Connection aborted")]
    AbortedBySupersedingRequest,

    // ========================================================================
    // Effect Errors
    // ========================================================================
    /// The effect is not configured or no audio session is bound.
    #[error("Effect not available: {0}")]
    EffectUnavailable(EffectType),

    // ========================================================================
    // Generic Errors
    // ========================================================================
    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    #[error("Configuration error: {0}")]
    Config(#[from] core_runtime::Error),
}

impl SessionError {
    /// Stable code delivered to clients alongside the message.
    pub fn code(&self) -> &'static str {
        match self {
            SessionError::InvalidDescriptor(_) => "invalidDescriptor",
            SessionError::IllegalState(_) => "illegalState",
            SessionError::InvalidArgument(_) => "invalidArgument",
            SessionError::Disposed => "disposed",
            SessionError::Engine { kind, .. } => kind.code(),
            SessionError::AbortedBySupersedingRequest => "abort",
            SessionError::EffectUnavailable(_) => "effectUnavailable",
            SessionError::Bridge(_) => "bridge",
            SessionError::Config(_) => "config",
        }
    }

    /// Returns `true` if the failure came from the engine rather than the
    /// command itself.
    pub fn is_engine_error(&self) -> bool {
        matches!(self, SessionError::Engine { .. })
    }
}

/// Result type for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        assert_eq!(SessionError::AbortedBySupersedingRequest.code(), "abort");
        assert_eq!(
            SessionError::Engine {
                kind: EngineErrorKind::Renderer,
                message: "decoder init".into()
            }
            .code(),
            "renderer"
        );
        assert_eq!(
            SessionError::InvalidDescriptor("x".into()).code(),
            "invalidDescriptor"
        );
    }

    #[test]
    fn test_abort_message_matches_wire_text() {
        assert_eq!(
            SessionError::AbortedBySupersedingRequest.to_string(),
            "Connection aborted"
        );
    }
}
