//! Error types for the voice core

use thiserror::Error;

/// Result type alias for voice operations
pub type VoiceResult<T> = Result<T, VoiceError>;

/// Errors that can occur in the duplex voice engine
#[derive(Error, Debug)]
pub enum VoiceError {
    #[error("capture pipeline error: {0}")]
    Capture(String),

    #[error("malformed frame: expected {expected} bytes, got {got}")]
    MalformedFrame { expected: usize, got: usize },

    #[error("voice activity classification error: {0}")]
    Vad(String),

    #[error("playback error: {0}")]
    Playback(String),

    #[error("transcription error: {0}")]
    Stt(String),

    #[error("synthesis error: {0}")]
    Tts(String),

    #[error("reasoning error: {0}")]
    Reasoning(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
