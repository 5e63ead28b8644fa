//! Error types for RustBeam.

use thiserror::Error;

/// Main error type for decoder construction and data preparation.
///
/// The decoding hot path itself is error-free: its inputs are caller
/// preconditions. Errors arise while building collaborators (lexicon,
/// trie, emission blocks, configuration).
#[derive(Error, Debug)]
pub enum BeamError {
    /// Lexicon and trie construction errors.
    #[error("Lexicon error: {0}")]
    Lexicon(String),

    /// Configuration errors.
    #[error("Config error: {0}")]
    Config(String),

    /// Emission block shape errors.
    #[error("Emissions error: {0}")]
    Emissions(String),

    /// I/O errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing errors.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Candle tensor errors.
    #[error("Tensor error: {0}")]
    Candle(#[from] candle_core::Error),
}

/// Result type alias for decoder operations.
pub type BeamResult<T> = Result<T, BeamError>;
