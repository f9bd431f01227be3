//! Error types for musicgen-render.

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Candle tensor/model error.
    #[error("candle: {0}")]
    Candle(#[from] candle_core::Error),

    /// Audio processing error (WAV I/O, resampling, STFT).
    #[error("audio: {0}")]
    Audio(String),

    /// Model weight or seed bank loading error.
    #[error("weight loading: {0}")]
    WeightLoad(String),

    /// Invalid configuration or model metadata.
    #[error("config: {0}")]
    Config(String),

    /// I/O error.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    /// MIDI serialization error.
    #[error("midi: {0}")]
    Midi(String),

    /// External synthesizer failed or produced no output.
    #[error("synth: {0}")]
    Synth(String),

    /// Preview image encoding/decoding error.
    #[error("image: {0}")]
    Image(#[from] image::ImageError),

    /// Seed index does not address an entry in the seed bank.
    #[error("seed index {index} out of range (bank holds {len} seeds)")]
    SeedIndex { index: i64, len: usize },

    /// Request parameters rejected before any work was done.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Output directory missing or not a directory.
    #[error("output directory {0:?} does not exist or is not a directory")]
    OutputDir(std::path::PathBuf),

    /// Render manager worker is gone.
    #[error("manager: {0}")]
    Manager(String),
}

impl From<hound::Error> for Error {
    fn from(error: hound::Error) -> Self {
        Error::Audio(error.to_string())
    }
}

impl From<midly::Error> for Error {
    fn from(error: midly::Error) -> Self {
        Error::Midi(error.to_string())
    }
}
