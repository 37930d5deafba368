use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NovelizeError {
    #[error("Could not open video file {path}: {reason}")]
    OpenFailed { path: PathBuf, reason: String },

    #[error("Video file not found: {path}")]
    SourceNotFound { path: PathBuf },

    #[error("Video file appears corrupted or unsupported: {reason}")]
    UnsupportedMedia { reason: String },

    #[error("Video has no audio track")]
    NoAudioTrack,

    #[error("Audio extraction failed: {reason}")]
    ExtractionFailed { reason: String },

    #[error("Audio extraction timed out after {0} seconds")]
    ExtractionTimeout(u64),

    #[error("Whisper model not found at {path}. Download a ggml model or pass --whisper-model")]
    TranscriptionUnavailable { path: PathBuf },

    #[error("Transcription failed: {reason}")]
    TranscriptionFailed { reason: String },

    #[error("Frame sampling failed for {path}: {reason}")]
    SamplingFailed { path: PathBuf, reason: String },

    #[error("No frames could be extracted from the video")]
    NoFramesExtracted,

    #[error("Frame description failed: {reason}")]
    DescriptionFailed { reason: String },

    #[error("Rate limited by provider: {message}")]
    RateLimited { message: String },

    #[error("API request failed with status {status}: {message}")]
    ApiFailed { status: u16, message: String },

    #[error("Narrative synthesis failed: {reason}")]
    SynthesisFailed { reason: String },

    #[error("Failed to write output file {path}: {source}")]
    OutputWriteFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Missing API key: {env_var} environment variable is not set")]
    MissingApiKey { env_var: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, NovelizeError>;
