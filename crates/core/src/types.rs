use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Container metadata for an analyzed video. Immutable once probed.
#[derive(Debug, Clone)]
pub struct VideoSource {
    pub path: PathBuf,
    pub fps: f64,
    pub total_frames: i64,
    /// Seconds, derived as `total_frames / fps`; zero when fps is zero.
    pub duration: f64,
}

/// A time-bounded span of transcribed speech.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DialogueSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Transcript {
    pub text: String,
    pub segments: Vec<DialogueSegment>,
    pub language: String,
}

/// One still image pulled from the video at a whole-second timestamp.
#[derive(Clone)]
pub struct FrameSample {
    pub timestamp: u32,
    pub image: Vec<u8>,
}

/// Caption for one sampled frame. Exists even when the model call failed;
/// see [`crate::describe::FAILED_CAPTION`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameDescription {
    pub timestamp: u32,
    pub caption: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkProgress {
    pub current: u32,
    pub total: u32,
}

impl Default for ChunkProgress {
    fn default() -> Self {
        Self {
            current: 0,
            total: 1,
        }
    }
}
