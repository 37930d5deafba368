use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::fs;

use crate::audio::{self, ProgressFn};
use crate::describe;
use crate::error::{NovelizeError, Result};
use crate::frames;
use crate::narrative;
use crate::probe;
use crate::progress::ProgressSink;
use crate::provider::Provider;
use crate::retry::RetryPolicy;
use crate::transcribe;
use crate::types::ChunkProgress;

pub struct PipelineConfig {
    /// Seconds between sampled frames.
    pub frame_interval: u32,
    /// Videos longer than this are synthesized chunk by chunk.
    pub chunk_duration: u32,
    /// Pacing between successive caption calls.
    pub request_delay: Duration,
    pub retry: RetryPolicy,
    /// Path to a ggml Whisper model file.
    pub whisper_model: PathBuf,
}

impl PipelineConfig {
    pub fn new(whisper_model: PathBuf) -> Self {
        Self {
            frame_interval: 10,
            chunk_duration: 600,
            request_delay: Duration::from_millis(200),
            retry: RetryPolicy::default(),
            whisper_model,
        }
    }
}

/// Convert `video_path` into a prose narrative at `output_path`.
///
/// Runs every stage start to finish, reporting progress through `sink`.
/// On any fatal error a terminal `Error: …` record is written best-effort
/// before the error propagates, so an external poller always observes a
/// definitive final state. The output file is written exactly once, before
/// the completed record.
pub async fn run(
    video_path: &Path,
    output_path: &Path,
    provider: &Provider,
    config: &PipelineConfig,
    sink: Arc<dyn ProgressSink>,
) -> Result<()> {
    match run_stages(video_path, output_path, provider, config, &sink).await {
        Ok(()) => Ok(()),
        Err(err) => {
            // the sink clamps percent/index, so this only changes the label
            sink.report(&format!("Error: {err}"), 0, 0, ChunkProgress::default());
            Err(err)
        }
    }
}

async fn run_stages(
    video_path: &Path,
    output_path: &Path,
    provider: &Provider,
    config: &PipelineConfig,
    sink: &Arc<dyn ProgressSink>,
) -> Result<()> {
    let api_key = provider.validate_api_key()?;
    let client = reqwest::Client::new();

    sink.report("Starting...", 0, 0, ChunkProgress::default());

    sink.report("Analyzing video...", 5, 0, ChunkProgress::default());
    let source = probe::analyze(video_path)?;

    sink.report("Extracting audio...", 10, 0, ChunkProgress::default());
    let audio_file = tempfile::Builder::new()
        .prefix("novelize-audio-")
        .suffix(".wav")
        .tempfile()?;
    let audio_path = audio_file.path().to_path_buf();

    let audio_progress: ProgressFn = {
        let sink = Arc::clone(sink);
        Arc::new(move |percent| {
            sink.report("Extracting audio...", percent, 0, ChunkProgress::default())
        })
    };
    audio::extract_audio(video_path, &audio_path, Some(audio_progress)).await?;

    sink.report("Transcribing dialogue...", 20, 1, ChunkProgress::default());
    let transcript = transcribe::transcribe_audio(&audio_path, &config.whisper_model)?;
    drop(audio_file);

    sink.report("Analyzing frames...", 30, 2, ChunkProgress::default());
    let samples = frames::sample_frames(video_path, 0.0, source.duration, config.frame_interval)?;
    if samples.is_empty() {
        return Err(NovelizeError::NoFramesExtracted);
    }

    let total = samples.len();
    let descriptions = describe::describe_frames(
        &client,
        provider,
        &api_key,
        &samples,
        &config.retry,
        config.request_delay,
        |index| {
            sink.report(
                "Analyzing frames...",
                frame_percent(index, total),
                2,
                ChunkProgress {
                    current: index as u32 + 1,
                    total: total as u32,
                },
            );
        },
    )
    .await;

    sink.report("Creating narrative...", 80, 3, ChunkProgress::default());
    let narrative = narrative::synthesize(
        &client,
        provider,
        &api_key,
        &descriptions,
        &transcript.segments,
        source.duration,
        config.chunk_duration,
        &config.retry,
        |current, total| {
            sink.report(
                "Creating narrative...",
                80,
                3,
                ChunkProgress { current, total },
            );
        },
    )
    .await?;

    sink.report("Almost done...", 95, 4, ChunkProgress::default());
    let contents = format!("{}\n", narrative.trim_end());
    fs::write(output_path, contents)
        .await
        .map_err(|source| NovelizeError::OutputWriteFailed {
            path: output_path.to_path_buf(),
            source,
        })?;

    sink.report("Completed", 100, 4, ChunkProgress::default());
    Ok(())
}

/// Linear 30→80 mapping over the frame index.
pub(crate) fn frame_percent(index: usize, total: usize) -> u32 {
    30 + (index * 50 / total.max(1)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_percent_spans_thirty_to_eighty() {
        assert_eq!(frame_percent(0, 180), 30);
        assert_eq!(frame_percent(90, 180), 55);
        assert_eq!(frame_percent(179, 180), 79);
    }

    #[test]
    fn frame_percent_is_monotone() {
        let total = 37;
        let mut last = 0;
        for index in 0..total {
            let percent = frame_percent(index, total);
            assert!(percent >= last);
            assert!((30..80).contains(&percent));
            last = percent;
        }
    }

    #[test]
    fn single_frame_reports_stage_floor() {
        assert_eq!(frame_percent(0, 1), 30);
    }
}
