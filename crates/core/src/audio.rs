use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use tokio::process::Command;
use tokio::time;

use crate::error::{NovelizeError, Result};

/// Callback fed whole percents while a stage runs.
pub type ProgressFn = Arc<dyn Fn(u32) + Send + Sync>;

/// Upper bound on one ffmpeg run.
pub const EXTRACTION_TIMEOUT_SECS: u64 = 60 * 60;

// ffmpeg reports nothing usable while demuxing, so the audio stage ticks a
// wall-clock heuristic through an open sub-range and closes with one
// authoritative value when the process exits.
const TICK_START: u32 = 10;
const TICK_CEILING: u32 = 19;
const STAGE_DONE: u32 = 20;
const TICK_PERIOD: Duration = Duration::from_secs(2);

/// Extract the audio track to mono 16kHz PCM WAV using ffmpeg.
///
/// `on_progress` receives heuristic percents in `10..=19` while the external
/// process runs and exactly one final `20` after the output is verified.
pub async fn extract_audio(
    video_path: &Path,
    audio_path: &Path,
    on_progress: Option<ProgressFn>,
) -> Result<()> {
    let mut cmd = Command::new("ffmpeg");
    cmd.arg("-y")
        .arg("-i")
        .arg(video_path)
        .arg("-vn")
        .arg("-acodec")
        .arg("pcm_s16le")
        .arg("-ar")
        .arg("16000")
        .arg("-ac")
        .arg("1")
        .arg("-loglevel")
        .arg("error")
        .arg(audio_path)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = cmd.spawn().map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            NovelizeError::ExtractionFailed {
                reason: "ffmpeg not found on PATH; install FFmpeg".to_string(),
            }
        } else {
            NovelizeError::IoError(e)
        }
    })?;

    let ticker = on_progress.as_ref().map(|report| {
        let report = Arc::clone(report);
        tokio::spawn(async move {
            let mut percent = TICK_START;
            let mut timer = time::interval(TICK_PERIOD);
            loop {
                timer.tick().await;
                report(percent);
                if percent < TICK_CEILING {
                    percent += 1;
                }
            }
        })
    });

    let waited = time::timeout(
        Duration::from_secs(EXTRACTION_TIMEOUT_SECS),
        child.wait_with_output(),
    )
    .await;

    if let Some(handle) = ticker {
        handle.abort();
    }

    let output = match waited {
        Ok(result) => result?,
        // kill_on_drop reaps the child when the wait future is dropped
        Err(_) => return Err(NovelizeError::ExtractionTimeout(EXTRACTION_TIMEOUT_SECS)),
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(classify_failure(video_path, &stderr));
    }

    let metadata = tokio::fs::metadata(audio_path)
        .await
        .map_err(|_| NovelizeError::ExtractionFailed {
            reason: "ffmpeg reported success but wrote no output file".to_string(),
        })?;
    if metadata.len() == 0 {
        // tool exited zero but produced nothing to transcribe
        return Err(NovelizeError::NoAudioTrack);
    }

    if let Some(report) = on_progress {
        report(STAGE_DONE);
    }

    Ok(())
}

/// Best-effort mapping of ffmpeg diagnostics onto the error taxonomy,
/// checked in priority order.
fn classify_failure(video_path: &Path, stderr: &str) -> NovelizeError {
    if stderr.contains("No such file") {
        NovelizeError::SourceNotFound {
            path: video_path.to_path_buf(),
        }
    } else if stderr.contains("Invalid data") || stderr.contains("could not find codec") {
        NovelizeError::UnsupportedMedia {
            reason: diagnostic_tail(stderr),
        }
    } else if stderr.contains("does not contain any stream") || stderr.contains("matches no streams")
    {
        NovelizeError::NoAudioTrack
    } else {
        NovelizeError::ExtractionFailed {
            reason: diagnostic_tail(stderr),
        }
    }
}

fn diagnostic_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.lines().collect();
    let start = lines.len().saturating_sub(10);
    lines[start..].join("\n")
}
