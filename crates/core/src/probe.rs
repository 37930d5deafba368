use std::path::Path;

use ffmpeg_next as ffmpeg;

use crate::error::{NovelizeError, Result};
use crate::types::VideoSource;

pub(crate) fn init_ffmpeg(path: &Path) -> Result<()> {
    ffmpeg::init().map_err(|e| NovelizeError::OpenFailed {
        path: path.to_path_buf(),
        reason: format!("ffmpeg initialization failed: {e}"),
    })?;
    // errors only; libav is chatty at the default level
    unsafe {
        ffmpeg::sys::av_log_set_level(ffmpeg::sys::AV_LOG_ERROR as i32);
    }
    Ok(())
}

/// Read container metadata: frame rate, frame count and duration.
pub fn analyze(path: &Path) -> Result<VideoSource> {
    init_ffmpeg(path)?;

    let ictx = ffmpeg::format::input(&path).map_err(|e| NovelizeError::OpenFailed {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let stream = ictx
        .streams()
        .best(ffmpeg::media::Type::Video)
        .ok_or_else(|| NovelizeError::OpenFailed {
            path: path.to_path_buf(),
            reason: "no video stream".to_string(),
        })?;

    let rate = stream.avg_frame_rate();
    let fps = if rate.denominator() > 0 {
        rate.numerator() as f64 / rate.denominator() as f64
    } else {
        0.0
    };

    let mut total_frames = stream.frames();
    if total_frames <= 0 {
        // Some containers carry no frame count; estimate from the container
        // duration instead.
        let container_secs = (ictx.duration().max(0)) as f64 / ffmpeg::ffi::AV_TIME_BASE as f64;
        total_frames = (container_secs * fps) as i64;
    }

    let duration = if fps > 0.0 {
        total_frames as f64 / fps
    } else {
        0.0
    };

    Ok(VideoSource {
        path: path.to_path_buf(),
        fps,
        total_frames,
        duration,
    })
}
