use std::path::Path;

use ffmpeg_next as ffmpeg;
use image::codecs::jpeg::JpegEncoder;

use crate::error::{NovelizeError, Result};
use crate::probe::init_ffmpeg;
use crate::types::FrameSample;

pub const JPEG_QUALITY: u8 = 85;

// Seeking lands on the keyframe before the target; bound how far we decode
// forward from there before giving up on an instant.
const MAX_PACKETS_PER_SEEK: usize = 256;

/// Sample instants `start, start+interval, …` while `< end`.
pub fn sample_instants(start: f64, end: f64, interval: u32) -> Vec<f64> {
    let mut instants = Vec::new();
    if interval == 0 {
        return instants;
    }
    let mut k = 0u64;
    loop {
        let t = start + (k * interval as u64) as f64;
        if t >= end {
            break;
        }
        instants.push(t);
        k += 1;
    }
    instants
}

/// Pull one JPEG-encoded frame per `interval` seconds across `[start, end)`.
///
/// An instant whose frame cannot be read is skipped without a placeholder,
/// so the result can be shorter than the candidate instant list. Only a
/// source that cannot be opened at all is an error here.
pub fn sample_frames(
    video_path: &Path,
    start: f64,
    end: f64,
    interval: u32,
) -> Result<Vec<FrameSample>> {
    init_ffmpeg(video_path)?;

    let sampling_failed = |reason: String| NovelizeError::SamplingFailed {
        path: video_path.to_path_buf(),
        reason,
    };

    let mut ictx = ffmpeg::format::input(&video_path).map_err(|e| sampling_failed(e.to_string()))?;

    let (stream_index, time_base) = {
        let stream = ictx
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| sampling_failed("no video stream".to_string()))?;
        (stream.index(), stream.time_base())
    };

    let parameters = ictx
        .stream(stream_index)
        .ok_or_else(|| sampling_failed("video stream disappeared".to_string()))?
        .parameters();
    let mut decoder = ffmpeg::codec::context::Context::from_parameters(parameters)
        .map_err(|e| sampling_failed(e.to_string()))?
        .decoder()
        .video()
        .map_err(|e| sampling_failed(e.to_string()))?;

    let mut scaler = ffmpeg::software::scaling::Context::get(
        decoder.format(),
        decoder.width(),
        decoder.height(),
        ffmpeg::format::Pixel::RGB24,
        decoder.width(),
        decoder.height(),
        ffmpeg::software::scaling::Flags::BILINEAR,
    )
    .map_err(|e| sampling_failed(e.to_string()))?;

    let mut samples = Vec::new();
    for target in sample_instants(start, end, interval) {
        if let Some(image) = grab_frame_at(&mut ictx, &mut decoder, &mut scaler, stream_index, time_base, target)
        {
            samples.push(FrameSample {
                timestamp: target as u32,
                image,
            });
        }
    }

    Ok(samples)
}

fn grab_frame_at(
    ictx: &mut ffmpeg::format::context::Input,
    decoder: &mut ffmpeg::decoder::Video,
    scaler: &mut ffmpeg::software::scaling::Context,
    stream_index: usize,
    time_base: ffmpeg::Rational,
    target: f64,
) -> Option<Vec<u8>> {
    let ts = (target * ffmpeg::ffi::AV_TIME_BASE as f64) as i64;
    if ictx.seek(ts, ..ts).is_err() {
        return None;
    }
    decoder.flush();

    let tb = time_base.numerator() as f64 / time_base.denominator() as f64;
    let mut packets_read = 0usize;
    let mut decoded = ffmpeg::frame::Video::empty();

    for (stream, packet) in ictx.packets() {
        if stream.index() != stream_index {
            continue;
        }
        packets_read += 1;
        if packets_read > MAX_PACKETS_PER_SEEK {
            break;
        }
        if decoder.send_packet(&packet).is_err() {
            continue;
        }
        while decoder.receive_frame(&mut decoded).is_ok() {
            let frame_time = decoded.timestamp().map(|pts| pts as f64 * tb).unwrap_or(0.0);
            if frame_time + 1e-3 < target {
                continue;
            }
            let mut rgb = ffmpeg::frame::Video::empty();
            if scaler.run(&decoded, &mut rgb).is_err() {
                return None;
            }
            return encode_jpeg(&rgb);
        }
    }
    None
}

fn encode_jpeg(frame: &ffmpeg::frame::Video) -> Option<Vec<u8>> {
    let width = frame.width();
    let height = frame.height();
    let stride = frame.stride(0);
    let data = frame.data(0);
    let row_len = width as usize * 3;

    // scaled frames can be padded past width*3 per row
    let mut pixels = Vec::with_capacity(row_len * height as usize);
    for y in 0..height as usize {
        let offset = y * stride;
        pixels.extend_from_slice(data.get(offset..offset + row_len)?);
    }

    let buffer = image::RgbImage::from_raw(width, height, pixels)?;
    let mut jpeg = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY);
    encoder
        .encode(&buffer, width, height, image::ExtendedColorType::Rgb8)
        .ok()?;
    Some(jpeg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thirty_seconds_at_ten_yields_three_instants() {
        assert_eq!(sample_instants(0.0, 30.0, 10), vec![0.0, 10.0, 20.0]);
    }

    #[test]
    fn instants_stay_strictly_below_end() {
        for (duration, interval) in [(30.0, 10), (25.0, 10), (600.0, 10), (9.9, 10)] {
            let instants = sample_instants(0.0, duration, interval);
            assert!(instants.iter().all(|t| *t < duration));
            let bound = (duration / interval as f64).ceil() as usize;
            assert!(instants.len() <= bound);
        }
    }

    #[test]
    fn instants_are_evenly_spaced_and_increasing() {
        let instants = sample_instants(600.0, 1200.0, 10);
        assert_eq!(instants.first(), Some(&600.0));
        for pair in instants.windows(2) {
            assert_eq!(pair[1] - pair[0], 10.0);
        }
    }

    #[test]
    fn zero_duration_yields_no_instants() {
        assert!(sample_instants(0.0, 0.0, 10).is_empty());
    }

    #[test]
    fn zero_interval_yields_no_instants() {
        assert!(sample_instants(0.0, 30.0, 0).is_empty());
    }

    #[test]
    fn unopenable_source_is_sampling_failed() {
        let err = sample_frames(Path::new("/nonexistent/clip.mp4"), 0.0, 10.0, 10).unwrap_err();
        assert!(matches!(err, NovelizeError::SamplingFailed { .. }));
    }
}
