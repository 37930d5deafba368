use std::path::Path;

use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

use crate::error::{NovelizeError, Result};
use crate::types::{DialogueSegment, Transcript};

/// Whisper emits stray punctuation and hum for non-speech audio; anything
/// this short is noise, not dialogue.
pub(crate) fn is_dialogue(text: &str) -> bool {
    text.trim().chars().count() > 2
}

/// Run Whisper over the extracted audio and return time-stamped dialogue.
///
/// An empty segment list is a valid outcome (silent video) and must be
/// tolerated downstream.
pub fn transcribe_audio(audio_path: &Path, model_path: &Path) -> Result<Transcript> {
    if !model_path.exists() {
        return Err(NovelizeError::TranscriptionUnavailable {
            path: model_path.to_path_buf(),
        });
    }
    let model_path_str = model_path
        .to_str()
        .ok_or_else(|| NovelizeError::TranscriptionFailed {
            reason: "model path is not valid UTF-8".to_string(),
        })?;

    let mut reader =
        hound::WavReader::open(audio_path).map_err(|e| NovelizeError::TranscriptionFailed {
            reason: format!("failed to read {}: {e}", audio_path.display()),
        })?;
    let samples: Vec<f32> = reader
        .samples::<i16>()
        .map(|s| s.map(|v| v as f32 / i16::MAX as f32))
        .collect::<std::result::Result<_, _>>()
        .map_err(|e| NovelizeError::TranscriptionFailed {
            reason: format!("malformed wav data: {e}"),
        })?;

    let ctx = WhisperContext::new_with_params(model_path_str, WhisperContextParameters::default())
        .map_err(|e| NovelizeError::TranscriptionFailed {
            reason: format!("failed to load model: {e}"),
        })?;

    let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
    params.set_language(Some("auto"));
    params.set_translate(false);
    params.set_print_special(false);
    params.set_print_progress(false);
    params.set_print_realtime(false);
    params.set_print_timestamps(false);

    let mut state = ctx
        .create_state()
        .map_err(|e| NovelizeError::TranscriptionFailed {
            reason: format!("failed to create state: {e}"),
        })?;
    state
        .full(params, &samples)
        .map_err(|e| NovelizeError::TranscriptionFailed {
            reason: format!("failed to run model: {e}"),
        })?;

    let mut text = String::new();
    let mut segments: Vec<DialogueSegment> = Vec::new();

    for segment in state.as_iter() {
        let seg_text = match segment.to_str() {
            Ok(s) => s,
            Err(_) => continue,
        };
        if !is_dialogue(seg_text) {
            continue;
        }
        segments.push(DialogueSegment {
            start: segment.start_timestamp() as f64 / 100.0,
            end: segment.end_timestamp() as f64 / 100.0,
            text: seg_text.trim().to_string(),
        });
        text.push_str(seg_text);
    }

    let language_index = state.full_lang_id_from_state();
    let language = whisper_rs::get_lang_str(language_index);

    Ok(Transcript {
        language: language.unwrap_or("unknown").to_string(),
        segments,
        text,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_segments_are_noise() {
        assert!(!is_dialogue(""));
        assert!(!is_dialogue("  "));
        assert!(!is_dialogue(" uh "));
        assert!(!is_dialogue("ok"));
    }

    #[test]
    fn real_dialogue_is_kept() {
        assert!(is_dialogue("Hey!"));
        assert!(is_dialogue(" We need to leave. "));
    }

    #[test]
    fn missing_model_is_unavailable() {
        let err = transcribe_audio(
            Path::new("/tmp/audio.wav"),
            Path::new("/nonexistent/ggml-tiny.bin"),
        )
        .unwrap_err();
        assert!(matches!(err, NovelizeError::TranscriptionUnavailable { .. }));
    }
}
