use crate::align::dialogue_for_window;
use crate::chat::chat_completion;
use crate::error::{NovelizeError, Result};
use crate::format::{format_dialogue, format_snapshots};
use crate::provider::Provider;
use crate::retry::RetryPolicy;
use crate::types::{DialogueSegment, FrameDescription};

/// A response shorter than this cannot be a usable narrative and is
/// retried as a soft failure.
pub const MIN_NARRATIVE_CHARS: usize = 50;

const FINAL_TOKEN_BUDGET: u32 = 8000;
const CHUNK_TOKEN_BUDGET: u32 = 4000;

/// Produce the full prose narrative from ordered captions and dialogue.
///
/// Single-pass when the video fits one chunk, otherwise one mini-narrative
/// per fixed window followed by exactly one combine pass. `on_chunk` fires
/// before each per-window call in chunked mode.
pub async fn synthesize(
    client: &reqwest::Client,
    provider: &Provider,
    api_key: &str,
    descriptions: &[FrameDescription],
    transcript: &[DialogueSegment],
    duration: f64,
    chunk_duration: u32,
    retry: &RetryPolicy,
    mut on_chunk: impl FnMut(u32, u32),
) -> Result<String> {
    if descriptions.is_empty() {
        return Err(NovelizeError::SynthesisFailed {
            reason: "no frame descriptions to narrate".to_string(),
        });
    }

    if duration <= chunk_duration as f64 {
        let dialogue = dialogue_for_window(transcript, 0.0, duration);
        let prompt = scene_prompt(&format_snapshots(descriptions), &format_dialogue(&dialogue));
        return synthesis_call(client, provider, api_key, &prompt, FINAL_TOKEN_BUDGET, retry).await;
    }

    let windows = chunk_windows(duration, chunk_duration);
    let total = windows.len() as u32;
    let mut chunk_narratives = Vec::new();

    for (index, (win_start, win_end)) in windows.into_iter().enumerate() {
        on_chunk(index as u32 + 1, total);

        let captions = captions_in_window(descriptions, win_start, win_end);
        let dialogue = dialogue_for_window(transcript, win_start, win_end);
        if captions.is_empty() && dialogue.is_empty() {
            // nothing was observed in this window
            continue;
        }

        let prompt = scene_prompt(&format_snapshots(&captions), &format_dialogue(&dialogue));
        let mini =
            synthesis_call(client, provider, api_key, &prompt, CHUNK_TOKEN_BUDGET, retry).await?;
        chunk_narratives.push(mini);
    }

    if chunk_narratives.is_empty() {
        return Err(NovelizeError::SynthesisFailed {
            reason: "no chunk produced a narrative".to_string(),
        });
    }

    let prompt = combine_prompt(&chunk_narratives);
    synthesis_call(client, provider, api_key, &prompt, FINAL_TOKEN_BUDGET, retry).await
}

/// Fixed windows `[k*chunk, (k+1)*chunk)` covering `[0, duration)`; the
/// last window is truncated at `duration`.
pub(crate) fn chunk_windows(duration: f64, chunk_duration: u32) -> Vec<(f64, f64)> {
    let mut windows = Vec::new();
    let mut start = 0.0;
    while start < duration {
        let end = (start + chunk_duration as f64).min(duration);
        windows.push((start, end));
        start = end;
    }
    windows
}

pub(crate) fn captions_in_window(
    descriptions: &[FrameDescription],
    start: f64,
    end: f64,
) -> Vec<FrameDescription> {
    descriptions
        .iter()
        .filter(|d| {
            let t = d.timestamp as f64;
            t >= start && t < end
        })
        .cloned()
        .collect()
}

fn scene_prompt(snapshots: &str, dialogue: &str) -> String {
    let dialogue_block = if dialogue.is_empty() {
        String::new()
    } else {
        format!("\n\nDialogue (in the order spoken):\n{dialogue}")
    };
    format!(
        "Here are timed visual snapshots from a video, and the dialogue spoken during it.\n\
Write what happens as flowing narrative prose, the way a novel would tell it.\n\
Use only the evidence below. Do not invent characters, names, or events that are not \
shown or spoken. When people speak, quote the dialogue provided rather than inventing \
lines, and weave it in naturally; it fills the gaps between snapshots. If a snapshot is \
ambiguous, stay vague rather than guessing. Never mention frames, snapshots, timestamps, \
or camera angles.\n\n\
Visual snapshots:\n{snapshots}{dialogue_block}\n\n\
Write the narrative:"
    )
}

fn combine_prompt(chunk_narratives: &[String]) -> String {
    let formatted = chunk_narratives
        .iter()
        .enumerate()
        .map(|(i, narrative)| format!("Part {}:\n{}", i + 1, narrative))
        .collect::<Vec<_>>()
        .join("\n\n---\n\n");
    format!(
        "Combine these narrative sections into one flowing story with smooth transitions.\n\
Keep the concrete details and quoted dialogue that appear below; remove redundancy where \
sections overlap. Do not add events of your own, and never mention parts, sections, or \
that the text was assembled.\n\n\
Sections:\n{formatted}\n\n\
Write the combined narrative:"
    )
}

/// One synthesis call. Rate limits and too-short output retry with backoff;
/// anything else, or an exhausted retry budget, is a fatal synthesis error.
async fn synthesis_call(
    client: &reqwest::Client,
    provider: &Provider,
    api_key: &str,
    prompt: &str,
    budget: u32,
    retry: &RetryPolicy,
) -> Result<String> {
    let messages = serde_json::json!([{ "role": "user", "content": prompt }]);

    let mut attempt = 0;
    loop {
        match chat_completion(client, provider, api_key, messages.clone(), budget).await {
            Ok(text) if text.trim().chars().count() >= MIN_NARRATIVE_CHARS => {
                return Ok(text.trim().to_string());
            }
            Ok(text) => {
                if attempt + 1 >= retry.max_attempts {
                    return Err(NovelizeError::SynthesisFailed {
                        reason: format!(
                            "model returned {} characters after {} attempts",
                            text.trim().chars().count(),
                            retry.max_attempts
                        ),
                    });
                }
                tokio::time::sleep(retry.delay_for(attempt)).await;
                attempt += 1;
            }
            Err(err) if retry.should_retry(&err, attempt) => {
                tokio::time::sleep(retry.delay_for(attempt)).await;
                attempt += 1;
            }
            Err(err) => {
                return Err(NovelizeError::SynthesisFailed {
                    reason: err.to_string(),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_count_is_duration_over_chunk_rounded_up() {
        assert_eq!(chunk_windows(600.0, 600).len(), 1);
        assert_eq!(chunk_windows(601.0, 600).len(), 2);
        assert_eq!(chunk_windows(1800.0, 600).len(), 3);
        assert_eq!(chunk_windows(1850.0, 600).len(), 4);
    }

    #[test]
    fn last_window_is_truncated_at_duration() {
        let windows = chunk_windows(1850.0, 600);
        assert_eq!(windows[0], (0.0, 600.0));
        assert_eq!(windows[3], (1800.0, 1850.0));
    }

    #[test]
    fn windows_tile_without_gaps() {
        let windows = chunk_windows(1850.0, 600);
        for pair in windows.windows(2) {
            assert_eq!(pair[0].1, pair[1].0);
        }
    }

    #[test]
    fn captions_filter_is_half_open() {
        let descriptions: Vec<FrameDescription> = [0u32, 10, 590, 600, 610]
            .iter()
            .map(|&timestamp| FrameDescription {
                timestamp,
                caption: format!("caption at {timestamp}"),
            })
            .collect();

        let first = captions_in_window(&descriptions, 0.0, 600.0);
        assert_eq!(first.len(), 3);
        assert_eq!(first.last().unwrap().timestamp, 590);

        let second = captions_in_window(&descriptions, 600.0, 1200.0);
        assert_eq!(second.len(), 2);
        assert_eq!(second[0].timestamp, 600);
    }

    #[test]
    fn scene_prompt_omits_dialogue_block_for_silent_windows() {
        let prompt = scene_prompt("[0s] An empty street.", "");
        assert!(!prompt.contains("Dialogue"));
        let with_dialogue = scene_prompt("[0s] An empty street.", "- Hello?");
        assert!(with_dialogue.contains("Dialogue (in the order spoken):\n- Hello?"));
    }
}
