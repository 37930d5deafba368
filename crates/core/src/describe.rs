use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;

use crate::chat::chat_completion;
use crate::error::Result;
use crate::provider::Provider;
use crate::retry::RetryPolicy;
use crate::types::{FrameDescription, FrameSample};

/// Substituted when a frame's caption call fails for good; keeps the
/// description sequence index-aligned with the sample sequence.
pub const FAILED_CAPTION: &str = "[Could not analyze]";

pub const CAPTION_TOKEN_BUDGET: u32 = 500;

const CAPTION_PROMPT: &str = "Describe what is visible in this video frame in 1-2 sentences. \
Focus on the main action, the people present, and the setting. \
State only what can actually be seen; do not invent names, backstory, or \
events outside the frame. If something is unclear or ambiguous, say so \
rather than guessing.";

/// Caption one frame, retrying rate-limited calls with exponential backoff.
/// Any other failure propagates immediately.
pub async fn describe_frame(
    client: &reqwest::Client,
    provider: &Provider,
    api_key: &str,
    frame: &FrameSample,
    retry: &RetryPolicy,
) -> Result<String> {
    let image_base64 = BASE64.encode(&frame.image);
    let messages = serde_json::json!([
        {
            "role": "user",
            "content": [
                {
                    "type": "image_url",
                    "image_url": {
                        "url": format!("data:image/jpeg;base64,{image_base64}")
                    }
                },
                {
                    "type": "text",
                    "text": CAPTION_PROMPT
                }
            ]
        }
    ]);

    let mut attempt = 0;
    loop {
        match chat_completion(client, provider, api_key, messages.clone(), CAPTION_TOKEN_BUDGET)
            .await
        {
            Ok(caption) => return Ok(caption),
            Err(err) if retry.should_retry(&err, attempt) => {
                tokio::time::sleep(retry.delay_for(attempt)).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Caption every sample in order. One description comes back per sample:
/// an exhausted or unrecoverable call yields [`FAILED_CAPTION`] instead of
/// shortening the sequence. `on_frame(index)` fires before each call, and a
/// pacing delay separates successive calls (skipped after the last).
pub async fn describe_frames(
    client: &reqwest::Client,
    provider: &Provider,
    api_key: &str,
    samples: &[FrameSample],
    retry: &RetryPolicy,
    request_delay: Duration,
    mut on_frame: impl FnMut(usize),
) -> Vec<FrameDescription> {
    let mut descriptions = Vec::with_capacity(samples.len());

    for (index, sample) in samples.iter().enumerate() {
        on_frame(index);

        let caption = match describe_frame(client, provider, api_key, sample, retry).await {
            Ok(caption) => caption,
            Err(err) => {
                tracing::warn!(
                    timestamp = sample.timestamp,
                    "frame could not be described: {err}"
                );
                FAILED_CAPTION.to_string()
            }
        };
        descriptions.push(FrameDescription {
            timestamp: sample.timestamp,
            caption,
        });

        if index + 1 < samples.len() {
            tokio::time::sleep(request_delay).await;
        }
    }

    descriptions
}
