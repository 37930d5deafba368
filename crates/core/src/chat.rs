use crate::error::{NovelizeError, Result};
use crate::provider::Provider;

/// One chat-completions call; returns the assistant message content.
pub(crate) async fn chat_completion(
    client: &reqwest::Client,
    provider: &Provider,
    api_key: &str,
    messages: serde_json::Value,
    max_completion_tokens: u32,
) -> Result<String> {
    let config = provider.config();

    let response = client
        .post(config.api_url)
        .header("Content-Type", "application/json")
        .header("Authorization", format!("Bearer {}", api_key))
        .json(&serde_json::json!({
            "model": config.model,
            "messages": messages,
            "max_completion_tokens": max_completion_tokens,
        }))
        .send()
        .await?;

    let status = response.status();
    let body = response.text().await?;

    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Err(NovelizeError::RateLimited {
            message: truncate(&body, 300),
        });
    }
    if !status.is_success() {
        return Err(NovelizeError::ApiFailed {
            status: status.as_u16(),
            message: truncate(&body, 300),
        });
    }

    let parsed: serde_json::Value = serde_json::from_str(&body)?;
    let content = parsed["choices"][0]["message"]["content"]
        .as_str()
        .ok_or_else(|| NovelizeError::ApiFailed {
            status: status.as_u16(),
            message: format!("Invalid API response: {}", truncate(&body, 300)),
        })?;

    Ok(content.to_string())
}

fn truncate(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        text.to_string()
    } else {
        text.chars().take(limit).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("short", 300), "short");
        let long = "é".repeat(400);
        assert_eq!(truncate(&long, 300).chars().count(), 300);
    }
}
