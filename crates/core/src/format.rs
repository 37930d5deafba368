use crate::types::{DialogueSegment, FrameDescription};

/// Format seconds as MM:SS timestamp
pub fn format_timestamp(seconds: f64) -> String {
    let mins = (seconds / 60.0) as u32;
    let secs = (seconds % 60.0) as u32;
    format!("{:02}:{:02}", mins, secs)
}

/// Format captions as `[Ts] caption` evidence lines for synthesis prompts.
pub fn format_snapshots(descriptions: &[FrameDescription]) -> String {
    descriptions
        .iter()
        .map(|d| format!("[{}s] {}", d.timestamp, d.caption))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Format dialogue segments as bullet lines for synthesis prompts.
pub fn format_dialogue(segments: &[&DialogueSegment]) -> String {
    segments
        .iter()
        .map(|seg| format!("- {}", seg.text.trim()))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_render_as_minutes_and_seconds() {
        assert_eq!(format_timestamp(0.0), "00:00");
        assert_eq!(format_timestamp(75.0), "01:15");
        assert_eq!(format_timestamp(619.4), "10:19");
    }

    #[test]
    fn snapshots_keep_timestamp_prefix_and_order() {
        let descriptions = vec![
            FrameDescription {
                timestamp: 0,
                caption: "A man waits at a bus stop.".to_string(),
            },
            FrameDescription {
                timestamp: 10,
                caption: "The bus arrives.".to_string(),
            },
        ];
        let block = format_snapshots(&descriptions);
        assert!(block.starts_with("[0s] A man waits"));
        assert!(block.contains("\n\n[10s] The bus arrives."));
    }

    #[test]
    fn dialogue_lines_are_bulleted_and_trimmed() {
        let first = DialogueSegment {
            start: 1.0,
            end: 2.0,
            text: "  Where were you?  ".to_string(),
        };
        let second = DialogueSegment {
            start: 3.0,
            end: 4.0,
            text: "Stuck in traffic.".to_string(),
        };
        let block = format_dialogue(&[&first, &second]);
        assert_eq!(block, "- Where were you?\n- Stuck in traffic.");
    }
}
