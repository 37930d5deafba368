use crate::types::DialogueSegment;

/// Segments overlapping the half-open window `[start, end)`:
/// `segment.start < end && segment.end > start`.
pub fn dialogue_for_window(
    segments: &[DialogueSegment],
    start: f64,
    end: f64,
) -> Vec<&DialogueSegment> {
    segments
        .iter()
        .filter(|seg| seg.start < end && seg.end > start)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(start: f64, end: f64, text: &str) -> DialogueSegment {
        DialogueSegment {
            start,
            end,
            text: text.to_string(),
        }
    }

    #[test]
    fn overlap_is_half_open() {
        let segments = vec![seg(5.0, 9.0, "hi")];

        assert_eq!(dialogue_for_window(&segments, 8.0, 12.0).len(), 1);
        assert!(dialogue_for_window(&segments, 9.0, 12.0).is_empty());
        assert!(dialogue_for_window(&segments, 0.0, 5.0).is_empty());
    }

    #[test]
    fn segment_spanning_the_whole_window_matches() {
        let segments = vec![seg(0.0, 100.0, "long monologue")];
        assert_eq!(dialogue_for_window(&segments, 40.0, 50.0).len(), 1);
    }

    #[test]
    fn emission_order_is_preserved() {
        let segments = vec![seg(12.0, 15.0, "second"), seg(2.0, 4.0, "first")];
        let hits = dialogue_for_window(&segments, 0.0, 30.0);
        assert_eq!(hits[0].text, "second");
        assert_eq!(hits[1].text, "first");
    }

    #[test]
    fn empty_transcript_is_fine() {
        assert!(dialogue_for_window(&[], 0.0, 30.0).is_empty());
    }
}
