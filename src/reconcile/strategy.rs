use crate::models::TranscriptionResult;

/// Which reconciliation path to take for one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Temporal overlap matching: spans carry usable timestamps
    Overlap,
    /// Sequential sentence distribution over the full-text blob
    Sequential,
}

/// Decide the reconciliation strategy from timestamp coverage alone.
///
/// Overlap matching needs at least half of the transcript spans to carry
/// both timestamps and text; anything less and the span timing is too
/// sparse to trust, so the full text is distributed sequentially instead.
pub fn choose_strategy(transcription: &TranscriptionResult) -> Strategy {
    if transcription.timestamp_coverage() >= 0.5 {
        Strategy::Overlap
    } else {
        Strategy::Sequential
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TranscriptSpan;

    fn result_with(timed: usize, untimed: usize) -> TranscriptionResult {
        let mut segments = Vec::new();
        for i in 0..timed {
            segments.push(TranscriptSpan::new(i as f64, i as f64 + 1.0, "text"));
        }
        for _ in 0..untimed {
            segments.push(TranscriptSpan::text_only("text"));
        }
        TranscriptionResult {
            segments,
            full_text: String::new(),
        }
    }

    #[test]
    fn test_full_coverage_uses_overlap() {
        assert_eq!(choose_strategy(&result_with(4, 0)), Strategy::Overlap);
    }

    #[test]
    fn test_no_segments_uses_sequential() {
        assert_eq!(choose_strategy(&result_with(0, 0)), Strategy::Sequential);
    }

    #[test]
    fn test_exactly_half_coverage_uses_overlap() {
        assert_eq!(choose_strategy(&result_with(2, 2)), Strategy::Overlap);
    }

    #[test]
    fn test_below_half_coverage_uses_sequential() {
        assert_eq!(choose_strategy(&result_with(1, 3)), Strategy::Sequential);
    }
}
