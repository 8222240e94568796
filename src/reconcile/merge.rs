use tracing::debug;

use crate::models::SpeakerTurn;

/// Coalesce consecutive same-speaker turns separated by short gaps.
///
/// Diarization models often fragment a single utterance into many short
/// turns with brief pauses. Merging before reconciliation reduces spurious
/// segment boundaries. Two turns merge only when the gap between them is at
/// most `max_gap` seconds AND no other speaker's turn straddles the gap, so
/// another speaker's words can never be folded into the wrong run.
///
/// Input order is not assumed; output is chronological.
pub fn merge_speaker_runs(turns: &[SpeakerTurn], max_gap: f64) -> Vec<SpeakerTurn> {
    if turns.is_empty() {
        return Vec::new();
    }

    let mut sorted: Vec<SpeakerTurn> = turns.to_vec();
    sorted.sort_by(|a, b| a.start.total_cmp(&b.start));

    let mut merged: Vec<SpeakerTurn> = Vec::new();
    let mut current = sorted[0].clone();

    for turn in &sorted[1..] {
        let gap = turn.start - current.end;
        let same_speaker = turn.speaker == current.speaker;

        let interleaved = gap > 0.0
            && sorted.iter().any(|other| {
                other.speaker != current.speaker
                    && other.start < turn.start
                    && other.end > current.end
            });

        if same_speaker && gap <= max_gap && !interleaved {
            if turn.end > current.end {
                current.end = turn.end;
            }
        } else {
            merged.push(current);
            current = turn.clone();
        }
    }
    merged.push(current);

    debug!(
        before = turns.len(),
        after = merged.len(),
        "merged consecutive speaker runs"
    );

    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turn(start: f64, end: f64, speaker: &str) -> SpeakerTurn {
        SpeakerTurn::new(start, end, speaker)
    }

    #[test]
    fn test_empty_input() {
        assert!(merge_speaker_runs(&[], 5.0).is_empty());
    }

    #[test]
    fn test_single_turn_unchanged() {
        let turns = vec![turn(1.0, 4.0, "A")];
        let merged = merge_speaker_runs(&turns, 5.0);
        assert_eq!(merged, turns);
    }

    #[test]
    fn test_adjacent_same_speaker_merge() {
        // {0,5,A},{5,6,A},{6,15,B} -> {0,6,A},{6,15,B}
        let turns = vec![turn(0.0, 5.0, "A"), turn(5.0, 6.0, "A"), turn(6.0, 15.0, "B")];
        let merged = merge_speaker_runs(&turns, 5.0);
        assert_eq!(merged, vec![turn(0.0, 6.0, "A"), turn(6.0, 15.0, "B")]);
    }

    #[test]
    fn test_gap_within_threshold_merges() {
        let turns = vec![turn(0.0, 5.0, "A"), turn(9.0, 12.0, "A")];
        let merged = merge_speaker_runs(&turns, 5.0);
        assert_eq!(merged, vec![turn(0.0, 12.0, "A")]);
    }

    #[test]
    fn test_gap_beyond_threshold_splits() {
        let turns = vec![turn(0.0, 5.0, "A"), turn(11.0, 12.0, "A")];
        let merged = merge_speaker_runs(&turns, 5.0);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_interleaved_speaker_blocks_merge() {
        // B occupies the gap between the two A turns
        let turns = vec![
            turn(0.0, 5.0, "A"),
            turn(5.5, 7.0, "B"),
            turn(7.5, 9.0, "A"),
        ];
        let merged = merge_speaker_runs(&turns, 5.0);
        assert_eq!(merged.len(), 3);
        assert_eq!(merged[0], turn(0.0, 5.0, "A"));
        assert_eq!(merged[1], turn(5.5, 7.0, "B"));
        assert_eq!(merged[2], turn(7.5, 9.0, "A"));
    }

    #[test]
    fn test_different_speakers_never_merge() {
        let turns = vec![turn(0.0, 5.0, "A"), turn(5.0, 10.0, "B")];
        let merged = merge_speaker_runs(&turns, 5.0);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_unsorted_input_is_tolerated() {
        let turns = vec![turn(6.0, 15.0, "B"), turn(5.0, 6.0, "A"), turn(0.0, 5.0, "A")];
        let merged = merge_speaker_runs(&turns, 5.0);
        assert_eq!(merged, vec![turn(0.0, 6.0, "A"), turn(6.0, 15.0, "B")]);
    }

    #[test]
    fn test_contained_turn_does_not_shrink_run() {
        // Second A turn ends before the first one; end must not move backwards
        let turns = vec![turn(0.0, 10.0, "A"), turn(2.0, 4.0, "A")];
        let merged = merge_speaker_runs(&turns, 5.0);
        assert_eq!(merged, vec![turn(0.0, 10.0, "A")]);
    }
}
