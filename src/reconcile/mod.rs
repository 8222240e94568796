pub mod merge;
pub mod overlap;
pub mod sentences;
pub mod strategy;
pub mod validate;

pub use merge::merge_speaker_runs;
pub use overlap::match_by_overlap;
pub use sentences::{distribute_sequential, fill_empty_segments, split_sentences};
pub use strategy::{choose_strategy, Strategy};
pub use validate::{validate, ValidationWarning};

use tracing::info;

use crate::models::{ReconciledSegment, SpeakerTurn, TranscriptionResult};

/// Tunable thresholds for reconciliation.
///
/// The defaults are the empirically validated values; they are deliberately
/// configuration rather than hidden constants so mismatch rates can be tuned
/// without touching the matching code.
#[derive(Debug, Clone)]
pub struct ReconcileConfig {
    /// Minimum overlap as a share of the turn's duration for a span to qualify
    pub min_overlap_ratio: f64,
    /// Absolute overlap floor in seconds (qualifies regardless of ratio)
    pub min_overlap_secs: f64,
    /// Weight of the overlap ratio in the match score
    pub ratio_weight: f64,
    /// Weight of the normalized overlap duration in the match score
    pub duration_weight: f64,
    /// Overlap duration (seconds) that counts as a full-strength match
    pub duration_normalizer: f64,
    /// Merge gap threshold for consecutive same-speaker turns, in seconds
    pub merge_max_gap: f64,
    /// Whether to merge same-speaker runs before matching
    pub merge_runs: bool,
    /// Warn when more than this fraction of segments has empty text
    pub max_empty_fraction: f64,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            min_overlap_ratio: 0.3,
            min_overlap_secs: 1.0,
            ratio_weight: 0.7,
            duration_weight: 0.3,
            duration_normalizer: 10.0,
            merge_max_gap: 5.0,
            merge_runs: true,
            max_empty_fraction: 0.2,
        }
    }
}

/// Result of one reconciliation run
#[derive(Debug, Clone)]
pub struct ReconcileReport {
    /// One segment per (possibly merged) input turn, in chronological order
    pub segments: Vec<ReconciledSegment>,
    /// Which strategy was selected
    pub strategy: Strategy,
    /// Non-fatal inconsistencies found by validation
    pub warnings: Vec<ValidationWarning>,
}

/// Merge diarization turns and transcription spans into one authoritative
/// segment list.
///
/// Pure computation over already-fetched data: no retries, no side effects
/// beyond logging, and running it twice on the same input yields identical
/// output. Strategy selection happens once per invocation; validation always
/// runs and never rejects the best-effort result.
pub fn reconcile(
    turns: &[SpeakerTurn],
    transcription: &TranscriptionResult,
    config: &ReconcileConfig,
) -> ReconcileReport {
    let working_turns: Vec<SpeakerTurn> = if config.merge_runs {
        merge_speaker_runs(turns, config.merge_max_gap)
    } else {
        let mut sorted = turns.to_vec();
        sorted.sort_by(|a, b| a.start.total_cmp(&b.start));
        sorted
    };

    let strategy = choose_strategy(transcription);
    info!(
        turns = working_turns.len(),
        spans = transcription.segments.len(),
        ?strategy,
        "reconciling transcription against diarization"
    );

    let mut segments = match strategy {
        Strategy::Overlap => {
            let mut segments = match_by_overlap(&working_turns, &transcription.segments, config);
            // Overlap matching can leave gaps; the full text covers them
            let any_empty = segments.iter().any(|s| !s.has_text());
            if any_empty && !transcription.full_text.trim().is_empty() {
                fill_empty_segments(&mut segments, &transcription.full_text);
            }
            segments
        }
        Strategy::Sequential => distribute_sequential(&transcription.full_text, &working_turns),
    };

    // Chunked processing may interleave turns from different sources
    segments.sort_by(|a, b| a.start.total_cmp(&b.start));

    let warnings = validate(&working_turns, &segments, config.max_empty_fraction);

    ReconcileReport {
        segments,
        strategy,
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TranscriptSpan;

    #[test]
    fn test_timed_spans_take_overlap_path() {
        let turns = vec![
            SpeakerTurn::new(0.0, 5.0, "A"),
            SpeakerTurn::new(5.0, 10.0, "B"),
        ];
        let transcription = TranscriptionResult {
            segments: vec![
                TranscriptSpan::new(0.0, 5.0, "hello"),
                TranscriptSpan::new(5.0, 10.0, "world"),
            ],
            full_text: "hello world".to_string(),
        };

        let report = reconcile(&turns, &transcription, &ReconcileConfig::default());
        assert_eq!(report.strategy, Strategy::Overlap);
        assert_eq!(report.segments.len(), 2);
        assert_eq!(report.segments[0].text, "hello");
        assert_eq!(report.segments[1].text, "world");
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_full_text_only_takes_sequential_path() {
        let turns = vec![SpeakerTurn::new(0.0, 10.0, "A")];
        let transcription = TranscriptionResult {
            segments: vec![],
            full_text: "Bonjour. Comment allez-vous?".to_string(),
        };

        let report = reconcile(&turns, &transcription, &ReconcileConfig::default());
        assert_eq!(report.strategy, Strategy::Sequential);
        assert_eq!(report.segments.len(), 1);
        assert_eq!(report.segments[0].text, "Bonjour. Comment allez-vous?");
    }

    #[test]
    fn test_output_count_equals_merged_turn_count() {
        let turns = vec![
            SpeakerTurn::new(0.0, 5.0, "A"),
            SpeakerTurn::new(5.0, 6.0, "A"),
            SpeakerTurn::new(6.0, 15.0, "B"),
        ];
        let transcription = TranscriptionResult::default();

        let report = reconcile(&turns, &transcription, &ReconcileConfig::default());
        // The two adjacent A turns merge into one run
        assert_eq!(report.segments.len(), 2);
        assert_eq!(report.segments[0].speaker, "A");
        assert_eq!(report.segments[0].start, 0.0);
        assert_eq!(report.segments[0].end, 6.0);
    }

    #[test]
    fn test_no_transcript_yields_empty_segments_without_error() {
        let turns = vec![
            SpeakerTurn::new(0.0, 5.0, "A"),
            SpeakerTurn::new(6.0, 10.0, "B"),
        ];
        let report = reconcile(&turns, &TranscriptionResult::default(), &ReconcileConfig::default());

        assert_eq!(report.segments.len(), 2);
        assert!(report.segments.iter().all(|s| s.text.is_empty()));
        // All-empty output trips the empty-fraction warning, nothing more
        assert!(report
            .warnings
            .iter()
            .all(|w| matches!(w, ValidationWarning::TooManyEmpty { .. })));
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let turns = vec![
            SpeakerTurn::new(0.0, 4.0, "A"),
            SpeakerTurn::new(4.5, 9.0, "B"),
            SpeakerTurn::new(10.0, 12.0, "A"),
        ];
        let transcription = TranscriptionResult {
            segments: vec![
                TranscriptSpan::new(0.2, 4.1, "premier point"),
                TranscriptSpan::new(4.4, 8.8, "deuxieme point"),
            ],
            full_text: "premier point deuxieme point".to_string(),
        };
        let config = ReconcileConfig::default();

        let first = reconcile(&turns, &transcription, &config);
        let second = reconcile(&turns, &transcription, &config);
        assert_eq!(first.segments, second.segments);
    }

    #[test]
    fn test_repair_pass_fills_gaps_after_overlap() {
        let turns = vec![
            SpeakerTurn::new(0.0, 5.0, "A"),
            SpeakerTurn::new(20.0, 25.0, "B"),
        ];
        // Only the first turn has a matching span; full text carries the rest
        let transcription = TranscriptionResult {
            segments: vec![
                TranscriptSpan::new(0.0, 5.0, "Ouverture de seance."),
                TranscriptSpan::new(40.0, 45.0, "Hors champ."),
            ],
            full_text: "Ouverture de seance. Passons au vote.".to_string(),
        };

        let report = reconcile(&turns, &transcription, &ReconcileConfig::default());
        assert_eq!(report.segments[0].text, "Ouverture de seance.");
        assert_eq!(report.segments[1].text, "Passons au vote.");
    }

    #[test]
    fn test_sorted_input_stays_sorted() {
        let turns: Vec<SpeakerTurn> = (0..10)
            .map(|i| SpeakerTurn::new(i as f64 * 10.0, i as f64 * 10.0 + 8.0, format!("S{}", i % 3)))
            .collect();
        let report = reconcile(&turns, &TranscriptionResult::default(), &ReconcileConfig::default());

        for pair in report.segments.windows(2) {
            assert!(pair[0].start <= pair[1].start);
        }
    }
}
