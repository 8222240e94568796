use tracing::debug;

use crate::models::{ReconciledSegment, SpeakerTurn, TranscriptSpan};

use super::ReconcileConfig;

/// Temporal overlap matching (used when span timestamps are trustworthy).
///
/// For each turn in chronological order, the not-yet-consumed span with the
/// greatest weighted overlap score is assigned exclusively to that turn.
/// Spans qualify only when the overlap exceeds an absolute floor or covers
/// a minimum share of the turn; turns with no qualifying span get empty
/// text, which the repair pass may fill in later.
pub fn match_by_overlap(
    turns: &[SpeakerTurn],
    spans: &[TranscriptSpan],
    config: &ReconcileConfig,
) -> Vec<ReconciledSegment> {
    let mut sorted_spans: Vec<&TranscriptSpan> =
        spans.iter().filter(|s| !s.text.trim().is_empty()).collect();
    sorted_spans.sort_by(|a, b| a.start.unwrap_or(0.0).total_cmp(&b.start.unwrap_or(0.0)));

    let mut consumed = vec![false; sorted_spans.len()];
    let mut segments = Vec::with_capacity(turns.len());

    for turn in turns {
        let turn_duration = turn.duration();
        let mut best: Option<(usize, f64)> = None;

        for (idx, span) in sorted_spans.iter().enumerate() {
            if consumed[idx] {
                continue;
            }

            // Missing timestamps default to an open interval
            let span_start = span.start.unwrap_or(0.0);
            let span_end = span.end.unwrap_or(f64::INFINITY);

            let overlap = (span_end.min(turn.end) - span_start.max(turn.start)).max(0.0);
            if overlap <= 0.0 {
                continue;
            }

            let ratio = if turn_duration > 0.0 {
                overlap / turn_duration
            } else {
                0.0
            };

            if overlap < config.min_overlap_secs && ratio < config.min_overlap_ratio {
                continue;
            }

            let score = config.ratio_weight * ratio
                + config.duration_weight * (overlap / config.duration_normalizer).min(1.0);

            if best.map_or(true, |(_, s)| score > s) {
                best = Some((idx, score));
            }
        }

        let text = match best {
            Some((idx, score)) => {
                consumed[idx] = true;
                debug!(
                    turn_start = turn.start,
                    turn_end = turn.end,
                    speaker = %turn.speaker,
                    score,
                    "matched transcript span to turn"
                );
                sorted_spans[idx].text.trim().to_string()
            }
            None => String::new(),
        };

        segments.push(ReconciledSegment {
            start: turn.start,
            end: turn.end,
            speaker: turn.speaker.clone(),
            text,
        });
    }

    segments
}
