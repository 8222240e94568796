use tracing::{info, warn};

use crate::models::{ReconciledSegment, SpeakerTurn};

/// A non-fatal inconsistency found in the reconciled output.
///
/// Validation never rejects a result: a partial transcript is more useful
/// than none, so violations are surfaced for observability only.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationWarning {
    /// Output segment count differs from input turn count
    CountMismatch { turns: usize, segments: usize },
    /// Start times are not non-decreasing at this index
    OrderBroken { index: usize },
    /// Output speaker differs from the source turn's speaker
    SpeakerMismatch {
        index: usize,
        expected: String,
        actual: String,
    },
    /// More than the tolerated share of segments ended up with empty text
    TooManyEmpty { empty: usize, total: usize },
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CountMismatch { turns, segments } => {
                write!(f, "segment count {} differs from turn count {}", segments, turns)
            }
            Self::OrderBroken { index } => {
                write!(f, "chronological order broken at index {}", index)
            }
            Self::SpeakerMismatch {
                index,
                expected,
                actual,
            } => write!(
                f,
                "speaker mismatch at index {}: expected {}, got {}",
                index, expected, actual
            ),
            Self::TooManyEmpty { empty, total } => {
                write!(f, "too many empty segments: {}/{}", empty, total)
            }
        }
    }
}

/// Check the reconciled output against its source turns.
///
/// Runs after every reconciliation; logs violations and returns them so the
/// caller can attach them to the session status.
pub fn validate(
    turns: &[SpeakerTurn],
    segments: &[ReconciledSegment],
    max_empty_fraction: f64,
) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    if segments.len() != turns.len() {
        warnings.push(ValidationWarning::CountMismatch {
            turns: turns.len(),
            segments: segments.len(),
        });
    }

    for i in 0..segments.len().saturating_sub(1) {
        if segments[i].start > segments[i + 1].start {
            warnings.push(ValidationWarning::OrderBroken { index: i });
        }
    }

    for (i, (segment, turn)) in segments.iter().zip(turns.iter()).enumerate() {
        if segment.speaker != turn.speaker {
            warnings.push(ValidationWarning::SpeakerMismatch {
                index: i,
                expected: turn.speaker.clone(),
                actual: segment.speaker.clone(),
            });
        }
    }

    if !segments.is_empty() {
        let empty = segments.iter().filter(|s| !s.has_text()).count();
        if empty as f64 > segments.len() as f64 * max_empty_fraction {
            warnings.push(ValidationWarning::TooManyEmpty {
                empty,
                total: segments.len(),
            });
        }
    }

    if warnings.is_empty() {
        info!("reconciliation validation passed");
    } else {
        warn!(count = warnings.len(), "reconciliation validation found issues");
        for warning in warnings.iter().take(5) {
            warn!("  {}", warning);
        }
    }

    warnings
}
