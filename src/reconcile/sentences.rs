use tracing::{debug, info};

use crate::models::{ReconciledSegment, SpeakerTurn};

/// Split text into sentences on runs of terminal punctuation (`.` `!` `?`)
/// followed by whitespace. The punctuation stays with the preceding
/// sentence; the trailing sentence is kept even without a final terminator.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);
        if matches!(c, '.' | '!' | '?') {
            // Consume the rest of the punctuation run
            while let Some(&next) = chars.peek() {
                if matches!(next, '.' | '!' | '?') {
                    current.push(next);
                    chars.next();
                } else {
                    break;
                }
            }
            // A following whitespace marks the boundary
            if chars.peek().is_some_and(|n| n.is_whitespace()) {
                let trimmed = current.trim();
                if !trimmed.is_empty() {
                    sentences.push(trimmed.to_string());
                }
                current.clear();
            }
        }
    }

    let trimmed = current.trim();
    if !trimmed.is_empty() {
        sentences.push(trimmed.to_string());
    }

    sentences
}

/// Sequential sentence distribution (used when span timestamps are sparse).
///
/// Sentences are allocated to turns strictly in chronological order,
/// proportional to each turn's share of the total spoken duration, with a
/// minimum of one sentence per turn while any remain. Rounding leftovers
/// are appended to the final turn so no text is ever dropped.
pub fn distribute_sequential(full_text: &str, turns: &[SpeakerTurn]) -> Vec<ReconciledSegment> {
    let mut sorted: Vec<SpeakerTurn> = turns.to_vec();
    sorted.sort_by(|a, b| a.start.total_cmp(&b.start));

    let total_duration: f64 = sorted.iter().map(|t| t.duration()).sum();

    if total_duration <= 0.0 {
        return sorted
            .iter()
            .map(|t| empty_segment(t))
            .collect();
    }

    let sentences = split_sentences(full_text);
    if sentences.is_empty() {
        // No terminal punctuation at all; fall back to word-level allocation
        return distribute_words(full_text, &sorted, total_duration);
    }

    info!(
        sentences = sentences.len(),
        turns = sorted.len(),
        "distributing transcript sentences sequentially"
    );

    let total_sentences = sentences.len();
    let mut segments = Vec::with_capacity(sorted.len());
    let mut cursor = 0usize;

    for turn in &sorted {
        let share = turn.duration() / total_duration * total_sentences as f64;
        let count = (share.round() as usize).max(1);

        let end = (cursor + count).min(total_sentences);
        let text = sentences[cursor..end].join(" ");
        cursor = end;

        segments.push(ReconciledSegment {
            start: turn.start,
            end: turn.end,
            speaker: turn.speaker.clone(),
            text,
        });
    }

    // Rounding may leave sentences unassigned; they belong to the last turn
    if cursor < total_sentences {
        let leftover = sentences[cursor..].join(" ");
        if let Some(last) = segments.last_mut() {
            if last.text.is_empty() {
                last.text = leftover;
            } else {
                last.text.push(' ');
                last.text.push_str(&leftover);
            }
            debug!(
                count = total_sentences - cursor,
                "appended leftover sentences to final turn"
            );
        }
    }

    segments
}

/// Repair pass after overlap matching: redistribute the unconsumed part of
/// the full text across exactly the empty segments, proportional to their
/// durations, using the same sentence splitting as sequential distribution.
pub fn fill_empty_segments(segments: &mut [ReconciledSegment], full_text: &str) {
    let empty_indices: Vec<usize> = segments
        .iter()
        .enumerate()
        .filter(|(_, s)| !s.has_text())
        .map(|(i, _)| i)
        .collect();

    if empty_indices.is_empty() || full_text.trim().is_empty() {
        return;
    }

    // Approximate the unconsumed remainder by stripping each assigned span
    // text out of the full text once
    let mut remainder = full_text.to_string();
    for segment in segments.iter().filter(|s| s.has_text()) {
        if let Some(pos) = remainder.find(segment.text.as_str()) {
            remainder.replace_range(pos..pos + segment.text.len(), "");
        }
    }

    let sentences = split_sentences(&remainder);
    if sentences.is_empty() {
        return;
    }

    info!(
        empty = empty_indices.len(),
        sentences = sentences.len(),
        "repair pass: filling empty segments from remaining text"
    );

    let total_empty_duration: f64 = empty_indices
        .iter()
        .map(|&i| segments[i].duration())
        .sum();
    if total_empty_duration <= 0.0 {
        return;
    }

    let mut cursor = 0usize;
    for &idx in &empty_indices {
        if cursor >= sentences.len() {
            break;
        }
        let share = segments[idx].duration() / total_empty_duration * sentences.len() as f64;
        let count = (share as usize).max(1);
        let end = (cursor + count).min(sentences.len());
        segments[idx].text = sentences[cursor..end].join(" ");
        cursor = end;
    }
}

fn empty_segment(turn: &SpeakerTurn) -> ReconciledSegment {
    ReconciledSegment {
        start: turn.start,
        end: turn.end,
        speaker: turn.speaker.clone(),
        text: String::new(),
    }
}

/// Word-level fallback for text with no sentence boundaries
fn distribute_words(
    full_text: &str,
    sorted: &[SpeakerTurn],
    total_duration: f64,
) -> Vec<ReconciledSegment> {
    let words: Vec<&str> = full_text.split_whitespace().collect();
    let total_words = words.len();
    let mut segments = Vec::with_capacity(sorted.len());
    let mut cursor = 0usize;

    for turn in sorted {
        let count = (turn.duration() / total_duration * total_words as f64) as usize;
        let end = (cursor + count).min(total_words);
        let text = words[cursor..end].join(" ");
        cursor = end;
        segments.push(ReconciledSegment {
            start: turn.start,
            end: turn.end,
            speaker: turn.speaker.clone(),
            text,
        });
    }

    if cursor < total_words {
        let leftover = words[cursor..].join(" ");
        if let Some(last) = segments.last_mut() {
            if last.text.is_empty() {
                last.text = leftover;
            } else {
                last.text.push(' ');
                last.text.push_str(&leftover);
            }
        }
    }

    segments
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_basic_sentences() {
        let sentences = split_sentences("Bonjour. Comment allez-vous? Bien!");
        assert_eq!(sentences, vec!["Bonjour.", "Comment allez-vous?", "Bien!"]);
    }

    #[test]
    fn test_split_keeps_punctuation_run_together() {
        let sentences = split_sentences("Vraiment?! Oui... Bon.");
        assert_eq!(sentences, vec!["Vraiment?!", "Oui...", "Bon."]);
    }

    #[test]
    fn test_split_decimal_point_not_a_boundary() {
        // "3.5" has no whitespace after the dot, so it must not split
        let sentences = split_sentences("Le budget est de 3.5 millions. Vote adopte.");
        assert_eq!(
            sentences,
            vec!["Le budget est de 3.5 millions.", "Vote adopte."]
        );
    }

    #[test]
    fn test_split_trailing_text_without_terminator() {
        let sentences = split_sentences("Premiere phrase. et ensuite");
        assert_eq!(sentences, vec!["Premiere phrase.", "et ensuite"]);
    }

    #[test]
    fn test_split_empty_text() {
        assert!(split_sentences("").is_empty());
        assert!(split_sentences("   ").is_empty());
    }

    #[test]
    fn test_single_turn_gets_all_text() {
        let turns = vec![SpeakerTurn::new(0.0, 10.0, "A")];
        let segments = distribute_sequential("Bonjour. Comment allez-vous?", &turns);

        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].text, "Bonjour. Comment allez-vous?");
        assert_eq!(segments[0].speaker, "A");
    }

    #[test]
    fn test_proportional_allocation() {
        // First turn is 3x longer: with 4 sentences it should get 3
        let turns = vec![
            SpeakerTurn::new(0.0, 30.0, "A"),
            SpeakerTurn::new(30.0, 40.0, "B"),
        ];
        let text = "Un. Deux. Trois. Quatre.";
        let segments = distribute_sequential(text, &turns);

        assert_eq!(segments[0].text, "Un. Deux. Trois.");
        assert_eq!(segments[1].text, "Quatre.");
    }

    #[test]
    fn test_leftover_sentences_go_to_last_turn() {
        // Rounding down on both turns leaves leftovers to append
        let turns = vec![
            SpeakerTurn::new(0.0, 1.0, "A"),
            SpeakerTurn::new(1.0, 2.0, "B"),
        ];
        let text = "Un. Deux. Trois. Quatre. Cinq. Six.";
        let segments = distribute_sequential(text, &turns);

        let combined: String = segments
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        assert_eq!(combined, text);
    }

    #[test]
    fn test_zero_duration_turns_yield_empty_text() {
        let turns = vec![SpeakerTurn::new(5.0, 5.0, "A")];
        let segments = distribute_sequential("Texte.", &turns);
        assert_eq!(segments.len(), 1);
        assert!(segments[0].text.is_empty());
    }

    #[test]
    fn test_word_fallback_without_punctuation() {
        let turns = vec![
            SpeakerTurn::new(0.0, 5.0, "A"),
            SpeakerTurn::new(5.0, 10.0, "B"),
        ];
        let segments = distribute_sequential("alpha beta gamma delta", &turns);

        assert_eq!(segments.len(), 2);
        let combined: Vec<&str> = segments
            .iter()
            .flat_map(|s| s.text.split_whitespace())
            .collect();
        assert_eq!(combined, vec!["alpha", "beta", "gamma", "delta"]);
    }

    #[test]
    fn test_repair_fills_only_empty_segments() {
        let mut segments = vec![
            ReconciledSegment {
                start: 0.0,
                end: 5.0,
                speaker: "A".to_string(),
                text: "Premiere partie.".to_string(),
            },
            ReconciledSegment {
                start: 5.0,
                end: 10.0,
                speaker: "B".to_string(),
                text: String::new(),
            },
        ];

        fill_empty_segments(&mut segments, "Premiere partie. Deuxieme partie.");

        assert_eq!(segments[0].text, "Premiere partie.");
        assert_eq!(segments[1].text, "Deuxieme partie.");
    }

    #[test]
    fn test_repair_noop_without_empty_segments() {
        let mut segments = vec![ReconciledSegment {
            start: 0.0,
            end: 5.0,
            speaker: "A".to_string(),
            text: "Tout est la.".to_string(),
        }];
        let before = segments.clone();
        fill_empty_segments(&mut segments, "Tout est la. Et plus.");
        assert_eq!(segments, before);
    }

    #[test]
    fn test_repair_noop_without_full_text() {
        let mut segments = vec![ReconciledSegment {
            start: 0.0,
            end: 5.0,
            speaker: "A".to_string(),
            text: String::new(),
        }];
        fill_empty_segments(&mut segments, "  ");
        assert!(segments[0].text.is_empty());
    }
}
