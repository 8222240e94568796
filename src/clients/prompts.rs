use crate::io::format_hms;
use crate::models::ReconciledSegment;

/// System prompt for the speaker naming pass
pub const SPEAKER_NAMING_SYSTEM: &str = r#"You identify the speakers of a municipal council meeting from its transcript. You MUST follow these rules:

1. Use only the names present in the participant list you are given.
2. Base each identification on explicit evidence in the transcript (people addressing each other by name, the chair giving the floor, self-introductions).
3. If a label cannot be identified with confidence, omit it from the answer.
4. Output MUST be a single JSON object mapping diarization labels to names, nothing else.

Example output: {"SPEAKER_00": "Mme Claire Durand", "SPEAKER_02": "M. Paul Martin"}"#;

/// System prompt for the report rewriting pass
pub const REPORT_SYSTEM: &str = r#"You write the official minutes of a municipal council meeting from its attributed transcript. You MUST follow these rules:

1. Do not invent anything: every statement in the minutes must be supported by the transcript.
2. Follow the agenda order when the agenda is provided.
3. Use formal administrative French.
4. Keep speaker attributions: report who said what.
5. Summarize exchanges faithfully; quote verbatim only when the exact wording matters (motions, amendments).

Structure the minutes with a heading per agenda item, and end with the list of decisions taken."#;

/// System prompt for the decision extraction pass
pub const DECISIONS_SYSTEM: &str = r#"You extract the formal decisions from the transcript of a municipal council meeting. You MUST follow these rules:

1. A decision is a deliberation put to a vote or formally adopted, not a mere discussion.
2. Report the vote tally when it is stated; otherwise leave the "vote" field null.
3. Use the official vote record when one is provided; it prevails over the transcript.
4. Output MUST be valid JSON of the form {"decisions": [{"subject": "...", "outcome": "...", "vote": "...", "timestamp": "HH:MM:SS"}]}, nothing else.
5. If no decision was taken, output {"decisions": []}."#;

/// Render the reconciled segments as an attributed transcript,
/// one `[HH:MM:SS] Speaker: text` line per segment
pub fn format_transcript(segments: &[ReconciledSegment]) -> String {
    let mut out = String::new();
    for segment in segments {
        if segment.text.trim().is_empty() {
            continue;
        }
        out.push_str(&format!(
            "[{}] {}: {}\n",
            format_hms(segment.start),
            segment.speaker,
            segment.text.trim()
        ));
    }
    out
}

/// Build the user prompt for the speaker naming pass
pub fn build_speaker_naming_prompt(segments: &[ReconciledSegment], participants: &str) -> String {
    format!(
        "# Participants\n{}\n\n# Transcript\n{}\n\nIdentify which participant \
         each diarization label corresponds to.",
        participants.trim(),
        format_transcript(segments)
    )
}

/// Build the user prompt for the report rewriting pass
pub fn build_report_prompt(transcript: &str, agenda: &str) -> String {
    let mut prompt = String::new();
    if !agenda.trim().is_empty() {
        prompt.push_str(&format!("# Agenda\n{}\n\n", agenda.trim()));
    }
    prompt.push_str(&format!("# Attributed transcript\n{}\n", transcript));
    prompt.push_str("\nWrite the official minutes of this meeting.");
    prompt
}

/// Build the user prompt for the decision extraction pass
pub fn build_decisions_prompt(transcript: &str, votes: Option<&str>) -> String {
    let mut prompt = String::new();
    if let Some(votes) = votes.filter(|v| !v.trim().is_empty()) {
        prompt.push_str(&format!("# Official vote record\n{}\n\n", votes.trim()));
    }
    prompt.push_str(&format!("# Attributed transcript\n{}\n", transcript));
    prompt.push_str("\nExtract the decisions taken during this meeting.");
    prompt
}
