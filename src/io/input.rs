use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::models::{
    ContextDocuments, RawDiarization, RawTranscription, RawTurn, SpeakerTurn, TranscriptionResult,
};

/// Parse a saved diarization JSON file into canonical turns.
///
/// Accepts both the service envelope (`{"segments": [...]}`) and a bare
/// array of turn objects, since both shapes exist in saved sessions.
pub fn parse_turns_file(path: &Path) -> Result<Vec<SpeakerTurn>> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read file: {:?}", path))?;
    parse_turns_json(&content)
}

pub fn parse_turns_json(json: &str) -> Result<Vec<SpeakerTurn>> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum TurnsFile {
        Envelope(RawDiarization),
        Bare(Vec<RawTurn>),
    }

    let parsed: TurnsFile =
        serde_json::from_str(json).context("Failed to parse diarization JSON")?;
    let raw = match parsed {
        TurnsFile::Envelope(raw) => raw,
        TurnsFile::Bare(segments) => RawDiarization { segments },
    };
    Ok(raw.into_turns())
}

/// Parse a saved transcription file.
///
/// JSON files go through the raw-payload shape; anything that does not parse
/// as JSON is treated as a plain-text transcript with no timed spans.
pub fn parse_transcription_file(path: &Path) -> Result<TranscriptionResult> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read file: {:?}", path))?;

    match serde_json::from_str::<RawTranscription>(&content) {
        Ok(raw) => Ok(raw.into_result()),
        Err(_) => Ok(TranscriptionResult {
            segments: vec![],
            full_text: content.trim().to_string(),
        }),
    }
}

/// Loaded context documents, empty strings where none were supplied
#[derive(Debug, Clone, Default)]
pub struct MeetingContext {
    pub agenda: String,
    pub participants: String,
    pub votes: Option<String>,
}

/// Read the optional context documents referenced by the session metadata.
/// A referenced file that cannot be read is an error; an absent reference
/// is not.
pub fn load_context(docs: &ContextDocuments) -> Result<MeetingContext> {
    let read = |path: &Path| {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read context document: {:?}", path))
    };

    Ok(MeetingContext {
        agenda: docs.agenda.as_deref().map(read).transpose()?.unwrap_or_default(),
        participants: docs
            .participants
            .as_deref()
            .map(read)
            .transpose()?
            .unwrap_or_default(),
        votes: docs.votes.as_deref().map(read).transpose()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_parse_turns_envelope() {
        let json = r#"{"segments": [{"start": 0.0, "end": 4.5, "speaker": "SPEAKER_00"}]}"#;
        let turns = parse_turns_json(json).unwrap();
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].speaker, "SPEAKER_00");
    }

    #[test]
    fn test_parse_turns_bare_array() {
        let json = r#"[{"start": 1.0, "end": 2.0, "speaker": "A"}, {"start": 3.0, "end": 2.0, "speaker": "B"}]"#;
        let turns = parse_turns_json(json).unwrap();
        // Degenerate second entry dropped during normalization
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].speaker, "A");
    }

    #[test]
    fn test_parse_transcription_plain_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("transcript.txt");
        std::fs::write(&path, "Bonjour a tous.\n").unwrap();

        let result = parse_transcription_file(&path).unwrap();
        assert_eq!(result.full_text, "Bonjour a tous.");
        assert!(result.segments.is_empty());
    }

    #[test]
    fn test_load_context_absent_docs() {
        let context = load_context(&ContextDocuments::default()).unwrap();
        assert!(context.agenda.is_empty());
        assert!(context.votes.is_none());
    }

    #[test]
    fn test_load_context_missing_file_errors() {
        let docs = ContextDocuments {
            agenda: Some(PathBuf::from("/nonexistent/agenda.txt")),
            ..Default::default()
        };
        assert!(load_context(&docs).is_err());
    }
}
