use serde::{Deserialize, Serialize};

/// One contiguous time range attributed to a single speaker by diarization.
///
/// The speaker label is opaque (e.g. "SPEAKER_00") and stable for the same
/// physical speaker across the session; stability is guaranteed by the
/// diarization model, not by this crate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeakerTurn {
    /// Start timestamp in seconds
    pub start: f64,
    /// End timestamp in seconds (>= start)
    pub end: f64,
    /// Opaque speaker label
    pub speaker: String,
}

impl SpeakerTurn {
    pub fn new(start: f64, end: f64, speaker: impl Into<String>) -> Self {
        Self {
            start,
            end,
            speaker: speaker.into(),
        }
    }

    /// Duration in seconds
    pub fn duration(&self) -> f64 {
        (self.end - self.start).max(0.0)
    }
}

/// One time-stamped span of recognized speech from the transcription model.
///
/// Unlike [`SpeakerTurn`], timestamps may be entirely absent: the model can
/// return only a full-text blob, or per-span timestamps that are materially
/// misaligned with diarization boundaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSpan {
    pub start: Option<f64>,
    pub end: Option<f64>,
    pub text: String,
}

impl TranscriptSpan {
    pub fn new(start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
            text: text.into(),
        }
    }

    pub fn text_only(text: impl Into<String>) -> Self {
        Self {
            start: None,
            end: None,
            text: text.into(),
        }
    }

    /// Whether this span carries usable timestamps and non-empty text
    pub fn is_timed(&self) -> bool {
        self.start.is_some() && self.end.is_some() && !self.text.trim().is_empty()
    }
}

/// The reconciler's output unit: one per diarization turn, same order,
/// same timing and speaker, with the transcript text attached.
///
/// `text` may be empty when no matching transcript content was found; that
/// is a valid terminal value, not an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciledSegment {
    pub start: f64,
    pub end: f64,
    pub speaker: String,
    pub text: String,
}

impl ReconciledSegment {
    pub fn duration(&self) -> f64 {
        (self.end - self.start).max(0.0)
    }

    pub fn has_text(&self) -> bool {
        !self.text.trim().is_empty()
    }
}

/// Transcription service output: per-span results plus the full text blob.
/// Either part may be empty depending on what the backend returned.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TranscriptionResult {
    #[serde(default)]
    pub segments: Vec<TranscriptSpan>,
    #[serde(default)]
    pub full_text: String,
}

impl TranscriptionResult {
    /// Fraction of spans that carry both timestamps and text
    pub fn timestamp_coverage(&self) -> f64 {
        if self.segments.is_empty() {
            return 0.0;
        }
        let timed = self.segments.iter().filter(|s| s.is_timed()).count();
        timed as f64 / self.segments.len() as f64
    }
}

/// Raw diarization payload as returned by the service.
///
/// External backends are loose about shape, so every field is defaulted here
/// and normalized into [`SpeakerTurn`] immediately at the ingestion boundary.
#[derive(Debug, Clone, Deserialize)]
pub struct RawDiarization {
    #[serde(default)]
    pub segments: Vec<RawTurn>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawTurn {
    #[serde(default)]
    pub start: f64,
    #[serde(default)]
    pub end: f64,
    #[serde(default = "unknown_speaker")]
    pub speaker: String,
}

fn unknown_speaker() -> String {
    "UNKNOWN".to_string()
}

impl RawDiarization {
    /// Normalize into canonical turns, dropping degenerate entries
    pub fn into_turns(self) -> Vec<SpeakerTurn> {
        self.segments
            .into_iter()
            .filter(|s| s.end > s.start)
            .map(|s| SpeakerTurn {
                start: s.start,
                end: s.end,
                speaker: s.speaker,
            })
            .collect()
    }
}

/// Raw transcription payload: text always, segments and timestamps optional.
#[derive(Debug, Clone, Deserialize)]
pub struct RawTranscription {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub segments: Vec<RawSpan>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawSpan {
    #[serde(default)]
    pub start: Option<f64>,
    #[serde(default)]
    pub end: Option<f64>,
    #[serde(default)]
    pub text: String,
}

impl RawTranscription {
    pub fn into_result(self) -> TranscriptionResult {
        TranscriptionResult {
            segments: self
                .segments
                .into_iter()
                .map(|s| TranscriptSpan {
                    start: s.start,
                    end: s.end,
                    text: s.text,
                })
                .collect(),
            full_text: self.text,
        }
    }
}
