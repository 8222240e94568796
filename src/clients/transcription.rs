use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::StageError;
use crate::io::format_hms;
use crate::models::{RawTranscription, ReconciledSegment, SpeakerTurn, TranscriptionResult};

use super::backoff::{retry_with_backoff, RetryPolicy};

/// Maximum |Δstart| + |Δend| for a contextual reply segment to be matched
/// back onto a diarization turn
const ALIGN_TOLERANCE_SECS: f64 = 2.0;

/// Client for the transcription service.
///
/// Two modes: the contextual chat mode sends the audio together with the
/// diarization turns as a prompt and gets back speaker-attributed segments
/// directly; the classic mode hits the plain transcription endpoint and
/// returns spans (with unreliable timestamps) for the reconciler to match.
pub struct TranscriptionClient {
    client: Client,
    base_url: String,
    api_key: String,
    language: String,
    retry: RetryPolicy,
}

impl TranscriptionClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        language: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            language: language.into(),
            retry: RetryPolicy::default(),
        }
    }

    /// Contextual chat-mode transcription: the model sees the diarization
    /// turns and returns one transcript segment per turn. The reply is
    /// aligned back onto the turns so timing and speaker identity always
    /// come from diarization, never from the model.
    pub async fn transcribe_contextual(
        &self,
        audio_url: &str,
        turns: &[SpeakerTurn],
    ) -> Result<(Vec<ReconciledSegment>, String), StageError> {
        info!("contextual transcription for {} ({} turns)", audio_url, turns.len());

        let prompt = build_contextual_prompt(turns);
        let request = ChatRequest {
            model: "voxtral-small-latest".to_string(),
            temperature: 0.0,
            response_format: ResponseFormat {
                format_type: "json_object".to_string(),
            },
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: vec![
                    ChatContent::InputAudio {
                        input_audio: audio_url.to_string(),
                    },
                    ChatContent::Text { text: prompt },
                ],
            }],
        };

        let body = retry_with_backoff(&self.retry, "contextual transcription", || {
            self.post_chat(&request)
        })
        .await?;

        let reply: ChatResponse = serde_json::from_str(&body)
            .map_err(|e| StageError::Fatal(format!("invalid chat response: {}", e)))?;
        let content = reply
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .ok_or_else(|| StageError::Fatal("empty chat response".to_string()))?;

        let parsed: ContextualReply = serde_json::from_str(content).map_err(|e| {
            StageError::Fatal(format!("contextual reply was not valid JSON: {}", e))
        })?;

        debug!(segments = parsed.segments.len(), "contextual reply parsed");

        let aligned = align_to_turns(&parsed.segments, turns);
        Ok((aligned, parsed.full_text))
    }

    /// Classic transcription endpoint: audio reference in, text plus
    /// optionally time-stamped spans out. Reconciliation happens downstream.
    pub async fn transcribe_classic(
        &self,
        audio_url: &str,
    ) -> Result<TranscriptionResult, StageError> {
        info!("classic transcription for {}", audio_url);

        let request = TranscriptionRequest {
            model: "voxtral-mini-latest".to_string(),
            file_url: audio_url.to_string(),
            language: self.language.clone(),
            temperature: 0.0,
            timestamp_granularities: vec!["segment".to_string()],
        };

        let body = retry_with_backoff(&self.retry, "classic transcription", || {
            self.post_transcription(&request)
        })
        .await?;

        let raw: RawTranscription = serde_json::from_str(&body)
            .map_err(|e| StageError::Fatal(format!("invalid transcription response: {}", e)))?;

        let result = raw.into_result();
        info!(
            spans = result.segments.len(),
            text_chars = result.full_text.len(),
            "classic transcription complete"
        );
        Ok(result)
    }

    async fn post_chat(&self, request: &ChatRequest) -> Result<String, StageError> {
        self.post_json(&format!("{}/chat/completions", self.base_url), request)
            .await
    }

    async fn post_transcription(
        &self,
        request: &TranscriptionRequest,
    ) -> Result<String, StageError> {
        self.post_json(
            &format!("{}/audio/transcriptions", self.base_url),
            request,
        )
        .await
    }

    async fn post_json<B: Serialize>(&self, url: &str, body: &B) -> Result<String, StageError> {
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(body)
            .timeout(Duration::from_secs(600))
            .send()
            .await
            .map_err(|e| StageError::Transient(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| StageError::Transient(e.to_string()))?;

        if !status.is_success() {
            return Err(StageError::from_http(status, &text));
        }
        Ok(text)
    }
}

/// Format the diarization turns into transcription instructions.
///
/// The model is told to transcribe strictly within the given time ranges and
/// to reply as JSON; timestamps and speaker labels in the reply are treated
/// as echoes of this table, not as new information.
fn build_contextual_prompt(turns: &[SpeakerTurn]) -> String {
    let mut table = String::new();
    for (i, turn) in turns.iter().enumerate() {
        table.push_str(&format!(
            "Segment {}: [{} - {}] {} (duration: {:.1}s)\n",
            i + 1,
            format_hms(turn.start),
            format_hms(turn.end),
            turn.speaker,
            turn.duration()
        ));
    }

    format!(
        "You are an expert meeting transcription assistant.\n\
         \n\
         TASK:\n\
         Transcribe the supplied audio, strictly respecting the speaker \
         segments below. Each segment is one speaker's intervention.\n\
         \n\
         SPEAKER SEGMENTS (chronological):\n\
         {table}\n\
         RULES:\n\
         1. For each segment, transcribe only the words spoken inside that \
         exact time range.\n\
         2. Keep strict chronological order.\n\
         3. If a segment is very short or silent, keep it with empty text.\n\
         4. Do not cut sentences mid-way; if a sentence crosses a boundary, \
         split it sensibly.\n\
         5. The text must be a verbatim transcription.\n\
         \n\
         RESPONSE FORMAT (strict JSON, nothing before or after):\n\
         {{\"segments\": [{{\"start\": 0.0, \"end\": 5.2, \"speaker\": \
         \"SPEAKER_00\", \"text\": \"...\"}}], \"full_text\": \"...\"}}\n\
         \n\
         The start/end/speaker values must match the segments above exactly."
    )
}

/// Map contextual reply segments back onto the diarization turns.
///
/// For each turn, the reply segment with the closest boundaries within the
/// tolerance provides the text; timing and speaker always come from the
/// turn. Unmatched turns get empty text.
fn align_to_turns(replies: &[ContextualSegment], turns: &[SpeakerTurn]) -> Vec<ReconciledSegment> {
    let mut aligned = Vec::with_capacity(turns.len());
    let mut unmatched = 0usize;

    for turn in turns {
        let mut best: Option<(&ContextualSegment, f64)> = None;
        for reply in replies {
            let distance = (reply.start - turn.start).abs() + (reply.end - turn.end).abs();
            if distance < ALIGN_TOLERANCE_SECS && best.map_or(true, |(_, d)| distance < d) {
                best = Some((reply, distance));
            }
        }

        let text = match best {
            Some((reply, _)) => reply.text.trim().to_string(),
            None => {
                unmatched += 1;
                String::new()
            }
        };

        aligned.push(ReconciledSegment {
            start: turn.start,
            end: turn.end,
            speaker: turn.speaker.clone(),
            text,
        });
    }

    if unmatched > 0 {
        warn!(unmatched, total = turns.len(), "turns without contextual transcription");
    }

    aligned
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    temperature: f64,
    response_format: ResponseFormat,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: String,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: Vec<ChatContent>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum ChatContent {
    #[serde(rename = "input_audio")]
    InputAudio { input_audio: String },
    #[serde(rename = "text")]
    Text { text: String },
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReplyMessage,
}

#[derive(Debug, Deserialize)]
struct ChatReplyMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct ContextualReply {
    #[serde(default)]
    segments: Vec<ContextualSegment>,
    #[serde(default)]
    full_text: String,
}

#[derive(Debug, Deserialize)]
struct ContextualSegment {
    #[serde(default)]
    start: f64,
    #[serde(default)]
    end: f64,
    #[serde(default)]
    #[allow(dead_code)]
    speaker: String,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
struct TranscriptionRequest {
    model: String,
    file_url: String,
    language: String,
    temperature: f64,
    timestamp_granularities: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply(start: f64, end: f64, text: &str) -> ContextualSegment {
        ContextualSegment {
            start,
            end,
            speaker: String::new(),
            text: text.to_string(),
        }
    }

    #[test]
    fn test_align_exact_boundaries() {
        let turns = vec![
            SpeakerTurn::new(0.0, 5.0, "SPEAKER_00"),
            SpeakerTurn::new(5.0, 12.0, "SPEAKER_01"),
        ];
        let replies = vec![reply(0.0, 5.0, "bonjour"), reply(5.0, 12.0, "merci")];

        let aligned = align_to_turns(&replies, &turns);
        assert_eq!(aligned.len(), 2);
        assert_eq!(aligned[0].text, "bonjour");
        assert_eq!(aligned[0].speaker, "SPEAKER_00");
        assert_eq!(aligned[1].text, "merci");
    }

    #[test]
    fn test_align_tolerates_small_drift() {
        let turns = vec![SpeakerTurn::new(0.0, 5.0, "SPEAKER_00")];
        let replies = vec![reply(0.4, 5.5, "texte")];

        let aligned = align_to_turns(&replies, &turns);
        assert_eq!(aligned[0].text, "texte");
        // Timing comes from diarization, not from the reply
        assert_eq!(aligned[0].start, 0.0);
        assert_eq!(aligned[0].end, 5.0);
    }

    #[test]
    fn test_align_rejects_beyond_tolerance() {
        let turns = vec![SpeakerTurn::new(0.0, 5.0, "SPEAKER_00")];
        let replies = vec![reply(3.0, 9.0, "ailleurs")];

        let aligned = align_to_turns(&replies, &turns);
        assert_eq!(aligned[0].text, "");
    }

    #[test]
    fn test_align_picks_closest_reply() {
        let turns = vec![SpeakerTurn::new(10.0, 15.0, "SPEAKER_00")];
        let replies = vec![reply(9.5, 14.6, "proche"), reply(10.8, 15.9, "moins proche")];

        let aligned = align_to_turns(&replies, &turns);
        assert_eq!(aligned[0].text, "proche");
    }

    #[test]
    fn test_contextual_reply_parses_with_defaults() {
        let json = r#"{"segments": [{"start": 1.0, "end": 2.0, "text": "ok"}]}"#;
        let parsed: ContextualReply = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.segments.len(), 1);
        assert_eq!(parsed.full_text, "");
    }

    #[test]
    fn test_prompt_contains_turn_table() {
        let turns = vec![SpeakerTurn::new(0.0, 65.0, "SPEAKER_00")];
        let prompt = build_contextual_prompt(&turns);
        assert!(prompt.contains("[00:00:00 - 00:01:05] SPEAKER_00"));
        assert!(prompt.contains("full_text"));
    }

    #[test]
    fn test_classic_response_without_segments_degrades() {
        let json = r#"{"text": "toute la reunion"}"#;
        let raw: RawTranscription = serde_json::from_str(json).unwrap();
        let result = raw.into_result();
        assert!(result.segments.is_empty());
        assert_eq!(result.full_text, "toute la reunion");
    }
}
