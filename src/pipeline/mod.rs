pub mod status;

pub use status::{SessionHistory, StageEntry, StatusLog};

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::json;
use tracing::{info, warn};

use crate::audio::{normalize_audio, probe_duration, split_into_chunks, NormalizeConfig};
use crate::clients::{
    prompts, AnthropicClient, AnthropicConfig, DiarizationClient, TranscriptionClient,
};
use crate::config::PipelineConfig;
use crate::error::StageError;
use crate::io::{load_context, HumanMinutes, MachineMinutes};
use crate::models::{ContextDocuments, ReconciledSegment, SessionMetadata, SpeakerTurn};
use crate::reconcile::{
    merge_speaker_runs, reconcile, validate, ReconcileConfig, Strategy, ValidationWarning,
};

/// Audio longer than this goes through the chunked path
pub const CHAT_MODE_MAX_SECS: f64 = 900.0;
/// Fixed chunk length for the chunked path; must stay under the chat-mode
/// ceiling so every chunk is eligible for contextual transcription
pub const CHUNK_SECS: f64 = 600.0;

/// Per-run knobs on top of the environment configuration
#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    /// Apply the speech-band filter chain during normalization
    pub enhance: bool,
    /// Documents that ground the LLM passes
    pub context: ContextDocuments,
    /// Name of the meeting chair, recorded in the session metadata
    pub chair: Option<String>,
    /// Stop after reconciliation: no speaker naming, report or decisions
    pub skip_llm: bool,
    pub reconcile: ReconcileConfig,
}

/// Everything a completed session produced
#[derive(Debug)]
pub struct SessionOutcome {
    pub session_id: String,
    pub segments: Vec<ReconciledSegment>,
    pub strategy: String,
    pub warnings: Vec<ValidationWarning>,
    pub minutes_path: PathBuf,
    pub segments_path: PathBuf,
    /// Absent when the LLM passes were skipped
    pub report_path: Option<PathBuf>,
    pub decisions_path: Option<PathBuf>,
}

/// Intermediate result of the transcription stage, before speaker naming
struct TranscriptStage {
    segments: Vec<ReconciledSegment>,
    strategy: String,
    warnings: Vec<ValidationWarning>,
}

/// Sequential driver for one session: normalize, diarize, transcribe,
/// reconcile, then the LLM passes. Stages run strictly in order; each one
/// consumes the previous stage's output and appends to the status log.
pub struct Pipeline {
    config: PipelineConfig,
    diarization: DiarizationClient,
    transcription: TranscriptionClient,
    llm: AnthropicClient,
    status: StatusLog,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, status_log: impl Into<PathBuf>) -> Self {
        let diarization = DiarizationClient::new(
            config.diarization_endpoint.clone(),
            config.diarization_api_key.clone(),
        );
        let transcription = TranscriptionClient::new(
            config.transcription_endpoint.clone(),
            config.transcription_api_key.clone(),
            config.language.clone(),
        );
        let llm = AnthropicClient::new(AnthropicConfig::new(config.anthropic_api_key.clone()));
        let status = StatusLog::new(status_log);

        Self {
            config,
            diarization,
            transcription,
            llm,
            status,
        }
    }

    /// Process one audio file end to end, writing all outputs into
    /// `session_dir`. A failure at any stage marks the session failed in
    /// the status log before propagating.
    pub async fn run_session(
        &self,
        audio: &Path,
        session_dir: &Path,
        options: &PipelineOptions,
    ) -> Result<SessionOutcome> {
        std::fs::create_dir_all(session_dir)
            .with_context(|| format!("Failed to create session dir: {:?}", session_dir))?;

        let mut metadata = SessionMetadata::new(audio.to_path_buf());
        metadata.chair = options.chair.clone();
        metadata.context = options.context.clone();
        let session_id = metadata.session_id.clone();

        match self
            .run_stages(&mut metadata, session_dir, options)
            .await
        {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                metadata.status = "failed".to_string();
                let _ = metadata.save(&session_dir.join("metadata.json"));
                let _ = self.status.log_status(
                    &session_id,
                    "failed",
                    &format!("{:#}", e),
                    None,
                );
                Err(e)
            }
        }
    }

    async fn run_stages(
        &self,
        metadata: &mut SessionMetadata,
        session_dir: &Path,
        options: &PipelineOptions,
    ) -> Result<SessionOutcome> {
        let session_id = metadata.session_id.clone();
        self.status
            .log_status(&session_id, "uploaded", "session created", None)?;

        // Stage 1: normalization
        let processed = session_dir.join("processed.wav");
        let normalize_config = NormalizeConfig {
            enhance: options.enhance,
            ..NormalizeConfig::default()
        };
        normalize_audio(&metadata.audio_file, &processed, &normalize_config).await?;
        metadata.processed_audio = Some(processed.clone());
        metadata.status = "audio_processed".to_string();
        metadata.save(&session_dir.join("metadata.json"))?;

        let duration = probe_duration(&processed).await?;
        self.status.log_status(
            &session_id,
            "audio_processed",
            "audio normalized",
            Some(json!({"duration_seconds": duration, "enhance": options.enhance})),
        )?;

        // Stage 2: diarization over the full audio
        let audio_url = audio_url(&self.config.app_base_url, &processed)?;
        let turns = self.diarization.diarize(&audio_url).await?;
        self.status.log_status(
            &session_id,
            "diarization",
            "speaker turns received",
            Some(json!({"turns": turns.len()})),
        )?;

        // Stage 3: transcription and reconciliation
        let stage = if duration > CHAT_MODE_MAX_SECS {
            info!(duration, "audio exceeds chat-mode ceiling, using chunked path");
            self.transcribe_chunked(&processed, session_dir, &turns, options)
                .await?
        } else {
            match self.transcribe_single(&audio_url, &turns, options).await {
                Ok(stage) => stage,
                Err(StageError::PayloadTooLarge(detail)) => {
                    warn!("payload too large, switching to chunked path: {}", detail);
                    self.transcribe_chunked(&processed, session_dir, &turns, options)
                        .await?
                }
                Err(e) => return Err(e.into()),
            }
        };
        self.status.log_status(
            &session_id,
            "transcription",
            "transcript reconciled",
            Some(json!({
                "segments": stage.segments.len(),
                "strategy": stage.strategy,
                "warnings": stage.warnings.len(),
            })),
        )?;

        // Stage 4: LLM passes
        let context = load_context(&options.context)?;
        let mut segments = stage.segments;
        let mut names = HashMap::new();
        let mut report = None;
        let mut decisions = None;

        if options.skip_llm {
            info!("skipping LLM passes");
        } else {
            if !context.participants.trim().is_empty() {
                names = self.llm.map_speakers(&segments, &context.participants).await;
            }
            apply_speaker_names(&mut segments, &names);
            self.status.log_status(
                &session_id,
                "speaker_naming",
                "speaker labels resolved",
                Some(json!({"named": names.len()})),
            )?;

            let transcript_text = prompts::format_transcript(&segments);
            report = Some(
                self.llm
                    .rewrite_report(&transcript_text, &context.agenda)
                    .await?,
            );
            self.status
                .log_status(&session_id, "report", "minutes rewritten", None)?;

            decisions = match self
                .llm
                .extract_decisions(&transcript_text, context.votes.as_deref())
                .await
            {
                Ok(decisions) => Some(decisions),
                Err(e) => {
                    warn!("decision extraction failed, writing empty list: {:#}", e);
                    Some(Default::default())
                }
            };
        }

        // Stage 5: outputs
        let minutes_path = session_dir.join("minutes.txt");
        let segments_path = session_dir.join("segments.json");

        HumanMinutes::new(&segments, &names).write_file(&minutes_path)?;
        MachineMinutes::new(segments.clone(), &stage.strategy).write_json(&segments_path)?;

        let report_path = match &report {
            Some(report) => {
                let path = session_dir.join("report.txt");
                crate::io::write_report(&path, report)?;
                Some(path)
            }
            None => None,
        };
        let decisions_path = match &decisions {
            Some(decisions) => {
                let path = session_dir.join("decisions.json");
                crate::io::write_decisions(&path, decisions)?;
                Some(path)
            }
            None => None,
        };

        metadata.status = "completed".to_string();
        metadata.save(&session_dir.join("metadata.json"))?;
        self.status.log_status(
            &session_id,
            "completed",
            "session outputs written",
            Some(json!({
                "decisions": decisions.as_ref().map(|d| d.decisions.len()).unwrap_or(0)
            })),
        )?;

        Ok(SessionOutcome {
            session_id,
            segments,
            strategy: stage.strategy,
            warnings: stage.warnings,
            minutes_path,
            segments_path,
            report_path,
            decisions_path,
        })
    }

    /// One-shot transcription: contextual chat mode first, classic plus
    /// reconciliation when the contextual reply is unusable.
    async fn transcribe_single(
        &self,
        audio_url: &str,
        turns: &[SpeakerTurn],
        options: &PipelineOptions,
    ) -> Result<TranscriptStage, StageError> {
        let merged = if options.reconcile.merge_runs {
            merge_speaker_runs(turns, options.reconcile.merge_max_gap)
        } else {
            turns.to_vec()
        };

        match self
            .transcription
            .transcribe_contextual(audio_url, &merged)
            .await
        {
            Ok((segments, _full_text)) => {
                let warnings =
                    validate(&merged, &segments, options.reconcile.max_empty_fraction);
                Ok(TranscriptStage {
                    segments,
                    strategy: "contextual".to_string(),
                    warnings,
                })
            }
            Err(e @ StageError::PayloadTooLarge(_)) => Err(e),
            Err(e) => {
                warn!("contextual transcription unusable, falling back: {}", e);
                self.transcribe_classic_stage(audio_url, turns, options).await
            }
        }
    }

    /// Classic endpoint followed by reconciliation against the turns
    async fn transcribe_classic_stage(
        &self,
        audio_url: &str,
        turns: &[SpeakerTurn],
        options: &PipelineOptions,
    ) -> Result<TranscriptStage, StageError> {
        let transcription = self.transcription.transcribe_classic(audio_url).await?;
        let report = reconcile(turns, &transcription, &options.reconcile);
        Ok(TranscriptStage {
            segments: report.segments,
            strategy: strategy_label(report.strategy).to_string(),
            warnings: report.warnings,
        })
    }

    /// Chunked path for long audio: fixed-length chunks, diarization sliced
    /// and shifted into chunk-local time, per-chunk transcription, results
    /// shifted back and concatenated. Each chunk tries contextual mode
    /// first and degrades to classic inside `transcribe_single`. The chunk
    /// guard drops at the end of its iteration, so the temp file is gone
    /// before the next chunk starts, whether or not transcription
    /// succeeded.
    async fn transcribe_chunked(
        &self,
        audio: &Path,
        session_dir: &Path,
        turns: &[SpeakerTurn],
        options: &PipelineOptions,
    ) -> Result<TranscriptStage> {
        let chunks = split_into_chunks(audio, session_dir, CHUNK_SECS).await?;
        info!(chunks = chunks.len(), "processing long audio in chunks");

        let mut segments = Vec::new();
        let mut warnings = Vec::new();

        for chunk in chunks {
            let local_turns = slice_turns(turns, chunk.start, chunk.end);
            if local_turns.is_empty() {
                info!(index = chunk.index, "no speech in chunk, skipping");
                continue;
            }

            let chunk_url = audio_url(&self.config.app_base_url, &chunk.path)?;
            let attempt = self
                .transcribe_single(&chunk_url, &local_turns, options)
                .await;

            let stage = match attempt {
                Ok(stage) => stage,
                Err(e) => {
                    // A lost chunk keeps its turns, with empty text
                    warn!(index = chunk.index, "chunk transcription failed: {}", e);
                    let report =
                        reconcile(&local_turns, &Default::default(), &options.reconcile);
                    TranscriptStage {
                        segments: report.segments,
                        strategy: strategy_label(report.strategy).to_string(),
                        warnings: report.warnings,
                    }
                }
            };

            segments.extend(stage.segments.into_iter().map(|mut s| {
                s.start += chunk.start;
                s.end += chunk.start;
                s
            }));
            warnings.extend(stage.warnings);
        }

        segments.sort_by(|a, b| a.start.total_cmp(&b.start));

        Ok(TranscriptStage {
            segments,
            strategy: "chunked".to_string(),
            warnings,
        })
    }
}

/// URL under which the app serves a session file to the external models
fn audio_url(base_url: &str, path: &Path) -> Result<String> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("audio path has no usable file name: {:?}", path))?;
    Ok(format!("{}/audio/{}", base_url.trim_end_matches('/'), name))
}

/// Clamp turns to a chunk window and shift them into chunk-local time.
/// Slivers shorter than 50 ms are dropped.
fn slice_turns(turns: &[SpeakerTurn], start: f64, end: f64) -> Vec<SpeakerTurn> {
    turns
        .iter()
        .filter_map(|t| {
            let s = t.start.max(start);
            let e = t.end.min(end);
            if e - s > 0.05 {
                Some(SpeakerTurn::new(s - start, e - start, t.speaker.clone()))
            } else {
                None
            }
        })
        .collect()
}

/// Replace diarization labels with resolved names where the map has one
fn apply_speaker_names(segments: &mut [ReconciledSegment], names: &HashMap<String, String>) {
    for segment in segments {
        if let Some(name) = names.get(&segment.speaker) {
            segment.speaker = name.clone();
        }
    }
}

/// Stable lowercase name for a reconciliation strategy, used in output
/// metadata and log payloads
pub fn strategy_label(strategy: Strategy) -> &'static str {
    match strategy {
        Strategy::Overlap => "overlap",
        Strategy::Sequential => "sequential",
    }
}
