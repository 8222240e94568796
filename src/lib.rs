pub mod audio;
pub mod clients;
pub mod config;
pub mod error;
pub mod io;
pub mod models;
pub mod pipeline;
pub mod reconcile;

pub use audio::{normalize_audio, probe_duration, split_into_chunks, NormalizeConfig};
pub use clients::{AnthropicClient, AnthropicConfig, DiarizationClient, TranscriptionClient};
pub use config::PipelineConfig;
pub use error::StageError;
pub use io::{parse_transcription_file, parse_turns_file, HumanMinutes, MachineMinutes};
pub use models::{ReconciledSegment, SessionMetadata, SpeakerTurn, TranscriptionResult};
pub use pipeline::{strategy_label, Pipeline, PipelineOptions, SessionOutcome, StatusLog};
pub use reconcile::{reconcile, ReconcileConfig, ReconcileReport, Strategy};
