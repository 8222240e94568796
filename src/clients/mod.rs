pub mod backoff;
pub mod diarization;
pub mod llm;
pub mod prompts;
pub mod transcription;

pub use backoff::{retry_with_backoff, RetryPolicy};
pub use diarization::DiarizationClient;
pub use llm::{AnthropicClient, AnthropicConfig};
pub use transcription::TranscriptionClient;
