use anyhow::{Context, Result};

/// API endpoints and credentials for the external services, read from the
/// environment.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Diarization job endpoint base URL (submit/poll style backend)
    pub diarization_endpoint: String,
    /// Bearer token for the diarization backend
    pub diarization_api_key: String,
    /// Transcription API base URL
    pub transcription_endpoint: String,
    /// API key for the transcription backend
    pub transcription_api_key: String,
    /// Anthropic API key for speaker naming, report rewrite and decision
    /// extraction
    pub anthropic_api_key: String,
    /// Public base URL under which session audio files are served, so the
    /// external models can fetch them
    pub app_base_url: String,
    /// Language hint passed to transcription
    pub language: String,
}

impl PipelineConfig {
    /// Build from environment variables. Endpoints have sensible defaults;
    /// keys are required.
    pub fn from_env() -> Result<Self> {
        let diarization_api_key = std::env::var("DIARIZATION_API_KEY")
            .context("DIARIZATION_API_KEY environment variable not set")?;
        let diarization_endpoint = std::env::var("DIARIZATION_ENDPOINT")
            .context("DIARIZATION_ENDPOINT environment variable not set")?;
        let transcription_api_key = std::env::var("TRANSCRIPTION_API_KEY")
            .context("TRANSCRIPTION_API_KEY environment variable not set")?;
        let transcription_endpoint = std::env::var("TRANSCRIPTION_ENDPOINT")
            .unwrap_or_else(|_| "https://api.mistral.ai/v1".to_string());
        let anthropic_api_key = std::env::var("ANTHROPIC_API_KEY")
            .context("ANTHROPIC_API_KEY environment variable not set")?;
        let app_base_url = std::env::var("APP_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:5000".to_string());
        let language = std::env::var("MEETING_LANGUAGE").unwrap_or_else(|_| "fr".to_string());

        let app_base_url = if app_base_url.starts_with("http") {
            app_base_url
        } else {
            format!("https://{}", app_base_url)
        };

        Ok(Self {
            diarization_endpoint,
            diarization_api_key,
            transcription_endpoint,
            transcription_api_key,
            anthropic_api_key,
            app_base_url,
            language,
        })
    }
}
