use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::StageError;
use crate::models::{RawDiarization, SpeakerTurn};

use super::backoff::{retry_with_backoff, RetryPolicy};

/// Client for the job-style diarization backend.
///
/// The backend exposes a submit endpoint returning a job id and a status
/// endpoint polled until the job completes. The returned speaker turns are
/// authoritative for speaker identity and timing.
pub struct DiarizationClient {
    client: Client,
    base_url: String,
    api_key: String,
    retry: RetryPolicy,
    /// Interval between status polls
    poll_interval: Duration,
    /// Ceiling on total polling time for one job
    max_wait: Duration,
}

impl DiarizationClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            retry: RetryPolicy::default(),
            poll_interval: Duration::from_secs(5),
            max_wait: Duration::from_secs(3600),
        }
    }

    /// Submit an audio reference for diarization and wait for the turns.
    pub async fn diarize(&self, audio_url: &str) -> Result<Vec<SpeakerTurn>> {
        info!("submitting diarization job for {}", audio_url);

        let job_id = retry_with_backoff(&self.retry, "diarization submit", || {
            self.submit(audio_url)
        })
        .await
        .map_err(|e| anyhow::anyhow!("diarization submit failed: {}", e))?;

        debug!(job_id = %job_id, "diarization job submitted");

        let output = self.wait_for_completion(&job_id).await?;
        let raw: RawDiarization =
            serde_json::from_value(output).context("Failed to parse diarization output")?;
        let turns = raw.into_turns();

        info!(turns = turns.len(), "diarization complete");
        Ok(turns)
    }

    async fn submit(&self, audio_url: &str) -> Result<String, StageError> {
        let payload = JobRequest {
            input: JobInput {
                task: "diarization".to_string(),
                audio_url: audio_url.to_string(),
                model: "pyannote/speaker-diarization-3.1".to_string(),
            },
        };

        let response = self
            .client
            .post(format!("{}/run", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&payload)
            .timeout(Duration::from_secs(300))
            .send()
            .await
            .map_err(|e| StageError::Transient(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StageError::from_http(status, &body));
        }

        let submitted: JobSubmitted = response
            .json()
            .await
            .map_err(|e| StageError::Fatal(format!("invalid submit response: {}", e)))?;
        Ok(submitted.id)
    }

    /// Poll the status endpoint until the job finishes or the wait ceiling
    /// is reached. Exceeding the ceiling is fatal to the session.
    async fn wait_for_completion(&self, job_id: &str) -> Result<serde_json::Value> {
        let deadline = tokio::time::Instant::now() + self.max_wait;

        loop {
            if tokio::time::Instant::now() >= deadline {
                return Err(
                    StageError::JobTimeout(self.max_wait.as_secs()).into(),
                );
            }

            let response = self
                .client
                .get(format!("{}/status/{}", self.base_url, job_id))
                .bearer_auth(&self.api_key)
                .timeout(Duration::from_secs(30))
                .send()
                .await
                .context("Failed to poll diarization job status")?;

            let status: JobStatus = response
                .json()
                .await
                .context("Failed to parse diarization job status")?;

            match status.status.as_str() {
                "COMPLETED" => return Ok(status.output.unwrap_or_default()),
                "FAILED" => {
                    let reason = status.error.unwrap_or_else(|| "unknown error".to_string());
                    anyhow::bail!("diarization job failed: {}", reason);
                }
                other => {
                    debug!(job_id, state = other, "diarization job still running");
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct JobRequest {
    input: JobInput,
}

#[derive(Debug, Serialize)]
struct JobInput {
    task: String,
    audio_url: String,
    model: String,
}

#[derive(Debug, Deserialize)]
struct JobSubmitted {
    id: String,
}

#[derive(Debug, Deserialize)]
struct JobStatus {
    status: String,
    #[serde(default)]
    output: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<String>,
}
