use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Contextual documents optionally supplied alongside the audio
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContextDocuments {
    /// Meeting agenda
    pub agenda: Option<PathBuf>,
    /// Participant list, used for speaker-name mapping
    pub participants: Option<PathBuf>,
    /// Vote tally, used for decision extraction
    pub votes: Option<PathBuf>,
}

/// Per-session bookkeeping, persisted as metadata.json in the session folder
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMetadata {
    pub session_id: String,
    pub created_at: String,
    /// Name of the meeting chair, if provided
    pub chair: Option<String>,
    /// Meeting date as provided by the uploader (free-form)
    pub meeting_date: Option<String>,
    pub audio_file: PathBuf,
    /// Filled in once normalization completes
    pub processed_audio: Option<PathBuf>,
    pub context: ContextDocuments,
    pub status: String,
}

impl SessionMetadata {
    pub fn new(audio_file: PathBuf) -> Self {
        Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            created_at: Utc::now().to_rfc3339(),
            chair: None,
            meeting_date: None,
            audio_file,
            processed_audio: None,
            context: ContextDocuments::default(),
            status: "uploaded".to_string(),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write metadata: {:?}", path))?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read metadata: {:?}", path))?;
        serde_json::from_str(&content).context("Failed to parse metadata JSON")
    }
}

/// One decision extracted from the meeting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    /// Short title of the decision
    pub subject: String,
    /// What was decided
    pub outcome: String,
    /// Vote counts if a vote took place (e.g. "12 for, 3 against, 1 abstention")
    #[serde(default)]
    pub vote: Option<String>,
    /// Approximate timestamp in the meeting, HH:MM:SS
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// Structured decision list returned by the extraction step
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DecisionList {
    #[serde(default)]
    pub decisions: Vec<Decision>,
}
