use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// One stage transition within a session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageEntry {
    pub stage: String,
    pub message: String,
    pub timestamp: String,
    /// Optional stage-specific payload (counts, warnings, file names)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Full processing history of one session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionHistory {
    pub session_id: String,
    pub created_at: String,
    /// Latest stage name, duplicated here for cheap listing
    pub status: String,
    pub stages: Vec<StageEntry>,
    pub updated_at: String,
}

/// Append-only processing log, persisted as history.json.
///
/// Every write rewrites the whole file under the lock; the file is small
/// (one entry per session) and this keeps partial writes impossible to
/// observe through this type.
pub struct StatusLog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl StatusLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Record a stage transition for a session, creating the session's
    /// history entry on first use
    pub fn log_status(
        &self,
        session_id: &str,
        stage: &str,
        message: &str,
        data: Option<Value>,
    ) -> Result<()> {
        let _guard = self.lock.lock().map_err(|_| {
            anyhow::anyhow!("status log lock poisoned")
        })?;

        let now = Utc::now().to_rfc3339();
        let mut histories = self.read_all()?;

        let entry = StageEntry {
            stage: stage.to_string(),
            message: message.to_string(),
            timestamp: now.clone(),
            data,
        };

        match histories.iter_mut().find(|h| h.session_id == session_id) {
            Some(history) => {
                history.status = stage.to_string();
                history.updated_at = now;
                history.stages.push(entry);
            }
            None => histories.push(SessionHistory {
                session_id: session_id.to_string(),
                created_at: now.clone(),
                status: stage.to_string(),
                stages: vec![entry],
                updated_at: now,
            }),
        }

        self.write_all(&histories)?;
        debug!(session_id, stage, "status logged");
        Ok(())
    }

    /// History of one session, if any
    pub fn get_status(&self, session_id: &str) -> Result<Option<SessionHistory>> {
        let _guard = self.lock.lock().map_err(|_| {
            anyhow::anyhow!("status log lock poisoned")
        })?;
        Ok(self
            .read_all()?
            .into_iter()
            .find(|h| h.session_id == session_id))
    }

    /// Most recently updated sessions first, at most `limit` entries
    pub fn get_history(&self, limit: usize) -> Result<Vec<SessionHistory>> {
        let _guard = self.lock.lock().map_err(|_| {
            anyhow::anyhow!("status log lock poisoned")
        })?;
        let mut histories = self.read_all()?;
        histories.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        histories.truncate(limit);
        Ok(histories)
    }

    fn read_all(&self) -> Result<Vec<SessionHistory>> {
        if !self.path.exists() {
            return Ok(vec![]);
        }
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read status log: {:?}", self.path))?;
        if content.trim().is_empty() {
            return Ok(vec![]);
        }
        serde_json::from_str(&content).context("Failed to parse status log JSON")
    }

    fn write_all(&self, histories: &[SessionHistory]) -> Result<()> {
        let json = serde_json::to_string_pretty(histories)?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("Failed to write status log: {:?}", self.path))?;
        Ok(())
    }
}
