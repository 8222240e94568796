use std::collections::HashMap;

use anyhow::{Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::models::{DecisionList, ReconciledSegment};

use super::prompts;

/// Configuration for the Anthropic API client
#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    /// API key (from ANTHROPIC_API_KEY env var)
    pub api_key: String,
    /// Model to use (e.g., "claude-sonnet-4-20250514")
    pub model: String,
    /// Temperature (0-1, lower = more deterministic)
    pub temperature: f64,
    /// Maximum tokens in response
    pub max_tokens: u32,
}

impl AnthropicConfig {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            model: "claude-sonnet-4-20250514".to_string(),
            temperature: 0.1,
            max_tokens: 4096,
        }
    }
}

/// Anthropic API client for the post-processing passes: speaker naming,
/// report rewriting and decision extraction.
pub struct AnthropicClient {
    client: Client,
    config: AnthropicConfig,
}

impl AnthropicClient {
    pub fn new(config: AnthropicConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    /// Send a message to Claude and get the text of the reply
    pub async fn send_message(&self, system: &str, user: &str) -> Result<String> {
        let request = AnthropicRequest {
            model: self.config.model.clone(),
            max_tokens: self.config.max_tokens,
            temperature: Some(self.config.temperature),
            system: Some(system.to_string()),
            messages: vec![Message {
                role: "user".to_string(),
                content: user.to_string(),
            }],
        };

        let response = self
            .client
            .post("https://api.anthropic.com/v1/messages")
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .context("Failed to send request to Anthropic API")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Anthropic API error: {} - {}", status, body);
        }

        let response: AnthropicResponse = response
            .json()
            .await
            .context("Failed to parse Anthropic API response")?;

        response
            .content
            .first()
            .and_then(|c| {
                if c.content_type == "text" {
                    Some(c.text.clone())
                } else {
                    None
                }
            })
            .context("No text content in response")
    }

    /// Infer real names for the diarization labels from the transcript and
    /// the participant list. Returns the label-to-name map; any failure is
    /// logged and yields an empty map so the pipeline keeps the raw labels.
    pub async fn map_speakers(
        &self,
        segments: &[ReconciledSegment],
        participants: &str,
    ) -> HashMap<String, String> {
        let user = prompts::build_speaker_naming_prompt(segments, participants);

        let reply = match self
            .send_message(prompts::SPEAKER_NAMING_SYSTEM, &user)
            .await
        {
            Ok(reply) => reply,
            Err(e) => {
                warn!("speaker naming failed, keeping raw labels: {:#}", e);
                return HashMap::new();
            }
        };

        match parse_json_reply::<HashMap<String, String>>(&reply) {
            Ok(map) => {
                info!(mapped = map.len(), "speaker names resolved");
                map
            }
            Err(e) => {
                warn!("speaker naming reply unusable, keeping raw labels: {:#}", e);
                HashMap::new()
            }
        }
    }

    /// Rewrite the raw attributed transcript into a structured meeting report
    pub async fn rewrite_report(&self, transcript: &str, agenda: &str) -> Result<String> {
        let user = prompts::build_report_prompt(transcript, agenda);
        self.send_message(prompts::REPORT_SYSTEM, &user).await
    }

    /// Extract the formal decisions from the attributed transcript
    pub async fn extract_decisions(
        &self,
        transcript: &str,
        votes: Option<&str>,
    ) -> Result<DecisionList> {
        let user = prompts::build_decisions_prompt(transcript, votes);
        let reply = self.send_message(prompts::DECISIONS_SYSTEM, &user).await?;
        parse_json_reply(&reply).context("Failed to parse decisions reply")
    }
}

/// Parse a JSON reply, tolerating a Markdown code fence around it
fn parse_json_reply<T: serde::de::DeserializeOwned>(reply: &str) -> Result<T> {
    let trimmed = reply.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|s| s.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed);
    serde_json::from_str(body).context("Reply is not valid JSON")
}

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    content_type: String,
    #[serde(default)]
    text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bare_json_reply() {
        let map: HashMap<String, String> =
            parse_json_reply(r#"{"SPEAKER_00": "Mme Durand"}"#).unwrap();
        assert_eq!(map.get("SPEAKER_00").unwrap(), "Mme Durand");
    }

    #[test]
    fn test_parse_fenced_json_reply() {
        let reply = "```json\n{\"SPEAKER_01\": \"M. Martin\"}\n```";
        let map: HashMap<String, String> = parse_json_reply(reply).unwrap();
        assert_eq!(map.get("SPEAKER_01").unwrap(), "M. Martin");
    }

    #[test]
    fn test_parse_garbage_reply_errors() {
        let result: Result<HashMap<String, String>> = parse_json_reply("je ne sais pas");
        assert!(result.is_err());
    }

    #[test]
    fn test_decisions_reply_parses() {
        let reply = r#"{"decisions": [{"subject": "Budget 2026", "outcome": "adopted", "vote": "12 pour, 3 contre"}]}"#;
        let list: DecisionList = parse_json_reply(reply).unwrap();
        assert_eq!(list.decisions.len(), 1);
        assert_eq!(list.decisions[0].subject, "Budget 2026");
    }
}
