use std::collections::HashMap;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::models::{DecisionList, ReconciledSegment};

/// Machine-readable session output, written as segments.json
#[derive(Debug, Clone, Serialize)]
pub struct MachineMinutes {
    pub segments: Vec<ReconciledSegment>,
    pub metadata: MinutesMetadata,
}

#[derive(Debug, Clone, Serialize)]
pub struct MinutesMetadata {
    pub total_segments: usize,
    pub empty_segments: usize,
    pub speakers: Vec<String>,
    pub duration_seconds: f64,
    pub strategy: String,
}

impl MachineMinutes {
    pub fn new(segments: Vec<ReconciledSegment>, strategy: &str) -> Self {
        let empty = segments.iter().filter(|s| !s.has_text()).count();
        let speakers: Vec<String> = segments
            .iter()
            .map(|s| s.speaker.clone())
            .collect::<std::collections::BTreeSet<_>>()
            .into_iter()
            .collect();
        let duration = segments.last().map(|s| s.end).unwrap_or(0.0);

        let metadata = MinutesMetadata {
            total_segments: segments.len(),
            empty_segments: empty,
            speakers,
            duration_seconds: duration,
            strategy: strategy.to_string(),
        };
        Self { segments, metadata }
    }

    /// Write to a JSON file
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let file = std::fs::File::create(path)
            .with_context(|| format!("Failed to create file: {:?}", path))?;
        serde_json::to_writer_pretty(file, self).context("Failed to write JSON")?;
        Ok(())
    }
}

/// Human-readable minutes: one block per segment, speaker names applied
pub struct HumanMinutes<'a> {
    segments: &'a [ReconciledSegment],
    speaker_names: &'a HashMap<String, String>,
}

impl<'a> HumanMinutes<'a> {
    pub fn new(
        segments: &'a [ReconciledSegment],
        speaker_names: &'a HashMap<String, String>,
    ) -> Self {
        Self {
            segments,
            speaker_names,
        }
    }

    /// Format the minutes as human-readable text
    pub fn format(&self) -> String {
        let mut output = String::new();

        for segment in self.segments {
            if !segment.has_text() {
                continue;
            }
            let name = self
                .speaker_names
                .get(&segment.speaker)
                .unwrap_or(&segment.speaker);
            output.push_str(&format!("[{}] {}:\n", format_hms(segment.start), name));
            output.push_str(&wrap_text(segment.text.trim(), 80));
            output.push_str("\n\n");
        }

        output
    }

    /// Write to a text file
    pub fn write_file(&self, path: &Path) -> Result<()> {
        let mut file = std::fs::File::create(path)
            .with_context(|| format!("Failed to create file: {:?}", path))?;
        write!(file, "{}", self.format())?;
        Ok(())
    }
}

/// Write the rewritten report as plain text
pub fn write_report(path: &Path, report: &str) -> Result<()> {
    std::fs::write(path, report).with_context(|| format!("Failed to write report: {:?}", path))
}

/// Write the extracted decisions as pretty JSON
pub fn write_decisions(path: &Path, decisions: &DecisionList) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create file: {:?}", path))?;
    serde_json::to_writer_pretty(file, decisions).context("Failed to write decisions JSON")?;
    Ok(())
}

/// Format seconds as HH:MM:SS
pub fn format_hms(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    format!(
        "{:02}:{:02}:{:02}",
        total / 3600,
        (total % 3600) / 60,
        total % 60
    )
}

/// Wrap text at approximately the given width
fn wrap_text(text: &str, width: usize) -> String {
    let mut result = String::new();
    let mut line_len = 0;

    for word in text.split_whitespace() {
        if line_len + word.len() + 1 > width && line_len > 0 {
            result.push('\n');
            line_len = 0;
        }
        if line_len > 0 {
            result.push(' ');
            line_len += 1;
        }
        result.push_str(word);
        line_len += word.len();
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(start: f64, end: f64, speaker: &str, text: &str) -> ReconciledSegment {
        ReconciledSegment {
            start,
            end,
            speaker: speaker.to_string(),
            text: text.to_string(),
        }
    }

    #[test]
    fn test_format_hms() {
        assert_eq!(format_hms(0.0), "00:00:00");
        assert_eq!(format_hms(65.4), "00:01:05");
        assert_eq!(format_hms(3661.0), "01:01:01");
        assert_eq!(format_hms(-2.0), "00:00:00");
    }

    #[test]
    fn test_wrap_text() {
        let text = "This is a test of the text wrapping function that should wrap at 20 chars";
        let wrapped = wrap_text(text, 20);
        for line in wrapped.lines() {
            assert!(line.len() <= 25); // Allow some slack for long words
        }
    }

    #[test]
    fn test_human_minutes_applies_names() {
        let segments = vec![
            segment(0.0, 5.0, "SPEAKER_00", "La seance est ouverte."),
            segment(5.0, 9.0, "SPEAKER_01", "Merci madame la maire."),
        ];
        let mut names = HashMap::new();
        names.insert("SPEAKER_00".to_string(), "Mme Dubois".to_string());

        let text = HumanMinutes::new(&segments, &names).format();
        assert!(text.contains("[00:00:00] Mme Dubois:"));
        // Unmapped labels stay as-is
        assert!(text.contains("[00:00:05] SPEAKER_01:"));
    }

    #[test]
    fn test_machine_minutes_metadata() {
        let segments = vec![
            segment(0.0, 5.0, "SPEAKER_00", "bonjour"),
            segment(5.0, 9.0, "SPEAKER_01", ""),
        ];
        let minutes = MachineMinutes::new(segments, "overlap");
        assert_eq!(minutes.metadata.total_segments, 2);
        assert_eq!(minutes.metadata.empty_segments, 1);
        assert_eq!(minutes.metadata.speakers.len(), 2);
        assert_eq!(minutes.metadata.duration_seconds, 9.0);
    }
}
