use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::decode::decode_to_mono;

/// One time-bounded chunk of a longer recording.
///
/// The temporary file is owned exclusively by this handle and deleted when
/// it drops, so chunk files cannot accumulate across long sessions even
/// when a chunk fails mid-processing.
#[derive(Debug)]
pub struct AudioChunk {
    pub path: PathBuf,
    /// Offset of this chunk within the full recording, in seconds
    pub start: f64,
    pub end: f64,
    pub index: usize,
}

impl AudioChunk {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

impl Drop for AudioChunk {
    fn drop(&mut self) {
        if self.path.exists() {
            if let Err(e) = std::fs::remove_file(&self.path) {
                warn!("failed to remove chunk file {:?}: {}", self.path, e);
            } else {
                debug!("removed chunk file {:?}", self.path);
            }
        }
    }
}

/// Duration of an audio file in seconds.
///
/// ffprobe reads only the header, so it is tried first; a full in-process
/// decode is the fallback when ffprobe is missing.
pub async fn probe_duration(path: &Path) -> Result<f64> {
    let probed = Command::new("ffprobe")
        .args(["-v", "error"])
        .args(["-show_entries", "format=duration"])
        .args(["-of", "default=noprint_wrappers=1:nokey=1"])
        .arg(path)
        .output()
        .await;

    match probed {
        Ok(output) if output.status.success() => {
            let text = String::from_utf8_lossy(&output.stdout);
            if let Ok(duration) = text.trim().parse::<f64>() {
                return Ok(duration);
            }
            warn!("ffprobe returned unparseable duration: {:?}", text.trim());
        }
        Ok(output) => {
            warn!(
                "ffprobe exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Err(e) => {
            warn!("ffprobe unavailable ({}), decoding for duration", e);
        }
    }

    let decoded = decode_to_mono(path)?;
    Ok(decoded.duration_seconds())
}

/// Split an audio file into fixed-duration, non-overlapping mono/16k chunks.
///
/// Chunk filenames carry a random suffix so concurrent sessions sharing an
/// output directory cannot collide.
pub async fn split_into_chunks(
    input: &Path,
    output_dir: &Path,
    chunk_secs: f64,
) -> Result<Vec<AudioChunk>> {
    let total = probe_duration(input).await?;
    if total <= 0.0 {
        bail!("could not determine audio duration for {:?}", input);
    }

    let count = (total / chunk_secs).ceil() as usize;
    info!(
        duration = total,
        chunks = count,
        chunk_secs, "splitting audio into chunks"
    );

    let mut chunks = Vec::with_capacity(count);
    for index in 0..count {
        let start = index as f64 * chunk_secs;
        let duration = chunk_secs.min(total - start);
        if duration <= 0.0 {
            break;
        }

        let suffix = &uuid::Uuid::new_v4().to_string()[..8];
        let path = output_dir.join(format!("chunk_{:04}_{}.wav", index, suffix));

        let output = Command::new("ffmpeg")
            .args(["-threads", "0"])
            .arg("-i")
            .arg(input)
            .args(["-ss", &start.to_string()])
            .args(["-t", &duration.to_string()])
            .args(["-acodec", "pcm_s16le"])
            .args(["-ar", "16000"])
            .args(["-ac", "1"])
            .args(["-loglevel", "error", "-y"])
            .arg(&path)
            .output()
            .await
            .context("Failed to spawn ffmpeg for chunk extraction")?;

        if !output.status.success() {
            bail!(
                "ffmpeg failed cutting chunk {}: {}",
                index,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        debug!(index, start, end = start + duration, "created chunk");
        chunks.push(AudioChunk {
            path,
            start,
            end: start + duration,
            index,
        });
    }

    Ok(chunks)
}
