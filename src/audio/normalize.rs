use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::decode::decode_to_mono;

/// Target format for everything downstream: mono, 16 kHz, 16-bit PCM
pub const TARGET_SAMPLE_RATE: u32 = 16_000;

/// Configuration for audio normalization
#[derive(Debug, Clone)]
pub struct NormalizeConfig {
    /// Output sample rate
    pub sample_rate: u32,
    /// Apply the speech-band filter chain (high-pass 80 Hz, low-pass 8 kHz,
    /// dynamic loudness normalization) before the basic conversion
    pub enhance: bool,
    /// Wall-clock ceiling on one ffmpeg invocation; sized for multi-hour
    /// recordings
    pub ffmpeg_timeout: Duration,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            sample_rate: TARGET_SAMPLE_RATE,
            enhance: false,
            ffmpeg_timeout: Duration::from_secs(3600),
        }
    }
}

/// Ordered fallback chain for producing the canonical PCM file.
///
/// Each strategy is attempted in order with a uniform contract; the first
/// success wins and every failure reason is kept for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NormalizeStrategy {
    /// External ffmpeg invocation (fast, handles every container)
    FfmpegCli,
    /// In-process decode + sinc resample + peak normalize
    InProcess,
    /// Last-ditch numeric path: decode + linear-interpolation resample
    LinearResample,
}

impl NormalizeStrategy {
    async fn attempt(&self, input: &Path, output: &Path, config: &NormalizeConfig) -> Result<()> {
        match self {
            Self::FfmpegCli => ffmpeg_convert(input, output, config, false).await,
            Self::InProcess => in_process_convert(input, output, config.sample_rate, true),
            Self::LinearResample => in_process_convert(input, output, config.sample_rate, false),
        }
    }
}

/// Reduce arbitrary input audio to a canonical mono/16kHz/16-bit PCM file.
///
/// Writes exactly one output file and never mutates the input. In enhanced
/// mode a failing filter chain degrades to the basic conversion rather than
/// aborting; exhausting every strategy is fatal to the caller's stage.
pub async fn normalize_audio(
    input: &Path,
    output: &Path,
    config: &NormalizeConfig,
) -> Result<PathBuf> {
    info!("normalizing audio {:?} -> {:?}", input, output);

    if config.enhance {
        match ffmpeg_convert(input, output, config, true).await {
            Ok(()) => {
                info!("audio normalized with enhancement filters");
                return Ok(output.to_path_buf());
            }
            Err(e) => {
                warn!("enhanced normalization failed, degrading to basic path: {e:#}");
            }
        }
    }

    let strategies = [
        NormalizeStrategy::FfmpegCli,
        NormalizeStrategy::InProcess,
        NormalizeStrategy::LinearResample,
    ];

    let mut failures: Vec<String> = Vec::new();
    for strategy in strategies {
        match strategy.attempt(input, output, config).await {
            Ok(()) => {
                info!(?strategy, "audio normalized");
                return Ok(output.to_path_buf());
            }
            Err(e) => {
                warn!(?strategy, "normalization strategy failed: {e:#}");
                failures.push(format!("{:?}: {:#}", strategy, e));
            }
        }
    }

    bail!(
        "audio normalization exhausted all strategies: {}",
        failures.join("; ")
    )
}

async fn ffmpeg_convert(
    input: &Path,
    output: &Path,
    config: &NormalizeConfig,
    enhance: bool,
) -> Result<()> {
    let mut command = Command::new("ffmpeg");
    command.args(["-i"]).arg(input);

    if enhance {
        // One pass over the file: rumble removal, speech-band ceiling for
        // the 16 kHz target, then dynamic loudness normalization
        command.args([
            "-af",
            "highpass=f=80,lowpass=f=8000,loudnorm=I=-16:TP=-1.5:LRA=11",
        ]);
    }

    command
        .args(["-ac", "1"])
        .args(["-ar", &config.sample_rate.to_string()])
        .args(["-acodec", "pcm_s16le"])
        .args(["-loglevel", "error", "-y"])
        .arg(output)
        .kill_on_drop(true);

    debug!("running ffmpeg: {:?}", command);

    let result = tokio::time::timeout(config.ffmpeg_timeout, command.output())
        .await
        .map_err(|_| anyhow!("ffmpeg timed out after {:?}", config.ffmpeg_timeout))?
        .context("Failed to spawn ffmpeg")?;

    if !result.status.success() {
        let stderr = String::from_utf8_lossy(&result.stderr);
        bail!("ffmpeg exited with {}: {}", result.status, stderr.trim());
    }

    Ok(())
}

fn in_process_convert(input: &Path, output: &Path, sample_rate: u32, sinc: bool) -> Result<()> {
    let decoded = decode_to_mono(input)?;

    let resampled = if decoded.sample_rate == sample_rate {
        decoded.samples
    } else if sinc {
        sinc_resample(&decoded.samples, decoded.sample_rate, sample_rate)?
    } else {
        linear_resample(&decoded.samples, decoded.sample_rate, sample_rate)
    };

    let normalized = peak_normalize(&resampled);
    write_pcm16_wav(output, &normalized, sample_rate)
}

/// Scale so the loudest sample sits at 95% of full scale; silence passes
/// through untouched
pub fn peak_normalize(samples: &[f32]) -> Vec<f32> {
    let peak = samples.iter().fold(0.0f32, |max, &s| max.max(s.abs()));
    if peak == 0.0 {
        return samples.to_vec();
    }
    let scale = 0.95 / peak;
    samples.iter().map(|&s| s * scale).collect()
}

fn sinc_resample(input: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
    debug!(from_rate, to_rate, "sinc resampling");
    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let mut resampler = SincFixedIn::<f32>::new(
        to_rate as f64 / from_rate as f64,
        2.0,
        params,
        input.len(),
        1,
    )?;

    let waves_in = vec![input.to_vec()];
    let waves_out = resampler.process(&waves_in, None)?;
    waves_out
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("resampler produced no output"))
}

/// Naive linear-interpolation resampler, the final fallback when both
/// ffmpeg and the sinc path are unavailable
pub fn linear_resample(input: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if input.is_empty() || from_rate == to_rate {
        return input.to_vec();
    }
    let ratio = from_rate as f64 / to_rate as f64;
    let out_len = (input.len() as f64 / ratio).floor() as usize;
    let mut output = Vec::with_capacity(out_len);

    for i in 0..out_len {
        let pos = i as f64 * ratio;
        let idx = pos.floor() as usize;
        let frac = (pos - idx as f64) as f32;
        let a = input[idx.min(input.len() - 1)];
        let b = input[(idx + 1).min(input.len() - 1)];
        output.push(a + (b - a) * frac);
    }

    output
}

fn write_pcm16_wav(path: &Path, samples: &[f32], sample_rate: u32) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)
        .with_context(|| format!("Failed to create WAV file: {:?}", path))?;
    for &sample in samples {
        writer.write_sample((sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)?;
    }
    writer.finalize().context("Failed to finalize WAV file")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peak_normalize_silence_unchanged() {
        let silence = vec![0.0f32; 100];
        assert_eq!(peak_normalize(&silence), silence);
    }

    #[test]
    fn test_peak_normalize_scales_to_095() {
        let samples = vec![0.5, -0.25, 0.1];
        let normalized = peak_normalize(&samples);
        let peak = normalized.iter().fold(0.0f32, |m, &s| m.max(s.abs()));
        assert!((peak - 0.95).abs() < 1e-6);
    }

    #[test]
    fn test_linear_resample_halves_length() {
        let input: Vec<f32> = (0..1000).map(|i| (i as f32 * 0.01).sin()).collect();
        let output = linear_resample(&input, 32_000, 16_000);
        assert!((output.len() as i64 - 500).abs() <= 1);
    }

    #[test]
    fn test_linear_resample_same_rate_is_identity() {
        let input = vec![0.1, 0.2, 0.3];
        assert_eq!(linear_resample(&input, 16_000, 16_000), input);
    }

    #[test]
    fn test_linear_resample_empty_input() {
        assert!(linear_resample(&[], 44_100, 16_000).is_empty());
    }

    #[tokio::test]
    async fn test_in_process_fallback_produces_target_format() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.wav");
        let output = dir.path().join("out.wav");

        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 44_100,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&input, spec).unwrap();
        for i in 0..44_100 {
            let sample = ((i as f32 * 0.03).sin() * 10_000.0) as i16;
            writer.write_sample(sample).unwrap();
            writer.write_sample(sample).unwrap();
        }
        writer.finalize().unwrap();

        in_process_convert(&input, &output, TARGET_SAMPLE_RATE, false).unwrap();

        let reader = hound::WavReader::open(&output).unwrap();
        let out_spec = reader.spec();
        assert_eq!(out_spec.channels, 1);
        assert_eq!(out_spec.sample_rate, TARGET_SAMPLE_RATE);
        assert_eq!(out_spec.bits_per_sample, 16);
    }
}
