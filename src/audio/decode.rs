use std::path::Path;

use anyhow::{anyhow, Context, Result};
use symphonia::core::audio::{AudioBufferRef, Signal};
use symphonia::core::codecs::CODEC_TYPE_NULL;
use symphonia::core::conv::FromSample;
use tracing::debug;

/// Decoded audio: mono f32 samples plus source properties
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: usize,
}

impl DecodedAudio {
    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Decode an audio file to mono f32 PCM.
///
/// Multi-channel sources are downmixed by averaging channels per frame.
pub fn decode_to_mono<P: AsRef<Path>>(path: P) -> Result<DecodedAudio> {
    debug!("decoding audio file {:?}", path.as_ref());

    let src = std::fs::File::open(&path)
        .with_context(|| format!("Failed to open audio file: {:?}", path.as_ref()))?;
    let mss = symphonia::core::io::MediaSourceStream::new(Box::new(src), Default::default());

    let hint = symphonia::core::probe::Hint::new();
    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &Default::default(), &Default::default())
        .context("Failed to probe audio format")?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| anyhow!("no supported audio tracks found"))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &Default::default())
        .map_err(|_| anyhow!("unsupported codec"))?;

    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| anyhow!("could not determine sample rate"))?;
    let channels = track
        .codec_params
        .channels
        .map(|c| c.count())
        .unwrap_or(1)
        .max(1);

    let mut samples = Vec::new();

    while let Ok(packet) = format.next_packet() {
        while !format.metadata().is_latest() {
            format.metadata().pop();
        }
        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet)? {
            AudioBufferRef::F32(buf) => downmix(&mut samples, buf.as_ref()),
            AudioBufferRef::F64(buf) => downmix_conv(&mut samples, buf.as_ref()),
            AudioBufferRef::S8(buf) => downmix_conv(&mut samples, buf.as_ref()),
            AudioBufferRef::S16(buf) => downmix_conv(&mut samples, buf.as_ref()),
            AudioBufferRef::S24(buf) => downmix_conv(&mut samples, buf.as_ref()),
            AudioBufferRef::S32(buf) => downmix_conv(&mut samples, buf.as_ref()),
            AudioBufferRef::U8(buf) => downmix_conv(&mut samples, buf.as_ref()),
            AudioBufferRef::U16(buf) => downmix_conv(&mut samples, buf.as_ref()),
            AudioBufferRef::U24(buf) => downmix_conv(&mut samples, buf.as_ref()),
            AudioBufferRef::U32(buf) => downmix_conv(&mut samples, buf.as_ref()),
        }
    }

    if samples.is_empty() {
        return Err(anyhow!("decoded zero samples from {:?}", path.as_ref()));
    }

    debug!(
        samples = samples.len(),
        sample_rate, channels, "decoded audio to mono"
    );

    Ok(DecodedAudio {
        samples,
        sample_rate,
        channels,
    })
}

fn downmix(out: &mut Vec<f32>, buf: &symphonia::core::audio::AudioBuffer<f32>) {
    let channels = buf.spec().channels.count().max(1);
    let frames = buf.frames();
    for frame in 0..frames {
        let mut sum = 0.0f32;
        for ch in 0..channels {
            sum += buf.chan(ch)[frame];
        }
        out.push(sum / channels as f32);
    }
}

fn downmix_conv<T>(out: &mut Vec<f32>, buf: &symphonia::core::audio::AudioBuffer<T>)
where
    T: symphonia::core::sample::Sample,
    f32: FromSample<T>,
{
    let channels = buf.spec().channels.count().max(1);
    let frames = buf.frames();
    for frame in 0..frames {
        let mut sum = 0.0f32;
        for ch in 0..channels {
            sum += f32::from_sample(buf.chan(ch)[frame]);
        }
        out.push(sum / channels as f32);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_wav_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");

        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for i in 0..8000 {
            let sample = ((i as f32 * 0.05).sin() * 8000.0) as i16;
            writer.write_sample(sample).unwrap();
            writer.write_sample(sample).unwrap();
        }
        writer.finalize().unwrap();

        let decoded = decode_to_mono(&path).unwrap();
        assert_eq!(decoded.sample_rate, 8000);
        assert_eq!(decoded.channels, 2);
        // Stereo frames downmix to one mono sample each
        assert_eq!(decoded.samples.len(), 8000);
        assert!((decoded.duration_seconds() - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_decode_missing_file_errors() {
        assert!(decode_to_mono("/nonexistent/audio.wav").is_err());
    }
}
