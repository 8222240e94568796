pub mod decode;
pub mod normalize;
pub mod split;

pub use decode::{decode_to_mono, DecodedAudio};
pub use normalize::{normalize_audio, NormalizeConfig, TARGET_SAMPLE_RATE};
pub use split::{probe_duration, split_into_chunks, AudioChunk};
