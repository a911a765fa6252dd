pub mod backend;
pub mod decode;
pub mod endpoint;
pub mod feeder;
pub mod file;
pub mod playback;

pub use backend::{AudioChunk, AudioChunkSource, ChannelChunkSource};
pub use decode::{decode_audio, DecodedAudio};
pub use endpoint::{record_utterance, AudioBuffer, EndpointingRecorder, EndpointingSettings};
pub use feeder::{utterance_chunks, AudioFeeder, ChunkReader, WavChunkReader};
pub use file::{downmix_to_mono, encode_wav, write_wav, AudioFile};
pub use playback::{AudioSink, NullSink, SynthesizedReply, WavFileSink};
