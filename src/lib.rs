pub mod audio;
pub mod config;
pub mod conversation;
pub mod error;
pub mod http;
pub mod scenario;
pub mod services;
pub mod session;

pub use audio::{
    AudioBuffer, AudioChunk, AudioChunkSource, AudioFeeder, AudioFile, AudioSink,
    ChannelChunkSource, EndpointingRecorder, EndpointingSettings, SynthesizedReply,
    WavChunkReader, WavFileSink,
};
pub use config::Config;
pub use conversation::{ConversationMemory, ConversationTurn, RetentionPolicy, Role};
pub use error::{RecordingDeviceError, ScenarioError, ServiceError, SessionError, TurnFailure};
pub use http::{create_router, AppState};
pub use scenario::{bind, parse_scenario_text, Scenario, ScenarioRecord, SystemContext};
pub use services::{
    GenerationClient, GenerationRequest, ImageClient, OpenAiClient, ServiceHandles,
    SynthesisClient, TranscriptionClient,
};
pub use session::{
    Session, SessionConfig, SessionRegistry, SessionStats, SessionSummary, TerminationReason,
    TurnController, TurnOutcome, TurnState,
};
