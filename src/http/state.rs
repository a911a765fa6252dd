use crate::services::ServiceHandles;
use crate::session::{SessionConfig, SessionRegistry};
use std::path::PathBuf;
use std::sync::Arc;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Active conversation sessions (session_id → session)
    pub sessions: SessionRegistry,

    /// External service clients, shared by every session
    pub services: ServiceHandles,

    /// Root of the static asset mount
    pub assets_dir: Arc<PathBuf>,

    /// Settings applied to new sessions (session_id is replaced per session)
    pub session_template: Arc<SessionConfig>,

    /// Chunks buffered between uploads and a session's recorder
    pub feed_capacity: usize,
}

impl AppState {
    pub fn new(
        services: ServiceHandles,
        assets_dir: impl Into<PathBuf>,
        session_template: SessionConfig,
        feed_capacity: usize,
    ) -> Self {
        Self {
            sessions: SessionRegistry::new(),
            services,
            assets_dir: Arc::new(assets_dir.into()),
            session_template: Arc::new(session_template),
            feed_capacity,
        }
    }

    pub fn image_dir(&self) -> PathBuf {
        self.assets_dir.join("image")
    }

    pub fn session_audio_dir(&self, session_id: &str) -> PathBuf {
        self.assets_dir.join("audio").join(session_id)
    }
}
