//! HTTP API for app clients
//!
//! This module provides a REST API around conversation sessions:
//! - POST /scenario/image - Generate a scenario and its background image
//! - POST /sessions - Start a new session
//! - POST /sessions/:id/audio - Upload one utterance (.m4a)
//! - POST /sessions/:id/stop - End a session
//! - GET /sessions/:id/status - Query session status
//! - GET /sessions/:id/transcript - Get conversation history
//! - GET /assets/* - Generated media
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
