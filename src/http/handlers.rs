use super::state::AppState;
use crate::audio::{
    decode_audio, utterance_chunks, AudioSink, ChannelChunkSource, NullSink, WavFileSink,
};
use crate::conversation::ConversationTurn;
use crate::scenario::{
    LearnerProfile, ScenarioFields, ScenarioGenerationError, ScenarioGenerator, ScenarioImagery,
    ScenarioRecord,
};
use crate::session::{Session, SessionHandle, SessionStats, SessionSummary, TurnController};
use axum::{
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ProfileRequest {
    pub language: String,
    pub level: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    /// Optional session ID (if not provided, generate UUID)
    pub session_id: Option<String>,
    pub language: String,
    pub level: String,
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct CreateSessionResponse {
    pub session_id: String,
    pub status: String,
    pub scenario: ScenarioFields,
}

#[derive(Debug, Serialize)]
pub struct UploadAudioResponse {
    pub status: String,
    pub filename: String,
    pub saved_path: String,
    pub chunks: usize,
}

#[derive(Debug, Serialize)]
pub struct StopSessionResponse {
    pub session_id: String,
    pub status: String,
    pub summary: Option<SessionSummary>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

fn generation_error_response(err: ScenarioGenerationError) -> Response {
    match err {
        ScenarioGenerationError::Service(e) => error_response(
            StatusCode::BAD_GATEWAY,
            format!("Scenario generation failed: {}", e),
        ),
        ScenarioGenerationError::Scenario(e) => error_response(
            StatusCode::BAD_GATEWAY,
            format!("Generated scenario was invalid: {}", e),
        ),
    }
}

/// Session ids end up in asset paths
fn valid_session_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 64
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /scenario/image
/// Generate a scenario with its background and avatar; return the background.
/// Both images and `scenario.json` are kept under `/assets/image`.
pub async fn scenario_image(
    State(state): State<AppState>,
    Json(req): Json<ProfileRequest>,
) -> impl IntoResponse {
    let profile = match LearnerProfile::new(req.language, req.level, req.name) {
        Ok(p) => p,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e.to_string()),
    };

    let generator = ScenarioGenerator::new(state.services.generation.clone());
    let scenario = match generator.generate(&profile).await {
        Ok(s) => s,
        Err(e) => {
            error!("Scenario generation failed: {}", e);
            return generation_error_response(e);
        }
    };

    let imagery = ScenarioImagery::new(state.services.images.clone(), state.image_dir());
    let rendered = async {
        let background = imagery.render_background(&scenario, "background.png").await?;
        let avatar = imagery.render_avatar(&scenario, "avatar.png").await?;
        anyhow::Ok((background, avatar))
    }
    .await;
    let (image_path, avatar_path) = match rendered {
        Ok(paths) => paths,
        Err(e) => {
            error!("Scenario images failed: {:#}", e);
            return error_response(StatusCode::BAD_GATEWAY, format!("{:#}", e));
        }
    };

    let mut record = ScenarioRecord::new(scenario);
    record.background_image = Some(image_path.clone());
    record.avatar_image = Some(avatar_path);
    if let Err(e) = record.save(state.image_dir().join("scenario.json")) {
        warn!("Failed to persist scenario: {:#}", e);
    }

    match tokio::fs::read(&image_path).await {
        Ok(bytes) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "image/png"),
                (
                    header::CONTENT_DISPOSITION,
                    "attachment; filename=\"background.png\"",
                ),
            ],
            bytes,
        )
            .into_response(),
        Err(e) => error_response(
            StatusCode::NOT_FOUND,
            format!("Background image not found: {}", e),
        ),
    }
}

/// POST /sessions
/// Generate a scenario and start a conversation session fed by uploads
pub async fn create_session(
    State(state): State<AppState>,
    Json(req): Json<CreateSessionRequest>,
) -> impl IntoResponse {
    // Generate or use provided session ID
    let session_id = req
        .session_id
        .unwrap_or_else(|| format!("session-{}", uuid::Uuid::new_v4()));

    if !valid_session_id(&session_id) {
        return error_response(
            StatusCode::BAD_REQUEST,
            format!("Invalid session id '{}'", session_id),
        );
    }

    let profile = match LearnerProfile::new(req.language, req.level, req.name) {
        Ok(p) => p,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e.to_string()),
    };

    info!("Creating session: {}", session_id);

    let reservation = match state.sessions.reserve(&session_id).await {
        Ok(r) => r,
        Err(e) => return error_response(StatusCode::CONFLICT, e.to_string()),
    };

    let generator = ScenarioGenerator::new(state.services.generation.clone());
    let scenario = match generator.generate(&profile).await {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to create session {}: {}", session_id, e);
            state.sessions.release(reservation).await;
            return generation_error_response(e);
        }
    };

    let sink: Box<dyn AudioSink> = match WavFileSink::new(state.session_audio_dir(&session_id)) {
        Ok(sink) => Box::new(sink),
        Err(e) => {
            warn!("Replies for {} will not be rendered: {:#}", session_id, e);
            Box::new(NullSink)
        }
    };

    let mut config = (*state.session_template).clone();
    config.session_id = session_id.clone();

    let (audio_tx, source) =
        ChannelChunkSource::channel(state.feed_capacity, format!("uploads:{}", session_id));
    let session = Session::new(session_id.clone(), scenario.clone(), config.retention);
    let controller = TurnController::new(
        session,
        state.services.clone(),
        Box::new(source),
        sink,
        config,
        CancellationToken::new(),
    );

    let handle = SessionHandle::spawn(controller, audio_tx);
    if let Err(e) = state.sessions.activate(reservation, handle).await {
        error!("Failed to register session {}: {}", session_id, e);
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
    }

    info!("Session {} started", session_id);

    (
        StatusCode::OK,
        Json(CreateSessionResponse {
            session_id,
            status: "active".to_string(),
            scenario: scenario.fields().clone(),
        }),
    )
        .into_response()
}

/// POST /sessions/:session_id/audio
/// Accept one spoken utterance (.m4a only) for a session
pub async fn upload_audio(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    mut multipart: Multipart,
) -> impl IntoResponse {
    let Some(handle) = state.sessions.get(&session_id).await else {
        return error_response(
            StatusCode::NOT_FOUND,
            format!("Session {} not found", session_id),
        );
    };

    let field = match multipart.next_field().await {
        Ok(Some(field)) => field,
        Ok(None) => return error_response(StatusCode::BAD_REQUEST, "Missing file field"),
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e.to_string()),
    };

    let filename = field.file_name().unwrap_or_default().to_string();
    if !filename.to_lowercase().ends_with(".m4a") {
        return error_response(StatusCode::BAD_REQUEST, "Only .m4a uploads accepted");
    }

    let bytes = match field.bytes().await {
        Ok(b) => b,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e.to_string()),
    };

    let dir = state.session_audio_dir(&session_id);
    let dest = dir.join(format!("upload-{}.m4a", uuid::Uuid::new_v4()));
    let saved = async {
        tokio::fs::create_dir_all(&dir).await?;
        tokio::fs::write(&dest, &bytes).await
    }
    .await;
    if let Err(e) = saved {
        return error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Could not save file: {}", e),
        );
    }

    let endpointing = state.session_template.endpointing.clone();
    let decoded = tokio::task::spawn_blocking(move || decode_audio(&bytes, Some("m4a"))).await;
    let audio = match decoded {
        Ok(Ok(audio)) => audio,
        Ok(Err(e)) => {
            return error_response(
                StatusCode::UNPROCESSABLE_ENTITY,
                format!("Could not decode audio: {:#}", e),
            )
        }
        Err(e) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };

    let chunks = utterance_chunks(&audio.mono_samples(), audio.sample_rate, &endpointing);

    match handle.push_audio(chunks).await {
        Ok(count) => {
            info!(
                "Queued {:.1}s upload for session {} ({} chunks)",
                audio.duration_seconds(),
                session_id,
                count
            );
            (
                StatusCode::OK,
                Json(UploadAudioResponse {
                    status: "ok".to_string(),
                    filename,
                    saved_path: dest.display().to_string(),
                    chunks: count,
                }),
            )
                .into_response()
        }
        Err(e) => error_response(StatusCode::GONE, format!("{:#}", e)),
    }
}

/// GET /sessions/:session_id/status
pub async fn get_session_status(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    match state.sessions.get(&session_id).await {
        Some(handle) => {
            let stats: SessionStats = handle.status().stats();
            (StatusCode::OK, Json(stats)).into_response()
        }
        None => error_response(
            StatusCode::NOT_FOUND,
            format!("Session {} not found", session_id),
        ),
    }
}

/// GET /sessions/:session_id/transcript
/// Conversation history so far
pub async fn get_session_transcript(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    match state.sessions.get(&session_id).await {
        Some(handle) => {
            let transcript: Vec<ConversationTurn> = handle.status().history;
            (StatusCode::OK, Json(transcript)).into_response()
        }
        None => error_response(
            StatusCode::NOT_FOUND,
            format!("Session {} not found", session_id),
        ),
    }
}

/// POST /sessions/:session_id/stop
/// Cancel a session and remove it
pub async fn stop_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    info!("Stopping session: {}", session_id);

    let Some(handle) = state.sessions.remove(&session_id).await else {
        return error_response(
            StatusCode::NOT_FOUND,
            format!("Session {} not found", session_id),
        );
    };

    match handle.stop().await {
        Ok(summary) => (
            StatusCode::OK,
            Json(StopSessionResponse {
                session_id,
                status: "stopped".to_string(),
                summary,
            }),
        )
            .into_response(),
        Err(e) => {
            error!("Failed to stop session: {:#}", e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to stop session: {:#}", e),
            )
        }
    }
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
