// Integration tests for the HTTP API
//
// The router runs in-process against scripted services; requests are sent
// with `tower::ServiceExt::oneshot`.

mod common;

use anyhow::Result;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use common::{fast_endpointing, Fakes, ScriptedGenerator, ScriptedTranscriber, FAKE_PNG};
use lingo_voice::session::{SessionConfig, TurnState};
use lingo_voice::{create_router, AppState};
use serde_json::{json, Value};
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

const BOUNDARY: &str = "lingo-test-boundary";

struct TestApp {
    router: Router,
    state: AppState,
    assets: TempDir,
    fakes: Fakes,
}

fn test_app(fakes: Fakes) -> Result<TestApp> {
    let assets = TempDir::new()?;
    let template = SessionConfig {
        endpointing: fast_endpointing(),
        service_timeout: Duration::from_secs(2),
        ..SessionConfig::default()
    };
    let state = AppState::new(fakes.handles(), assets.path(), template, 64);

    Ok(TestApp {
        router: create_router(state.clone()),
        state,
        assets,
        fakes,
    })
}

fn default_app() -> Result<TestApp> {
    test_app(Fakes::new(
        ScriptedTranscriber::default(),
        ScriptedGenerator::replies(&["¡Hola, Ana! ¿Qué le pongo?"]),
    ))
}

fn json_request(method: &str, uri: &str, body: Value) -> Result<Request<Body>> {
    Ok(Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))?)
}

fn empty_request(method: &str, uri: &str) -> Result<Request<Body>> {
    Ok(Request::builder().method(method).uri(uri).body(Body::empty())?)
}

fn upload_request(uri: &str, filename: &str, bytes: &[u8]) -> Result<Request<Body>> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n",
            filename
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

    Ok(Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))?)
}

async fn send(router: &Router, request: Request<Body>) -> Result<(StatusCode, Vec<u8>)> {
    let response = router.clone().oneshot(request).await?;
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    Ok((status, bytes.to_vec()))
}

async fn send_json(router: &Router, request: Request<Body>) -> Result<(StatusCode, Value)> {
    let (status, bytes) = send(router, request).await?;
    Ok((status, serde_json::from_slice(&bytes)?))
}

fn profile(session_id: Option<&str>) -> Value {
    let mut body = json!({"language": "Spanish", "level": "beginner", "name": "Ana"});
    if let Some(id) = session_id {
        body["session_id"] = json!(id);
    }
    body
}

#[tokio::test]
async fn test_health_check() -> Result<()> {
    let app = default_app()?;

    let (status, body) = send(&app.router, empty_request("GET", "/health")?).await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"OK");
    Ok(())
}

#[tokio::test]
async fn test_scenario_image_returns_png() -> Result<()> {
    let app = default_app()?;

    let response = app
        .router
        .clone()
        .oneshot(json_request("POST", "/scenario/image", profile(None))?)
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    assert_eq!(&bytes[..], FAKE_PNG);

    // The scenario is kept next to its image
    let saved = app.assets.path().join("image").join("scenario.json");
    let record: Value = serde_json::from_str(&std::fs::read_to_string(saved)?)?;
    assert_eq!(record["place"], "Tapas bar");
    assert!(record["background_image"].is_string());
    assert!(record["avatar_image"].is_string());

    let prompts = app.fakes.images.prompts();
    assert_eq!(prompts.len(), 2);
    assert_eq!(prompts[0].1, "1536x1024");
    assert!(prompts[1].0.contains("portrait of a waiter"));
    assert_eq!(prompts[1].1, "1024x1024");

    // The avatar is served with the other assets
    let (status, avatar) = send(&app.router, empty_request("GET", "/assets/image/avatar.png")?).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(avatar, FAKE_PNG);
    Ok(())
}

#[tokio::test]
async fn test_scenario_image_requires_profile_fields() -> Result<()> {
    let app = default_app()?;
    let body = json!({"language": "Spanish", "level": "beginner", "name": " "});

    let (status, body) = send_json(&app.router, json_request("POST", "/scenario/image", body)?).await?;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("name"));
    Ok(())
}

#[tokio::test]
async fn test_invalid_generated_scenario_is_a_bad_gateway() -> Result<()> {
    let app = test_app(Fakes::new(
        ScriptedTranscriber::default(),
        ScriptedGenerator::default().with_scenario_text("Sorry, I can't help with that."),
    ))?;

    let (status, _) = send_json(
        &app.router,
        json_request("POST", "/sessions", profile(Some("bad-scenario")))?,
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_GATEWAY);

    // The id was released
    assert!(app.state.sessions.reserve("bad-scenario").await.is_ok());
    Ok(())
}

#[tokio::test]
async fn test_session_lifecycle() -> Result<()> {
    let app = default_app()?;

    let (status, created) = send_json(
        &app.router,
        json_request("POST", "/sessions", profile(Some("lesson-1")))?,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(created["session_id"], "lesson-1");
    assert_eq!(created["status"], "active");
    assert_eq!(created["scenario"]["person_to_talk_to"], "waiter");

    // The character opens the conversation, then the session waits for audio
    let handle = app.state.sessions.get("lesson-1").await.expect("registered");
    handle
        .wait_for(|s| s.history.len() == 1 && s.state == TurnState::Recording)
        .await?;

    let (status, stats) =
        send_json(&app.router, empty_request("GET", "/sessions/lesson-1/status")?).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["session_id"], "lesson-1");
    assert_eq!(stats["state"], "recording");
    assert_eq!(stats["turns_count"], 1);

    let (status, transcript) = send_json(
        &app.router,
        empty_request("GET", "/sessions/lesson-1/transcript")?,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(transcript[0]["role"], "assistant");
    assert_eq!(transcript[0]["text"], "¡Hola, Ana! ¿Qué le pongo?");

    let (status, stopped) =
        send_json(&app.router, empty_request("POST", "/sessions/lesson-1/stop")?).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stopped["status"], "stopped");
    assert_eq!(stopped["summary"]["reason"]["kind"], "cancelled");
    assert_eq!(stopped["summary"]["history"].as_array().map(Vec::len), Some(1));

    let (status, _) =
        send_json(&app.router, empty_request("GET", "/sessions/lesson-1/status")?).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn test_duplicate_session_id_conflicts() -> Result<()> {
    let app = default_app()?;

    let (status, _) = send_json(
        &app.router,
        json_request("POST", "/sessions", profile(Some("dup")))?,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send_json(
        &app.router,
        json_request("POST", "/sessions", profile(Some("dup")))?,
    )
    .await?;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("dup"));

    send(&app.router, empty_request("POST", "/sessions/dup/stop")?).await?;
    Ok(())
}

#[tokio::test]
async fn test_session_id_must_be_path_safe() -> Result<()> {
    let app = default_app()?;

    let (status, _) = send_json(
        &app.router,
        json_request("POST", "/sessions", profile(Some("../escape")))?,
    )
    .await?;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn test_generated_session_id() -> Result<()> {
    let app = default_app()?;

    let (status, created) =
        send_json(&app.router, json_request("POST", "/sessions", profile(None))?).await?;

    assert_eq!(status, StatusCode::OK);
    let id = created["session_id"].as_str().unwrap().to_string();
    assert!(id.starts_with("session-"));

    send(&app.router, empty_request("POST", &format!("/sessions/{}/stop", id))?).await?;
    Ok(())
}

#[tokio::test]
async fn test_upload_rules() -> Result<()> {
    let app = default_app()?;
    send_json(
        &app.router,
        json_request("POST", "/sessions", profile(Some("uploads")))?,
    )
    .await?;

    // Unknown session
    let (status, _) = send_json(
        &app.router,
        upload_request("/sessions/missing/audio", "clip.m4a", b"data")?,
    )
    .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Wrong extension
    let (status, body) = send_json(
        &app.router,
        upload_request("/sessions/uploads/audio", "clip.wav", b"RIFF")?,
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains(".m4a"));

    // Right extension, undecodable content
    let (status, _) = send_json(
        &app.router,
        upload_request("/sessions/uploads/audio", "clip.m4a", b"not really audio")?,
    )
    .await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    // The upload itself was kept
    let saved: Vec<_> = std::fs::read_dir(app.assets.path().join("audio").join("uploads"))?
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".m4a"))
        .collect();
    assert_eq!(saved.len(), 1);

    send(&app.router, empty_request("POST", "/sessions/uploads/stop")?).await?;
    Ok(())
}

#[tokio::test]
async fn test_unknown_session_routes_return_not_found() -> Result<()> {
    let app = default_app()?;

    for (method, uri) in [
        ("GET", "/sessions/nope/status"),
        ("GET", "/sessions/nope/transcript"),
        ("POST", "/sessions/nope/stop"),
    ] {
        let (status, body) = send_json(&app.router, empty_request(method, uri)?).await?;
        assert_eq!(status, StatusCode::NOT_FOUND, "{} {}", method, uri);
        assert!(body["error"].is_string());
    }
    Ok(())
}
