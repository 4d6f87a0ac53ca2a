//! API integration tests for radio-server
//!
//! Drive the router with `oneshot` requests; no socket is bound.

mod helpers;

use std::time::Duration;

use axum::http::{header, Method, StatusCode};
use helpers::{body_json, body_text, TestServer};
use http_body_util::BodyExt;

const BITRATE: u64 = 64_000;

// =============================================================================
// Health / Status
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let server = TestServer::start(8_000, BITRATE);

    let response = server.get("/health").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["module"], "radio-server");
    assert_eq!(json["port"], 3000);
}

#[tokio::test]
async fn test_status_reports_idle_then_streaming() {
    let server = TestServer::start(80_000, BITRATE);

    let json = body_json(server.get("/status").await).await;
    assert_eq!(json["state"], "Idle");
    assert_eq!(json["listeners"], 0);
    assert!(json.get("session_id").is_none());
    assert!(json.get("started_at").is_none());

    let (status, _) = server.command("start").await;
    assert_eq!(status, StatusCode::OK);

    let json = body_json(server.get("/status").await).await;
    assert_eq!(json["state"], "Streaming");
    assert_eq!(json["bitrate"], BITRATE);
    assert_eq!(json["bytes_per_second"], BITRATE / 8);
    assert!(json["started_at"].is_string());

    server.controller.stop().await;
}

// =============================================================================
// Commands
// =============================================================================

#[tokio::test]
async fn test_start_and_stop_commands() {
    let server = TestServer::start(80_000, BITRATE);

    let (status, json) = server.command("START_STREAM").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, serde_json::json!({ "result": "ok" }));
    assert_eq!(server.controller.state().await, radio_server::StreamState::Streaming);

    let (status, json) = server.command("stop").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["result"], "ok");
    assert_eq!(server.controller.state().await, radio_server::StreamState::Idle);
}

#[tokio::test]
async fn test_unknown_command_is_not_found() {
    let server = TestServer::start(8_000, BITRATE);

    let (status, json) = server.command("pause").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["result"], "not found");
    assert_eq!(server.controller.state().await, radio_server::StreamState::Idle);
}

#[tokio::test]
async fn test_start_with_missing_song_still_ok() {
    let server = TestServer::start(8_000, BITRATE);
    let song = server.song.path().to_path_buf();
    std::fs::remove_file(&song).unwrap();

    let (_, json) = server.command("start").await;
    assert_eq!(json["result"], "ok");
    assert_eq!(server.controller.state().await, radio_server::StreamState::Idle);
}

// =============================================================================
// Pages and Static Files
// =============================================================================

#[tokio::test]
async fn test_root_redirects_home() {
    let server = TestServer::start(8_000, BITRATE);

    let response = server.get("/").await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(response.headers()[header::LOCATION], "/home");
}

#[tokio::test]
async fn test_home_and_controller_pages() {
    let server = TestServer::start(8_000, BITRATE);

    let response = server.get("/home").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/html");
    assert_eq!(body_text(response).await, "<h1>home</h1>");

    let response = server.get("/controller").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "<h1>controller</h1>");
}

#[tokio::test]
async fn test_static_asset_content_types() {
    let server = TestServer::start(8_000, BITRATE);

    let response = server.get("/home/css/styles.css").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/css");

    let response = server.get("/file.ext").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get(header::CONTENT_TYPE).is_none());
    assert_eq!(body_text(response).await, "raw");
}

#[tokio::test]
async fn test_missing_file_is_404() {
    let server = TestServer::start(8_000, BITRATE);

    let response = server.get("/index.png").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = server.get("/../secret.txt").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_non_get_unknown_route_is_404() {
    let server = TestServer::start(8_000, BITRATE);

    let response = server.request(Method::POST, "/home/css/styles.css", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// =============================================================================
// Live Audio
// =============================================================================

#[tokio::test]
async fn test_stream_attaches_and_detaches_listener() {
    let server = TestServer::start(80_000, BITRATE);

    let response = server.get("/stream").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "audio/mpeg");
    assert_eq!(response.headers()[header::ACCEPT_RANGES], "bytes");
    assert_eq!(server.controller.listener_count(), 1);

    drop(response);
    assert_eq!(server.controller.listener_count(), 0);
}

#[tokio::test]
async fn test_stream_receives_first_chunk() {
    let server = TestServer::start(80_000, BITRATE);

    let mut body = server.get("/stream").await.into_body();
    server.command("start").await;

    let frame = tokio::time::timeout(Duration::from_secs(2), body.frame())
        .await
        .expect("chunk within two seconds")
        .expect("body still open")
        .expect("frame without error");
    let data = frame.into_data().expect("data frame");

    // 64 kbit/s -> 8000 bytes/s in tenth-of-a-second chunks
    assert_eq!(data.len(), 800);
    assert_eq!(data[0], 0);
    assert_eq!(data[1], 1);

    drop(body);
    server.controller.stop().await;
    assert_eq!(server.controller.listener_count(), 0);
}

// =============================================================================
// Events
// =============================================================================

#[tokio::test]
async fn test_event_stream_announces_connection() {
    let server = TestServer::start(8_000, BITRATE);

    let response = server.get("/events").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/event-stream");

    let mut body = response.into_body();
    let frame = tokio::time::timeout(Duration::from_secs(1), body.frame())
        .await
        .expect("connection event")
        .expect("body still open")
        .expect("frame without error");
    let text = String::from_utf8(frame.into_data().unwrap().to_vec()).unwrap();
    assert!(text.contains("event: ConnectionStatus"));
    assert!(text.contains("data: connected"));
}
