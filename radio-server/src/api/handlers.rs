//! HTTP request handlers
//!
//! Page serving, command dispatch, live audio and status endpoints.

use axum::{
    body::Body,
    extract::State,
    http::{header, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};
use futures::stream::StreamExt;
use serde::Serialize;
use tokio_util::io::ReaderStream;
use tracing::{error, warn};

use super::{AppContext, HOME_LOCATION};
use crate::command::{CommandRequest, CommandResponse};
use crate::controller::StreamStatus;
use crate::error::Error;
use crate::files::{CONTROLLER_PAGE, HOME_PAGE};

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub module: String,
    pub version: String,
    pub port: u16,
}

// ============================================================================
// Pages
// ============================================================================

/// GET / - Redirect to the home page
pub async fn redirect_home() -> Response {
    (StatusCode::FOUND, [(header::LOCATION, HOME_LOCATION)]).into_response()
}

/// GET /home
pub async fn home_page(State(ctx): State<AppContext>) -> Response {
    serve_file(&ctx, HOME_PAGE).await
}

/// GET /controller
pub async fn controller_page(State(ctx): State<AppContext>) -> Response {
    serve_file(&ctx, CONTROLLER_PAGE).await
}

/// Fallback - static assets for GET, 404 for everything else
pub async fn static_file(State(ctx): State<AppContext>, method: Method, uri: Uri) -> Response {
    if method != Method::GET {
        return StatusCode::NOT_FOUND.into_response();
    }
    serve_file(&ctx, uri.path()).await
}

/// Stream a file from the public root
///
/// The content type is set for known extensions and omitted otherwise.
async fn serve_file(ctx: &AppContext, filename: &str) -> Response {
    match ctx.files.get_file_stream(filename).await {
        Ok(file) => {
            let content_type = file.content_type();
            let body = Body::from_stream(ReaderStream::new(file.file));
            match content_type {
                Some(ct) => ([(header::CONTENT_TYPE, ct)], body).into_response(),
                None => body.into_response(),
            }
        }
        Err(Error::NotFound(name)) => {
            warn!("File not found: {}", name);
            StatusCode::NOT_FOUND.into_response()
        }
        Err(e) => {
            error!("Failed to serve {}: {}", filename, e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

// ============================================================================
// Commands
// ============================================================================

/// POST /controller - Start or stop the broadcast
pub async fn command(
    State(ctx): State<AppContext>,
    Json(req): Json<CommandRequest>,
) -> Json<CommandResponse> {
    Json(ctx.controller.handle_command(&req.command).await)
}

// ============================================================================
// Live Audio
// ============================================================================

/// GET /stream - Live audio for one listener
///
/// The listener stays attached until the response body is dropped.
pub async fn stream_audio(State(ctx): State<AppContext>) -> Response {
    let stream = ctx
        .controller
        .create_client_stream()
        .map(Ok::<_, std::io::Error>);

    (
        [
            (header::CONTENT_TYPE, "audio/mpeg"),
            (header::ACCEPT_RANGES, "bytes"),
        ],
        Body::from_stream(stream),
    )
        .into_response()
}

// ============================================================================
// Status
// ============================================================================

/// GET /health - Health check endpoint
pub async fn health(State(ctx): State<AppContext>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        module: "radio-server".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        port: ctx.port,
    })
}

/// GET /status - Controller state and listener count
pub async fn status(State(ctx): State<AppContext>) -> Json<StreamStatus> {
    Json(ctx.controller.status().await)
}
