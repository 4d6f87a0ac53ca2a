//! HTTP API for the broadcast server
//!
//! Routes map requests onto the session controller (commands, listener
//! streams, status) and the static file service (pages and assets).

pub mod handlers;
pub mod server;
pub mod sse;

use axum::{
    routing::get,
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::controller::SessionController;
use crate::files::FileService;

/// Path the root URL redirects to
pub const HOME_LOCATION: &str = "/home";

/// Shared application context passed to all handlers
///
/// Holds the single process-wide controller; every clone refers to it.
#[derive(Clone)]
pub struct AppContext {
    pub controller: Arc<SessionController>,
    pub files: FileService,
    /// Server port, reported by the health endpoint
    pub port: u16,
}

/// Create the API router
pub fn create_router(ctx: AppContext) -> Router {
    Router::new()
        // Pages
        .route("/", get(handlers::redirect_home))
        .route("/home", get(handlers::home_page))
        .route(
            "/controller",
            get(handlers::controller_page).post(handlers::command),
        )

        // Live audio
        .route("/stream", get(handlers::stream_audio))

        // Observability
        .route("/health", get(handlers::health))
        .route("/status", get(handlers::status))
        .route("/events", get(sse::event_stream))

        // Static assets (GET) or 404 (anything else)
        .fallback(handlers::static_file)
        .with_state(ctx)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
