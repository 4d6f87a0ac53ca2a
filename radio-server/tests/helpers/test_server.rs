//! Test server wrapper for integration tests
//!
//! Builds the full router around a controller with a fixed-bitrate probe, a
//! scratch public folder and a scratch song file.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, Response, StatusCode};
use axum::Router;
use radio_common::EventBus;
use radio_server::api::{create_router, AppContext};
use radio_server::files::FileService;
use radio_server::probe::FixedProbe;
use radio_server::session::PacingConfig;
use radio_server::{SessionController, StreamSettings};
use serde_json::Value;
use tempfile::{NamedTempFile, TempDir};
use tower::ServiceExt; // for `oneshot`

/// Test server instance with scratch files
pub struct TestServer {
    router: Router,
    pub controller: Arc<SessionController>,
    pub public_dir: TempDir,
    pub song: NamedTempFile,
}

impl TestServer {
    /// Song of `song_len` bytes broadcast at `bitrate` bits/s
    pub fn start(song_len: usize, bitrate: u64) -> Self {
        let public_dir = tempfile::tempdir().expect("public dir");
        write_page(public_dir.path(), "home/index.html", "<h1>home</h1>");
        write_page(public_dir.path(), "controller/index.html", "<h1>controller</h1>");
        write_page(public_dir.path(), "home/css/styles.css", "body {}");
        write_page(public_dir.path(), "file.ext", "raw");

        let mut song = NamedTempFile::new().expect("song file");
        let data: Vec<u8> = (0..song_len).map(|i| (i % 256) as u8).collect();
        song.write_all(&data).expect("write song");

        let settings = StreamSettings {
            default_song: song.path().to_path_buf(),
            pacing: PacingConfig::default(),
            listener_buffer_chunks: 256,
        };
        let controller = Arc::new(SessionController::new(
            settings,
            Arc::new(FixedProbe(bitrate)),
            EventBus::default(),
        ));

        let router = create_router(AppContext {
            controller: Arc::clone(&controller),
            files: FileService::new(public_dir.path()),
            port: 3000,
        });

        Self {
            router,
            controller,
            public_dir,
            song,
        }
    }

    pub async fn request(&self, method: Method, uri: &str, body: Option<Value>) -> Response<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        self.router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap()
    }

    pub async fn get(&self, uri: &str) -> Response<Body> {
        self.request(Method::GET, uri, None).await
    }

    /// POST a command and return (status, JSON body)
    pub async fn command(&self, command: &str) -> (StatusCode, Value) {
        let response = self
            .request(
                Method::POST,
                "/controller",
                Some(serde_json::json!({ "command": command })),
            )
            .await;
        let status = response.status();
        (status, body_json(response).await)
    }
}

fn write_page(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, contents).unwrap();
}

/// Read a whole (finite) body as JSON
pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

/// Read a whole (finite) body as text
pub async fn body_text(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Should read body");
    String::from_utf8(bytes.to_vec()).expect("utf-8 body")
}
