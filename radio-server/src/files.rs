//! Static file service for the web pages
//!
//! Resolves request paths under the public root. Unrelated to the broadcast
//! pipeline.

use std::path::{Component, Path, PathBuf};
use tokio::fs::File;

use crate::error::{Error, Result};

/// Home page, relative to the public root
pub const HOME_PAGE: &str = "home/index.html";

/// Controller page, relative to the public root
pub const CONTROLLER_PAGE: &str = "controller/index.html";

/// Content type for the file extensions the pages use
pub fn content_type(extension: &str) -> Option<&'static str> {
    match extension {
        ".html" => Some("text/html"),
        ".css" => Some("text/css"),
        ".js" => Some("text/javascript"),
        _ => None,
    }
}

/// An opened static file
#[derive(Debug)]
pub struct FileStream {
    pub file: File,
    /// Extension including the leading dot, or empty
    pub extension: String,
}

impl FileStream {
    pub fn content_type(&self) -> Option<&'static str> {
        content_type(&self.extension)
    }
}

/// Serves files from one root directory
#[derive(Debug, Clone)]
pub struct FileService {
    root: PathBuf,
}

impl FileService {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Map a request path onto the root
    ///
    /// Leading slashes are ignored. Paths that could escape the root are
    /// reported as not found.
    pub fn resolve(&self, filename: &str) -> Result<PathBuf> {
        let relative = Path::new(filename.trim_start_matches('/'));

        let mut resolved = self.root.clone();
        for component in relative.components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(Error::NotFound(filename.to_string()));
                }
            }
        }
        Ok(resolved)
    }

    /// Open a file for streaming
    pub async fn get_file_stream(&self, filename: &str) -> Result<FileStream> {
        let path = self.resolve(filename)?;

        let metadata = tokio::fs::metadata(&path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::NotFound(filename.to_string()),
            _ => Error::Io(e),
        })?;
        if !metadata.is_file() {
            return Err(Error::NotFound(filename.to_string()));
        }

        let file = File::open(&path).await?;
        let extension = path
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default();

        Ok(FileStream { file, extension })
    }
}
