//! Project documents under `reference/`, `meetings/` and `reports/`

use super::files::serve_file;
use super::{ApiError, AppState};
use axum::extract::{Path, State};
use axum::response::Response;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path as FsPath;
use walkdir::WalkDir;

pub const DOCUMENT_DIRS: [&str; 3] = ["reference", "meetings", "reports"];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    pub name: String,
    /// Relative to the project directory
    pub path: String,
    pub directory: String,
    pub size_bytes: u64,
    pub modified_at: Option<String>,
}

/// Files of every document directory, sorted by path within each directory
pub fn scan_documents(project_dir: &FsPath) -> Vec<Document> {
    let mut docs = Vec::new();
    for dir in DOCUMENT_DIRS {
        let root = project_dir.join(dir);
        if !root.is_dir() {
            continue;
        }
        let walker = WalkDir::new(&root).sort_by_file_name().into_iter();
        for entry in walker.filter_map(|e| e.ok()).filter(|e| e.file_type().is_file()) {
            let Ok(meta) = entry.metadata() else {
                continue;
            };
            let rel = entry
                .path()
                .strip_prefix(project_dir)
                .unwrap_or(entry.path())
                .to_string_lossy()
                .replace('\\', "/");
            docs.push(Document {
                name: entry.file_name().to_string_lossy().to_string(),
                path: rel,
                directory: dir.to_string(),
                size_bytes: meta.len(),
                modified_at: meta
                    .modified()
                    .ok()
                    .map(|t| DateTime::<Utc>::from(t).to_rfc3339()),
            });
        }
    }
    docs
}

pub fn count_documents(project_dir: &FsPath) -> usize {
    DOCUMENT_DIRS
        .iter()
        .map(|dir| {
            WalkDir::new(project_dir.join(dir))
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
                .count()
        })
        .sum()
}

pub async fn list_documents(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<Vec<Document>>, ApiError> {
    let dir = state.project_dir(&code);
    if !dir.is_dir() {
        return Err(ApiError::not_found(format!("Project {} not found", code)));
    }
    Ok(Json(scan_documents(&dir)))
}

pub async fn download_document(
    State(state): State<AppState>,
    Path((code, path)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    serve_file(&state.project_dir(&code), &path, "Document").await
}
