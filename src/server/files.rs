//! File serving and JSON helpers shared by the filesystem-backed routes

use super::ApiError;
use crate::error::Error;
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use serde_json::Value;
use std::path::Path;
use tracing::warn;

/// Serve `rel` from inside `root`; 403 when it resolves outside, 404 when missing
pub async fn serve_file(root: &Path, rel: &str, what: &str) -> Result<Response, ApiError> {
    let missing = || ApiError::not_found(format!("{} not found", what));

    let resolved = tokio::fs::canonicalize(root.join(rel))
        .await
        .map_err(|_| missing())?;
    let root = tokio::fs::canonicalize(root).await.map_err(|_| missing())?;
    if !resolved.starts_with(&root) {
        return Err(Error::Forbidden("Access denied".to_string()).into());
    }
    if !resolved.is_file() {
        return Err(missing());
    }

    let bytes = tokio::fs::read(&resolved).await.map_err(Error::from)?;
    let mime = mime_guess::from_path(&resolved).first_or_octet_stream();
    let filename = resolved
        .file_name()
        .map(|n| n.to_string_lossy().replace('"', ""))
        .unwrap_or_default();

    Ok((
        [
            (CONTENT_TYPE, mime.to_string()),
            (CONTENT_DISPOSITION, format!("attachment; filename=\"{}\"", filename)),
        ],
        bytes,
    )
        .into_response())
}

/// Read a JSON file; missing or malformed files yield `None`
pub fn read_json(path: &Path) -> Option<Value> {
    let content = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str(&content) {
        Ok(v) => Some(v),
        Err(e) => {
            warn!("Ignoring malformed {:?}: {}", path, e);
            None
        }
    }
}

/// Entries of `<project>/emails/index.json`
pub fn load_email_index(project_dir: &Path) -> Vec<Value> {
    match read_json(&project_dir.join("emails").join("index.json")) {
        Some(Value::Array(entries)) => entries,
        Some(Value::Object(mut map)) => match map.remove("emails").or_else(|| map.remove("messages")) {
            Some(Value::Array(entries)) => entries,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

/// String field of a JSON object, empty when absent
pub fn str_of<'a>(value: &'a Value, key: &str) -> &'a str {
    value.get(key).and_then(Value::as_str).unwrap_or_default()
}
