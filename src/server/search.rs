//! Substring search across email indexes and document names

use super::documents::scan_documents;
use super::files::{load_email_index, str_of};
use super::{ApiError, AppState};
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::path::PathBuf;

const SNIPPET_CHARS: usize = 200;
const EMAIL_SCORE: f64 = 1.0;
const DOCUMENT_SCORE: f64 = 0.8;

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
    pub project: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    #[serde(rename = "type")]
    pub kind: String,
    pub project_code: String,
    pub title: String,
    pub snippet: String,
    pub path: Option<String>,
    pub score: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SearchResponse {
    pub query: String,
    pub total: usize,
    pub results: Vec<SearchResult>,
}

/// Window of at most `SNIPPET_CHARS` chars opening a third of a window before the match
pub fn snippet_around(text: &str, needle_lower: &str) -> Option<String> {
    let lower: Vec<char> = text.to_lowercase().chars().collect();
    let needle: Vec<char> = needle_lower.chars().collect();
    if needle.is_empty() || needle.len() > lower.len() {
        return None;
    }
    let idx = lower.windows(needle.len()).position(|w| w == needle.as_slice())?;

    // Lowercasing can change char counts; fall back to the lowered text then
    let chars: Vec<char> = if lower.len() == text.chars().count() {
        text.chars().collect()
    } else {
        lower
    };
    let start = idx.saturating_sub(SNIPPET_CHARS / 3);
    let end = (start + SNIPPET_CHARS).min(chars.len());
    Some(chars[start..end].iter().collect::<String>().trim().to_string())
}

fn human_size(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    let b = bytes as f64;
    if b < KB {
        format!("{} B", bytes)
    } else if b < KB * KB {
        format!("{:.1} KB", b / KB)
    } else {
        format!("{:.1} MB", b / (KB * KB))
    }
}

fn readable_stem(name: &str) -> String {
    let stem = name.rsplit_once('.').map(|(s, _)| s).unwrap_or(name);
    stem.replace(['_', '-'], " ").to_lowercase()
}

/// Registry codes followed by any other project directories on disk
fn project_codes(state: &AppState) -> Vec<String> {
    let mut codes = state.registry().codes();
    let nested = state.pmo_root().join("pmo");
    let scan_root = if nested.is_dir() { nested } else { state.pmo_root().clone() };
    if let Ok(entries) = std::fs::read_dir(&scan_root) {
        let mut found: Vec<String> = entries
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_dir())
            .map(|e| e.file_name().to_string_lossy().to_string())
            .filter(|name| name != "config" && name != "pmo" && !name.starts_with('.'))
            .collect();
        found.sort();
        for name in found {
            if !codes.contains(&name) {
                codes.push(name);
            }
        }
    }
    codes
}

/// `<root>/pmo/<code>` when present, else `<root>/<code>`
fn project_dir(state: &AppState, code: &str) -> PathBuf {
    let nested = state.pmo_root().join("pmo").join(code);
    if nested.is_dir() {
        nested
    } else {
        state.project_dir(code)
    }
}

fn search_emails(state: &AppState, codes: &[String], needle: &str) -> Vec<SearchResult> {
    let mut results = Vec::new();
    for code in codes {
        for entry in load_email_index(&project_dir(state, code)) {
            let subject = str_of(&entry, "subject");
            let sender = format!("{} {}", str_of(&entry, "sender_name"), str_of(&entry, "sender_email"));
            let preview = str_of(&entry, "body_preview");

            let snippet = [subject, sender.trim(), preview]
                .iter()
                .find_map(|field| snippet_around(field, needle));
            let Some(snippet) = snippet else {
                continue;
            };

            let hash = str_of(&entry, "hash");
            results.push(SearchResult {
                kind: "email".to_string(),
                project_code: code.clone(),
                title: if subject.is_empty() { "(no subject)".to_string() } else { subject.to_string() },
                snippet,
                path: (!hash.is_empty()).then(|| hash.to_string()),
                score: EMAIL_SCORE,
            });
        }
    }
    results
}

fn search_documents(state: &AppState, codes: &[String], needle: &str) -> Vec<SearchResult> {
    let mut results = Vec::new();
    for code in codes {
        for doc in scan_documents(&project_dir(state, code)) {
            let name = doc.name.to_lowercase();
            if !name.contains(needle) && !readable_stem(&doc.name).contains(needle) {
                continue;
            }
            results.push(SearchResult {
                kind: "document".to_string(),
                project_code: code.clone(),
                snippet: format!("{}/{} ({})", doc.directory, doc.name, human_size(doc.size_bytes)),
                title: doc.name,
                path: Some(doc.path),
                score: DOCUMENT_SCORE,
            });
        }
    }
    results
}

pub async fn search(
    State(state): State<AppState>,
    query: Result<Query<SearchQuery>, QueryRejection>,
) -> Result<Json<SearchResponse>, ApiError> {
    let Query(params) = query.map_err(|e| ApiError::unprocessable(e.body_text()))?;
    let q = params
        .q
        .filter(|q| !q.is_empty())
        .ok_or_else(|| ApiError::unprocessable("q must be at least 1 character"))?;
    let kind = params.kind.unwrap_or_else(|| "all".to_string());
    if !matches!(kind.as_str(), "all" | "emails" | "documents") {
        return Err(ApiError::unprocessable("type must be emails, documents or all"));
    }

    let codes = match params.project.filter(|p| !p.is_empty()) {
        Some(project) => vec![project],
        None => project_codes(&state),
    };
    let needle = q.to_lowercase();

    let mut results = Vec::new();
    if kind != "documents" {
        results.extend(search_emails(&state, &codes, &needle));
    }
    if kind != "emails" {
        results.extend(search_documents(&state, &codes, &needle));
    }
    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.title.cmp(&b.title))
    });

    Ok(Json(SearchResponse {
        query: q,
        total: results.len(),
        results,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::test_support::*;
    use axum::http::StatusCode;
    use serde_json::json;

    #[test]
    fn test_snippet_window() {
        let text = format!("{}needle{}", "a".repeat(150), "b".repeat(300));
        let snippet = snippet_around(&text, "needle").unwrap();
        assert_eq!(snippet.chars().count(), SNIPPET_CHARS);
        assert!(snippet.starts_with(&"a".repeat(SNIPPET_CHARS / 3)));
        assert!(snippet[SNIPPET_CHARS / 3..].starts_with("needle"));

        assert_eq!(snippet_around("Short Needle", "needle").unwrap(), "Short Needle");
        assert_eq!(snippet_around("nothing", "needle"), None);
    }

    #[test]
    fn test_readable_stem() {
        assert_eq!(readable_stem("Press_Line-Layout.pdf"), "press line layout");
    }

    fn seed(app: &TestApp) {
        app.write_registry(json!({"01001": {"name": "Press"}}));
        app.write_file(
            "01001/emails/index.json",
            &json!([
                {"hash": "h1", "subject": "Gripper quote", "sender_name": "Jane"},
                {"hash": "h2", "subject": "Status", "sender_email": "gripper@acme.com"},
                {"hash": "h3", "subject": "", "body_preview": "the gripper arrived"}
            ])
            .to_string(),
        );
        app.write_file("01001/reference/gripper_datasheet.pdf", "pdf");
        app.write_file("01001/reports/weekly.md", "text");
    }

    #[tokio::test]
    async fn test_search_all() {
        let app = TestApp::new(None).await;
        seed(&app);

        let (status, body) = app.json("GET", "/api/search?q=Gripper", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 4);
        let results = body["results"].as_array().unwrap();
        assert_eq!(results[0]["title"], "(no subject)");
        assert_eq!(results[1]["title"], "Gripper quote");
        assert_eq!(results[3]["type"], "document");
        assert_eq!(results[3]["snippet"], "reference/gripper_datasheet.pdf (3 B)");
        assert_eq!(results[3]["score"], 0.8);
    }

    #[tokio::test]
    async fn test_search_type_and_project_filters() {
        let app = TestApp::new(None).await;
        seed(&app);

        let (_, body) = app.json("GET", "/api/search?q=gripper&type=documents", None).await;
        assert_eq!(body["total"], 1);

        let (_, body) = app
            .json("GET", "/api/search?q=gripper&project=02002", None)
            .await;
        assert_eq!(body["total"], 0);
    }

    #[tokio::test]
    async fn test_empty_query_is_422() {
        let app = TestApp::new(None).await;
        let (status, _) = app.json("GET", "/api/search?q=", None).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        let (status, _) = app.json("GET", "/api/search", None).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }
}
