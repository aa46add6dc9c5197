//! Email listing, detail and attachments, read from a project's mailbox

use super::files::{load_email_index, read_json, serve_file, str_of};
use super::{ApiError, AppState};
use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const DEFAULT_PER_PAGE: i64 = 50;
const MAX_PER_PAGE: i64 = 200;

#[derive(Debug, Default, Deserialize)]
pub struct EmailQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub category: Option<String>,
    pub search: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EmailPage {
    pub items: Vec<Value>,
    pub total: usize,
    pub page: i64,
    pub per_page: i64,
    pub pages: usize,
}

fn matches_search(entry: &Value, needle: &str) -> bool {
    ["subject", "sender_name", "sender_email"]
        .iter()
        .any(|key| str_of(entry, key).to_lowercase().contains(needle))
}

pub async fn list_emails(
    State(state): State<AppState>,
    Path(code): Path<String>,
    query: Result<Query<EmailQuery>, QueryRejection>,
) -> Result<Json<EmailPage>, ApiError> {
    let Query(q) = query.map_err(|e| ApiError::unprocessable(e.body_text()))?;

    let page = q.page.unwrap_or(1);
    if page < 1 {
        return Err(ApiError::unprocessable("page must be >= 1"));
    }
    let per_page = q.per_page.unwrap_or(DEFAULT_PER_PAGE);
    if !(1..=MAX_PER_PAGE).contains(&per_page) {
        return Err(ApiError::unprocessable(format!(
            "per_page must be between 1 and {}",
            MAX_PER_PAGE
        )));
    }

    let mut emails = load_email_index(&state.project_dir(&code));
    if let Some(category) = q.category.as_deref().filter(|c| !c.is_empty()) {
        emails.retain(|e| str_of(e, "category") == category);
    }
    if let Some(search) = q.search.as_deref().filter(|s| !s.is_empty()) {
        let needle = search.to_lowercase();
        emails.retain(|e| matches_search(e, &needle));
    }
    if let Some(from) = q.date_from.as_deref().filter(|d| !d.is_empty()) {
        emails.retain(|e| str_of(e, "date") >= from);
    }
    if let Some(to) = q.date_to.as_deref().filter(|d| !d.is_empty()) {
        emails.retain(|e| str_of(e, "date") <= to);
    }

    emails.sort_by(|a, b| str_of(b, "date").cmp(str_of(a, "date")));

    let total = emails.len();
    let per = per_page as usize;
    let pages = total.div_ceil(per).max(1);
    let items = emails
        .into_iter()
        .skip((page as usize - 1) * per)
        .take(per)
        .collect();

    Ok(Json(EmailPage {
        items,
        total,
        page,
        per_page,
        pages,
    }))
}

/// Content hashes are lowercase hex
fn is_content_hash(hash: &str) -> bool {
    !hash.is_empty() && hash.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// Parsed record merged over its index entry
pub async fn get_email(
    State(state): State<AppState>,
    Path((code, hash)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    let not_found = || ApiError::not_found(format!("Email {} not found", hash));
    if !is_content_hash(&hash) {
        return Err(not_found());
    }

    let dir = state.project_dir(&code);
    let prefix: String = hash.chars().take(16).collect();
    let parsed_path = dir.join("emails").join("parsed").join(format!("{}.json", prefix));
    let Some(Value::Object(parsed)) = read_json(&parsed_path) else {
        return Err(not_found());
    };

    let mut merged = load_email_index(&dir)
        .into_iter()
        .find(|e| str_of(e, "hash") == hash)
        .and_then(|e| match e {
            Value::Object(map) => Some(map),
            _ => None,
        })
        .unwrap_or_default();
    merged.extend(parsed);
    Ok(Json(Value::Object(merged)))
}

pub async fn get_attachment(
    State(state): State<AppState>,
    Path((code, path)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let root = state.project_dir(&code).join("attachments");
    serve_file(&root, &path, "Attachment").await
}

#[cfg(test)]
mod tests {
    use crate::server::test_support::*;
    use axum::http::StatusCode;
    use serde_json::json;

    fn seed(app: &TestApp) {
        let entries: Vec<_> = (1..=5)
            .map(|i| {
                json!({
                    "hash": format!("hash{:02}", i),
                    "subject": format!("Update {}", i),
                    "sender_name": if i == 3 { "Alice Supplier" } else { "Bob" },
                    "sender_email": "x@acme.com",
                    "date": format!("2025-01-0{}T10:00:00", i),
                    "category": if i % 2 == 0 { json!("quote") } else { json!(null) },
                })
            })
            .collect();
        app.write_file("01001/emails/index.json", &json!(entries).to_string());
    }

    #[tokio::test]
    async fn test_pagination_and_sorting() {
        let app = TestApp::new(None).await;
        seed(&app);

        let (status, body) = app
            .json("GET", "/api/projects/01001/emails?page=2&per_page=2", None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 5);
        assert_eq!(body["pages"], 3);
        assert_eq!(body["items"][0]["hash"], "hash03");
        assert_eq!(body["items"][1]["hash"], "hash02");
    }

    #[tokio::test]
    async fn test_filters() {
        let app = TestApp::new(None).await;
        seed(&app);

        let (_, body) = app
            .json("GET", "/api/projects/01001/emails?category=quote", None)
            .await;
        assert_eq!(body["total"], 2);

        let (_, body) = app
            .json("GET", "/api/projects/01001/emails?search=alice", None)
            .await;
        assert_eq!(body["items"][0]["hash"], "hash03");

        let (_, body) = app
            .json(
                "GET",
                "/api/projects/01001/emails?date_from=2025-01-02&date_to=2025-01-04",
                None,
            )
            .await;
        assert_eq!(body["total"], 2);
    }

    #[tokio::test]
    async fn test_empty_index_has_one_page() {
        let app = TestApp::new(None).await;
        let (status, body) = app.json("GET", "/api/projects/01001/emails", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 0);
        assert_eq!(body["pages"], 1);
    }

    #[tokio::test]
    async fn test_out_of_range_query_is_422() {
        let app = TestApp::new(None).await;
        for uri in [
            "/api/projects/01001/emails?page=0",
            "/api/projects/01001/emails?per_page=201",
            "/api/projects/01001/emails?per_page=abc",
        ] {
            let (status, _) = app.json("GET", uri, None).await;
            assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{}", uri);
        }
    }

    #[tokio::test]
    async fn test_email_detail_merges_index() {
        let app = TestApp::new(None).await;
        let hash = "abcdef0123456789ffff";
        app.write_file(
            "01001/emails/index.json",
            &json!([{"hash": hash, "subject": "Old", "category": "quote"}]).to_string(),
        );
        app.write_file(
            "01001/emails/parsed/abcdef0123456789.json",
            &json!({"hash": hash, "subject": "New", "body_text": "Hello"}).to_string(),
        );

        let (status, body) = app
            .json("GET", &format!("/api/projects/01001/emails/{}", hash), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["subject"], "New");
        assert_eq!(body["category"], "quote");
        assert_eq!(body["body_text"], "Hello");

        let (status, _) = app.json("GET", "/api/projects/01001/emails/missing", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_email_detail_rejects_non_hex_hash() {
        let app = TestApp::new(None).await;
        app.write_file("01001/secret.json", &json!({"token": "hidden"}).to_string());
        app.write_file(
            "01001/emails/parsed/ABCDEF0123456789.json",
            &json!({"subject": "Upper"}).to_string(),
        );

        for hash in ["..%2F..%2Fsecret", "ABCDEF0123456789"] {
            let (status, body) = app
                .json("GET", &format!("/api/projects/01001/emails/{}", hash), None)
                .await;
            assert_eq!(status, StatusCode::NOT_FOUND, "{}", hash);
            assert!(body.get("token").is_none());
        }
    }

    #[tokio::test]
    async fn test_attachment_serving() {
        let app = TestApp::new(None).await;
        app.write_file("01001/attachments/abc123/quote.txt", "quote text");
        app.write_file("01001/emails/index.json", "[]");

        let response = app
            .request(
                "GET",
                "/api/projects/01001/emails/attachments/abc123/quote.txt",
                None,
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "quote text");

        let response = app
            .request(
                "GET",
                "/api/projects/01001/emails/attachments/../emails/index.json",
                None,
            )
            .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = app
            .request("GET", "/api/projects/01001/emails/attachments/nope.pdf", None)
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
