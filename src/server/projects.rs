//! Project listing and detail, read from the PMO filesystem

use super::documents::count_documents;
use super::files::{load_email_index, read_json, str_of};
use super::{ApiError, AppState};
use crate::pmo::sync::title_case;
use crate::registry::ProjectInfo;
use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const PRODUCT_LABELS: &[(&str, &str)] = &[
    ("diemaster", "DieMaster"),
    ("spotfusion", "SpotFusion"),
    ("visionking", "VisionKing"),
];

const PREFIX_FALLBACK: &[(&str, &str)] = &[("01", "DieMaster"), ("02", "SpotFusion"), ("03", "VisionKing")];

/// Product line from the registry entry, else from the code prefix
pub fn product_line(code: &str, info: Option<&ProjectInfo>) -> String {
    if let Some(product) = info.and_then(|i| i.product.as_deref()).filter(|p| !p.is_empty()) {
        return PRODUCT_LABELS
            .iter()
            .find(|(key, _)| *key == product)
            .map(|(_, label)| label.to_string())
            .unwrap_or_else(|| title_case(product));
    }
    let prefix: String = code.chars().take(2).collect();
    PREFIX_FALLBACK
        .iter()
        .find(|(p, _)| *p == prefix)
        .map(|(_, label)| label.to_string())
        .unwrap_or_else(|| "Unknown".to_string())
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProjectSummary {
    pub code: String,
    pub name: String,
    pub language: String,
    pub email_count: usize,
    pub unread_count: usize,
    pub latest_email_date: Option<String>,
    pub document_count: usize,
    pub phase: Option<String>,
    pub product_line: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProjectDetail {
    #[serde(flatten)]
    pub summary: ProjectSummary,
    pub technical_report: Option<String>,
    pub timeline: Vec<Value>,
}

fn summarize(state: &AppState, code: &str, info: &ProjectInfo) -> ProjectSummary {
    let dir = state.project_dir(code);
    let emails = load_email_index(&dir);

    let unread_count = emails
        .iter()
        .filter(|e| str_of(e, "category").is_empty())
        .count();
    let latest_email_date = emails
        .iter()
        .map(|e| str_of(e, "date"))
        .filter(|d| !d.is_empty())
        .max()
        .map(String::from);

    ProjectSummary {
        code: code.to_string(),
        name: info.name.clone().unwrap_or_else(|| code.to_string()),
        language: info.language.clone().unwrap_or_else(|| "en".to_string()),
        email_count: emails.len(),
        unread_count,
        latest_email_date,
        document_count: count_documents(&dir),
        phase: info.phase.clone(),
        product_line: product_line(code, Some(info)),
    }
}

pub async fn list_projects(State(state): State<AppState>) -> Json<Vec<ProjectSummary>> {
    let registry = state.registry();
    let projects = registry
        .iter()
        .map(|(code, info)| summarize(&state, code, info))
        .collect();
    Json(projects)
}

pub async fn get_project(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<ProjectDetail>, ApiError> {
    let registry = state.registry();
    let info = registry
        .get(&code)
        .ok_or_else(|| ApiError::not_found(format!("Project {} not found", code)))?;

    let dir = state.project_dir(&code);
    let technical_report = std::fs::read_to_string(dir.join("technical_report.md")).ok();
    let timeline = match read_json(&dir.join("timeline.json")) {
        Some(Value::Array(events)) => events,
        _ => Vec::new(),
    };

    Ok(Json(ProjectDetail {
        summary: summarize(&state, &code, info),
        technical_report,
        timeline,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::test_support::*;
    use axum::http::StatusCode;
    use serde_json::json;

    #[test]
    fn test_product_line() {
        let info = |p: &str| ProjectInfo {
            product: Some(p.to_string()),
            ..Default::default()
        };
        assert_eq!(product_line("09001", Some(&info("spotfusion"))), "SpotFusion");
        assert_eq!(product_line("09001", Some(&info("laser cell"))), "Laser Cell");
        assert_eq!(product_line("03001", None), "VisionKing");
        assert_eq!(product_line("77001", None), "Unknown");
    }

    #[tokio::test]
    async fn test_list_projects_counts() {
        let app = TestApp::new(None).await;
        app.write_registry(json!({
            "01001": {"name": "Press line", "phase": "FAT"},
            "02002": {"name": "Welding", "language": "pt"}
        }));
        app.write_file(
            "01001/emails/index.json",
            &json!([
                {"hash": "a", "date": "2025-01-02T10:00:00", "category": "quote"},
                {"hash": "b", "date": "2025-03-04T09:00:00"}
            ])
            .to_string(),
        );
        app.write_file("01001/reference/spec.pdf", "x");
        app.write_file("01001/reports/weekly/w1.md", "x");
        app.write_file("01001/other/ignored.txt", "x");

        let (status, body) = app.json("GET", "/api/projects", None).await;
        assert_eq!(status, StatusCode::OK);
        let first = &body[0];
        assert_eq!(first["code"], "01001");
        assert_eq!(first["email_count"], 2);
        assert_eq!(first["unread_count"], 1);
        assert_eq!(first["latest_email_date"], "2025-03-04T09:00:00");
        assert_eq!(first["document_count"], 2);
        assert_eq!(first["product_line"], "DieMaster");
        assert_eq!(first["language"], "en");
        assert_eq!(body[1]["language"], "pt");
        assert_eq!(body[1]["email_count"], 0);
    }

    #[tokio::test]
    async fn test_project_detail_and_unknown_code() {
        let app = TestApp::new(None).await;
        app.write_registry(json!({"01001": {"name": "Press line"}}));
        app.write_file("01001/technical_report.md", "# Report");
        app.write_file(
            "01001/timeline.json",
            &json!([{"date": "2025-01-01", "event": "Kickoff"}]).to_string(),
        );

        let (status, body) = app.json("GET", "/api/projects/01001", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["technical_report"], "# Report");
        assert_eq!(body["timeline"][0]["event"], "Kickoff");

        let (status, body) = app.json("GET", "/api/projects/99999", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["detail"], "Project 99999 not found");
    }
}
