//! Alert feed endpoints

use super::{ApiError, AppState};
use crate::pmo::{Alert, AlertCreate, AlertFilter};
use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;

pub async fn list_alerts(
    State(state): State<AppState>,
    filter: Result<Query<AlertFilter>, QueryRejection>,
) -> Result<Json<Vec<Alert>>, ApiError> {
    let Query(filter) = filter.map_err(|e| ApiError::unprocessable(e.body_text()))?;
    Ok(Json(state.db.list_alerts(&filter).await?))
}

pub async fn create_alert(
    State(state): State<AppState>,
    Json(input): Json<AlertCreate>,
) -> Result<(StatusCode, Json<Alert>), ApiError> {
    let alert = state.db.create_alert(&input).await?;
    Ok((StatusCode::CREATED, Json(alert)))
}

pub async fn dismiss_alert(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Alert>, ApiError> {
    Ok(Json(state.db.dismiss_alert(id).await?))
}

#[cfg(test)]
mod tests {
    use crate::server::test_support::*;
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_alert_feed() {
        let app = TestApp::new(None).await;

        let (status, first) = app
            .json(
                "POST",
                "/api/alerts",
                Some(json!({"project_code": "01001", "alert_type": "deadline", "title": "FAT slips"})),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(first["severity"], "warning");
        assert_eq!(first["is_read"], false);

        app.json(
            "POST",
            "/api/alerts",
            Some(json!({"alert_type": "quote", "severity": "info", "title": "New quote"})),
        )
        .await;

        let (_, all) = app.json("GET", "/api/alerts", None).await;
        assert_eq!(all.as_array().unwrap().len(), 2);

        let (_, filtered) = app.json("GET", "/api/alerts?project_code=01001", None).await;
        assert_eq!(filtered.as_array().unwrap().len(), 1);

        let id = first["id"].as_i64().unwrap();
        let (status, dismissed) = app
            .json("PUT", &format!("/api/alerts/{}/dismiss", id), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(dismissed["is_read"], true);
        assert!(dismissed["dismissed_at"].is_string());

        let (_, unread) = app.json("GET", "/api/alerts?unread_only=true", None).await;
        let unread = unread.as_array().unwrap();
        assert_eq!(unread.len(), 1);
        assert_eq!(unread[0]["title"], "New quote");
    }

    #[tokio::test]
    async fn test_dismiss_missing_alert_is_404() {
        let app = TestApp::new(None).await;
        let (status, body) = app.json("PUT", "/api/alerts/99/dismiss", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["detail"].is_string());
    }
}
