//! Google Sheets mirror endpoints

use super::{ApiError, AppState};
use crate::pmo::sheets::{self, ExportResult, GoogleSheetsClient, SheetClient};
use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};
use std::sync::Arc;

fn client(state: &AppState) -> Result<Arc<dyn SheetClient>, ApiError> {
    if let Some(client) = &state.sheet_client {
        return Ok(client.clone());
    }
    let client = GoogleSheetsClient::from_config(&state.config.sheets)?;
    Ok(Arc::new(client))
}

pub async fn sync_to_sheet(State(state): State<AppState>) -> Result<Json<ExportResult>, ApiError> {
    let client = client(&state)?;
    let sheet_id = state.config.sheets.sheet_id.as_deref().unwrap_or("memory");
    Ok(Json(sheets::export_to_sheet(&state.db, client.as_ref(), sheet_id).await?))
}

pub async fn sync_from_sheet(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let client = client(&state)?;
    let stats = sheets::import_from_sheet(&state.db, client.as_ref()).await?;
    Ok(Json(json!({
        "status": "ok",
        "imported": stats.total_imported(),
        "details": stats,
    })))
}

#[cfg(test)]
mod tests {
    use crate::pmo::sheets::{MemorySheet, SUPPLIERS_TAB};
    use crate::server::test_support::*;
    use axum::http::StatusCode;
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_unconfigured_sheet_is_503() {
        let app = TestApp::new(None).await;
        let (status, body) = app.json("POST", "/api/suppliers/sync-to-sheet", None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(body["detail"].as_str().unwrap().contains("GOOGLE_SHEET_ID"));

        let (status, _) = app.json("POST", "/api/suppliers/sync-from-sheet", None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_round_trip_through_memory_sheet() {
        let mut app = TestApp::new(None).await;
        let sheet = Arc::new(MemorySheet::new());
        app.state = app.state.clone().with_sheet_client(sheet.clone());

        app.json("POST", "/api/suppliers", Some(json!({"company": "Acme"}))).await;

        let (status, body) = app.json("POST", "/api/suppliers/sync-to-sheet", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["rows_synced"]["suppliers"], 1);
        assert_eq!(sheet.rows(SUPPLIERS_TAB).len(), 2);

        let mut rows = sheet.rows(SUPPLIERS_TAB);
        rows.push(vec![String::new(), "Globex".to_string()]);
        sheet.set_rows(SUPPLIERS_TAB, rows);

        let (status, body) = app.json("POST", "/api/suppliers/sync-from-sheet", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["imported"], 1);
        assert_eq!(body["details"]["suppliers"]["updated"], 1);
    }
}
