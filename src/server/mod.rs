//! PMO REST backend
//!
//! Filesystem-backed project, email and document views plus the supplier,
//! schedule and alert tables of [`PmoDb`]. Every route except
//! `/api/health` sits behind the bearer-token gate.

mod alerts;
mod auth;
mod documents;
mod emails;
mod error;
mod files;
mod projects;
mod schedule;
mod search;
mod sheet_sync;
mod suppliers;

pub use error::ApiError;

use crate::config::Config;
use crate::error::Result;
use crate::pmo::sheets::SheetClient;
use crate::pmo::{sync, PmoDb};
use crate::registry::ProjectRegistry;
use axum::routing::{get, post, put};
use axum::{middleware, Json, Router};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db: PmoDb,
    /// Overrides the Google client built from config
    pub sheet_client: Option<Arc<dyn SheetClient>>,
}

impl AppState {
    pub fn new(config: Config, db: PmoDb) -> Self {
        Self {
            config: Arc::new(config),
            db,
            sheet_client: None,
        }
    }

    pub fn with_sheet_client(mut self, client: Arc<dyn SheetClient>) -> Self {
        self.sheet_client = Some(client);
        self
    }

    pub(crate) fn pmo_root(&self) -> &PathBuf {
        &self.config.pmo.pmo_root
    }

    pub(crate) fn project_dir(&self, code: &str) -> PathBuf {
        self.pmo_root().join(code)
    }

    pub(crate) fn registry(&self) -> ProjectRegistry {
        ProjectRegistry::load_lenient(&self.config.pmo_project_codes_file())
    }
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Build the application router
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/api/projects", get(projects::list_projects))
        .route("/api/projects/:code", get(projects::get_project))
        .route("/api/projects/:code/emails", get(emails::list_emails))
        .route(
            "/api/projects/:code/emails/attachments/*path",
            get(emails::get_attachment),
        )
        .route("/api/projects/:code/emails/:hash", get(emails::get_email))
        .route("/api/projects/:code/documents", get(documents::list_documents))
        .route(
            "/api/projects/:code/documents/*path",
            get(documents::download_document),
        )
        .route("/api/projects/:code/schedule", get(schedule::get_schedule))
        .route("/api/projects/:code/schedule/tasks", post(schedule::create_task))
        .route(
            "/api/projects/:code/schedule/tasks/:task_id",
            put(schedule::update_task),
        )
        .route(
            "/api/suppliers",
            get(suppliers::list_suppliers).post(suppliers::create_supplier),
        )
        .route("/api/suppliers/sync-to-sheet", post(sheet_sync::sync_to_sheet))
        .route("/api/suppliers/sync-from-sheet", post(sheet_sync::sync_from_sheet))
        .route(
            "/api/suppliers/:id",
            get(suppliers::get_supplier)
                .put(suppliers::update_supplier)
                .delete(suppliers::delete_supplier),
        )
        .route("/api/suppliers/:id/contacts", post(suppliers::create_contact))
        .route(
            "/api/suppliers/:id/contacts/:contact_id",
            put(suppliers::update_contact).delete(suppliers::delete_contact),
        )
        .route("/api/suppliers/:id/catalogs", post(suppliers::create_catalog))
        .route(
            "/api/suppliers/:id/catalogs/:catalog_id",
            axum::routing::delete(suppliers::delete_catalog),
        )
        .route(
            "/api/suppliers/:id/quotes",
            get(suppliers::list_quotes).post(suppliers::create_quote),
        )
        .route(
            "/api/suppliers/:id/quotes/:quote_id",
            put(suppliers::update_quote).delete(suppliers::delete_quote),
        )
        .route("/api/suppliers/:id/projects", post(suppliers::link_project))
        .route(
            "/api/suppliers/:id/projects/:project_code",
            axum::routing::delete(suppliers::unlink_project),
        )
        .route("/api/search", get(search::search))
        .route("/api/alerts", get(alerts::list_alerts).post(alerts::create_alert))
        .route("/api/alerts/:id/dismiss", put(alerts::dismiss_alert))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::require_token));

    Router::new()
        .route("/api/health", get(health))
        .merge(api)
        .with_state(state)
}

/// Open the database, run the startup sync and serve until shutdown
pub async fn serve(config: Config) -> Result<()> {
    let db = PmoDb::connect(&config.pmo.db_path).await?;

    if config.pmo.sync_on_startup {
        match sync::run_initial_sync(&db, &config.pmo.pmo_root, &config.pmo.config_root).await {
            Ok(stats) => info!(
                "Startup sync: {} supplier(s) created, {} project schedule(s) changed",
                stats.suppliers.suppliers_created,
                stats.schedules.len()
            ),
            Err(e) => warn!("Initial sync failed: {}", e),
        }
    }

    let addr = format!("{}:{}", config.server.host, config.server.port);
    if config.server.auth_token.as_deref().unwrap_or_default().is_empty() {
        warn!("AUTH_TOKEN is empty; the API is open");
    }

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("PMO backend listening on http://{}", addr);
    axum::serve(listener, router(AppState::new(config, db))).await?;
    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use axum::response::Response;
    use tempfile::TempDir;
    use tower::ServiceExt;

    pub struct TestApp {
        pub state: AppState,
        pub tmp: TempDir,
    }

    impl TestApp {
        pub async fn new(auth_token: Option<&str>) -> Self {
            let tmp = TempDir::new().unwrap();
            let mut config = Config::default();
            config.pmo.pmo_root = tmp.path().join("pmo");
            config.pmo.config_root = tmp.path().join("config");
            config.pmo.db_path = tmp.path().join("db").join("pmo.db");
            config.server.auth_token = auth_token.map(String::from);
            config.sheets.sheet_id = None;
            config.sheets.credentials_path = None;
            std::fs::create_dir_all(&config.pmo.pmo_root).unwrap();
            std::fs::create_dir_all(&config.pmo.config_root).unwrap();

            let db = PmoDb::connect(&config.pmo.db_path).await.unwrap();
            Self {
                state: AppState::new(config, db),
                tmp,
            }
        }

        pub fn pmo_root(&self) -> PathBuf {
            self.state.config.pmo.pmo_root.clone()
        }

        pub fn write_registry(&self, value: Value) {
            std::fs::write(self.state.config.pmo_project_codes_file(), value.to_string()).unwrap();
        }

        pub fn write_file(&self, rel: &str, content: &str) {
            let path = self.pmo_root().join(rel);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, content).unwrap();
        }

        pub async fn request(&self, method: &str, uri: &str, body: Option<Value>) -> Response {
            self.request_with_token(method, uri, body, None).await
        }

        pub async fn request_with_token(
            &self,
            method: &str,
            uri: &str,
            body: Option<Value>,
            token: Option<&str>,
        ) -> Response {
            let mut builder = Request::builder().method(method).uri(uri);
            if let Some(token) = token {
                builder = builder.header("authorization", format!("Bearer {}", token));
            }
            let request = match body {
                Some(body) => builder
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
                None => builder.body(Body::empty()).unwrap(),
            };
            router(self.state.clone()).oneshot(request).await.unwrap()
        }

        pub async fn json(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
            let response = self.request(method, uri, body).await;
            let status = response.status();
            (status, body_json(response).await)
        }
    }

    pub async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), 4 * 1024 * 1024).await.unwrap();
        if bytes.is_empty() {
            return Value::Null;
        }
        serde_json::from_slice(&bytes).unwrap()
    }

    pub async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), 4 * 1024 * 1024).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use axum::http::StatusCode;

    #[tokio::test]
    async fn test_health_is_open() {
        let app = TestApp::new(Some("secret")).await;
        let (status, body) = app.json("GET", "/api/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }
}
