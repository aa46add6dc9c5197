//! Supplier registry endpoints

use super::{ApiError, AppState};
use crate::pmo::{
    Catalog, CatalogCreate, Contact, ContactCreate, ContactUpdate, Quote, QuoteCreate, QuoteUpdate,
    SupplierCreate, SupplierDetail, SupplierFilter, SupplierProject, SupplierProjectCreate,
    SupplierSummary, SupplierUpdate,
};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;

type ApiResult<T> = Result<T, ApiError>;

pub async fn list_suppliers(
    State(state): State<AppState>,
    Query(filter): Query<SupplierFilter>,
) -> ApiResult<Json<Vec<SupplierSummary>>> {
    Ok(Json(state.db.list_suppliers(&filter).await?))
}

pub async fn create_supplier(
    State(state): State<AppState>,
    Json(input): Json<SupplierCreate>,
) -> ApiResult<(StatusCode, Json<SupplierDetail>)> {
    let supplier = state.db.create_supplier(&input).await?;
    let detail = state.db.get_supplier_detail(supplier.id).await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

pub async fn get_supplier(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<SupplierDetail>> {
    Ok(Json(state.db.get_supplier_detail(id).await?))
}

pub async fn update_supplier(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<SupplierUpdate>,
) -> ApiResult<Json<SupplierDetail>> {
    state.db.update_supplier(id, &input).await?;
    Ok(Json(state.db.get_supplier_detail(id).await?))
}

pub async fn delete_supplier(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    state.db.delete_supplier(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ===== Contacts =====

pub async fn create_contact(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<ContactCreate>,
) -> ApiResult<(StatusCode, Json<Contact>)> {
    Ok((StatusCode::CREATED, Json(state.db.create_contact(id, &input).await?)))
}

pub async fn update_contact(
    State(state): State<AppState>,
    Path((id, contact_id)): Path<(i64, i64)>,
    Json(input): Json<ContactUpdate>,
) -> ApiResult<Json<Contact>> {
    Ok(Json(state.db.update_contact(id, contact_id, &input).await?))
}

pub async fn delete_contact(
    State(state): State<AppState>,
    Path((id, contact_id)): Path<(i64, i64)>,
) -> ApiResult<StatusCode> {
    state.db.delete_contact(id, contact_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ===== Catalogs =====

pub async fn create_catalog(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<CatalogCreate>,
) -> ApiResult<(StatusCode, Json<Catalog>)> {
    Ok((StatusCode::CREATED, Json(state.db.create_catalog(id, &input).await?)))
}

pub async fn delete_catalog(
    State(state): State<AppState>,
    Path((id, catalog_id)): Path<(i64, i64)>,
) -> ApiResult<StatusCode> {
    state.db.delete_catalog(id, catalog_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ===== Quotes =====

pub async fn list_quotes(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Vec<Quote>>> {
    if state.db.get_supplier(id).await?.is_none() {
        return Err(ApiError::not_found(format!("Supplier {} not found", id)));
    }
    Ok(Json(state.db.list_quotes(id).await?))
}

pub async fn create_quote(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<QuoteCreate>,
) -> ApiResult<(StatusCode, Json<Quote>)> {
    Ok((StatusCode::CREATED, Json(state.db.create_quote(id, &input).await?)))
}

pub async fn update_quote(
    State(state): State<AppState>,
    Path((id, quote_id)): Path<(i64, i64)>,
    Json(input): Json<QuoteUpdate>,
) -> ApiResult<Json<Quote>> {
    Ok(Json(state.db.update_quote(id, quote_id, &input).await?))
}

pub async fn delete_quote(
    State(state): State<AppState>,
    Path((id, quote_id)): Path<(i64, i64)>,
) -> ApiResult<StatusCode> {
    state.db.delete_quote(id, quote_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ===== Project links =====

pub async fn link_project(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<SupplierProjectCreate>,
) -> ApiResult<(StatusCode, Json<SupplierProject>)> {
    Ok((StatusCode::CREATED, Json(state.db.link_project(id, &input).await?)))
}

pub async fn unlink_project(
    State(state): State<AppState>,
    Path((id, project_code)): Path<(i64, String)>,
) -> ApiResult<StatusCode> {
    state.db.unlink_project(id, &project_code).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use crate::server::test_support::*;
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_supplier_lifecycle() {
        let app = TestApp::new(None).await;

        let (status, created) = app
            .json(
                "POST",
                "/api/suppliers",
                Some(json!({
                    "company": "Acme Tools",
                    "category": "tooling",
                    "contacts": [{"name": "Jane", "email": "jane@acme.com", "is_primary": true}]
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["contacts"][0]["name"], "Jane");
        assert_eq!(created["contact_count"], 1);
        let id = created["id"].as_i64().unwrap();

        let (status, _) = app
            .json("POST", "/api/suppliers", Some(json!({"company": "Acme Tools"})))
            .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, quote) = app
            .json(
                "POST",
                &format!("/api/suppliers/{}/quotes", id),
                Some(json!({"description": "Die set", "amount": 1500.0})),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(quote["currency"], "USD");

        let (status, _) = app
            .json(
                "POST",
                &format!("/api/suppliers/{}/projects", id),
                Some(json!({"project_code": "01001"})),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        let (status, _) = app
            .json(
                "POST",
                &format!("/api/suppliers/{}/projects", id),
                Some(json!({"project_code": "01001"})),
            )
            .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (_, listed) = app
            .json("GET", "/api/suppliers?project_code=01001", None)
            .await;
        assert_eq!(listed[0]["quote_count"], 1);
        assert_eq!(listed[0]["project_codes"][0], "01001");

        let (status, updated) = app
            .json(
                "PUT",
                &format!("/api/suppliers/{}", id),
                Some(json!({"country": "BR"})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["country"], "BR");
        assert_eq!(updated["category"], "tooling");

        let response = app
            .request("DELETE", &format!("/api/suppliers/{}", id), None)
            .await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let (status, body) = app.json("GET", &format!("/api/suppliers/{}", id), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["detail"].as_str().unwrap().contains("not found"));
    }

    #[tokio::test]
    async fn test_nested_resources_of_unknown_supplier_are_404() {
        let app = TestApp::new(None).await;
        let (status, _) = app
            .json("POST", "/api/suppliers/42/contacts", Some(json!({"name": "X"})))
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = app.json("GET", "/api/suppliers/42/quotes", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let response = app.request("DELETE", "/api/suppliers/42/catalogs/1", None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_contact_update_and_delete() {
        let app = TestApp::new(None).await;
        let (_, created) = app
            .json("POST", "/api/suppliers", Some(json!({"company": "Beta"})))
            .await;
        let id = created["id"].as_i64().unwrap();

        let (_, contact) = app
            .json(
                "POST",
                &format!("/api/suppliers/{}/contacts", id),
                Some(json!({"name": "Hans"})),
            )
            .await;
        let cid = contact["id"].as_i64().unwrap();

        let (status, updated) = app
            .json(
                "PUT",
                &format!("/api/suppliers/{}/contacts/{}", id, cid),
                Some(json!({"role": "Sales"})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["role"], "Sales");
        assert_eq!(updated["name"], "Hans");

        let response = app
            .request("DELETE", &format!("/api/suppliers/{}/contacts/{}", id, cid), None)
            .await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }
}
