//! Bearer-token gate

use super::{ApiError, AppState};
use crate::error::Error;
use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;

fn bearer(request: &Request) -> Option<&str> {
    let value = request.headers().get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    scheme.eq_ignore_ascii_case("bearer").then(|| token.trim())
}

/// Reject requests without the configured token; open when no token is set
pub async fn require_token(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let expected = state.config.server.auth_token.as_deref().unwrap_or_default();
    if expected.is_empty() {
        return Ok(next.run(request).await);
    }

    match bearer(&request) {
        None => Err(Error::Unauthorized("Missing authentication token".to_string()).into()),
        Some(token) if token != expected => {
            Err(Error::Unauthorized("Invalid authentication token".to_string()).into())
        }
        Some(_) => Ok(next.run(request).await),
    }
}

#[cfg(test)]
mod tests {
    use crate::server::test_support::*;
    use axum::http::StatusCode;

    #[tokio::test]
    async fn test_missing_token_is_401_with_challenge() {
        let app = TestApp::new(Some("secret")).await;
        let response = app.request("GET", "/api/projects", None).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()["www-authenticate"], "Bearer");
        let body = body_json(response).await;
        assert_eq!(body["detail"], "Missing authentication token");
    }

    #[tokio::test]
    async fn test_wrong_token_is_401() {
        let app = TestApp::new(Some("secret")).await;
        let response = app
            .request_with_token("GET", "/api/alerts", None, Some("nope"))
            .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = body_json(response).await;
        assert_eq!(body["detail"], "Invalid authentication token");
    }

    #[tokio::test]
    async fn test_valid_token_passes() {
        let app = TestApp::new(Some("secret")).await;
        let response = app
            .request_with_token("GET", "/api/alerts", None, Some("secret"))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_empty_token_disables_auth() {
        let app = TestApp::new(None).await;
        let response = app.request("GET", "/api/projects", None).await;
        assert_eq!(response.status(), StatusCode::OK);
    }
}
