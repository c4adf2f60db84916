//! Operator authentication for the `/api` routes.
//!
//! Guardians reach the public signing routes without a key; everything else
//! needs the pre-shared operator key, compared in constant time.

use axum::{
    extract::Request,
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use subtle::ConstantTimeEq;

use crate::errors::{AppError, ErrorResponse};

/// Header name for the API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Middleware rejecting requests that do not carry the operator key.
///
/// Accepts the key in `x-api-key` or as a bearer token.
pub async fn operator_auth_layer(
    expected_psk: Option<String>,
    request: Request,
    next: Next,
) -> Response {
    // No key configured: local development
    let Some(expected) = expected_psk else {
        return next.run(request).await;
    };

    match presented_key(&request) {
        Some(key) if constant_time_compare(key, &expected) => next.run(request).await,
        Some(_) => unauthorized_response("Invalid API key"),
        None => unauthorized_response("Missing API key"),
    }
}

/// Key from `x-api-key`, falling back to an `Authorization: Bearer` token.
fn presented_key(request: &Request) -> Option<&str> {
    let headers = request.headers();
    headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .or_else(|| {
            headers
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.strip_prefix("Bearer "))
        })
}

fn constant_time_compare(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

fn unauthorized_response(message: &str) -> Response {
    let error = AppError::Unauthorized(message.to_string());
    tracing::debug!("Rejected unauthenticated request: {}", message);
    (StatusCode::UNAUTHORIZED, Json(ErrorResponse::new(&error, 0))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, middleware, routing::get, Router};
    use tower::ServiceExt;

    fn guarded(psk: Option<&str>) -> Router {
        let psk = psk.map(str::to_string);
        Router::new()
            .route("/ping", get(|| async { "pong" }))
            .layer(middleware::from_fn(move |req: Request, next: Next| {
                operator_auth_layer(psk.clone(), req, next)
            }))
    }

    async fn status_for(router: Router, request: axum::http::Request<Body>) -> StatusCode {
        router.oneshot(request).await.unwrap().status()
    }

    fn ping() -> axum::http::request::Builder {
        axum::http::Request::builder().uri("/ping")
    }

    #[tokio::test]
    async fn test_missing_key_is_rejected() {
        let status = status_for(guarded(Some("secret")), ping().body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_header_and_bearer_are_accepted() {
        let request = ping()
            .header(API_KEY_HEADER, "secret")
            .body(Body::empty())
            .unwrap();
        assert_eq!(status_for(guarded(Some("secret")), request).await, StatusCode::OK);

        let request = ping()
            .header(header::AUTHORIZATION, "Bearer secret")
            .body(Body::empty())
            .unwrap();
        assert_eq!(status_for(guarded(Some("secret")), request).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_wrong_key_is_rejected() {
        let request = ping()
            .header(API_KEY_HEADER, "guess")
            .body(Body::empty())
            .unwrap();
        assert_eq!(
            status_for(guarded(Some("secret")), request).await,
            StatusCode::UNAUTHORIZED
        );
    }

    #[tokio::test]
    async fn test_no_configured_key_allows_all() {
        let status = status_for(guarded(None), ping().body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("key-123", "key-123"));
        assert!(!constant_time_compare("key-123", "key-124"));
        assert!(!constant_time_compare("short", "much-longer-key"));
    }
}
