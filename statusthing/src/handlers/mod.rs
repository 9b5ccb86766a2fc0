//! HTTP surface
//!
//! [`api_router`] exposes the status thing API under a base path:
//!
//! | Method | Path | Action |
//! |---|---|---|
//! | `GET` | `{base}/` | list every thing |
//! | `GET` | `{base}/{id}` | fetch one thing |
//! | `PUT` | `{base}/` | create a thing |
//! | `POST` | `{base}/{id}` | change a thing's status |
//! | `DELETE` | `{base}/{id}` | remove a thing, returning it |
//!
//! [`health_router`] adds `/health` and `/ready` outside the base path.

mod api;
mod error;
mod guard;
mod health;

use std::sync::Arc;

use axum::{
    middleware,
    routing::get,
    Router,
};
use sqlx::SqlitePool;

pub use api::{create_thing, delete_thing, get_thing, list_things, update_status, ApiState};
pub use error::{ApiError, ApiErrorKind, ErrorResponse};
pub use guard::{RequestGuard, API_KEY_HEADER};
pub use health::{
    health, readiness, DependencyStatus, HealthResponse, HealthState, ReadinessResponse,
};

use crate::provider::Provider;

/// Routes for the status thing API, mounted under `base_path`
///
/// The collection is served both with and without a trailing slash.
pub fn api_router(base_path: &str, provider: Arc<dyn Provider>, guard: RequestGuard) -> Router {
    let base = base_path.trim_end_matches('/');
    let collection = format!("{}/", base);
    let item = format!("{}/{{id}}", base);

    let mut router = Router::new()
        .route(&collection, get(list_things).put(create_thing))
        .route(&item, get(get_thing).post(update_status).delete(delete_thing));
    if !base.is_empty() {
        router = router.route(base, get(list_things).put(create_thing));
    }

    router
        .route_layer(middleware::from_fn_with_state(guard, RequestGuard::middleware))
        .with_state(ApiState::new(provider))
}

/// Liveness and readiness routes
pub fn health_router(service: &str, pool: Option<SqlitePool>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ready", get(readiness))
        .with_state(HealthState::new(service, pool))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Status, StatusThing};
    use crate::provider::{StatusThingProvider, UnimplementedProvider};
    use crate::storer::{SqliteStorer, StorerOptions};
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, Request, StatusCode};
    use axum::response::Response;
    use crate::config::DatabaseConfig;
    use crate::database::create_pool;
    use tower::ServiceExt;

    const BASE: &str = "/statusthing/api";
    const KEY: &str = "sekrit";

    async fn memory_pool() -> SqlitePool {
        let config = DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            ..DatabaseConfig::default()
        };
        create_pool(&config).await.unwrap()
    }

    async fn app(api_key: Option<&str>) -> Router {
        let storer = SqliteStorer::new(memory_pool().await, StorerOptions::default())
            .await
            .unwrap();
        let provider = Arc::new(StatusThingProvider::new(Arc::new(storer)));
        api_router(BASE, provider, RequestGuard::new(api_key.map(String::from)))
    }

    fn request(method: Method, path: &str, body: Option<serde_json::Value>) -> Request<Body> {
        let body = body.map(|v| Body::from(v.to_string())).unwrap_or_else(Body::empty);
        Request::builder()
            .method(method)
            .uri(format!("{}{}", BASE, path))
            .header(header::CONTENT_TYPE, "application/json")
            .header(API_KEY_HEADER, KEY)
            .body(body)
            .unwrap()
    }

    async fn send(app: &Router, request: Request<Body>) -> Response {
        app.clone().oneshot(request).await.unwrap()
    }

    async fn body_bytes(response: Response) -> Vec<u8> {
        to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec()
    }

    async fn json_body<T: serde::de::DeserializeOwned>(response: Response) -> T {
        serde_json::from_slice(&body_bytes(response).await).unwrap()
    }

    #[tokio::test]
    async fn test_full_lifecycle() {
        let app = app(Some(KEY)).await;
        let new_thing = serde_json::json!({
            "name": "svc-a",
            "description": "d",
            "status": "STATUS_GREEN",
        });

        let response = send(&app, request(Method::PUT, "/", Some(new_thing.clone()))).await;
        assert_eq!(response.status(), StatusCode::OK);
        let created: StatusThing = json_body(response).await;
        assert!(!created.id.is_empty());
        assert_eq!(created.name, "svc-a");
        assert_eq!(created.status, Status::Green);

        let response = send(&app, request(Method::PUT, "/", Some(new_thing))).await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let error: ErrorResponse = json_body(response).await;
        assert_eq!(error.status, 409);
        assert_eq!(error.code.as_deref(), Some("ALREADY_EXISTS"));

        let path = format!("/{}", created.id);
        let response = send(&app, request(Method::GET, &path, None)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body::<StatusThing>(response).await, created);

        let response = send(
            &app,
            request(Method::POST, &path, Some(serde_json::json!({"status": "STATUS_RED"}))),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_bytes(response).await.is_empty());

        let response = send(&app, request(Method::GET, &path, None)).await;
        let updated: StatusThing = json_body(response).await;
        assert_eq!(updated.status, Status::Red);

        let response = send(&app, request(Method::DELETE, &path, None)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body::<StatusThing>(response).await, updated);

        let response = send(&app, request(Method::GET, &path, None)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_list() {
        let app = app(Some(KEY)).await;

        let response = send(&app, request(Method::GET, "/", None)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(json_body::<Vec<StatusThing>>(response).await.is_empty());

        for name in ["svc-a", "svc-b"] {
            let body = serde_json::json!({"name": name, "description": "d", "status": "STATUS_YELLOW"});
            let response = send(&app, request(Method::PUT, "", Some(body))).await;
            assert_eq!(response.status(), StatusCode::OK);
        }

        let response = send(&app, request(Method::GET, "", None)).await;
        assert_eq!(json_body::<Vec<StatusThing>>(response).await.len(), 2);
    }

    #[tokio::test]
    async fn test_create_validation() {
        let app = app(None).await;

        let bodies = [
            serde_json::json!({"name": "svc-a", "description": "d"}),
            serde_json::json!({"name": "svc-a", "description": "d", "status": "STATUS_PURPLE"}),
            serde_json::json!({"description": "d", "status": "STATUS_RED"}),
            serde_json::json!({"name": "svc-a", "status": "STATUS_RED"}),
        ];
        for body in bodies {
            let response = send(&app, request(Method::PUT, "/", Some(body))).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        }

        let malformed = Request::builder()
            .method(Method::PUT)
            .uri(format!("{}/", BASE))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        assert_eq!(send(&app, malformed).await.status(), StatusCode::BAD_REQUEST);

        let response = send(&app, request(Method::GET, "/", None)).await;
        assert!(json_body::<Vec<StatusThing>>(response).await.is_empty());
    }

    #[tokio::test]
    async fn test_status_update_errors() {
        let app = app(None).await;

        let response = send(
            &app,
            request(Method::POST, "/missing", Some(serde_json::json!({"status": "STATUS_RED"}))),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = serde_json::json!({"name": "svc-a", "description": "d", "status": "STATUS_GREEN"});
        let created: StatusThing = json_body(send(&app, request(Method::PUT, "/", Some(body))).await).await;
        let path = format!("/{}", created.id);

        let response = send(
            &app,
            request(Method::POST, &path, Some(serde_json::json!({"status": "bogus"}))),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = send(&app, request(Method::POST, &path, None)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_found() {
        let app = app(None).await;
        let response = send(&app, request(Method::DELETE, "/missing", None)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_guard_runs_before_provider() {
        let app = api_router(
            BASE,
            Arc::new(UnimplementedProvider),
            RequestGuard::new(Some(KEY.to_string())),
        );

        let wrong_key = Request::builder()
            .uri(format!("{}/", BASE))
            .header(header::CONTENT_TYPE, "application/json")
            .header(API_KEY_HEADER, "wrong")
            .body(Body::empty())
            .unwrap();
        assert_eq!(send(&app, wrong_key).await.status(), StatusCode::FORBIDDEN);

        let no_content_type = Request::builder()
            .uri(format!("{}/", BASE))
            .header(API_KEY_HEADER, KEY)
            .body(Body::empty())
            .unwrap();
        let response = send(&app, no_content_type).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let error: ErrorResponse = json_body(response).await;
        assert_eq!(error.code.as_deref(), Some("BAD_REQUEST"));

        // past the guard, the unimplemented provider answers
        let response = send(&app, request(Method::GET, "/", None)).await;
        assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
    }

    #[tokio::test]
    async fn test_health_routes() {
        let pool = memory_pool().await;
        let app = health_router("statusthing", Some(pool.clone()));

        let health = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let response = send(&app, health).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: HealthResponse = json_body(response).await;
        assert_eq!(body.service, "statusthing");

        let ready = || Request::builder().uri("/ready").body(Body::empty()).unwrap();
        let response = send(&app, ready()).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(json_body::<ReadinessResponse>(response).await.ready);

        pool.close().await;
        let response = send(&app, ready()).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(!json_body::<ReadinessResponse>(response).await.ready);
    }
}
