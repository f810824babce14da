//! Authenticated admin API over the breaker registry.

pub mod auth;
pub mod handlers;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;

use crate::registry::BreakerRegistry;
use self::auth::admin_auth_middleware;
use self::handlers::*;

#[derive(Clone)]
pub struct AdminState {
    pub registry: Arc<BreakerRegistry>,
    pub api_key: Arc<str>,
}

impl AdminState {
    pub fn new(registry: Arc<BreakerRegistry>, api_key: impl Into<Arc<str>>) -> Self {
        Self {
            registry,
            api_key: api_key.into(),
        }
    }
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/breakers", get(list_breakers))
        .route("/admin/breakers/{name}", get(get_breaker))
        .route("/admin/breakers/{name}/reset", post(reset_breaker))
        .route("/admin/breakers/{name}/open", post(open_breaker))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the admin API on `listener` until `shutdown` flips to true.
pub async fn serve(
    listener: TcpListener,
    state: AdminState,
    mut shutdown: watch::Receiver<bool>,
) -> std::io::Result<()> {
    let addr = listener.local_addr()?;
    tracing::info!(%addr, "Admin API listening");

    axum::serve(listener, setup_admin_router(state))
        .with_graceful_shutdown(async move {
            while !*shutdown.borrow_and_update() {
                if shutdown.changed().await.is_err() {
                    break;
                }
            }
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BreakerEntry, BreakerOptions};
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;

    const KEY: &str = "test-key";

    fn router() -> (Router, Arc<BreakerRegistry>) {
        let registry = Arc::new(BreakerRegistry::from_entries(
            &[
                BreakerEntry::new("payments", BreakerOptions::new().with_max_failures(2)),
                BreakerEntry::new("inventory", BreakerOptions::new()),
            ],
            None,
        ));
        (setup_admin_router(AdminState::new(registry.clone(), KEY)), registry)
    }

    fn request(method: &str, uri: &str, key: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(key) = key {
            builder = builder.header("Authorization", format!("Bearer {key}"));
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_requires_api_key() {
        let (app, _) = router();
        let response = app.clone().oneshot(request("GET", "/admin/status", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app.oneshot(request("GET", "/admin/status", Some("wrong"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_status_and_list() {
        let (app, registry) = router();
        registry.get("payments").unwrap().force_open();

        let response = app.clone().oneshot(request("GET", "/admin/status", Some(KEY))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let status = json_body(response).await;
        assert_eq!(status["breakers"], 2);
        assert_eq!(status["open"], 1);

        let response = app.oneshot(request("GET", "/admin/breakers", Some(KEY))).await.unwrap();
        let list = json_body(response).await;
        assert_eq!(list[0]["name"], "inventory");
        assert_eq!(list[1]["name"], "payments");
        assert_eq!(list[1]["state"], "OPEN");
    }

    #[tokio::test]
    async fn test_open_then_reset() {
        let (app, registry) = router();

        let response = app
            .clone()
            .oneshot(request("POST", "/admin/breakers/payments/open", Some(KEY)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["state"], "OPEN");

        let response = app
            .clone()
            .oneshot(request("POST", "/admin/breakers/payments/reset", Some(KEY)))
            .await
            .unwrap();
        assert_eq!(json_body(response).await["state"], "CLOSED");
        assert_eq!(registry.get("payments").unwrap().failure_count(), 0);

        let response = app
            .oneshot(request("GET", "/admin/breakers/payments", Some(KEY)))
            .await
            .unwrap();
        assert_eq!(json_body(response).await["options"]["maxFailures"], 2);
    }

    #[tokio::test]
    async fn test_unknown_breaker_is_404() {
        let (app, _) = router();
        let response = app
            .clone()
            .oneshot(request("GET", "/admin/breakers/nope", Some(KEY)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app
            .oneshot(request("POST", "/admin/breakers/nope/reset", Some(KEY)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
