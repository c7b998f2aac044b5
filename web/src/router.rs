use crate::controller::health_check_controller;
use crate::stream::handler as stream_handler;
use crate::AppState;
use axum::http::{header, HeaderValue, Method};
use axum::{routing::get, Router};
use log::*;
use service::config::Config;
use tower_http::cors::{AllowOrigin, CorsLayer};
use utoipa::OpenApi;
use utoipa_rapidoc::RapiDoc;

// This is the global definition of our OpenAPI spec. To be a part
// of the rendered spec, a path and schema must be listed here.
#[derive(OpenApi)]
#[openapi(
        info(
            title = "Read Service API"
        ),
        paths(
            health_check_controller::health_check,
            stream_handler::stream,
        ),
        components(
            schemas(
                health_check_controller::HealthStatus,
            )
        ),
        tags(
            (name = "read_service", description = "Read-only data views with live change streaming")
        )
    )]
struct ApiDoc;

pub fn define_routes(app_state: AppState) -> Router {
    let cors = cors_layer(app_state.config());

    Router::new()
        .merge(health_routes(app_state.clone()))
        .merge(stream_routes(app_state))
        .merge(RapiDoc::with_openapi("/api-docs/openapi.json", ApiDoc::openapi()).path("/rapidoc"))
        .layer(cors)
}

fn health_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health_check_controller::health_check))
        .with_state(app_state)
}

fn stream_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/events/stream", get(stream_handler::stream))
        .with_state(app_state)
}

/// Read-only CORS policy. `*` in the configured origins allows any origin.
fn cors_layer(config: &Config) -> CorsLayer {
    let allow_origin = if config.allows_any_origin() {
        AllowOrigin::any()
    } else {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|origin| match origin.trim().parse::<HeaderValue>() {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!("Ignoring invalid CORS origin: {origin}");
                    None
                }
            })
            .collect();
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use clap::Parser;
    use sea_orm::DatabaseConnection;
    use sse::Hub;
    use std::sync::Arc;
    use tokio::sync::watch;
    use tower::ServiceExt;

    fn app_state(args: &[&str]) -> (AppState, watch::Sender<bool>) {
        let config = Config::try_parse_from(std::iter::once("read_service").chain(args.iter().copied()))
            .unwrap();
        let db = Arc::new(DatabaseConnection::Disconnected);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let state = AppState::new(
            service::AppState::new(config, &db),
            Hub::start(4),
            shutdown_rx,
        );
        (state, shutdown_tx)
    }

    #[tokio::test]
    async fn test_health_check_reports_unreachable_database() {
        let (state, _shutdown) = app_state(&[]);
        let _subscriber = state.sse_hub.register().await.unwrap();

        let response = define_routes(state)
            .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["service"], "read-service");
        assert_eq!(json["status"], "error");
        assert_eq!(json["subscribers"], 1);
    }

    #[tokio::test]
    async fn test_cross_origin_requests_are_allowed_by_default() {
        let (state, _shutdown) = app_state(&[]);

        let response = define_routes(state)
            .oneshot(
                Request::builder()
                    .uri("/healthz")
                    .header(header::ORIGIN, "http://example.com")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    }

    #[tokio::test]
    async fn test_configured_origins_restrict_cross_origin_access() {
        let (state, _shutdown) = app_state(&["--allowed-origins", "https://app.example.com"]);
        let app = define_routes(state);

        let allowed = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/healthz")
                    .header(header::ORIGIN, "https://app.example.com")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(
            allowed.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "https://app.example.com"
        );

        let denied = app
            .oneshot(
                Request::builder()
                    .uri("/healthz")
                    .header(header::ORIGIN, "https://evil.example.com")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(denied
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .is_none());
    }

    #[tokio::test]
    async fn test_openapi_document_lists_endpoints() {
        let openapi = ApiDoc::openapi();
        let paths: Vec<&String> = openapi.paths.paths.keys().collect();

        assert!(paths.iter().any(|p| p.as_str() == "/healthz"));
        assert!(paths.iter().any(|p| p.as_str() == "/events/stream"));
    }
}
