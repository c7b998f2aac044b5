use crate::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use log::*;
use serde::Serialize;
use std::time::Duration;
use utoipa::ToSchema;

const SERVICE_NAME: &str = "read-service";
const DATABASE_PING_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthStatus {
    service: String,
    /// `ok` or `error`
    status: String,
    /// Streaming clients currently connected
    subscribers: usize,
}

/// GET the health of the service and its database connection
#[utoipa::path(
    get,
    path = "/healthz",
    responses(
        (status = 200, description = "Service and database are reachable", body = HealthStatus),
        (status = 503, description = "Database or live update hub is unavailable", body = HealthStatus)
    )
)]
pub async fn health_check(State(app_state): State<AppState>) -> impl IntoResponse {
    let database_ok = match tokio::time::timeout(
        DATABASE_PING_TIMEOUT,
        app_state.db_conn_ref().ping(),
    )
    .await
    {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            warn!("Health check database ping failed: {e}");
            false
        }
        Err(_) => {
            warn!("Health check database ping timed out");
            false
        }
    };

    let hub_stats = app_state.sse_hub.stats().await;
    let healthy = database_ok && hub_stats.is_ok();

    let (status_code, status) = if healthy {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "error")
    };

    (
        status_code,
        Json(HealthStatus {
            service: SERVICE_NAME.to_string(),
            status: status.to_string(),
            subscribers: hub_stats.map(|stats| stats.subscribers).unwrap_or(0),
        }),
    )
}
