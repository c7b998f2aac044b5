use log::*;
use sea_orm::DatabaseConnection;
use service::config::Config;
use sse::{Hub, Payload};
use std::future::Future;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;

mod controller;
mod error;
pub mod router;
mod stream;

pub use error::{Error, Result};

const SERVICE_NAME: &str = "read-service";

/// How long after the listener is bound the startup announcement goes out.
/// Long enough for browsers to retry a dropped event stream and register.
pub const STARTUP_ANNOUNCEMENT_DELAY: Duration = Duration::from_secs(5);

// Web-level state shared by every handler: the service infrastructure, the
// process-wide SSE hub and the shutdown signal that ends streaming sessions.
#[derive(Clone)]
pub struct AppState {
    pub service_state: service::AppState,
    pub sse_hub: Hub,
    shutdown: watch::Receiver<bool>,
}

impl AppState {
    pub fn new(
        service_state: service::AppState,
        sse_hub: Hub,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            service_state,
            sse_hub,
            shutdown,
        }
    }

    pub fn config(&self) -> &Config {
        &self.service_state.config
    }

    pub fn db_conn_ref(&self) -> &DatabaseConnection {
        self.service_state.db_conn_ref()
    }

    /// Completes once shutdown has been requested (or the sender is gone).
    pub fn shutdown_signal(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut shutdown = self.shutdown.clone();
        async move {
            let _ = shutdown.wait_for(|stopping| *stopping).await;
        }
    }
}

/// Request shutdown when `signal` fires. If the signal handler cannot be
/// installed the service keeps running and the sender is held forever, since
/// dropping it would also read as a shutdown request.
pub async fn forward_shutdown<F>(signal: F, shutdown: watch::Sender<bool>)
where
    F: Future<Output = std::io::Result<()>>,
{
    match signal.await {
        Ok(()) => {
            info!("Shutdown requested, closing streaming connections");
            let _ = shutdown.send(true);
        }
        Err(e) => {
            error!("Unable to listen for shutdown signal: {e}");
            let _shutdown = shutdown;
            std::future::pending::<()>().await;
        }
    }
}

pub async fn init_server(app_state: AppState) -> std::io::Result<()> {
    let listen_addr = format!(
        "{}:{}",
        app_state.config().interface(),
        app_state.config().port
    );

    info!("Server starting... listening for connections on http://{listen_addr}");

    let listener = TcpListener::bind(&listen_addr).await?;
    let shutdown = app_state.shutdown_signal();

    if app_state.config().announce_startup {
        announce_startup(app_state.sse_hub.clone(), STARTUP_ANNOUNCEMENT_DELAY);
    }

    axum::serve(listener, router::define_routes(app_state))
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("Server stopped");
    Ok(())
}

/// Broadcast `{"type":"startup","service":"read-service"}` once `delay` has
/// passed, reaching every client connected by then.
pub fn announce_startup(hub: Hub, delay: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;

        let announcement = serde_json::json!({ "type": "startup", "service": SERVICE_NAME });
        match Payload::from_json(&announcement) {
            Ok(payload) => {
                info!("Announcing startup to streaming clients");
                hub.broadcast(payload);
            }
            Err(e) => warn!("Unable to build startup announcement: {e}"),
        }
    })
}
