use log::{error, info};
use service::{config::Config, logging::Logger};
use sse::{Backoff, Hub, Notifier};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::Duration;

const SERVICE_NAME: &str = "read-service";

#[tokio::main]
async fn main() {
    let config = Config::new();
    if let Err(e) = Logger::init_logger(&config) {
        eprintln!("Failed to initialize logger: {e}");
    }

    info!(
        "Starting {SERVICE_NAME} [{}] in {} mode",
        env!("CARGO_PKG_VERSION"),
        config.runtime_env()
    );

    let db = match service::init_database(&config).await {
        Ok(db) => Arc::new(db),
        Err(e) => {
            error!("Failed to establish database connection: {e}");
            std::process::exit(1);
        }
    };

    let hub = Hub::start(config.subscriber_queue_capacity());

    let change_source = service::init_change_source(&db, &config);
    info!(
        "Listening for data changes on channel \"{}\"",
        change_source.channel()
    );
    let notifier = Notifier::new(Arc::new(change_source), hub.clone())
        .with_backoff(Backoff::new(
            Duration::from_secs(1),
            config.notifier_max_backoff(),
        ))
        .start();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(web::forward_shutdown(tokio::signal::ctrl_c(), shutdown_tx));

    let service_state = service::AppState::new(config, &db);
    let app_state = web::AppState::new(service_state, hub, shutdown_rx);

    if let Err(e) = web::init_server(app_state).await {
        error!("Server failed: {e}");
        notifier.abort();
        std::process::exit(1);
    }

    notifier.abort();
}
