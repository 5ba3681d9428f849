//! HTTP API for a question and answer forum.
//!
//! Questions can be listed, searched, created, replaced and deleted.
//! Answers hang off a question, and both questions and answers take votes.
//! Every mutating request goes through the same pipeline: validate the body,
//! confirm the referenced row exists, perform one write, answer with a
//! `{message}` body.

use std::error::Error;

use tokio::{net::TcpListener, signal};
use tracing::{info, warn};

pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod search;
pub mod store;
pub mod validation;

use config::Config;
use routes::{AppState, router};
use store::Store;

pub async fn start_server(config: Config) -> Result<(), Box<dyn Error>> {
    let addr = config.socket_addr()?;

    info!(db_path = %config.db_path, "Opening store...");
    let store = Store::open(&config.db_path)?;

    let app = router(AppState::new(store, config.api_key));

    let listener = TcpListener::bind(addr).await?;
    info!("Listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = signal::ctrl_c().await {
            warn!(%error, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(error) => {
                warn!(%error, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
