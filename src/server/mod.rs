//! HTTP front end over the store runtime.

/// API and lifecycle error types.
pub mod error;
/// Request handlers.
pub mod handler;
/// Route table.
pub mod router;

use tokio::net::TcpListener;
use tracing::info;

use crate::{
    config::ServerConfig,
    core::store::EntryStore,
    persist::{self, json::JsonFileSink},
    runtime::handle::spawn_store,
};

pub use error::{ApiError, ServerError, ServerResult};
pub use handler::AppState;
pub use router::build_router;

/// Bookmark server: loads the snapshot, runs the store and serves HTTP.
pub struct Server {
    config: ServerConfig,
}

impl Server {
    /// Server for `config`; nothing is bound until [`Server::serve`].
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Active configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Serve until Ctrl-C or SIGTERM, then flush a final snapshot.
    pub async fn serve(self) -> ServerResult<()> {
        let (sink, store) = open_store(&self.config).await?;
        info!(size = store.len(), path = %self.config.data_path.display(), "store ready");

        let handle = spawn_store(store, Some(Box::new(sink)), self.config.runtime_config());
        let app = build_router(AppState {
            handle: handle.clone(),
        });

        let listener = TcpListener::bind(self.config.bind_addr).await?;
        info!("starting server on {}", self.config.bind_addr);
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        info!("server stopped");

        handle.shutdown().await?;
        info!("graceful shutdown completed");
        Ok(())
    }
}

/// Builds the configured sink and loads its snapshot on the blocking pool.
pub async fn open_store(config: &ServerConfig) -> ServerResult<(JsonFileSink, EntryStore)> {
    let sink = match &config.stat_path {
        Some(stat) => JsonFileSink::with_stat_path(&config.data_path, stat),
        None => JsonFileSink::new(&config.data_path),
    };
    let loaded = tokio::task::spawn_blocking(move || {
        let store = persist::load_or_empty(&sink);
        (sink, store)
    })
    .await?;
    Ok(loaded)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(%err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => {
                tracing::error!(%err, "failed to listen for SIGTERM");
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
