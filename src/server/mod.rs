//! Prediction server
//!
//! Serves the active artifact bundle over a small REST API and an embedded
//! HTML form. The bundle is loaded once at startup and can be swapped at
//! runtime through `/api/model/reload`.

mod api;
mod auth;
mod error;
mod handlers;
mod page;
mod state;

pub use api::create_router;
pub use auth::API_KEY_HEADER;
pub use error::ServerError;
pub use handlers::ReloadRequest;
pub use state::AppState;

use crate::inference::SharedPredictor;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Reload paths must resolve inside this directory
    pub artifacts_dir: PathBuf,
    /// Key expected in `x-api-key` for model reloads; reloads are refused when unset
    pub admin_api_key: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: std::env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("API_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            artifacts_dir: std::env::var("ARTIFACTS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./artifacts")),
            admin_api_key: std::env::var("ADMIN_API_KEY").ok().filter(|k| !k.is_empty()),
        }
    }
}

impl ServerConfig {
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_artifacts_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.artifacts_dir = dir.into();
        self
    }

    pub fn with_admin_api_key(mut self, key: impl Into<String>) -> Self {
        self.admin_api_key = Some(key.into()).filter(|k| !k.is_empty());
        self
    }
}

/// Load the bundle and serve until ctrl+c.
///
/// Refuses to start when the bundle cannot be loaded.
pub async fn run_server(config: ServerConfig) -> anyhow::Result<()> {
    let start_time = chrono::Utc::now();
    info!(artifacts_dir = %config.artifacts_dir.display(), "Loading artifact bundle");

    let dir = config.artifacts_dir.clone();
    let predictor = tokio::task::spawn_blocking(move || SharedPredictor::load(dir)).await??;
    let model_name = predictor.current().metadata().model_name.clone();

    let state = Arc::new(AppState::new(config.clone(), predictor));
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!(
        host = %config.host,
        port = config.port,
        model = %model_name,
        started_at = %start_time.to_rfc3339(),
        "Riverbank adaptation server starting"
    );
    info!(url = %format!("http://{}", addr), "Prediction form available");
    info!(url = %format!("http://{}/api/health", addr), "Health endpoint available");
    if config.admin_api_key.is_none() {
        warn!("ADMIN_API_KEY is not set; /api/model/reload is disabled");
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(address = %addr, pid = std::process::id(), "Server listening");

    let shutdown_signal = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for ctrl+c");
            std::future::pending::<()>().await;
        }
        let uptime = chrono::Utc::now().signed_duration_since(start_time);
        info!(uptime_secs = uptime.num_seconds(), "Shutdown signal received, stopping server");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    info!("Server shut down cleanly");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builders() {
        let config = ServerConfig::default()
            .with_host("127.0.0.1")
            .with_port(9000)
            .with_artifacts_dir("/tmp/bundle")
            .with_admin_api_key("k3y");
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 9000);
        assert_eq!(config.artifacts_dir, PathBuf::from("/tmp/bundle"));
        assert_eq!(config.admin_api_key.as_deref(), Some("k3y"));
        assert_eq!(config.with_admin_api_key("").admin_api_key, None);
    }
}
