//! Application state management

use crate::error::AdaptError;
use crate::inference::SharedPredictor;
use std::path::{Path, PathBuf};

use super::error::{Result, ServerError};
use super::ServerConfig;

/// Application state shared across handlers
#[derive(Debug)]
pub struct AppState {
    pub config: ServerConfig,
    pub predictor: SharedPredictor,
    pub started_at: chrono::DateTime<chrono::Utc>,
}

impl AppState {
    pub fn new(config: ServerConfig, predictor: SharedPredictor) -> Self {
        Self {
            config,
            predictor,
            started_at: chrono::Utc::now(),
        }
    }

    /// Directory a pathless reload reads from: where the active bundle came from
    pub fn default_reload_dir(&self) -> PathBuf {
        self.predictor
            .current()
            .source()
            .map(PathBuf::from)
            .unwrap_or_else(|| self.config.artifacts_dir.clone())
    }

    /// Resolve a requested reload path to a canonical directory inside
    /// `artifacts_dir`. Relative paths are taken from `artifacts_dir`.
    pub fn resolve_reload_dir(&self, requested: Option<&Path>) -> Result<PathBuf> {
        let Some(requested) = requested else {
            return Ok(self.default_reload_dir());
        };
        let root = canonical(&self.config.artifacts_dir)?;
        let candidate = if requested.is_absolute() {
            requested.to_path_buf()
        } else {
            self.config.artifacts_dir.join(requested)
        };
        let resolved = canonical(&candidate)?;
        if !resolved.starts_with(&root) {
            return Err(ServerError::Forbidden(format!(
                "reload path {} is outside the artifacts directory",
                requested.display()
            )));
        }
        Ok(resolved)
    }
}

fn canonical(path: &Path) -> Result<PathBuf> {
    path.canonicalize().map_err(|e| {
        ServerError::Adapt(AdaptError::ArtifactLoad(format!(
            "artifact directory not found: {}: {e}",
            path.display()
        )))
    })
}
