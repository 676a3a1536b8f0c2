//! Process-wide predictor with atomic reload

use crate::error::Result;
use super::engine::Predictor;
use parking_lot::RwLock;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// The active predictor, swappable while requests are in flight.
///
/// Readers clone the `Arc` under a short read lock and predict without holding
/// it, so a reload never blocks on a running prediction and every prediction
/// sees exactly one bundle.
#[derive(Debug)]
pub struct SharedPredictor {
    current: RwLock<Arc<Predictor>>,
}

impl SharedPredictor {
    pub fn new(predictor: Predictor) -> Self {
        Self {
            current: RwLock::new(Arc::new(predictor)),
        }
    }

    /// Load the initial bundle; the caller refuses to serve on error
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        Predictor::load(dir).map(Self::new)
    }

    pub fn current(&self) -> Arc<Predictor> {
        Arc::clone(&*self.current.read())
    }

    /// Load a complete bundle from `dir` and swap it in.
    ///
    /// On failure the previous predictor stays active.
    pub fn reload(&self, dir: impl AsRef<Path>) -> Result<Arc<Predictor>> {
        let dir = dir.as_ref();
        let next = match Predictor::load(dir) {
            Ok(p) => Arc::new(p),
            Err(e) => {
                warn!(path = %dir.display(), error = %e, "Reload failed, keeping current bundle");
                return Err(e);
            }
        };
        let previous = std::mem::replace(&mut *self.current.write(), Arc::clone(&next));
        info!(
            path = %dir.display(),
            previous = %previous.metadata().model_name,
            current = %next.metadata().model_name,
            "Swapped predictor"
        );
        Ok(next)
    }

    pub fn replace(&self, predictor: Predictor) -> Arc<Predictor> {
        let next = Arc::new(predictor);
        *self.current.write() = Arc::clone(&next);
        next
    }
}
