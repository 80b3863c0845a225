//! Application state management

use std::sync::Arc;

use crate::config::Config;
use crate::watermark::{LopdfEngine, WatermarkEngine};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    engine: Arc<dyn WatermarkEngine>,
}

impl AppState {
    /// Create application state backed by the lopdf watermark engine
    pub fn new(config: Config) -> Self {
        Self::with_engine(config, Arc::new(LopdfEngine::new()))
    }

    /// Create application state with a specific engine
    pub fn with_engine(config: Config, engine: Arc<dyn WatermarkEngine>) -> Self {
        Self {
            inner: Arc::new(AppStateInner { config, engine }),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Get a handle to the watermark engine
    pub fn engine(&self) -> Arc<dyn WatermarkEngine> {
        Arc::clone(&self.inner.engine)
    }
}
