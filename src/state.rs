//! # Application State Management
//!
//! Shared state handed to every request handler. Per-session state never
//! lives here — sessions are fully independent — so the only cross-session
//! mutable resource is the connection limiter's atomic counter. Everything
//! else is read-only after startup.

use crate::admission::ConnectionLimiter;
use crate::config::AppConfig;
use crate::engine::SpeechEngine;
use std::sync::Arc;
use std::time::Instant;

/// The application state shared across all HTTP and WebSocket handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration, fixed after startup validation
    config: AppConfig,

    /// Process-wide admission controller
    limiter: Arc<ConnectionLimiter>,

    /// External engine; one shared collaborator, independent call per session
    engine: Arc<dyn SpeechEngine>,

    /// When the server started (for the health document)
    start_time: Instant,
}

impl AppState {
    /// Create the shared state from validated configuration and the
    /// constructed engine backend.
    pub fn new(config: AppConfig, engine: Arc<dyn SpeechEngine>) -> Self {
        let limiter = ConnectionLimiter::new(config.limits.max_sessions);
        Self {
            config,
            limiter,
            engine,
            start_time: Instant::now(),
        }
    }

    /// Get a copy of the current configuration.
    pub fn get_config(&self) -> AppConfig {
        self.config.clone()
    }

    /// The process-wide admission controller.
    pub fn limiter(&self) -> &Arc<ConnectionLimiter> {
        &self.limiter
    }

    /// Handle to the configured engine backend.
    pub fn engine(&self) -> Arc<dyn SpeechEngine> {
        Arc::clone(&self.engine)
    }

    /// Get server uptime in seconds.
    pub fn get_uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
