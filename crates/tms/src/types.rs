use parking_lot::RwLock;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::{AppConfig, EnrollmentSettings};
use crate::db::SqliteStore;
use crate::enrollment::EnrollmentEngine;

/// State shared by every request handler.
pub struct AppState {
    pub engine: EnrollmentEngine,
    /// Runtime enrollment rules; handlers copy them once per request.
    pub settings: RwLock<EnrollmentSettings>,
    pub request_timeout: Duration,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(config: &AppConfig, store: Arc<SqliteStore>) -> Self {
        Self {
            engine: EnrollmentEngine::new(store.clone(), store.clone(), store),
            settings: RwLock::new(config.enrollment.clone()),
            request_timeout: config.request_timeout(),
            started_at: Instant::now(),
        }
    }

    pub fn settings_snapshot(&self) -> EnrollmentSettings {
        self.settings.read().clone()
    }

    /// Deadline for a request starting now.
    pub fn deadline(&self) -> Instant {
        Instant::now() + self.request_timeout
    }
}
