//! Application state shared across handlers.

use std::sync::Arc;

use crate::admission::RateLimiter;
use crate::config::ConfigStore;
use crate::exec::{ProcessStatusCache, Spawner};
use crate::programs::ProgramCatalog;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Configuration, the single source of truth for settings and tiles.
    pub store: Arc<ConfigStore>,
    /// Cached index of launchable programs.
    pub programs: Arc<ProgramCatalog>,
    /// Per-client request budget.
    pub limiter: Arc<RateLimiter>,
    /// Launches resolved targets.
    pub spawner: Arc<dyn Spawner>,
    /// Running-process snapshot used for `showIf`.
    pub processes: Arc<ProcessStatusCache>,
}

impl AppState {
    pub fn new(
        store: Arc<ConfigStore>,
        programs: Arc<ProgramCatalog>,
        spawner: Arc<dyn Spawner>,
        processes: Arc<ProcessStatusCache>,
    ) -> Self {
        Self {
            store,
            programs,
            limiter: Arc::new(RateLimiter::new()),
            spawner,
            processes,
        }
    }
}
