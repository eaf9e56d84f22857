// Application state module
// Immutable state shared by every connection task

use crate::handler::Router;

use super::types::Config;

/// Application state
///
/// Built once in `main` after configuration is loaded; the request path only
/// ever reads from it, so no locking is involved.
pub struct AppState {
    pub config: Config,
    pub router: Router,
}

impl AppState {
    pub const fn new(config: Config, router: Router) -> Self {
        Self { config, router }
    }
}
