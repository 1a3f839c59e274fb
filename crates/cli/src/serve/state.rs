//! Application state.

use towerline_engine::DecisionService;

/// Shared across request handlers. The service synchronizes internally.
pub(crate) struct AppState {
    pub(crate) service: DecisionService,
}
