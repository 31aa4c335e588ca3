//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::{config::Config, web::middleware::DailyQuota};
use forum_answers_core::{orchestrator::QueryOrchestrator, ports::SnapshotSource};
use std::sync::Arc;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub orchestrator: Arc<QueryOrchestrator>,
    /// Backs the snapshot route; the orchestrator holds its own handle.
    pub snapshots: Arc<dyn SnapshotSource>,
    pub quota: Arc<DailyQuota>,
}
