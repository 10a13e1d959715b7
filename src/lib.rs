pub mod aggregation;
pub mod classifier;
pub mod config;
pub mod finalizer;
pub mod llm;
pub mod rest;
pub mod retry;
pub mod session;
pub mod storage;
pub mod tracker;
pub mod trigger;

use std::sync::Arc;

use aggregation::Aggregator;
use config::DaemonConfig;
use storage::OwnerStore;

/// Shared application state passed to every route handler and background task.
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<DaemonConfig>,
    pub owners: OwnerStore,
    pub aggregator: Arc<Aggregator>,
    pub started_at: std::time::Instant,
}
