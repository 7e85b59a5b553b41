use std::sync::Arc;

use crate::ledger::Store;
use crate::transfer::{RetryPolicy, TransferCoordinator};

/// Gateway application state (shared)
#[derive(Clone)]
pub struct AppState {
    /// Ledger store for account reads and writes
    pub store: Arc<dyn Store>,
    /// Transfer coordinator over the same store
    pub coordinator: Arc<TransferCoordinator>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, retry: RetryPolicy) -> Self {
        let coordinator = Arc::new(TransferCoordinator::with_retry_policy(store.clone(), retry));
        Self { store, coordinator }
    }
}
