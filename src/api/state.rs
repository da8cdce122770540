//! API shared state

use std::sync::Arc;

use crate::storage::Storage;

/// Shared state passed to all API handlers
#[derive(Clone)]
pub struct ApiState {
    /// The active storage backend
    pub storage: Arc<dyn Storage>,
}

impl ApiState {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }
}
