use crate::storage::SharedStorage;

/// État unique injecté dans tous les handlers Axum
#[derive(Clone)]
pub struct AppState {
    pub storage: SharedStorage,
}

impl AppState {
    pub fn new(storage: SharedStorage) -> Self {
        Self { storage }
    }
}
