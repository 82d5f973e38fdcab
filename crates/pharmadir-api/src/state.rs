use std::sync::{Arc, Mutex, MutexGuard};

use pharmadir_store::DuckStore;
use pharmadir_sync::{CandidateSink, Collector};

use crate::error::ApiError;
use crate::guard::RunGuard;

/// Shared handler state. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Mutex<DuckStore>>,
    /// Where collection runs persist. The store itself unless overridden.
    pub sink: Arc<dyn CandidateSink>,
    pub collector: Arc<Collector>,
    pub run_guard: RunGuard,
}

impl AppState {
    pub fn new(store: DuckStore, collector: Collector) -> Self {
        let store = Arc::new(Mutex::new(store));
        let sink: Arc<dyn CandidateSink> = store.clone();
        Self {
            store,
            sink,
            collector: Arc::new(collector),
            run_guard: RunGuard::new(),
        }
    }

    /// Lock the store for one synchronous call. Never hold the guard across an await.
    pub(crate) fn store(&self) -> Result<MutexGuard<'_, DuckStore>, ApiError> {
        self.store
            .lock()
            .map_err(|_| ApiError::Internal("store lock poisoned".into()))
    }
}
