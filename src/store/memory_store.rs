use std::sync::Mutex;

use crate::error::StoreError;
use crate::store::{PersistedState, TokenStore};

/// Process-local store for embedders that keep credentials elsewhere.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<Option<PersistedState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: PersistedState) -> Self {
        Self { state: Mutex::new(Some(state)) }
    }

    /// Last saved document.
    pub fn current(&self) -> Option<PersistedState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl TokenStore for MemoryStore {
    async fn load(&self) -> Result<Option<PersistedState>, StoreError> {
        Ok(self.current())
    }

    async fn save(&self, state: &PersistedState) -> Result<(), StoreError> {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = Some(state.clone());
        Ok(())
    }
}
