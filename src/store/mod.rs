//! Persistence of the credential state.
//!
//! The store only loads and saves whole documents; it never talks to the network
//! and never decides whether a record is usable.

pub mod file_store;
pub mod memory_store;

use std::collections::BTreeMap;
use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::credentials::{CompanyCredential, CredentialRecord, LocationCredential};
use crate::error::StoreError;

pub use file_store::FileStore;
pub use memory_store::MemoryStore;

/// Everything that survives a process restart: the company credential plus
/// every derived location credential, saved together.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedState {
    #[serde(default)]
    pub company: Option<CompanyCredential>,
    /// location_id -> credential
    #[serde(default)]
    pub locations: BTreeMap<String, LocationCredential>,
}

impl PersistedState {
    pub fn is_empty(&self) -> bool {
        self.company.is_none() && self.locations.is_empty()
    }

    /// All records, company first.
    pub fn records(&self) -> Vec<CredentialRecord> {
        self.company
            .iter()
            .cloned()
            .map(CredentialRecord::Company)
            .chain(self.locations.values().cloned().map(CredentialRecord::Location))
            .collect()
    }
}

pub trait TokenStore: Send + Sync {
    /// `Ok(None)` when nothing was ever saved; that is the normal first-run state.
    fn load(&self) -> impl Future<Output = Result<Option<PersistedState>, StoreError>> + Send;

    /// Replace the persisted document. A crash mid-save must leave the previous
    /// document readable.
    fn save(&self, state: &PersistedState) -> impl Future<Output = Result<(), StoreError>> + Send;
}

impl<T: TokenStore> TokenStore for std::sync::Arc<T> {
    fn load(&self) -> impl Future<Output = Result<Option<PersistedState>, StoreError>> + Send {
        (**self).load()
    }

    fn save(&self, state: &PersistedState) -> impl Future<Output = Result<(), StoreError>> + Send {
        (**self).save(state)
    }
}
