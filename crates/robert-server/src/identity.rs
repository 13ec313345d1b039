//! Identity store interface and an in-memory implementation.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use robert_crypto::{IdA, WRAPPED_KEY_SIZE};

use crate::error::StoreError;

// ============================================================================
// IdentityRecord
// ============================================================================

/// A registered identity. Key material is stored AES-KW wrapped only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityRecord {
    pub id_a: IdA,
    /// K_A wrapped under the identity KEK.
    pub wrapped_key_for_mac: [u8; WRAPPED_KEY_SIZE],
    /// K_EA wrapped under the identity KEK.
    pub wrapped_key_for_tuples: [u8; WRAPPED_KEY_SIZE],
    /// Country code the client registered with.
    pub country_code: u8,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// IdentityStore
// ============================================================================

/// Persistence of identities, keyed by idA.
///
/// The request processor bounds every call with a timeout and never retries.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn exists(&self, id_a: &IdA) -> Result<bool, StoreError>;

    async fn find(&self, id_a: &IdA) -> Result<Option<IdentityRecord>, StoreError>;

    /// Insert a new identity. Fails with [`StoreError::AlreadyExists`] if the
    /// idA is taken.
    async fn insert(&self, record: IdentityRecord) -> Result<(), StoreError>;

    /// Delete an identity. Returns whether it existed.
    async fn delete(&self, id_a: &IdA) -> Result<bool, StoreError>;
}

/// In-memory identity store.
#[derive(Default)]
pub struct MemoryIdentityStore {
    records: RwLock<HashMap<IdA, IdentityRecord>>,
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

#[async_trait]
impl IdentityStore for MemoryIdentityStore {
    async fn exists(&self, id_a: &IdA) -> Result<bool, StoreError> {
        Ok(self.records.read().contains_key(id_a))
    }

    async fn find(&self, id_a: &IdA) -> Result<Option<IdentityRecord>, StoreError> {
        Ok(self.records.read().get(id_a).cloned())
    }

    async fn insert(&self, record: IdentityRecord) -> Result<(), StoreError> {
        let mut records = self.records.write();
        if records.contains_key(&record.id_a) {
            return Err(StoreError::AlreadyExists);
        }
        records.insert(record.id_a, record);
        Ok(())
    }

    async fn delete(&self, id_a: &IdA) -> Result<bool, StoreError> {
        Ok(self.records.write().remove(id_a).is_some())
    }
}
