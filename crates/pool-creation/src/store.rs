//! Crash-consistent persistence of the pool-creation and user-data records.
//!
//! Every mutation goes through a single serialized update entry point and is
//! written back to durable storage before the call returns, so the last
//! completed update is always the resume point after a reload.

use {
    crate::{
        error::CreationError,
        interfaces::Storage,
        record::{PoolCreationRecord, TxState, UserDataRecord},
    },
    serde::{Serialize, de::DeserializeOwned},
    std::{
        collections::BTreeMap,
        sync::{Arc, Mutex},
    },
};

pub const POOL_CREATION_KEY: &str = "pool-creation-record";
pub const USER_DATA_KEY: &str = "user-data-record";

/// A value of type `T` mirrored into durable storage under a fixed key.
pub struct Persisted<T> {
    key: &'static str,
    storage: Arc<dyn Storage>,
    cached: Mutex<T>,
}

impl<T> Persisted<T>
where
    T: Clone + Default + Serialize + DeserializeOwned,
{
    /// Reads the stored value; absent or corrupt data yields defaults.
    /// Absence is the normal first-use state, never an error.
    pub fn load(key: &'static str, storage: Arc<dyn Storage>) -> Self {
        let cached = match storage.get(key) {
            None => T::default(),
            Some(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|err| {
                tracing::warn!(key, ?err, "discarding corrupt persisted record");
                T::default()
            }),
        };
        Self {
            key,
            storage,
            cached: Mutex::new(cached),
        }
    }

    pub fn snapshot(&self) -> T {
        self.lock().clone()
    }

    /// Applies `f` and persists the full resulting value synchronously
    /// before returning, making the mutation atomic with respect to
    /// reloads.
    pub fn update(&self, f: impl FnOnce(&mut T)) -> Result<T, CreationError> {
        let mut cached = self.lock();
        let mut next = cached.clone();
        f(&mut next);
        self.persist(&next)?;
        *cached = next.clone();
        Ok(next)
    }

    /// Replaces the value with defaults and persists. Irreversible.
    pub fn reset(&self) -> Result<T, CreationError> {
        self.update(|value| *value = T::default())
    }

    fn persist(&self, value: &T) -> Result<(), CreationError> {
        let bytes = serde_json::to_vec(value)?;
        self.storage.set(self.key, bytes);
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, T> {
        // Updates never panic while holding the lock outside of test code.
        self.cached.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// The pool-creation record store. Beyond plain persistence it rejects
/// updates that would violate the record's progress invariants.
pub struct PoolCreationStore {
    inner: Persisted<PoolCreationRecord>,
}

impl PoolCreationStore {
    pub fn load(storage: Arc<dyn Storage>) -> Self {
        Self {
            inner: Persisted::load(POOL_CREATION_KEY, storage),
        }
    }

    pub fn record(&self) -> PoolCreationRecord {
        self.inner.snapshot()
    }

    /// Single mutation entry point. The update is validated against the
    /// previous state and discarded wholesale if it breaks an invariant.
    pub fn update(
        &self,
        f: impl FnOnce(&mut PoolCreationRecord),
    ) -> Result<PoolCreationRecord, CreationError> {
        let previous = self.inner.snapshot();
        let mut next = previous.clone();
        f(&mut next);
        validate_transition(&previous, &next)?;
        self.inner.update(|record| *record = next)
    }

    /// Restores defaults. Only to be called behind an explicit user
    /// confirmation; there is no undo.
    pub fn reset(&self) -> Result<PoolCreationRecord, CreationError> {
        tracing::info!("resetting pool creation record");
        self.inner.reset()
    }
}

/// Progress invariants every record mutation must preserve:
/// the pool address is written exactly once, a successfully resolved stage
/// only ever rolls back to a clean unsubmitted state (hashes cleared with
/// it), and the step counter only decreases as part of such a rollback.
fn validate_transition(
    previous: &PoolCreationRecord,
    next: &PoolCreationRecord,
) -> Result<(), CreationError> {
    if previous.pool_address.is_some() && next.pool_address != previous.pool_address {
        return Err(CreationError::InvariantViolation(
            "pool address is immutable once set",
        ));
    }
    let mut rolled_back = false;
    for (stage, old_tx) in &previous.stages {
        if !old_tx.is_success() {
            continue;
        }
        match next.stages.get(stage) {
            Some(new_tx) if new_tx == old_tx => {}
            None | Some(TxState::Unsubmitted) => rolled_back = true,
            Some(_) => {
                return Err(CreationError::InvariantViolation(
                    "a resolved stage may only roll back to unsubmitted",
                ));
            }
        }
    }
    if next.step < previous.step && !rolled_back {
        return Err(CreationError::InvariantViolation(
            "step may not decrease outside a stage rollback",
        ));
    }
    Ok(())
}

/// Store for the ancillary user-data record; separate key, separate reset.
pub struct UserDataStore {
    inner: Persisted<UserDataRecord>,
}

impl UserDataStore {
    pub fn load(storage: Arc<dyn Storage>) -> Self {
        Self {
            inner: Persisted::load(USER_DATA_KEY, storage),
        }
    }

    pub fn record(&self) -> UserDataRecord {
        self.inner.snapshot()
    }

    pub fn update(
        &self,
        f: impl FnOnce(&mut UserDataRecord),
    ) -> Result<UserDataRecord, CreationError> {
        self.inner.update(f)
    }

    pub fn reset(&self) -> Result<UserDataRecord, CreationError> {
        self.inner.reset()
    }
}

/// In-memory [`Storage`], the default for tests and hosts without durable
/// storage.
#[derive(Default)]
pub struct MemoryStorage {
    entries: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: Vec<u8>) {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(key.to_string(), value);
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            record::TxOutcome,
            stage::Stage,
        },
        ethereum_types::{H160, H256},
    };

    fn storage() -> Arc<dyn Storage> {
        Arc::new(MemoryStorage::default())
    }

    fn success(byte: u8) -> TxState {
        TxState::Resolved {
            outcome: TxOutcome::Success {
                tx_hash: H256::repeat_byte(byte),
            },
        }
    }

    #[test]
    fn load_on_empty_storage_yields_defaults() {
        let store = PoolCreationStore::load(storage());
        assert_eq!(store.record(), PoolCreationRecord::default());
    }

    #[test]
    fn load_on_corrupt_data_yields_defaults() {
        let storage = storage();
        storage.set(POOL_CREATION_KEY, b"not json".to_vec());
        let store = PoolCreationStore::load(storage);
        assert_eq!(store.record(), PoolCreationRecord::default());
    }

    #[test]
    fn update_persists_before_returning() {
        let storage = storage();
        let store = PoolCreationStore::load(storage.clone());
        store.update(|record| record.step = 3).unwrap();

        // A fresh store over the same storage sees the mutation.
        let reloaded = PoolCreationStore::load(storage);
        assert_eq!(reloaded.record().step, 3);
    }

    #[test]
    fn reset_restores_defaults() {
        let storage = storage();
        let store = PoolCreationStore::load(storage.clone());
        store.update(|record| record.step = 5).unwrap();
        store.reset().unwrap();
        assert_eq!(
            PoolCreationStore::load(storage).record(),
            PoolCreationRecord::default()
        );
    }

    #[test]
    fn pool_address_is_write_once() {
        let store = PoolCreationStore::load(storage());
        store
            .update(|record| record.pool_address = Some(H160::repeat_byte(1)))
            .unwrap();
        let result = store.update(|record| record.pool_address = Some(H160::repeat_byte(2)));
        assert!(matches!(result, Err(CreationError::InvariantViolation(_))));
        // The failed update left nothing behind.
        assert_eq!(store.record().pool_address, Some(H160::repeat_byte(1)));
    }

    #[test]
    fn resolved_stage_cannot_become_pending_again() {
        let store = PoolCreationStore::load(storage());
        store
            .update(|record| {
                record.stages.insert(Stage::Deploy, success(1));
            })
            .unwrap();
        let result = store.update(|record| {
            record.stages.insert(
                Stage::Deploy,
                TxState::ExecutionPending {
                    tx_hash: H256::repeat_byte(2),
                },
            );
        });
        assert!(matches!(result, Err(CreationError::InvariantViolation(_))));
    }

    #[test]
    fn resolved_stage_may_roll_back_to_unsubmitted() {
        let store = PoolCreationStore::load(storage());
        store
            .update(|record| {
                record.step = 2;
                record.stages.insert(Stage::Deploy, success(1));
            })
            .unwrap();
        store
            .update(|record| {
                record.step = 1;
                record.stages.insert(Stage::Deploy, TxState::Unsubmitted);
            })
            .unwrap();
    }

    #[test]
    fn step_cannot_decrease_without_rollback() {
        let store = PoolCreationStore::load(storage());
        store.update(|record| record.step = 4).unwrap();
        let result = store.update(|record| record.step = 2);
        assert!(matches!(result, Err(CreationError::InvariantViolation(_))));
    }

    #[test]
    fn user_data_reset_leaves_pool_creation_untouched() {
        let storage = storage();
        let pool_store = PoolCreationStore::load(storage.clone());
        let user_store = UserDataStore::load(storage.clone());
        pool_store.update(|record| record.step = 3).unwrap();
        user_store
            .update(|record| record.risk_acknowledged = true)
            .unwrap();

        user_store.reset().unwrap();
        assert_eq!(PoolCreationStore::load(storage).record().step, 3);
        assert!(!user_store.record().risk_acknowledged);
    }
}
