//! Record storage
//!
//! A [`RegistryStore`] maps derived keys to [`Domain`] records. Inserts and
//! updates take a closure that runs while the key is held exclusively, and
//! the store commits only if that closure succeeds. This is the unit of work
//! the service builds its atomic operations on: the fee is collected inside
//! the closure, so a failed payment leaves nothing behind.

use crate::key::DomainKey;
use crate::types::Domain;
use parking_lot::{Condvar, Mutex, RwLock};
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Store failure, generic over the error a caller's closure may abort with
#[derive(Error, Debug)]
pub enum StoreError<E = Infallible> {
    #[error("key {0} already holds a record")]
    Occupied(DomainKey),

    #[error("no record at key {0}")]
    Missing(DomainKey),

    #[error("operation aborted: {0}")]
    Aborted(E),

    #[error("storage backend error: {0}")]
    Backend(anyhow::Error),
}

impl<E> StoreError<E> {
    pub fn backend(err: impl Into<anyhow::Error>) -> Self {
        StoreError::Backend(err.into())
    }
}

impl StoreError<Infallible> {
    /// Reinterpret a closure-free store error under any abort type.
    pub fn widen<E>(self) -> StoreError<E> {
        match self {
            StoreError::Occupied(key) => StoreError::Occupied(key),
            StoreError::Missing(key) => StoreError::Missing(key),
            StoreError::Aborted(never) => match never {},
            StoreError::Backend(err) => StoreError::Backend(err),
        }
    }
}

/// Durable mapping from derived key to domain record.
///
/// Implementations must serialize `insert_with` and `update` per key and must
/// not make a record visible until the closure has returned `Ok`. Once a
/// record is visible the call must return `Ok`, since callers settle fees on
/// the result. Operations on different keys must not block each other.
pub trait RegistryStore: Send + Sync {
    /// Read-only lookup
    fn get(&self, key: &DomainKey) -> Result<Option<Domain>, StoreError>;

    /// Create the record at `key` from `build`, unless the key is occupied.
    fn insert_with<E, F>(&self, key: &DomainKey, build: F) -> Result<Domain, StoreError<E>>
    where
        F: FnOnce() -> Result<Domain, E>;

    /// Apply `mutator` to the record at `key` and commit the result.
    fn update<E, F>(&self, key: &DomainKey, mutator: F) -> Result<Domain, StoreError<E>>
    where
        F: FnOnce(&mut Domain) -> Result<(), E>;

    /// All records, in no particular order
    fn list(&self) -> Result<Vec<(DomainKey, Domain)>, StoreError>;

    fn insert(&self, key: &DomainKey, record: Domain) -> Result<(), StoreError> {
        self.insert_with(key, || Ok::<_, Infallible>(record))
            .map(|_| ())
    }
}

/// Per-key exclusive sections.
///
/// A key is held for the lifetime of its [`KeyGuard`]; other keys stay free.
/// Each held key carries its own condition variable, so releasing a key only
/// wakes callers waiting on that key. Only held keys occupy memory.
#[derive(Debug, Default)]
pub struct KeyLocks {
    held: Mutex<HashMap<DomainKey, Arc<Condvar>>>,
}

impl KeyLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until `key` is free, then hold it
    pub fn lock(&self, key: &DomainKey) -> KeyGuard<'_> {
        let mut held = self.held.lock();
        while let Some(released) = held.get(key).cloned() {
            released.wait(&mut held);
        }
        held.insert(*key, Arc::new(Condvar::new()));
        KeyGuard {
            locks: self,
            key: *key,
        }
    }

    /// Number of keys currently held
    pub fn held(&self) -> usize {
        self.held.lock().len()
    }
}

/// Releases its key on drop
#[derive(Debug)]
pub struct KeyGuard<'a> {
    locks: &'a KeyLocks,
    key: DomainKey,
}

impl Drop for KeyGuard<'_> {
    fn drop(&mut self) {
        let released = self.locks.held.lock().remove(&self.key);
        if let Some(released) = released {
            released.notify_all();
        }
    }
}

/// In-memory store for embedding and tests
#[derive(Debug, Clone, Default)]
pub struct MemoryRegistryStore {
    records: Arc<RwLock<HashMap<DomainKey, Domain>>>,
    locks: Arc<KeyLocks>,
}

impl MemoryRegistryStore {
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

impl RegistryStore for MemoryRegistryStore {
    fn get(&self, key: &DomainKey) -> Result<Option<Domain>, StoreError> {
        Ok(self.records.read().get(key).cloned())
    }

    fn insert_with<E, F>(&self, key: &DomainKey, build: F) -> Result<Domain, StoreError<E>>
    where
        F: FnOnce() -> Result<Domain, E>,
    {
        let _guard = self.locks.lock(key);

        if self.records.read().contains_key(key) {
            return Err(StoreError::Occupied(*key));
        }

        let record = build().map_err(StoreError::Aborted)?;
        self.records.write().insert(*key, record.clone());
        debug!(target: "storage", key = %key, name = %record.name, "record inserted");
        Ok(record)
    }

    fn update<E, F>(&self, key: &DomainKey, mutator: F) -> Result<Domain, StoreError<E>>
    where
        F: FnOnce(&mut Domain) -> Result<(), E>,
    {
        let _guard = self.locks.lock(key);

        let mut record = self
            .records
            .read()
            .get(key)
            .cloned()
            .ok_or(StoreError::<E>::Missing(*key))?;

        mutator(&mut record).map_err(StoreError::Aborted)?;
        self.records.write().insert(*key, record.clone());
        debug!(target: "storage", key = %key, name = %record.name, "record updated");
        Ok(record)
    }

    fn list(&self) -> Result<Vec<(DomainKey, Domain)>, StoreError> {
        Ok(self
            .records
            .read()
            .iter()
            .map(|(key, record)| (*key, record.clone()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::KeyDeriver;
    use namereg_types::Identity;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    fn record(name: &str) -> Domain {
        Domain::new(name, Identity::from_label("owner"), 1_000).unwrap()
    }

    #[test]
    fn insert_then_get() {
        let store = MemoryRegistryStore::new();
        let key = KeyDeriver::default().derive("alpha");

        store.insert(&key, record("alpha")).unwrap();
        assert_eq!(store.get(&key).unwrap(), Some(record("alpha")));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn insert_into_occupied_key_fails_and_keeps_original() {
        let store = MemoryRegistryStore::new();
        let key = KeyDeriver::default().derive("alpha");
        store.insert(&key, record("alpha")).unwrap();

        let mut other = record("alpha");
        other.data = "intruder".into();
        let err = store.insert(&key, other).unwrap_err();
        assert!(matches!(err, StoreError::Occupied(k) if k == key));
        assert_eq!(store.get(&key).unwrap().unwrap().data, "");
    }

    #[test]
    fn aborted_build_commits_nothing() {
        let store = MemoryRegistryStore::new();
        let key = KeyDeriver::default().derive("alpha");

        let err = store
            .insert_with(&key, || Err::<Domain, _>("no funds"))
            .unwrap_err();
        assert!(matches!(err, StoreError::Aborted("no funds")));
        assert!(store.get(&key).unwrap().is_none());
    }

    #[test]
    fn update_missing_key_fails() {
        let store = MemoryRegistryStore::new();
        let key = KeyDeriver::default().derive("ghost");
        let err = store
            .update(&key, |_| Ok::<_, Infallible>(()))
            .unwrap_err();
        assert!(matches!(err, StoreError::Missing(_)));
    }

    #[test]
    fn aborted_update_leaves_record_unchanged() {
        let store = MemoryRegistryStore::new();
        let key = KeyDeriver::default().derive("alpha");
        store.insert(&key, record("alpha")).unwrap();

        let err = store
            .update(&key, |domain| {
                domain.data = "half-applied".into();
                Err("rejected")
            })
            .unwrap_err();
        assert!(matches!(err, StoreError::Aborted("rejected")));
        assert_eq!(store.get(&key).unwrap().unwrap().data, "");
    }

    #[test]
    fn update_returns_new_state() {
        let store = MemoryRegistryStore::new();
        let key = KeyDeriver::default().derive("alpha");
        store.insert(&key, record("alpha")).unwrap();

        let updated = store
            .update(&key, |domain| {
                domain.data = "https://a.example".into();
                Ok::<_, Infallible>(())
            })
            .unwrap();
        assert_eq!(updated.data, "https://a.example");
        assert_eq!(store.get(&key).unwrap().unwrap(), updated);
    }

    #[test]
    fn list_returns_every_record() {
        let store = MemoryRegistryStore::new();
        let deriver = KeyDeriver::default();
        for name in ["one", "two", "three"] {
            store.insert(&deriver.derive(name), record(name)).unwrap();
        }

        let mut names: Vec<String> = store
            .list()
            .unwrap()
            .into_iter()
            .map(|(_, domain)| domain.name)
            .collect();
        names.sort();
        assert_eq!(names, vec!["one", "three", "two"]);
    }

    #[test]
    fn key_locks_release_on_drop() {
        let locks = KeyLocks::new();
        let key = KeyDeriver::default().derive("alpha");
        {
            let _guard = locks.lock(&key);
            assert_eq!(locks.held(), 1);
        }
        assert_eq!(locks.held(), 0);
    }

    #[test]
    fn released_key_wakes_its_waiter() {
        let locks = Arc::new(KeyLocks::new());
        let deriver = KeyDeriver::default();
        let contested = deriver.derive("contested");
        let other = deriver.derive("other");

        let guard = locks.lock(&contested);
        let (acquired_tx, acquired_rx) = std::sync::mpsc::channel();
        let waiter = {
            let locks = locks.clone();
            thread::spawn(move || {
                let _guard = locks.lock(&contested);
                acquired_tx.send(()).unwrap();
            })
        };

        // A different key is free while the waiter is parked.
        drop(locks.lock(&other));
        assert!(acquired_rx
            .recv_timeout(Duration::from_millis(50))
            .is_err());

        drop(guard);
        acquired_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        waiter.join().unwrap();
        assert_eq!(locks.held(), 0);
    }

    #[test]
    fn same_key_updates_are_serialized() {
        let store = MemoryRegistryStore::new();
        let key = KeyDeriver::default().derive("counter");
        store.insert(&key, record("counter")).unwrap();

        let in_flight = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                let in_flight = in_flight.clone();
                thread::spawn(move || {
                    for _ in 0..25 {
                        store
                            .update(&key, |domain| {
                                assert_eq!(in_flight.fetch_add(1, Ordering::SeqCst), 0);
                                let n: u64 = domain.data.parse().unwrap_or(0);
                                domain.data = (n + 1).to_string();
                                in_flight.fetch_sub(1, Ordering::SeqCst);
                                Ok::<_, Infallible>(())
                            })
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.get(&key).unwrap().unwrap().data, "200");
    }

    #[test]
    fn different_keys_do_not_wait_on_each_other() {
        let store = MemoryRegistryStore::new();
        let deriver = KeyDeriver::default();
        let slow = deriver.derive("slow");
        let fast = deriver.derive("fast");
        store.insert(&slow, record("slow")).unwrap();
        store.insert(&fast, record("fast")).unwrap();

        let (entered_tx, entered_rx) = std::sync::mpsc::channel();
        let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();

        let slow_store = store.clone();
        let holder = thread::spawn(move || {
            slow_store
                .update(&slow, |_| {
                    entered_tx.send(()).unwrap();
                    release_rx.recv_timeout(Duration::from_secs(5)).unwrap();
                    Ok::<_, Infallible>(())
                })
                .unwrap();
        });

        entered_rx.recv().unwrap();
        // "slow" is held; "fast" must still go through.
        store
            .update(&fast, |domain| {
                domain.data = "done".into();
                Ok::<_, Infallible>(())
            })
            .unwrap();
        release_tx.send(()).unwrap();
        holder.join().unwrap();

        assert_eq!(store.get(&fast).unwrap().unwrap().data, "done");
    }
}
