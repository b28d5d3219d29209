use anyhow::Result;
use namereg_registry::{Domain, DomainKey, KeyLocks, RegistryStore, StoreError};
use sled::{Db, IVec, Tree};
use std::convert::Infallible;
use std::path::Path;
use tracing::{debug, error, info};

/// On-disk layout version, stored in the metadata tree.
pub const SCHEMA_VERSION: u32 = 1;

const SCHEMA_KEY: &[u8] = b"schema_version";

/// Storage errors
#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sled::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Corrupt record key {0}")]
    CorruptKey(String),
    #[error("Unsupported schema version {found} (expected {expected})")]
    SchemaMismatch { found: u32, expected: u32 },
}

fn db_error<E>(err: sled::Error) -> StoreError<E> {
    StoreError::backend(StorageError::Database(err))
}

/// Sled-backed implementation
pub struct SledRegistryStore {
    db: Db,
    domains: Tree,
    locks: KeyLocks,
    flush_domains: fn(&Tree) -> sled::Result<usize>,
}

impl SledRegistryStore {
    /// Open (or create) a store at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = sled::open(path).map_err(StorageError::from)?;
        Self::from_db(db)
    }

    /// Store backed by a temporary database that is removed on drop
    pub fn temporary() -> Result<Self> {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .map_err(StorageError::from)?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> Result<Self> {
        let metadata = db.open_tree("metadata").map_err(StorageError::from)?;
        match metadata.get(SCHEMA_KEY).map_err(StorageError::from)? {
            Some(raw) => {
                let bytes: [u8; 4] = raw
                    .as_ref()
                    .try_into()
                    .map_err(|_| StorageError::CorruptKey(hex::encode(&raw)))?;
                let found = u32::from_be_bytes(bytes);
                if found != SCHEMA_VERSION {
                    return Err(StorageError::SchemaMismatch {
                        found,
                        expected: SCHEMA_VERSION,
                    }
                    .into());
                }
            }
            None => {
                metadata
                    .insert(SCHEMA_KEY, &SCHEMA_VERSION.to_be_bytes())
                    .map_err(StorageError::from)?;
                info!(target: "storage", "Initialized registry store (schema v{})", SCHEMA_VERSION);
            }
        }

        let domains = db.open_tree("domains").map_err(StorageError::from)?;
        Ok(Self {
            db,
            domains,
            locks: KeyLocks::new(),
            flush_domains: Tree::flush,
        })
    }

    pub fn flush(&self) -> Result<()> {
        self.db.flush().map_err(StorageError::from)?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.domains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }

    fn commit<E>(
        &self,
        key: &DomainKey,
        old: Option<&IVec>,
        record: &Domain,
    ) -> std::result::Result<(), StoreError<E>> {
        let encoded = serde_json::to_vec(record)
            .map_err(|err| StoreError::<E>::backend(StorageError::from(err)))?;
        let swapped = self
            .domains
            .compare_and_swap(key, old, Some(encoded))
            .map_err(db_error::<E>)?;

        if swapped.is_err() {
            // Another writer got in despite the key lock (e.g. a second
            // handle on the same tree); surface it rather than overwrite.
            return Err(match old {
                None => StoreError::Occupied(*key),
                Some(_) => StoreError::backend(anyhow::anyhow!(
                    "record {} changed during update",
                    key
                )),
            });
        }

        // The record is visible from here on, so the commit stands even if
        // the flush fails; sled retries on its own flush interval.
        if let Err(err) = (self.flush_domains)(&self.domains) {
            error!(target: "storage", "Flushing {} after commit failed: {}", key, err);
        }
        Ok(())
    }
}

fn decode<E>(raw: &[u8]) -> std::result::Result<Domain, StoreError<E>> {
    serde_json::from_slice(raw).map_err(|err| StoreError::backend(StorageError::from(err)))
}

impl RegistryStore for SledRegistryStore {
    fn get(&self, key: &DomainKey) -> std::result::Result<Option<Domain>, StoreError> {
        self.domains
            .get(key)
            .map_err(db_error::<Infallible>)?
            .map(|raw| decode(&raw))
            .transpose()
    }

    fn insert_with<E, F>(&self, key: &DomainKey, build: F) -> std::result::Result<Domain, StoreError<E>>
    where
        F: FnOnce() -> std::result::Result<Domain, E>,
    {
        let _guard = self.locks.lock(key);

        if self
            .domains
            .contains_key(key)
            .map_err(db_error::<E>)?
        {
            return Err(StoreError::Occupied(*key));
        }

        let record = build().map_err(StoreError::Aborted)?;
        self.commit::<E>(key, None, &record)?;
        debug!(target: "storage", "Inserted {} at {}", record.name, key);
        Ok(record)
    }

    fn update<E, F>(&self, key: &DomainKey, mutator: F) -> std::result::Result<Domain, StoreError<E>>
    where
        F: FnOnce(&mut Domain) -> std::result::Result<(), E>,
    {
        let _guard = self.locks.lock(key);

        let current = self
            .domains
            .get(key)
            .map_err(db_error::<E>)?
            .ok_or(StoreError::<E>::Missing(*key))?;
        let mut record = decode::<E>(&current)?;

        mutator(&mut record).map_err(StoreError::Aborted)?;
        self.commit::<E>(key, Some(&current), &record)?;
        debug!(target: "storage", "Updated {} at {}", record.name, key);
        Ok(record)
    }

    fn list(&self) -> std::result::Result<Vec<(DomainKey, Domain)>, StoreError> {
        self.domains
            .iter()
            .map(|item| -> std::result::Result<(DomainKey, Domain), StoreError> {
                let (raw_key, raw_value) = item.map_err(db_error::<Infallible>)?;
                let key = DomainKey::from_slice(&raw_key).ok_or_else(|| {
                    StoreError::backend(StorageError::CorruptKey(hex::encode(&raw_key)))
                })?;
                Ok((key, decode::<Infallible>(&raw_value)?))
            })
            .collect()
    }
}
