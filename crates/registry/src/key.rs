//! Deterministic storage keys for names

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Domain-separation tag mixed into every derived key.
pub const KEY_NAMESPACE: &[u8] = b"domain";

/// Fixed-size storage key of a domain record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DomainKey(pub [u8; 32]);

impl DomainKey {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Rebuild a key from raw storage bytes.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let array: [u8; 32] = bytes.try_into().ok()?;
        Some(Self(array))
    }
}

impl fmt::Display for DomainKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl AsRef<[u8]> for DomainKey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Maps names to keys.
///
/// `key = SHA-256("domain" || name || registry_id)`. The namespace tag has a
/// fixed length and the registry id a fixed width, so the name bytes are
/// unambiguously delimited and distinct names hash distinct preimages.
/// Input is assumed to be validated already.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeyDeriver {
    registry_id: [u8; 32],
}

impl KeyDeriver {
    /// Deriver scoped to a registry instance
    pub fn new(registry_id: [u8; 32]) -> Self {
        Self { registry_id }
    }

    pub fn registry_id(&self) -> &[u8; 32] {
        &self.registry_id
    }

    /// Derive the storage key of `name`
    pub fn derive(&self, name: &str) -> DomainKey {
        let mut hasher = Sha256::new();
        hasher.update(KEY_NAMESPACE);
        hasher.update(name.as_bytes());
        hasher.update(self.registry_id);
        DomainKey(hasher.finalize().into())
    }
}
