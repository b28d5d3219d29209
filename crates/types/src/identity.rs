use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// Number of raw bytes in an identity handle.
pub const IDENTITY_BYTES: usize = 32;

/// Errors that can occur when parsing an identity string.
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("identity must be {expected} hex characters, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("identity is not valid hexadecimal")]
    InvalidHex(#[from] hex::FromHexError),
}

/// Opaque handle of an already-authenticated principal.
///
/// The registry never verifies credentials; it only compares identities for
/// equality. The transport layer is responsible for authenticating whoever
/// presents one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identity(pub [u8; IDENTITY_BYTES]);

impl Identity {
    pub const fn new(bytes: [u8; IDENTITY_BYTES]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; IDENTITY_BYTES] {
        &self.0
    }

    /// Deterministic identity derived from a human label (`"alice"`).
    ///
    /// Intended for tooling and tests where no key material exists.
    pub fn from_label(label: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"identity");
        hasher.update(label.as_bytes());
        Self(hasher.finalize().into())
    }

    /// Shortened hex form used in log lines.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..6])
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl FromStr for Identity {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != IDENTITY_BYTES * 2 {
            return Err(IdentityError::InvalidLength {
                expected: IDENTITY_BYTES * 2,
                actual: s.len(),
            });
        }
        let mut bytes = [0u8; IDENTITY_BYTES];
        hex::decode_to_slice(s, &mut bytes)?;
        Ok(Self(bytes))
    }
}

impl From<[u8; IDENTITY_BYTES]> for Identity {
    fn from(value: [u8; IDENTITY_BYTES]) -> Self {
        Self(value)
    }
}

impl From<Identity> for String {
    fn from(value: Identity) -> Self {
        value.to_string()
    }
}

impl TryFrom<String> for Identity {
    type Error = IdentityError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
