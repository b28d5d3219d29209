//! Types for the name registry

use namereg_types::{Identity, Timestamp};
use serde::{Deserialize, Serialize};

/// Length of one registration or renewal period (365 days).
pub const ONE_YEAR_SECONDS: u64 = 31_536_000;

/// A registered name and everything the registry knows about it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Domain {
    /// Name the record was registered under; never changes
    pub name: String,
    /// Identity allowed to mutate the record
    pub owner: Identity,
    /// Opaque payload (e.g. a URL), may be empty
    pub data: String,
    /// Creation timestamp
    pub registered: Timestamp,
    /// Expiration timestamp
    pub expires: Timestamp,
    /// Set at creation; expiry does not clear it
    pub active: bool,
}

impl Domain {
    /// Fresh record for `name`, valid for one year from `now`.
    ///
    /// Returns `None` if the expiry does not fit in a timestamp.
    pub fn new(name: impl Into<String>, owner: Identity, now: Timestamp) -> Option<Self> {
        Some(Self {
            name: name.into(),
            owner,
            data: String::new(),
            registered: now,
            expires: now.checked_add(ONE_YEAR_SECONDS)?,
            active: true,
        })
    }

    /// Whether the record has lapsed at `now`. Lapse is informational only.
    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.expires < now
    }

    /// Seconds left before the record lapses, zero once it has.
    pub fn remaining(&self, now: Timestamp) -> u64 {
        self.expires.saturating_sub(now)
    }

    pub fn is_owned_by(&self, identity: &Identity) -> bool {
        self.owner == *identity
    }
}

/// Domain registration request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub caller: Identity,
    pub fee_payer: Identity,
}

impl RegisterRequest {
    /// Registration paid for by the caller
    pub fn new(name: impl Into<String>, caller: Identity) -> Self {
        Self {
            name: name.into(),
            caller,
            fee_payer: caller,
        }
    }

    pub fn paid_by(mut self, payer: Identity) -> Self {
        self.fee_payer = payer;
        self
    }
}

/// Payload update request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetDataRequest {
    pub name: String,
    pub caller: Identity,
    pub data: String,
}

impl SetDataRequest {
    pub fn new(name: impl Into<String>, caller: Identity, data: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            caller,
            data: data.into(),
        }
    }
}

/// Ownership transfer request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferRequest {
    pub name: String,
    pub caller: Identity,
    pub new_owner: Identity,
}

impl TransferRequest {
    pub fn new(name: impl Into<String>, caller: Identity, new_owner: Identity) -> Self {
        Self {
            name: name.into(),
            caller,
            new_owner,
        }
    }
}

/// Renewal request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenewRequest {
    pub name: String,
    pub caller: Identity,
    pub fee_payer: Identity,
}

impl RenewRequest {
    /// Renewal paid for by the caller
    pub fn new(name: impl Into<String>, caller: Identity) -> Self {
        Self {
            name: name.into(),
            caller,
            fee_payer: caller,
        }
    }

    pub fn paid_by(mut self, payer: Identity) -> Self {
        self.fee_payer = payer;
        self
    }
}
