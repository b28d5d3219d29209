//! Name Registry Core
//!
//! Maps human-chosen names to records with a bounded lifetime, transferable
//! ownership, and an opaque payload. Names are validated, turned into a
//! deterministic storage key, and every mutation is gated on the current
//! owner. Registration and renewal are paid through an external [`Treasury`]
//! inside the same unit of work as the record change.
//!
//! The core never reads the wall clock or talks to a network: time comes from
//! a [`Clock`], storage from a [`RegistryStore`], and callers arrive already
//! authenticated.

pub mod clock;
pub mod errors;
pub mod key;
pub mod service;
pub mod store;
pub mod treasury;
pub mod types;
pub mod validation;

pub use clock::{Clock, ManualClock, SystemClock};
pub use errors::*;
pub use key::{DomainKey, KeyDeriver, KEY_NAMESPACE};
pub use service::RegistryService;
pub use store::{KeyLocks, MemoryRegistryStore, RegistryStore, StoreError};
pub use treasury::{FeeInstruction, FeeKind, FeeReceipt, PaymentError, Treasury};
pub use types::*;
pub use validation::{validate_name, NameError, MAX_NAME_LEN, MIN_NAME_LEN};

pub use namereg_types::{Amount, Identity, Timestamp};
