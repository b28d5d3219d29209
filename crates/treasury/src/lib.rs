//! Treasury for the name registry
//!
//! Implements the registry's [`namereg_registry::Treasury`] collaborator on
//! top of an account ledger: fees are priced from the registry price
//! schedule, moved from the payer to the treasury account, and tallied per
//! fee kind.

pub mod account_ledger;
pub mod fee_collector;
pub mod ledger_treasury;

pub use account_ledger::{AccountLedger, InMemoryAccountLedger, MockAccountLedger};
pub use fee_collector::{FeeCollectionStats, FeeCollector, FeeTally};
pub use ledger_treasury::LedgerTreasury;
