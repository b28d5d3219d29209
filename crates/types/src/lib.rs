//! Shared primitives for the name registry.
//!
//! Identities and amounts are plain fixed-size values so that every crate in
//! the workspace (core, storage, treasury, CLI) agrees on their encoding.

pub mod identity;
pub mod price_schedule;

pub use identity::*;
pub use price_schedule::*;

/// Seconds since the UNIX epoch.
pub type Timestamp = u64;

/// Amount in base units (smallest indivisible unit, 8 decimals).
pub type Amount = u64;

/// Number of base units per whole token.
pub const UNITS_PER_TOKEN: Amount = 100_000_000;
