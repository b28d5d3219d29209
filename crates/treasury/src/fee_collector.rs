//! Fee bookkeeping for the treasury
//!
//! Tracks what was collected per fee kind, what was handed back, and
//! produces summary statistics.

use namereg_registry::FeeKind;
use namereg_types::Amount;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

/// Totals for one fee kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeTally {
    pub count: u64,
    pub collected: Amount,
    pub refunded: Amount,
}

impl FeeTally {
    /// Collected minus refunded
    pub fn net(&self) -> Amount {
        self.collected.saturating_sub(self.refunded)
    }
}

/// Fee collection statistics for monitoring
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeCollectionStats {
    pub total_collected: Amount,
    pub total_refunded: Amount,
    pub net_collected: Amount,
    pub payments: u64,
    pub refunds: u64,
    pub average_payment: Amount,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeeCollector {
    by_kind: HashMap<FeeKind, FeeTally>,
    refunds: u64,
}

impl FeeCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a collected fee
    pub fn record(&mut self, kind: FeeKind, amount: Amount) {
        let tally = self.by_kind.entry(kind).or_default();
        tally.count += 1;
        tally.collected = tally.collected.saturating_add(amount);
        debug!(target: "treasury", "Recorded {:?} fee of {}", kind, amount);
    }

    /// Record a fee handed back
    pub fn record_refund(&mut self, kind: FeeKind, amount: Amount) {
        let tally = self.by_kind.entry(kind).or_default();
        tally.refunded = tally.refunded.saturating_add(amount);
        self.refunds += 1;
        info!(target: "treasury", "Refunded {:?} fee of {}", kind, amount);
    }

    pub fn tally(&self, kind: FeeKind) -> FeeTally {
        self.by_kind.get(&kind).copied().unwrap_or_default()
    }

    pub fn total_collected(&self) -> Amount {
        self.by_kind
            .values()
            .fold(0, |sum, tally| sum.saturating_add(tally.collected))
    }

    pub fn total_refunded(&self) -> Amount {
        self.by_kind
            .values()
            .fold(0, |sum, tally| sum.saturating_add(tally.refunded))
    }

    pub fn statistics(&self) -> FeeCollectionStats {
        let total_collected = self.total_collected();
        let total_refunded = self.total_refunded();
        let payments: u64 = self.by_kind.values().map(|tally| tally.count).sum();

        let average_payment = if payments > 0 {
            total_collected / payments
        } else {
            0
        };

        FeeCollectionStats {
            total_collected,
            total_refunded,
            net_collected: total_collected.saturating_sub(total_refunded),
            payments,
            refunds: self.refunds,
            average_payment,
        }
    }
}
