//! Treasury backed by an [`AccountLedger`]
//!
//! Prices each fee instruction from a [`RegistryPriceSchedule`], moves the
//! amount from the payer to the treasury account, and keeps the receipt open
//! until the registry either confirms it or asks for it to be reversed.

use crate::account_ledger::AccountLedger;
use crate::fee_collector::{FeeCollectionStats, FeeCollector, FeeTally};
use namereg_registry::{FeeInstruction, FeeKind, FeeReceipt, PaymentError, Treasury};
use namereg_types::{Amount, Identity, RegistryPriceSchedule};
use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::{debug, error, info, warn};

struct TreasuryState<L> {
    ledger: L,
    collector: FeeCollector,
    receipts: HashMap<u64, FeeReceipt>,
    next_id: u64,
}

pub struct LedgerTreasury<L> {
    account: Identity,
    schedule: RegistryPriceSchedule,
    state: Mutex<TreasuryState<L>>,
}

impl<L: AccountLedger> LedgerTreasury<L> {
    /// Treasury crediting `account` at the prices in `schedule`
    pub fn new(ledger: L, account: Identity, schedule: RegistryPriceSchedule) -> Self {
        Self {
            account,
            schedule,
            state: Mutex::new(TreasuryState {
                ledger,
                collector: FeeCollector::new(),
                receipts: HashMap::new(),
                next_id: 0,
            }),
        }
    }

    pub fn account(&self) -> &Identity {
        &self.account
    }

    pub fn schedule(&self) -> &RegistryPriceSchedule {
        &self.schedule
    }

    /// Price of one fee of `kind`; renewals cover a single year
    pub fn price(&self, kind: FeeKind) -> Amount {
        match kind {
            FeeKind::Registration => self.schedule.domain_register_fee,
            FeeKind::Renewal => self.schedule.compute_domain_renew_fee(1),
        }
    }

    pub fn balance(&self, account: &Identity) -> Result<Amount, PaymentError> {
        self.state.lock().ledger.balance(account).map_err(rejected)
    }

    /// Run `f` against the underlying ledger
    pub fn with_ledger<R>(&self, f: impl FnOnce(&mut L) -> R) -> R {
        f(&mut self.state.lock().ledger)
    }

    pub fn tally(&self, kind: FeeKind) -> FeeTally {
        self.state.lock().collector.tally(kind)
    }

    pub fn statistics(&self) -> FeeCollectionStats {
        self.state.lock().collector.statistics()
    }

    /// Receipts neither confirmed nor refunded yet
    pub fn open_receipts(&self) -> usize {
        self.state.lock().receipts.len()
    }

    pub fn into_ledger(self) -> L {
        self.state.into_inner().ledger
    }
}

impl<L: AccountLedger> Treasury for LedgerTreasury<L> {
    fn collect(&self, instruction: &FeeInstruction) -> Result<FeeReceipt, PaymentError> {
        let amount = self.price(instruction.kind);
        let payer = instruction.payer;
        let mut state = self.state.lock();

        let available = state.ledger.balance(&payer).map_err(rejected)?;
        if available < amount {
            warn!(
                target: "treasury",
                "{} cannot cover {:?} fee for {}: {} < {}",
                payer.short(),
                instruction.kind,
                instruction.name,
                available,
                amount
            );
            return Err(PaymentError::InsufficientFunds {
                payer,
                required: amount,
                available,
            });
        }

        state.ledger.debit(&payer, amount).map_err(rejected)?;
        if let Err(err) = state.ledger.credit(&self.account, amount) {
            if let Err(restore_err) = state.ledger.credit(&payer, amount) {
                error!(
                    target: "treasury",
                    "Could not restore {} to {}: {}",
                    amount,
                    payer.short(),
                    restore_err
                );
            }
            return Err(rejected(err));
        }

        let receipt = FeeReceipt {
            id: state.next_id,
            kind: instruction.kind,
            payer,
            amount,
        };
        state.next_id += 1;
        state.collector.record(receipt.kind, amount);
        state.receipts.insert(receipt.id, receipt.clone());

        info!(
            target: "treasury",
            "Collected {:?} fee #{} of {} from {} for {}",
            receipt.kind,
            receipt.id,
            amount,
            payer.short(),
            instruction.name
        );
        Ok(receipt)
    }

    fn confirm(&self, receipt: &FeeReceipt) -> Result<(), PaymentError> {
        let mut state = self.state.lock();
        state
            .receipts
            .remove(&receipt.id)
            .ok_or(PaymentError::UnknownReceipt(receipt.id))?;
        debug!(target: "treasury", "Confirmed fee #{}", receipt.id);
        Ok(())
    }

    fn refund(&self, receipt: &FeeReceipt) -> Result<(), PaymentError> {
        let mut state = self.state.lock();
        let held = state
            .receipts
            .remove(&receipt.id)
            .ok_or(PaymentError::UnknownReceipt(receipt.id))?;

        if held != *receipt {
            state.receipts.insert(held.id, held);
            return Err(PaymentError::Rejected(format!(
                "receipt #{} does not match the collected fee",
                receipt.id
            )));
        }

        if let Err(err) = state.ledger.debit(&self.account, held.amount) {
            state.receipts.insert(held.id, held);
            return Err(rejected(err));
        }
        if let Err(err) = state.ledger.credit(&held.payer, held.amount) {
            if let Err(restore_err) = state.ledger.credit(&self.account, held.amount) {
                error!(
                    target: "treasury",
                    "Could not restore {} to the treasury account: {}",
                    held.amount,
                    restore_err
                );
            }
            state.receipts.insert(held.id, held);
            return Err(rejected(err));
        }

        state.collector.record_refund(held.kind, held.amount);
        info!(
            target: "treasury",
            "Refunded fee #{} of {} to {}",
            held.id,
            held.amount,
            held.payer.short()
        );
        Ok(())
    }
}

fn rejected(err: anyhow::Error) -> PaymentError {
    PaymentError::Rejected(err.to_string())
}
