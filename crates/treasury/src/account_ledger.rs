//! Account ledger interface for fee settlement
//!
//! Provides a small, deterministic interface for crediting, debiting, and
//! reading balances of registry participants and the treasury account.

use anyhow::Result;
use namereg_types::{Amount, Identity};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Interface for account ledger operations.
pub trait AccountLedger: Send + Sync {
    /// Credit an account.
    fn credit(&mut self, account: &Identity, amount: Amount) -> Result<()>;

    /// Debit an account. Fails without side effects when the balance is short.
    fn debit(&mut self, account: &Identity, amount: Amount) -> Result<()>;

    fn balance(&self, account: &Identity) -> Result<Amount>;

    /// Total held across all accounts.
    fn total_supply(&self) -> Result<Amount>;

    /// Snapshot of every non-empty account.
    fn all_balances(&self) -> Result<HashMap<Identity, Amount>>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InMemoryAccountLedger {
    balances: HashMap<Identity, Amount>,
    total_supply: Amount,
}

impl InMemoryAccountLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ledger where every listed account starts with `amount`
    pub fn funded<'a>(accounts: impl IntoIterator<Item = &'a Identity>, amount: Amount) -> Self {
        let mut ledger = Self::new();
        for account in accounts {
            ledger.apply_credit(account, amount);
        }
        ledger
    }

    fn apply_credit(&mut self, account: &Identity, amount: Amount) {
        let balance = self.balances.entry(*account).or_insert(0);
        *balance = balance.saturating_add(amount);
        self.total_supply = self.total_supply.saturating_add(amount);
    }
}

impl AccountLedger for InMemoryAccountLedger {
    fn credit(&mut self, account: &Identity, amount: Amount) -> Result<()> {
        self.apply_credit(account, amount);
        Ok(())
    }

    fn debit(&mut self, account: &Identity, amount: Amount) -> Result<()> {
        let current = self.balances.get(account).copied().unwrap_or(0);
        if current < amount {
            return Err(anyhow::anyhow!(
                "Insufficient balance in {}: {} < {}",
                account.short(),
                current,
                amount
            ));
        }
        self.balances.insert(*account, current - amount);
        self.total_supply = self.total_supply.saturating_sub(amount);
        Ok(())
    }

    fn balance(&self, account: &Identity) -> Result<Amount> {
        Ok(self.balances.get(account).copied().unwrap_or(0))
    }

    fn total_supply(&self) -> Result<Amount> {
        Ok(self.total_supply)
    }

    fn all_balances(&self) -> Result<HashMap<Identity, Amount>> {
        Ok(self.balances.clone())
    }
}

/// Ledger that records every call, for asserting settlement flows
#[derive(Debug, Clone, Default)]
pub struct MockAccountLedger {
    inner: InMemoryAccountLedger,
    credit_calls: Vec<(Identity, Amount)>,
    debit_calls: Vec<(Identity, Amount)>,
    fail_credits: bool,
}

impl MockAccountLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn funded<'a>(accounts: impl IntoIterator<Item = &'a Identity>, amount: Amount) -> Self {
        Self {
            inner: InMemoryAccountLedger::funded(accounts, amount),
            ..Self::default()
        }
    }

    /// Make every subsequent credit fail
    pub fn fail_credits(&mut self, fail: bool) {
        self.fail_credits = fail;
    }

    pub fn credit_calls(&self) -> &[(Identity, Amount)] {
        &self.credit_calls
    }

    pub fn debit_calls(&self) -> &[(Identity, Amount)] {
        &self.debit_calls
    }

    pub fn clear_calls(&mut self) {
        self.credit_calls.clear();
        self.debit_calls.clear();
    }
}

impl AccountLedger for MockAccountLedger {
    fn credit(&mut self, account: &Identity, amount: Amount) -> Result<()> {
        self.credit_calls.push((*account, amount));
        if self.fail_credits {
            return Err(anyhow::anyhow!("credit to {} refused", account.short()));
        }
        self.inner.credit(account, amount)
    }

    fn debit(&mut self, account: &Identity, amount: Amount) -> Result<()> {
        self.debit_calls.push((*account, amount));
        self.inner.debit(account, amount)
    }

    fn balance(&self, account: &Identity) -> Result<Amount> {
        self.inner.balance(account)
    }

    fn total_supply(&self) -> Result<Amount> {
        self.inner.total_supply()
    }

    fn all_balances(&self) -> Result<HashMap<Identity, Amount>> {
        self.inner.all_balances()
    }
}
