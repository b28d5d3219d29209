//! Fee collection interface.
//!
//! The registry only states that a fee is due and who pays it. Pricing and
//! settlement belong to whatever implements [`Treasury`].

use crate::key::DomainKey;
use namereg_types::{Amount, Identity};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Operation a fee is charged for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeeKind {
    Registration,
    Renewal,
}

/// Fee-collection instruction emitted by a registry operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeInstruction {
    pub kind: FeeKind,
    pub payer: Identity,
    pub key: DomainKey,
    pub name: String,
}

impl FeeInstruction {
    pub fn registration(payer: Identity, key: DomainKey, name: impl Into<String>) -> Self {
        Self {
            kind: FeeKind::Registration,
            payer,
            key,
            name: name.into(),
        }
    }

    pub fn renewal(payer: Identity, key: DomainKey, name: impl Into<String>) -> Self {
        Self {
            kind: FeeKind::Renewal,
            payer,
            key,
            name: name.into(),
        }
    }
}

/// Proof that a fee was collected; needed to reverse it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeReceipt {
    pub id: u64,
    pub kind: FeeKind,
    pub payer: Identity,
    pub amount: Amount,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PaymentError {
    #[error("insufficient funds for {payer}: required {required}, available {available}")]
    InsufficientFunds {
        payer: Identity,
        required: Amount,
        available: Amount,
    },

    #[error("payment rejected: {0}")]
    Rejected(String),

    #[error("unknown fee receipt #{0}")]
    UnknownReceipt(u64),
}

/// External collaborator that receives registration and renewal fees.
///
/// `collect` runs inside the registry's unit of work; an error aborts the
/// operation before anything is committed. Exactly one of `confirm` or
/// `refund` follows every receipt: `confirm` once the mutation it paid for
/// is committed, `refund` when the store fails to commit after the fee was
/// taken. A confirmed receipt can no longer be refunded.
pub trait Treasury: Send + Sync {
    fn collect(&self, instruction: &FeeInstruction) -> Result<FeeReceipt, PaymentError>;

    fn confirm(&self, _receipt: &FeeReceipt) -> Result<(), PaymentError> {
        Ok(())
    }

    fn refund(&self, receipt: &FeeReceipt) -> Result<(), PaymentError>;
}

impl<T: Treasury + ?Sized> Treasury for std::sync::Arc<T> {
    fn collect(&self, instruction: &FeeInstruction) -> Result<FeeReceipt, PaymentError> {
        (**self).collect(instruction)
    }

    fn confirm(&self, receipt: &FeeReceipt) -> Result<(), PaymentError> {
        (**self).confirm(receipt)
    }

    fn refund(&self, receipt: &FeeReceipt) -> Result<(), PaymentError> {
        (**self).refund(receipt)
    }
}
