//! Registry operations
//!
//! [`RegistryService`] is a stateless orchestrator: it borrows a store, a
//! treasury, and a clock for as long as the caller keeps it around and owns
//! nothing but its key-derivation settings.

use crate::clock::Clock;
use crate::errors::*;
use crate::key::{DomainKey, KeyDeriver};
use crate::store::{RegistryStore, StoreError};
use crate::treasury::{FeeInstruction, FeeReceipt, Treasury};
use crate::types::*;
use crate::validation::validate_name;
use namereg_types::Identity;
use tracing::{debug, error, info, warn};

/// Name registry operations over borrowed collaborators
pub struct RegistryService<'a, S, T: ?Sized, C: ?Sized> {
    store: &'a S,
    treasury: &'a T,
    clock: &'a C,
    deriver: KeyDeriver,
}

impl<'a, S, T, C> RegistryService<'a, S, T, C>
where
    S: RegistryStore,
    T: Treasury + ?Sized,
    C: Clock + ?Sized,
{
    /// Service using the default key namespace
    pub fn new(store: &'a S, treasury: &'a T, clock: &'a C) -> Self {
        Self {
            store,
            treasury,
            clock,
            deriver: KeyDeriver::default(),
        }
    }

    /// Scope derived keys to a specific registry instance
    pub fn with_deriver(mut self, deriver: KeyDeriver) -> Self {
        self.deriver = deriver;
        self
    }

    pub fn deriver(&self) -> &KeyDeriver {
        &self.deriver
    }

    /// Storage key a name resolves to
    pub fn key_for(&self, name: &str) -> DomainKey {
        self.deriver.derive(name)
    }

    /// Register a new name owned by the caller.
    ///
    /// The registration fee is collected in the same unit of work as the
    /// insert. If the fee cannot be collected no record is created.
    pub fn register(&self, request: RegisterRequest) -> Result<Domain> {
        let RegisterRequest {
            name,
            caller,
            fee_payer,
        } = request;

        if let Err(reason) = validate_name(&name) {
            warn!(target: "registry", "Rejected registration of {:?}: {}", name, reason);
            return Err(RegistryError::InvalidName { name, reason });
        }

        let key = self.deriver.derive(&name);
        let now = self.clock.now();
        let mut receipt = None;

        let outcome = self.store.insert_with(&key, || -> Result<Domain> {
            let record = Domain::new(name.as_str(), caller, now).ok_or_else(|| {
                RegistryError::ExpiryOverflow { name: name.clone() }
            })?;
            let instruction = FeeInstruction::registration(fee_payer, key, name.as_str());
            receipt = Some(self.collect(&instruction)?);
            Ok(record)
        });

        let domain = self.settle(outcome, receipt, &name)?;
        info!(
            target: "registry",
            "Registered {} for {} (expires {})",
            domain.name,
            domain.owner.short(),
            domain.expires
        );
        Ok(domain)
    }

    /// Replace the payload of a name the caller owns
    pub fn set_data(&self, request: SetDataRequest) -> Result<Domain> {
        let SetDataRequest { name, caller, data } = request;
        let key = self.deriver.derive(&name);

        let outcome = self.store.update(&key, |domain: &mut Domain| -> Result<()> {
            self.authorize(domain, &caller)?;
            domain.data = data;
            Ok(())
        });

        let domain = self.settle(outcome, None, &name)?;
        debug!(
            target: "registry",
            "Updated data of {} ({} bytes)",
            domain.name,
            domain.data.len()
        );
        Ok(domain)
    }

    /// Hand a name the caller owns to `new_owner`.
    ///
    /// Only the owner changes; data, timestamps, and the active flag are kept.
    pub fn transfer(&self, request: TransferRequest) -> Result<Domain> {
        let TransferRequest {
            name,
            caller,
            new_owner,
        } = request;
        let key = self.deriver.derive(&name);

        let outcome = self.store.update(&key, |domain: &mut Domain| -> Result<()> {
            self.authorize(domain, &caller)?;
            domain.owner = new_owner;
            Ok(())
        });

        let domain = self.settle(outcome, None, &name)?;
        info!(
            target: "registry",
            "Transferred {} from {} to {}",
            domain.name,
            caller.short(),
            domain.owner.short()
        );
        Ok(domain)
    }

    /// Extend a name the caller owns by one year.
    ///
    /// The extension is added to the previous expiry, not to the current
    /// time, so early renewals are never shortened and lapsed names resume
    /// from where they ran out.
    pub fn renew(&self, request: RenewRequest) -> Result<Domain> {
        let RenewRequest {
            name,
            caller,
            fee_payer,
        } = request;
        let key = self.deriver.derive(&name);
        let mut receipt = None;

        let outcome = self.store.update(&key, |domain: &mut Domain| -> Result<()> {
            self.authorize(domain, &caller)?;
            domain.expires = domain
                .expires
                .checked_add(ONE_YEAR_SECONDS)
                .ok_or_else(|| RegistryError::ExpiryOverflow {
                    name: domain.name.clone(),
                })?;
            let instruction = FeeInstruction::renewal(fee_payer, key, domain.name.as_str());
            receipt = Some(self.collect(&instruction)?);
            Ok(())
        });

        let domain = self.settle(outcome, receipt, &name)?;
        info!(
            target: "registry",
            "Renewed {} until {}",
            domain.name,
            domain.expires
        );
        Ok(domain)
    }

    /// Record registered under `name`, if any
    pub fn find(&self, name: &str) -> Result<Option<Domain>> {
        let key = self.deriver.derive(name);
        self.store
            .get(&key)
            .map_err(|err| self.store_error(err.widen(), name))
    }

    /// Record registered under `name`
    pub fn get(&self, name: &str) -> Result<Domain> {
        self.find(name)?.ok_or_else(|| RegistryError::NotFound {
            name: name.to_string(),
        })
    }

    /// Every record, sorted by name
    pub fn list(&self) -> Result<Vec<Domain>> {
        let mut domains: Vec<Domain> = self
            .store
            .list()
            .map_err(|err| RegistryError::StorageError(err.into()))?
            .into_iter()
            .map(|(_, domain)| domain)
            .collect();
        domains.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(domains)
    }

    /// Every record currently owned by `owner`, sorted by name
    pub fn list_owned_by(&self, owner: &Identity) -> Result<Vec<Domain>> {
        Ok(self
            .list()?
            .into_iter()
            .filter(|domain| domain.is_owned_by(owner))
            .collect())
    }

    fn authorize(&self, domain: &Domain, caller: &Identity) -> Result<()> {
        if domain.is_owned_by(caller) {
            return Ok(());
        }
        warn!(
            target: "registry",
            "Rejected {} on {}: not the owner",
            caller.short(),
            domain.name
        );
        Err(RegistryError::Unauthorized {
            name: domain.name.clone(),
        })
    }

    fn collect(&self, instruction: &FeeInstruction) -> Result<FeeReceipt> {
        self.treasury.collect(instruction).map_err(|err| {
            warn!(
                target: "registry",
                "Fee collection for {} failed: {}",
                instruction.name,
                err
            );
            RegistryError::from(err)
        })
    }

    /// Finish a unit of work. A fee taken for a committed mutation is
    /// confirmed; one taken for a mutation that did not commit is handed back
    /// before the error is returned.
    fn settle(
        &self,
        outcome: std::result::Result<Domain, StoreError<RegistryError>>,
        receipt: Option<FeeReceipt>,
        name: &str,
    ) -> Result<Domain> {
        match outcome {
            Ok(domain) => {
                if let Some(receipt) = receipt {
                    if let Err(confirm_err) = self.treasury.confirm(&receipt) {
                        warn!(
                            target: "registry",
                            "Confirming receipt #{} for {} failed: {}",
                            receipt.id,
                            name,
                            confirm_err
                        );
                    }
                }
                Ok(domain)
            }
            Err(err) => {
                if let Some(receipt) = receipt {
                    if let Err(refund_err) = self.treasury.refund(&receipt) {
                        error!(
                            target: "registry",
                            "Refund of receipt #{} for {} failed: {}",
                            receipt.id,
                            name,
                            refund_err
                        );
                    }
                }
                Err(self.store_error(err, name))
            }
        }
    }

    fn store_error(&self, err: StoreError<RegistryError>, name: &str) -> RegistryError {
        match err {
            StoreError::Occupied(_) => RegistryError::AlreadyRegistered {
                name: name.to_string(),
            },
            StoreError::Missing(_) => RegistryError::NotFound {
                name: name.to_string(),
            },
            StoreError::Aborted(err) => err,
            StoreError::Backend(err) => RegistryError::StorageError(err),
        }
    }
}
