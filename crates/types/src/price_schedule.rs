//! Registry price schedule.
//!
//! All values are in base units. Pricing lives with the treasury side of the
//! system; the registry core only says *which* fee is due, never how much.

use crate::{Amount, UNITS_PER_TOKEN};
use serde::{Deserialize, Serialize};

/// Domain registration and renewal prices (all values in base units)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryPriceSchedule {
    /// Version of this schedule
    pub version: u32,
    /// Domain registration fee
    pub domain_register_fee: Amount,
    /// Domain renewal fee per year
    pub domain_renew_fee_per_year: Amount,
}

impl Default for RegistryPriceSchedule {
    fn default() -> Self {
        Self {
            version: 1,
            // 0.1 token to register a domain
            domain_register_fee: UNITS_PER_TOKEN / 10,
            // 0.05 token per year for domain renewal
            domain_renew_fee_per_year: UNITS_PER_TOKEN / 20,
        }
    }
}

impl RegistryPriceSchedule {
    /// Compute domain renewal fee for a given number of years
    pub fn compute_domain_renew_fee(&self, years: u32) -> Amount {
        self.domain_renew_fee_per_year.saturating_mul(years as u64)
    }

    /// Validate minimum floors
    pub fn validate(&self) -> Result<(), PriceScheduleError> {
        if self.domain_register_fee < 1 {
            return Err(PriceScheduleError::FeeBelowOneUnit {
                field: "domain_register_fee".to_string(),
            });
        }
        if self.domain_renew_fee_per_year < 1 {
            return Err(PriceScheduleError::FeeBelowOneUnit {
                field: "domain_renew_fee_per_year".to_string(),
            });
        }
        Ok(())
    }
}

/// Errors related to price schedule validation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PriceScheduleError {
    #[error("registry fee {field} must be >= 1 unit")]
    FeeBelowOneUnit { field: String },
}
