use std::sync::Arc;

use async_trait::async_trait;

use super::{Check, CheckName, CheckOutcome, RiskFactor, Subject};
use crate::error::Result;
use crate::fingerprint::is_well_formed;
use crate::ports::DataStore;

/// Format, claimed-match and uniqueness of the product fingerprint. Hard gate.
pub struct FingerprintCheck {
    store: Arc<dyn DataStore>,
}

impl FingerprintCheck {
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Check for FingerprintCheck {
    fn name(&self) -> CheckName {
        CheckName::Fingerprint
    }

    async fn run(&self, subject: &Subject<'_>) -> Result<CheckOutcome> {
        let product = subject.product;
        let mut outcome = CheckOutcome::new(self.name());

        if !is_well_formed(&product.fingerprint) {
            outcome.fail(
                "invalid fingerprint format - possible counterfeit",
                RiskFactor::FingerprintInvalid,
            );
            return Ok(outcome);
        }
        outcome.note("fingerprint format valid");

        if let Some(claimed) = subject.claimed_fingerprint {
            if claimed == product.fingerprint {
                outcome.note("fingerprint validated and matches");
            } else {
                outcome.fail(
                    "fingerprint mismatch - possible counterfeit",
                    RiskFactor::FingerprintInvalid,
                );
            }
        }

        match self
            .store
            .find_duplicate_fingerprint(&product.fingerprint, product.id)
            .await?
        {
            Some(other) => outcome.fail(
                format!(
                    "fingerprint also assigned to active product {} - counterfeit",
                    other.id
                ),
                RiskFactor::FingerprintInvalid,
            ),
            None => outcome.note("fingerprint unique among active products"),
        }

        Ok(outcome)
    }
}
