use std::sync::Arc;

use async_trait::async_trait;

use super::{Check, CheckName, CheckOutcome, RiskFactor, Subject};
use crate::error::{EngineError, Result};
use crate::ports::DataStore;

/// Standing of the issuer that owns the product. Risk factor only.
pub struct IssuerTrustCheck {
    store: Arc<dyn DataStore>,
}

impl IssuerTrustCheck {
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Check for IssuerTrustCheck {
    fn name(&self) -> CheckName {
        CheckName::IssuerTrust
    }

    async fn run(&self, subject: &Subject<'_>) -> Result<CheckOutcome> {
        let mut outcome = CheckOutcome::new(self.name());

        let issuer = match self.store.get_issuer(subject.product.issuer_id).await {
            Ok(issuer) => issuer,
            Err(EngineError::NotFound(_)) => {
                outcome.fail("issuer not found", RiskFactor::ManufacturerInvalid);
                return Ok(outcome);
            }
            Err(e) => return Err(e),
        };

        if !issuer.active {
            outcome.fail("issuer account inactive", RiskFactor::ManufacturerInvalid);
        } else if !issuer.trusted {
            outcome.raise(RiskFactor::ManufacturerInvalid);
            outcome.note("issuer not verified");
        } else {
            outcome.note("issuer valid and verified");
        }

        Ok(outcome)
    }
}
