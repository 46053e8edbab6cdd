use std::sync::Arc;

use async_trait::async_trait;

use super::{Check, CheckName, CheckOutcome, RiskFactor, Subject};
use crate::error::Result;
use crate::ports::DataStore;

/// Same batch number on another active product of the same issuer. Hard gate.
pub struct BatchDuplicateCheck {
    store: Arc<dyn DataStore>,
}

impl BatchDuplicateCheck {
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Check for BatchDuplicateCheck {
    fn name(&self) -> CheckName {
        CheckName::BatchDuplicate
    }

    async fn run(&self, subject: &Subject<'_>) -> Result<CheckOutcome> {
        let product = subject.product;
        let mut outcome = CheckOutcome::new(self.name());

        let duplicates = self
            .store
            .find_duplicate_batch(&product.batch_number, product.issuer_id, product.id)
            .await?;

        if duplicates.is_empty() {
            outcome.note("no duplicate batch from this issuer");
        } else {
            outcome.fail(
                format!(
                    "found {} other active product(s) with batch {} from the same issuer",
                    duplicates.len(),
                    product.batch_number
                ),
                RiskFactor::DuplicateDetected,
            );
        }

        Ok(outcome)
    }
}
