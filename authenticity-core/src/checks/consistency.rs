use async_trait::async_trait;
use chrono::Months;

use super::{Check, CheckName, CheckOutcome, RiskFactor, Subject};
use crate::error::Result;

/// Completeness and plausibility of the product's own fields. Never a gate.
pub struct ConsistencyCheck {
    max_age_years: u32,
}

impl ConsistencyCheck {
    pub fn new(max_age_years: u32) -> Self {
        Self { max_age_years }
    }
}

#[async_trait]
impl Check for ConsistencyCheck {
    fn name(&self) -> CheckName {
        CheckName::DataConsistency
    }

    async fn run(&self, subject: &Subject<'_>) -> Result<CheckOutcome> {
        let product = subject.product;
        let now = subject.context.at;
        let mut outcome = CheckOutcome::new(self.name());

        if product.product_name.trim().is_empty() || product.batch_number.trim().is_empty() {
            outcome.fail(
                "missing required product information",
                RiskFactor::DataInconsistent,
            );
        } else {
            outcome.note("product information complete");
        }

        if let Some(made) = product.manufacturing_date {
            let max_age = Months::new(self.max_age_years.saturating_mul(12));
            let oldest_plausible = now.checked_sub_months(max_age);
            if made > now {
                outcome.fail(
                    "manufacturing date is in the future",
                    RiskFactor::DataInconsistent,
                );
            } else if oldest_plausible.is_some_and(|limit| made < limit) {
                outcome.note("product is very old - verify authenticity");
            } else {
                outcome.note("manufacturing date plausible");
            }
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::testkit;
    use crate::types::Product;
    use chrono::{TimeZone, Utc};

    async fn run(product: &Product) -> CheckOutcome {
        let ctx = testkit::context();
        ConsistencyCheck::new(10)
            .run(&Subject {
                product,
                context: &ctx,
                claimed_fingerprint: None,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn complete_recent_product_is_clean() {
        let outcome = run(&testkit::product()).await;
        assert!(outcome.passed);
        assert_eq!(
            outcome.texts(),
            vec!["product information complete", "manufacturing date plausible"]
        );
    }

    #[tokio::test]
    async fn blank_batch_raises_factor() {
        let mut product = testkit::product();
        product.batch_number = "  ".into();
        let outcome = run(&product).await;
        assert!(!outcome.passed);
        assert!(!outcome.gates_authenticity);
        assert_eq!(outcome.risk_factor, Some(RiskFactor::DataInconsistent));
    }

    #[tokio::test]
    async fn future_date_raises_factor() {
        let mut product = testkit::product();
        product.manufacturing_date = Some(Utc.with_ymd_and_hms(2027, 1, 1, 0, 0, 0).unwrap());
        let outcome = run(&product).await;
        assert_eq!(outcome.risk_factor, Some(RiskFactor::DataInconsistent));
        assert_eq!(outcome.texts()[1], "manufacturing date is in the future");
    }

    #[tokio::test]
    async fn old_product_is_advisory_only() {
        let mut product = testkit::product();
        product.manufacturing_date = Some(Utc.with_ymd_and_hms(2010, 1, 1, 0, 0, 0).unwrap());
        let outcome = run(&product).await;
        assert!(outcome.passed);
        assert!(outcome.risk_factor.is_none());
        assert!(outcome.texts()[1].contains("very old"));
    }

    #[tokio::test]
    async fn huge_age_limit_does_not_overflow() {
        let mut product = testkit::product();
        product.manufacturing_date = Some(Utc.with_ymd_and_hms(2010, 1, 1, 0, 0, 0).unwrap());
        let ctx = testkit::context();
        let outcome = ConsistencyCheck::new(u32::MAX)
            .run(&Subject {
                product: &product,
                context: &ctx,
                claimed_fingerprint: None,
            })
            .await
            .unwrap();
        assert!(outcome.passed);
        assert_eq!(outcome.texts()[1], "manufacturing date plausible");
    }

    #[tokio::test]
    async fn missing_date_is_skipped() {
        let mut product = testkit::product();
        product.manufacturing_date = None;
        let outcome = run(&product).await;
        assert_eq!(outcome.reasons.len(), 1);
    }
}
