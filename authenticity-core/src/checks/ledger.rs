use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use super::{Check, CheckName, CheckOutcome, RiskFactor, Subject};
use crate::error::{with_timeout, Result};
use crate::ports::Ledger;

/// Ledger registration. Risk factor only, never a gate.
///
/// By default only the presence of a registration id is checked. With a
/// ledger attached and corroboration on, the id is also looked up.
pub struct LedgerRegistrationCheck {
    ledger: Option<Arc<dyn Ledger>>,
    timeout: Duration,
}

impl LedgerRegistrationCheck {
    pub fn new() -> Self {
        Self {
            ledger: None,
            timeout: Duration::ZERO,
        }
    }

    pub fn corroborated(ledger: Arc<dyn Ledger>, timeout: Duration) -> Self {
        Self {
            ledger: Some(ledger),
            timeout,
        }
    }
}

impl Default for LedgerRegistrationCheck {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Check for LedgerRegistrationCheck {
    fn name(&self) -> CheckName {
        CheckName::LedgerRegistration
    }

    async fn run(&self, subject: &Subject<'_>) -> Result<CheckOutcome> {
        let mut outcome = CheckOutcome::new(self.name());

        let Some(registration_id) = subject.product.ledger_registration_id.as_deref() else {
            outcome.fail("not registered on ledger", RiskFactor::LedgerInvalid);
            return Ok(outcome);
        };
        outcome.note("registered on ledger");

        let Some(ledger) = &self.ledger else {
            return Ok(outcome);
        };
        match with_timeout("ledger", self.timeout, ledger.is_registered(registration_id)).await {
            Ok(true) => outcome.note("ledger registration confirmed"),
            Ok(false) => outcome.fail(
                format!("ledger registration {registration_id} not found on ledger"),
                RiskFactor::LedgerInvalid,
            ),
            Err(e) if e.is_transport() => {
                warn!(registration_id, error = %e, "ledger corroboration skipped");
                outcome.unavailable(format!("ledger unreachable, registration not corroborated: {e}"));
            }
            Err(e) => return Err(e),
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::testkit;
    use crate::store_memory::MemoryLedger;
    use crate::types::Product;

    async fn run(check: &LedgerRegistrationCheck, product: &Product) -> CheckOutcome {
        let ctx = testkit::context();
        check
            .run(&Subject {
                product,
                context: &ctx,
                claimed_fingerprint: None,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn unregistered_raises_factor_without_gate() {
        let mut product = testkit::product();
        product.ledger_registration_id = None;
        let outcome = run(&LedgerRegistrationCheck::new(), &product).await;
        assert!(!outcome.passed);
        assert!(!outcome.gates_authenticity);
        assert_eq!(outcome.risk_factor, Some(RiskFactor::LedgerInvalid));
        assert_eq!(outcome.texts(), vec!["not registered on ledger"]);
    }

    #[tokio::test]
    async fn registered_is_clean() {
        let outcome = run(&LedgerRegistrationCheck::new(), &testkit::product()).await;
        assert!(outcome.passed);
        assert!(outcome.risk_factor.is_none());
        assert_eq!(outcome.texts(), vec!["registered on ledger"]);
    }

    #[tokio::test]
    async fn corroboration_catches_unknown_registration() {
        let check = LedgerRegistrationCheck::corroborated(
            Arc::new(MemoryLedger::new().with_registration("99")),
            Duration::from_secs(1),
        );
        let outcome = run(&check, &testkit::product()).await;
        assert_eq!(outcome.risk_factor, Some(RiskFactor::LedgerInvalid));
        assert!(outcome.texts()[1].contains("not found on ledger"));
    }

    #[tokio::test]
    async fn corroboration_confirms_known_registration() {
        let check = LedgerRegistrationCheck::corroborated(
            Arc::new(MemoryLedger::new().with_registration("7")),
            Duration::from_secs(1),
        );
        let outcome = run(&check, &testkit::product()).await;
        assert!(outcome.passed);
        assert_eq!(
            outcome.texts(),
            vec!["registered on ledger", "ledger registration confirmed"]
        );
    }

    #[tokio::test]
    async fn unreachable_ledger_is_advisory() {
        let check = LedgerRegistrationCheck::corroborated(
            Arc::new(MemoryLedger::new().unreachable()),
            Duration::from_secs(1),
        );
        let outcome = run(&check, &testkit::product()).await;
        assert!(outcome.passed);
        assert!(outcome.reasons[1].signal_unavailable);
    }
}
