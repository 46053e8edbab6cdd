//! Runs the registered checks and folds their outcomes.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use futures::future::try_join_all;
use tracing::debug;

use crate::checks::{Check, CheckName, CheckOutcome, Reason, RiskFactor, Subject};
use crate::error::Result;

/// Folded result of every check, before scoring.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregate {
    pub is_authentic: bool,
    pub risk_factors: BTreeSet<RiskFactor>,
    /// In check declaration order, each check's reasons in emission order.
    pub reasons: Vec<Reason>,
    pub validation_summary: BTreeMap<CheckName, bool>,
}

pub struct Aggregator {
    checks: Vec<Arc<dyn Check>>,
}

impl Aggregator {
    pub fn new(checks: Vec<Arc<dyn Check>>) -> Self {
        Self { checks }
    }

    pub fn check_names(&self) -> Vec<CheckName> {
        let mut names: Vec<_> = self.checks.iter().map(|c| c.name()).collect();
        names.sort();
        names
    }

    /// Run all checks concurrently. The first infrastructure error aborts the rest.
    pub async fn run(&self, subject: &Subject<'_>) -> Result<Aggregate> {
        let outcomes = try_join_all(self.checks.iter().map(|c| c.run(subject))).await?;
        Ok(fold(outcomes))
    }
}

/// Gate policy: only a failed gating check clears `is_authentic`.
pub fn fold(mut outcomes: Vec<CheckOutcome>) -> Aggregate {
    outcomes.sort_by_key(|o| o.check);

    let mut agg = Aggregate {
        is_authentic: true,
        risk_factors: BTreeSet::new(),
        reasons: Vec::new(),
        validation_summary: BTreeMap::new(),
    };
    for outcome in outcomes {
        debug!(
            check = %outcome.check,
            passed = outcome.passed,
            factor = ?outcome.risk_factor,
            "check finished"
        );
        if !outcome.passed && outcome.gates_authenticity {
            agg.is_authentic = false;
        }
        agg.risk_factors.extend(outcome.risk_factor);
        agg.validation_summary.insert(outcome.check, outcome.passed);
        agg.reasons.extend(outcome.reasons);
    }
    agg
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::testkit;
    use crate::error::EngineError;
    use async_trait::async_trait;
    use std::time::Duration;

    /// Check that answers after a delay, to scramble completion order.
    struct Scripted {
        name: CheckName,
        delay_ms: u64,
        outcome: fn(CheckName) -> Result<CheckOutcome>,
    }

    #[async_trait]
    impl Check for Scripted {
        fn name(&self) -> CheckName {
            self.name
        }

        async fn run(&self, _subject: &Subject<'_>) -> Result<CheckOutcome> {
            tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
            (self.outcome)(self.name)
        }
    }

    fn clean(name: CheckName) -> Result<CheckOutcome> {
        let mut o = CheckOutcome::new(name);
        o.note(format!("{name} ok"));
        Ok(o)
    }

    fn gate_fail(name: CheckName) -> Result<CheckOutcome> {
        let mut o = CheckOutcome::new(name);
        o.fail(format!("{name} failed"), RiskFactor::DuplicateDetected);
        Ok(o)
    }

    fn advisory_fail(name: CheckName) -> Result<CheckOutcome> {
        let mut o = CheckOutcome::new(name);
        o.fail(format!("{name} failed"), RiskFactor::ManufacturerInvalid);
        Ok(o)
    }

    fn broken(_: CheckName) -> Result<CheckOutcome> {
        Err(EngineError::unavailable("data store", "pool exhausted"))
    }

    fn scripted(
        name: CheckName,
        delay_ms: u64,
        outcome: fn(CheckName) -> Result<CheckOutcome>,
    ) -> Arc<dyn Check> {
        Arc::new(Scripted {
            name,
            delay_ms,
            outcome,
        })
    }

    async fn run(checks: Vec<Arc<dyn Check>>) -> Result<Aggregate> {
        let product = testkit::product();
        let ctx = testkit::context();
        Aggregator::new(checks)
            .run(&Subject {
                product: &product,
                context: &ctx,
                claimed_fingerprint: None,
            })
            .await
    }

    #[tokio::test(start_paused = true)]
    async fn reasons_follow_declaration_order_not_completion_order() {
        let agg = run(vec![
            scripted(CheckName::DataConsistency, 1, clean),
            scripted(CheckName::IssuerTrust, 5, clean),
            scripted(CheckName::Fingerprint, 30, clean),
        ])
        .await
        .unwrap();

        let texts: Vec<_> = agg.reasons.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(
            texts,
            vec!["fingerprint ok", "issuer_trust ok", "data_consistency ok"]
        );
        assert!(agg.is_authentic);
        assert!(agg.risk_factors.is_empty());
    }

    #[tokio::test]
    async fn gating_failure_clears_authenticity() {
        let agg = run(vec![
            scripted(CheckName::Fingerprint, 0, clean),
            scripted(CheckName::BatchDuplicate, 0, gate_fail),
        ])
        .await
        .unwrap();
        assert!(!agg.is_authentic);
        assert_eq!(agg.validation_summary[&CheckName::BatchDuplicate], false);
        assert_eq!(agg.validation_summary[&CheckName::Fingerprint], true);
    }

    #[tokio::test]
    async fn advisory_failure_keeps_authenticity() {
        let agg = run(vec![scripted(CheckName::IssuerTrust, 0, advisory_fail)])
            .await
            .unwrap();
        assert!(agg.is_authentic);
        assert!(agg.risk_factors.contains(&RiskFactor::ManufacturerInvalid));
    }

    #[tokio::test]
    async fn infrastructure_error_propagates() {
        let err = run(vec![
            scripted(CheckName::Fingerprint, 0, clean),
            scripted(CheckName::VerificationPattern, 0, broken),
        ])
        .await
        .unwrap_err();
        assert!(err.is_transport());
    }

    #[test]
    fn check_names_are_sorted() {
        let agg = Aggregator::new(vec![
            scripted(CheckName::DataConsistency, 0, clean),
            scripted(CheckName::ContentStore, 0, clean),
        ]);
        assert_eq!(
            agg.check_names(),
            vec![CheckName::ContentStore, CheckName::DataConsistency]
        );
    }
}
