//! Detection orchestrator.
//!
//! `DetectionEngine` is built once with its ports and configuration, then
//! shared. [`DetectionEngine::analyze`] is pure with respect to storage;
//! [`DetectionEngine::verify`] is the only operation that writes.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::aggregate::Aggregator;
use crate::checks::*;
use crate::config::EngineConfig;
use crate::error::{with_timeout, EngineError, Result};
use crate::ports::{ContentStore, DataStore, Ledger};
use crate::scoring;
use crate::types::*;

/// Records returned by [`DetectionEngine::product_report`].
pub const REPORT_HISTORY_LIMIT: usize = 10;

// ── Verdict ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub is_authentic: bool,
    pub reasons: Vec<String>,
    pub confidence_score: f64,
    pub risk_level: RiskLevel,
    pub risk_factors: BTreeSet<RiskFactor>,
    /// Pass/fail per check that ran. Empty on a fail-closed verdict.
    pub validation_summary: BTreeMap<CheckName, bool>,
}

impl Verdict {
    /// Fail-closed verdict for an analysis that could not complete.
    pub fn detection_error(err: &EngineError) -> Self {
        Self {
            is_authentic: false,
            reasons: vec![format!("detection error: {err}")],
            confidence_score: 0.0,
            risk_level: RiskLevel::High,
            risk_factors: BTreeSet::from([RiskFactor::DetectionError]),
            validation_summary: BTreeMap::new(),
        }
    }

    /// Apply the ledger's own judgement. Only ever turns a positive verdict
    /// negative; a negative verdict is returned unchanged.
    pub fn downgrade_from_ledger(&self, submission: &LedgerSubmission) -> Self {
        let mut verdict = self.clone();
        if self.is_authentic && submission.success && !submission.authentic {
            verdict.is_authentic = false;
            verdict.reasons.push("ledger marked counterfeit".to_string());
            verdict.risk_factors.insert(RiskFactor::LedgerCounterfeit);
            verdict.confidence_score = 0.0;
            verdict.risk_level = RiskLevel::High;
        }
        verdict
    }

    /// Verdict as it was persisted in `record`. Risk factors and the
    /// per-check summary are not stored, so both come back empty.
    pub fn from_record(record: &VerificationRecord) -> Self {
        Self {
            is_authentic: record.is_authentic,
            reasons: record.reasons.clone(),
            confidence_score: record.confidence_score,
            risk_level: record.risk_level,
            risk_factors: BTreeSet::new(),
            validation_summary: BTreeMap::new(),
        }
    }

    pub fn recommendation(&self) -> &'static str {
        if !self.is_authentic {
            return "Product appears to be counterfeit. Do not purchase or use.";
        }
        match self.risk_level {
            RiskLevel::High => {
                "High risk product. Exercise extreme caution and verify through official channels."
            }
            RiskLevel::Medium => "Medium risk product. Additional verification recommended.",
            RiskLevel::Low => "Low risk product. Appears authentic based on current analysis.",
        }
    }
}

/// Result of [`DetectionEngine::verify`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerificationOutcome {
    pub verdict: Verdict,
    pub record: VerificationRecord,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductReport {
    pub product: Product,
    pub verdict: Verdict,
    pub recommendation: &'static str,
    /// Newest first.
    pub recent_verifications: Vec<VerificationRecord>,
    pub issuer: Option<Issuer>,
}

// ── Engine ────────────────────────────────────────────────────

pub struct DetectionEngine {
    store: Arc<dyn DataStore>,
    content: Arc<dyn ContentStore>,
    secondary: Option<Arc<dyn ContentStore>>,
    ledger: Option<Arc<dyn Ledger>>,
    config: EngineConfig,
    aggregator: Aggregator,
}

impl DetectionEngine {
    pub fn new(
        store: Arc<dyn DataStore>,
        content: Arc<dyn ContentStore>,
        config: EngineConfig,
    ) -> Self {
        let mut engine = Self {
            store,
            content,
            secondary: None,
            ledger: None,
            config,
            aggregator: Aggregator::new(Vec::new()),
        };
        engine.rebuild_checks();
        engine
    }

    /// Enable ledger corroboration and submission (each still gated by config).
    pub fn with_ledger(mut self, ledger: Arc<dyn Ledger>) -> Self {
        self.ledger = Some(ledger);
        self.rebuild_checks();
        self
    }

    /// Register the legacy secondary snapshot check.
    pub fn with_secondary_store(mut self, store: Arc<dyn ContentStore>) -> Self {
        self.secondary = Some(store);
        self.rebuild_checks();
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn check_names(&self) -> Vec<CheckName> {
        self.aggregator.check_names()
    }

    fn rebuild_checks(&mut self) {
        let cfg = &self.config;
        let content_timeout = cfg.content_store_timeout();

        let ledger_check = match &self.ledger {
            Some(ledger) if cfg.corroborate_ledger_registration => {
                LedgerRegistrationCheck::corroborated(ledger.clone(), cfg.ledger_timeout())
            }
            _ => LedgerRegistrationCheck::new(),
        };

        let mut checks: Vec<Arc<dyn Check>> = vec![
            Arc::new(FingerprintCheck::new(self.store.clone())),
            Arc::new(ContentStoreCheck::primary(self.content.clone(), content_timeout)),
            Arc::new(ledger_check),
            Arc::new(BatchDuplicateCheck::new(self.store.clone())),
            Arc::new(PatternCheck::new(self.store.clone(), cfg.pattern.clone())),
            Arc::new(IssuerTrustCheck::new(self.store.clone())),
            Arc::new(ConsistencyCheck::new(cfg.max_product_age_years)),
        ];
        if let Some(secondary) = &self.secondary {
            checks.push(Arc::new(ContentStoreCheck::secondary(
                secondary.clone(),
                content_timeout,
            )));
        }
        self.aggregator = Aggregator::new(checks);
    }

    /// Run every check and score the result, surfacing infrastructure errors.
    pub async fn try_analyze(
        &self,
        product: &Product,
        context: &VerificationContext,
        claimed_fingerprint: Option<&str>,
    ) -> Result<Verdict> {
        let subject = Subject {
            product,
            context,
            claimed_fingerprint,
        };
        let agg = self.aggregator.run(&subject).await?;
        let (confidence_score, risk_level) =
            scoring::assess(agg.is_authentic, &agg.risk_factors, &agg.reasons);

        Ok(Verdict {
            is_authentic: agg.is_authentic,
            reasons: agg.reasons.into_iter().map(|r| r.text).collect(),
            confidence_score,
            risk_level,
            risk_factors: agg.risk_factors,
            validation_summary: agg.validation_summary,
        })
    }

    /// Like [`try_analyze`](Self::try_analyze), but an infrastructure error
    /// yields the fail-closed verdict instead.
    #[instrument(skip(self, product, context, claimed_fingerprint), fields(product_id = %product.id))]
    pub async fn analyze(
        &self,
        product: &Product,
        context: &VerificationContext,
        claimed_fingerprint: Option<&str>,
    ) -> Verdict {
        let verdict = match self.try_analyze(product, context, claimed_fingerprint).await {
            Ok(verdict) => verdict,
            Err(err) => {
                warn!(error = %err, "analysis failed, failing closed");
                Verdict::detection_error(&err)
            }
        };
        info!(
            authentic = verdict.is_authentic,
            score = verdict.confidence_score,
            risk = %verdict.risk_level,
            "verdict"
        );
        verdict
    }

    /// Load, analyze, optionally submit to the ledger, and append one record.
    ///
    /// A missing product is an error, not a verdict. Re-running with the same
    /// `context.attempt_id` returns the originally stored record and its
    /// verdict without analyzing or submitting to the ledger again.
    #[instrument(skip(self, context, claimed_fingerprint), fields(attempt_id = %context.attempt_id))]
    pub async fn verify(
        &self,
        product_id: Uuid,
        context: &VerificationContext,
        claimed_fingerprint: Option<&str>,
    ) -> Result<VerificationOutcome> {
        if context.location.trim().is_empty() {
            return Err(EngineError::InvalidInput(
                "verification location is required".into(),
            ));
        }
        if let Some(record) = self.store.find_verification(context.attempt_id).await? {
            info!(record_id = %record.id, "attempt already recorded");
            return Ok(VerificationOutcome {
                verdict: Verdict::from_record(&record),
                record,
            });
        }

        let product = self.store.get_product(product_id).await?;
        let mut verdict = self.analyze(&product, context, claimed_fingerprint).await;

        let ledger_verification_id = match self.ledger_for_submission(&product) {
            Some((ledger, registration_id)) => {
                let request = LedgerVerificationRequest {
                    registration_id: registration_id.to_string(),
                    location: context.location.clone(),
                    notes: context.notes.clone().unwrap_or_default(),
                    fingerprint: product.fingerprint.clone(),
                };
                let submitted = with_timeout(
                    "ledger",
                    self.config.ledger_timeout(),
                    ledger.submit_verification(&request),
                )
                .await;
                match submitted {
                    Ok(submission) if submission.success => {
                        verdict = verdict.downgrade_from_ledger(&submission);
                        submission.verification_id
                    }
                    Ok(_) => {
                        verdict
                            .reasons
                            .push("ledger verification unavailable: submission rejected".into());
                        None
                    }
                    Err(err) => {
                        warn!(error = %err, "ledger submission failed");
                        verdict
                            .reasons
                            .push(format!("ledger verification unavailable: {err}"));
                        None
                    }
                }
            }
            None => None,
        };

        let record = self
            .store
            .append_verification(NewVerification {
                attempt_id: context.attempt_id,
                product_id: product.id,
                verifier_id: context.verifier_id,
                location: context.location.clone(),
                notes: context.notes.clone(),
                timestamp: context.at,
                is_authentic: verdict.is_authentic,
                reasons: verdict.reasons.clone(),
                confidence_score: verdict.confidence_score,
                risk_level: verdict.risk_level,
                ledger_verification_id,
            })
            .await?;

        info!(record_id = %record.id, "verification recorded");
        Ok(VerificationOutcome { verdict, record })
    }

    fn ledger_for_submission<'a>(
        &'a self,
        product: &'a Product,
    ) -> Option<(&'a dyn Ledger, &'a str)> {
        if !self.config.submit_to_ledger {
            return None;
        }
        let ledger = self.ledger.as_deref()?;
        let registration_id = product.ledger_registration_id.as_deref()?;
        Some((ledger, registration_id))
    }

    /// Verdict, recent history and issuer standing for one product as of `at`.
    /// Records stamped after `at` are left out. Nothing is persisted.
    #[instrument(skip(self))]
    pub async fn product_report(
        &self,
        product_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<ProductReport> {
        let product = self.store.get_product(product_id).await?;

        let context = VerificationContext {
            attempt_id: Uuid::nil(),
            verifier_id: Uuid::nil(),
            location: "report".to_string(),
            notes: None,
            at,
        };
        let verdict = self.analyze(&product, &context, None).await;

        let mut recent_verifications: Vec<_> = self
            .store
            .list_verifications(product.id, DateTime::<Utc>::MIN_UTC)
            .await?
            .into_iter()
            .filter(|v| v.timestamp <= at)
            .collect();
        recent_verifications.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        recent_verifications.truncate(REPORT_HISTORY_LIMIT);

        let issuer = match self.store.get_issuer(product.issuer_id).await {
            Ok(issuer) => Some(issuer),
            Err(EngineError::NotFound(_)) => None,
            Err(err) => return Err(err),
        };

        Ok(ProductReport {
            recommendation: verdict.recommendation(),
            product,
            verdict,
            recent_verifications,
            issuer,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::testkit;
    use crate::store_memory::{MemoryContentStore, MemoryStore};

    fn positive() -> Verdict {
        Verdict {
            is_authentic: true,
            reasons: vec!["fingerprint format valid".into()],
            confidence_score: 0.9,
            risk_level: RiskLevel::Low,
            risk_factors: BTreeSet::new(),
            validation_summary: BTreeMap::from([(CheckName::Fingerprint, true)]),
        }
    }

    fn flagged() -> LedgerSubmission {
        LedgerSubmission {
            success: true,
            verification_id: Some("lv-1".into()),
            authentic: false,
        }
    }

    #[test]
    fn ledger_counterfeit_downgrades_positive() {
        let v = positive().downgrade_from_ledger(&flagged());
        assert!(!v.is_authentic);
        assert_eq!(v.confidence_score, 0.0);
        assert_eq!(v.risk_level, RiskLevel::High);
        assert!(v.risk_factors.contains(&RiskFactor::LedgerCounterfeit));
        assert_eq!(v.reasons.last().map(String::as_str), Some("ledger marked counterfeit"));
    }

    #[test]
    fn ledger_never_upgrades() {
        let mut negative = positive();
        negative.is_authentic = false;
        negative.confidence_score = 0.0;
        negative.risk_level = RiskLevel::High;
        let approving = LedgerSubmission {
            authentic: true,
            ..flagged()
        };
        assert_eq!(negative.downgrade_from_ledger(&approving), negative);
        assert_eq!(negative.downgrade_from_ledger(&flagged()), negative);
    }

    #[test]
    fn unsuccessful_submission_is_ignored() {
        let rejected = LedgerSubmission {
            success: false,
            verification_id: None,
            authentic: false,
        };
        assert_eq!(positive().downgrade_from_ledger(&rejected), positive());
    }

    #[test]
    fn detection_error_is_fail_closed() {
        let v = Verdict::detection_error(&EngineError::unavailable("data store", "down"));
        assert!(!v.is_authentic);
        assert_eq!(v.reasons, vec!["detection error: data store unavailable: down"]);
        assert_eq!(v.risk_factors, BTreeSet::from([RiskFactor::DetectionError]));
        assert!(v.validation_summary.is_empty());
    }

    #[test]
    fn recommendations_follow_risk() {
        let mut v = positive();
        assert!(v.recommendation().starts_with("Low risk"));
        v.risk_level = RiskLevel::Medium;
        assert!(v.recommendation().starts_with("Medium risk"));
        v.is_authentic = false;
        assert!(v.recommendation().contains("counterfeit"));
    }

    #[test]
    fn verdict_from_record_keeps_stored_outcome() {
        let record = NewVerification {
            attempt_id: Uuid::from_u128(9),
            product_id: Uuid::from_u128(1),
            verifier_id: Uuid::from_u128(500),
            location: "Lagos".into(),
            notes: None,
            timestamp: testkit::context().at,
            is_authentic: false,
            reasons: vec!["ledger marked counterfeit".into()],
            confidence_score: 0.0,
            risk_level: RiskLevel::High,
            ledger_verification_id: Some("lv-1".into()),
        }
        .into_record(Uuid::from_u128(77));

        let v = Verdict::from_record(&record);
        assert!(!v.is_authentic);
        assert_eq!(v.reasons, record.reasons);
        assert_eq!(v.risk_level, RiskLevel::High);
        assert!(v.risk_factors.is_empty());
    }

    #[test]
    fn verdict_serializes_snake_case_keys() {
        let json = serde_json::to_value(positive()).unwrap();
        assert_eq!(json["risk_level"], "low");
        assert_eq!(json["validation_summary"]["fingerprint"], true);
    }

    #[test]
    fn secondary_check_only_when_configured() {
        let store: Arc<dyn DataStore> = Arc::new(MemoryStore::new());
        let content: Arc<dyn ContentStore> = Arc::new(MemoryContentStore::new());
        let engine = DetectionEngine::new(store, content.clone(), EngineConfig::default());
        assert_eq!(engine.check_names().len(), 7);
        assert!(!engine
            .check_names()
            .contains(&CheckName::SecondaryContentStore));

        let engine = engine.with_secondary_store(content);
        assert_eq!(engine.check_names()[2], CheckName::SecondaryContentStore);
    }

    #[tokio::test]
    async fn blank_location_is_rejected_before_any_write() {
        let store = Arc::new(MemoryStore::new().with_product(testkit::product()));
        let engine = DetectionEngine::new(
            store.clone(),
            Arc::new(MemoryContentStore::new()),
            EngineConfig::default(),
        );
        let mut ctx = testkit::context();
        ctx.location = "   ".into();
        let err = engine
            .verify(testkit::product().id, &ctx, None)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));
        assert!(store.verifications().await.is_empty());
    }

    #[tokio::test]
    async fn missing_product_is_an_error_not_a_verdict() {
        let engine = DetectionEngine::new(
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryContentStore::new()),
            EngineConfig::default(),
        );
        let err = engine
            .verify(Uuid::from_u128(42), &testkit::context(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
    }
}
