use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;

use super::{Check, CheckName, CheckOutcome, RiskFactor, Subject};
use crate::config::PatternConfig;
use crate::error::Result;
use crate::ports::DataStore;

/// Verification-history analysis over a trailing window.
///
/// Too many attempts, or a majority of past attempts judged counterfeit,
/// marks the pattern suspicious. Risk factor only.
pub struct PatternCheck {
    store: Arc<dyn DataStore>,
    config: PatternConfig,
}

impl PatternCheck {
    pub fn new(store: Arc<dyn DataStore>, config: PatternConfig) -> Self {
        Self { store, config }
    }
}

#[async_trait]
impl Check for PatternCheck {
    fn name(&self) -> CheckName {
        CheckName::VerificationPattern
    }

    async fn run(&self, subject: &Subject<'_>) -> Result<CheckOutcome> {
        let cfg = &self.config;
        let at = subject.context.at;
        let since = at - Duration::days(cfg.window_days);
        // Records stamped after `at` belong to a later analysis.
        let history: Vec<_> = self
            .store
            .list_verifications(subject.product.id, since)
            .await?
            .into_iter()
            .filter(|v| v.timestamp <= at)
            .collect();

        let total = history.len();
        let counterfeit = history.iter().filter(|v| !v.is_authentic).count();
        let mut outcome = CheckOutcome::new(self.name());
        let mut suspicious = false;

        let window = format!("{total} verifications in {} days", cfg.window_days);
        if total > cfg.excessive_attempts {
            suspicious = true;
            outcome.note(format!("excessive attempts: {window}"));
        } else if total > cfg.high_frequency_attempts {
            outcome.note(format!("high frequency: {window}"));
        } else {
            outcome.note(format!("normal pattern: {window}"));
        }

        if total > 0 {
            let rate = counterfeit as f64 / total as f64;
            let pct = rate * 100.0;
            if rate > cfg.suspicious_rate {
                suspicious = true;
                outcome.note(format!("high counterfeit rate: {pct:.1}%"));
            } else if rate > cfg.moderate_rate {
                outcome.note(format!("moderate counterfeit rate: {pct:.1}%"));
            } else {
                outcome.note(format!("low counterfeit rate: {pct:.1}%"));
            }
        }

        if suspicious {
            outcome.passed = false;
            outcome.raise(RiskFactor::SuspiciousPattern);
        }
        Ok(outcome)
    }
}
