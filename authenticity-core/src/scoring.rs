//! Confidence scoring.
//!
//! Pure functions: no I/O, no clock. A negative verdict scores 0.0 exactly;
//! a positive one starts at [`BASE_SCORE`] and loses the penalty of every
//! risk factor plus [`WARNING_PENALTY`] per warning reason.

use std::collections::BTreeSet;

use crate::checks::{Reason, RiskFactor};
use crate::types::RiskLevel;

pub const BASE_SCORE: f64 = 0.9;
pub const WARNING_PENALTY: f64 = 0.05;
pub const DEFAULT_PENALTY: f64 = 0.1;

/// Case-insensitive substrings that mark a reason as a warning.
pub const WARNING_KEYWORDS: [&str; 4] = ["warning", "limited", "old", "high"];

pub fn penalty(factor: RiskFactor) -> f64 {
    match factor {
        RiskFactor::LedgerInvalid => 0.2,
        RiskFactor::SuspiciousPattern => 0.3,
        RiskFactor::ManufacturerInvalid => 0.2,
        RiskFactor::DataInconsistent => 0.2,
        RiskFactor::DetectionError => 0.5,
        RiskFactor::SecondaryStoreInvalid => 0.3,
        _ => DEFAULT_PENALTY,
    }
}

/// Reasons that add a warning penalty.
///
/// A reason counts when it contains a warning keyword, does not merely report
/// an unavailable signal, and comes from a check that raised no risk factor
/// (that check is already penalised through the factor).
pub fn warning_count(risk_factors: &BTreeSet<RiskFactor>, reasons: &[Reason]) -> usize {
    reasons
        .iter()
        .filter(|r| !r.signal_unavailable)
        .filter(|r| !risk_factors.iter().any(|f| f.check() == Some(r.check)))
        .filter(|r| {
            let lower = r.text.to_lowercase();
            WARNING_KEYWORDS.iter().any(|k| lower.contains(k))
        })
        .count()
}

/// Confidence in `[0, 1]`, rounded to two decimals.
pub fn confidence_score(
    is_authentic: bool,
    risk_factors: &BTreeSet<RiskFactor>,
    reasons: &[Reason],
) -> f64 {
    if !is_authentic {
        return 0.0;
    }
    let factor_penalty: f64 = risk_factors.iter().copied().map(penalty).sum();
    let warning_penalty = WARNING_PENALTY * warning_count(risk_factors, reasons) as f64;
    let raw = (BASE_SCORE - factor_penalty - warning_penalty).clamp(0.0, 1.0);
    (raw * 100.0).round() / 100.0
}

/// Score and bucket in one step.
pub fn assess(
    is_authentic: bool,
    risk_factors: &BTreeSet<RiskFactor>,
    reasons: &[Reason],
) -> (f64, RiskLevel) {
    let score = confidence_score(is_authentic, risk_factors, reasons);
    (score, RiskLevel::from_score(score))
}
