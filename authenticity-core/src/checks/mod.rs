//! Signal validators.
//!
//! Every check reads the same immutable [`Subject`] and returns a typed
//! [`CheckOutcome`]. Checks never mutate shared state, so the aggregator runs
//! them concurrently and re-sorts the outcomes by [`CheckName`] afterwards.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::{Product, VerificationContext};

pub mod batch;
pub mod consistency;
pub mod content;
pub mod fingerprint;
pub mod issuer;
pub mod ledger;
pub mod pattern;

pub use batch::BatchDuplicateCheck;
pub use consistency::ConsistencyCheck;
pub use content::ContentStoreCheck;
pub use fingerprint::FingerprintCheck;
pub use issuer::IssuerTrustCheck;
pub use ledger::LedgerRegistrationCheck;
pub use pattern::PatternCheck;

/// Check identifiers. Declaration order is the order reasons appear in a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckName {
    Fingerprint,
    ContentStore,
    SecondaryContentStore,
    LedgerRegistration,
    BatchDuplicate,
    VerificationPattern,
    IssuerTrust,
    DataConsistency,
}

impl CheckName {
    /// Identity, integrity and uniqueness checks: a failure here is a hard gate.
    pub fn is_gating(self) -> bool {
        matches!(
            self,
            Self::Fingerprint | Self::ContentStore | Self::BatchDuplicate
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fingerprint => "fingerprint",
            Self::ContentStore => "content_store",
            Self::SecondaryContentStore => "secondary_content_store",
            Self::LedgerRegistration => "ledger_registration",
            Self::BatchDuplicate => "batch_duplicate",
            Self::VerificationPattern => "verification_pattern",
            Self::IssuerTrust => "issuer_trust",
            Self::DataConsistency => "data_consistency",
        }
    }
}

impl std::fmt::Display for CheckName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named signal that lowers confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskFactor {
    FingerprintInvalid,
    ContentStoreInvalid,
    SecondaryStoreInvalid,
    LedgerInvalid,
    DuplicateDetected,
    SuspiciousPattern,
    ManufacturerInvalid,
    DataInconsistent,
    DetectionError,
    LedgerCounterfeit,
}

impl RiskFactor {
    /// The check that raises this factor, if any.
    pub fn check(self) -> Option<CheckName> {
        match self {
            Self::FingerprintInvalid => Some(CheckName::Fingerprint),
            Self::ContentStoreInvalid => Some(CheckName::ContentStore),
            Self::SecondaryStoreInvalid => Some(CheckName::SecondaryContentStore),
            Self::LedgerInvalid => Some(CheckName::LedgerRegistration),
            Self::DuplicateDetected => Some(CheckName::BatchDuplicate),
            Self::SuspiciousPattern => Some(CheckName::VerificationPattern),
            Self::ManufacturerInvalid => Some(CheckName::IssuerTrust),
            Self::DataInconsistent => Some(CheckName::DataConsistency),
            Self::DetectionError | Self::LedgerCounterfeit => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::FingerprintInvalid => "fingerprint_invalid",
            Self::ContentStoreInvalid => "content_store_invalid",
            Self::SecondaryStoreInvalid => "secondary_store_invalid",
            Self::LedgerInvalid => "ledger_invalid",
            Self::DuplicateDetected => "duplicate_detected",
            Self::SuspiciousPattern => "suspicious_pattern",
            Self::ManufacturerInvalid => "manufacturer_invalid",
            Self::DataInconsistent => "data_inconsistent",
            Self::DetectionError => "detection_error",
            Self::LedgerCounterfeit => "ledger_counterfeit",
        }
    }
}

impl std::fmt::Display for RiskFactor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One explanation line, tagged with the check that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reason {
    pub check: CheckName,
    pub text: String,
    /// The signal could not be obtained (no snapshot, collaborator unreachable).
    pub signal_unavailable: bool,
}

/// Result of one check.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckOutcome {
    pub check: CheckName,
    pub passed: bool,
    pub gates_authenticity: bool,
    pub risk_factor: Option<RiskFactor>,
    pub reasons: Vec<Reason>,
}

impl CheckOutcome {
    pub fn new(check: CheckName) -> Self {
        Self {
            check,
            passed: true,
            gates_authenticity: false,
            risk_factor: None,
            reasons: Vec::new(),
        }
    }

    pub fn note(&mut self, text: impl Into<String>) {
        self.push(text.into(), false);
    }

    pub fn unavailable(&mut self, text: impl Into<String>) {
        self.push(text.into(), true);
    }

    /// Record a failed sub-check. Gating follows the check's class.
    pub fn fail(&mut self, text: impl Into<String>, factor: RiskFactor) {
        self.passed = false;
        self.gates_authenticity = self.check.is_gating();
        self.raise(factor);
        self.note(text);
    }

    /// Raise a risk factor without failing the check.
    pub fn raise(&mut self, factor: RiskFactor) {
        self.risk_factor.get_or_insert(factor);
    }

    fn push(&mut self, text: String, signal_unavailable: bool) {
        self.reasons.push(Reason {
            check: self.check,
            text,
            signal_unavailable,
        });
    }

    #[cfg(test)]
    pub(crate) fn texts(&self) -> Vec<&str> {
        self.reasons.iter().map(|r| r.text.as_str()).collect()
    }
}

/// What every check looks at.
#[derive(Debug, Clone, Copy)]
pub struct Subject<'a> {
    pub product: &'a Product,
    pub context: &'a VerificationContext,
    pub claimed_fingerprint: Option<&'a str>,
}

/// A single signal validator.
///
/// `Err` is reserved for infrastructure failures the check cannot absorb;
/// validation failures belong in the returned outcome.
#[async_trait]
pub trait Check: Send + Sync {
    fn name(&self) -> CheckName;

    async fn run(&self, subject: &Subject<'_>) -> Result<CheckOutcome>;
}
