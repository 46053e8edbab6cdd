//! Domain records shared by the ports, the checks and the engine.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ── Entities ──────────────────────────────────────────────────

/// A physical product unit as registered by its issuer.
///
/// The engine only ever reads products; mutation belongs to the owning issuer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    /// SHA-256 hex digest bound to this unit (see [`crate::fingerprint`]).
    pub fingerprint: String,
    pub product_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    pub batch_number: String,
    #[serde(default)]
    pub manufacturing_date: Option<DateTime<Utc>>,
    pub issuer_id: Uuid,
    #[serde(default)]
    pub ledger_registration_id: Option<String>,
    #[serde(default)]
    pub content_store_hash: Option<String>,
    /// Legacy secondary content-store snapshot.
    #[serde(default)]
    pub secondary_store_hash: Option<String>,
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_true() -> bool {
    true
}

/// Manufacturer account owning products.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issuer {
    pub id: Uuid,
    pub name: String,
    pub active: bool,
    /// Set once the issuer's identity has been vetted.
    pub trusted: bool,
}

/// One append-only audit entry per verification attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationRecord {
    pub id: Uuid,
    pub attempt_id: Uuid,
    pub product_id: Uuid,
    pub verifier_id: Uuid,
    pub location: String,
    pub notes: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub is_authentic: bool,
    pub reasons: Vec<String>,
    pub confidence_score: f64,
    pub risk_level: RiskLevel,
    pub ledger_verification_id: Option<String>,
}

/// Insert payload for [`crate::ports::DataStore::append_verification`].
/// The store assigns the record id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewVerification {
    pub attempt_id: Uuid,
    pub product_id: Uuid,
    pub verifier_id: Uuid,
    pub location: String,
    pub notes: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub is_authentic: bool,
    pub reasons: Vec<String>,
    pub confidence_score: f64,
    pub risk_level: RiskLevel,
    pub ledger_verification_id: Option<String>,
}

impl NewVerification {
    pub fn into_record(self, id: Uuid) -> VerificationRecord {
        VerificationRecord {
            id,
            attempt_id: self.attempt_id,
            product_id: self.product_id,
            verifier_id: self.verifier_id,
            location: self.location,
            notes: self.notes,
            timestamp: self.timestamp,
            is_authentic: self.is_authentic,
            reasons: self.reasons,
            confidence_score: self.confidence_score,
            risk_level: self.risk_level,
            ledger_verification_id: self.ledger_verification_id,
        }
    }
}

// ── Verification context ──────────────────────────────────────

/// Who is verifying, where, and when.
///
/// `at` is the reference instant for every time-relative check, so two
/// analyses with the same context and data produce identical verdicts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationContext {
    /// Idempotency key for the persisted record.
    pub attempt_id: Uuid,
    pub verifier_id: Uuid,
    pub location: String,
    #[serde(default)]
    pub notes: Option<String>,
    pub at: DateTime<Utc>,
}

impl VerificationContext {
    pub fn new(verifier_id: Uuid, location: impl Into<String>) -> Self {
        Self {
            attempt_id: Uuid::new_v4(),
            verifier_id,
            location: location.into(),
            notes: None,
            at: Utc::now(),
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn at(mut self, at: DateTime<Utc>) -> Self {
        self.at = at;
        self
    }

    pub fn with_attempt_id(mut self, attempt_id: Uuid) -> Self {
        self.attempt_id = attempt_id;
        self
    }
}

// ── Risk level ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// Bucket a confidence score: `< 0.3` high, `[0.3, 0.7)` medium, else low.
    pub fn from_score(score: f64) -> Self {
        if score < 0.3 {
            Self::High
        } else if score < 0.7 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Collaborator payloads ─────────────────────────────────────

/// Product metadata previously published to a content store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductSnapshot {
    #[serde(default)]
    pub product_name: Option<String>,
    #[serde(default)]
    pub batch_number: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl ProductSnapshot {
    pub fn of(product: &Product) -> Self {
        Self {
            product_name: Some(product.product_name.clone()),
            batch_number: Some(product.batch_number.clone()),
            extra: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerVerificationRequest {
    pub registration_id: String,
    pub location: String,
    pub notes: String,
    pub fingerprint: String,
}

/// Ledger answer to a submitted verification event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerSubmission {
    pub success: bool,
    pub verification_id: Option<String>,
    /// The ledger's own authenticity flag; `false` marks the product counterfeit.
    pub authentic: bool,
}
