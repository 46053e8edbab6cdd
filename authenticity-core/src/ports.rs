//! Port traits for the engine's collaborators.
//! Core logic depends only on these traits; adapters live in `store_memory`
//! and `content_http`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::types::*;

/// Product, issuer and verification-history access.
///
/// Read-only except for `append_verification`, which is insert-only.
#[async_trait]
pub trait DataStore: Send + Sync {
    /// Load a product. `EngineError::NotFound` when absent.
    async fn get_product(&self, id: Uuid) -> Result<Product>;

    /// Any *active* product other than `exclude_id` carrying `fingerprint`.
    async fn find_duplicate_fingerprint(
        &self,
        fingerprint: &str,
        exclude_id: Uuid,
    ) -> Result<Option<Product>>;

    /// Active products other than `exclude_id` sharing batch and issuer.
    async fn find_duplicate_batch(
        &self,
        batch_number: &str,
        issuer_id: Uuid,
        exclude_id: Uuid,
    ) -> Result<Vec<Product>>;

    /// Load an issuer. `EngineError::NotFound` when absent.
    async fn get_issuer(&self, id: Uuid) -> Result<Issuer>;

    /// Verification records for a product with `timestamp >= since`.
    async fn list_verifications(
        &self,
        product_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Vec<VerificationRecord>>;

    /// The record stored for `attempt_id`, if that attempt was already recorded.
    async fn find_verification(&self, attempt_id: Uuid) -> Result<Option<VerificationRecord>>;

    /// Append one record. Implementations must treat a repeated
    /// `attempt_id` as the same insert and return the stored record.
    async fn append_verification(&self, record: NewVerification) -> Result<VerificationRecord>;
}

/// Content-addressed snapshot storage.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Fetch the snapshot published under `hash`.
    ///
    /// Transport failures must be reported as `Unavailable`/`Timeout` so the
    /// caller can tell them apart from a store that answered badly.
    async fn fetch(&self, hash: &str) -> Result<ProductSnapshot>;
}

/// Distributed ledger used to corroborate registrations and record verifications.
#[async_trait]
pub trait Ledger: Send + Sync {
    async fn is_registered(&self, registration_id: &str) -> Result<bool>;

    async fn submit_verification(
        &self,
        request: &LedgerVerificationRequest,
    ) -> Result<LedgerSubmission>;
}
