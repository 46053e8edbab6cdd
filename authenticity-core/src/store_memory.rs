//! In-process adapters for every port.
//!
//! Used by the test suite and the CLI fixture runner. Collections are
//! ordered maps so lookups are deterministic across runs.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::error::{EngineError, Result};
use crate::ports::{ContentStore, DataStore, Ledger};
use crate::types::*;

// ── MemoryStore ───────────────────────────────────────────────

#[derive(Default)]
struct Tables {
    products: BTreeMap<Uuid, Product>,
    issuers: BTreeMap<Uuid, Issuer>,
    /// Append order is preserved.
    verifications: Vec<VerificationRecord>,
}

/// `DataStore` backed by in-memory tables.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_product(mut self, product: Product) -> Self {
        self.tables.get_mut().products.insert(product.id, product);
        self
    }

    pub fn with_issuer(mut self, issuer: Issuer) -> Self {
        self.tables.get_mut().issuers.insert(issuer.id, issuer);
        self
    }

    /// Seed historical records verbatim (ids and timestamps kept).
    pub fn with_verification(mut self, record: VerificationRecord) -> Self {
        self.tables.get_mut().verifications.push(record);
        self
    }

    pub async fn insert_product(&self, product: Product) {
        self.tables.write().await.products.insert(product.id, product);
    }

    pub async fn insert_issuer(&self, issuer: Issuer) {
        self.tables.write().await.issuers.insert(issuer.id, issuer);
    }

    /// Every stored record, in append order.
    pub async fn verifications(&self) -> Vec<VerificationRecord> {
        self.tables.read().await.verifications.clone()
    }
}

#[async_trait]
impl DataStore for MemoryStore {
    async fn get_product(&self, id: Uuid) -> Result<Product> {
        self.tables
            .read()
            .await
            .products
            .get(&id)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(format!("product {id}")))
    }

    async fn find_duplicate_fingerprint(
        &self,
        fingerprint: &str,
        exclude_id: Uuid,
    ) -> Result<Option<Product>> {
        Ok(self
            .tables
            .read()
            .await
            .products
            .values()
            .find(|p| p.active && p.id != exclude_id && p.fingerprint == fingerprint)
            .cloned())
    }

    async fn find_duplicate_batch(
        &self,
        batch_number: &str,
        issuer_id: Uuid,
        exclude_id: Uuid,
    ) -> Result<Vec<Product>> {
        Ok(self
            .tables
            .read()
            .await
            .products
            .values()
            .filter(|p| {
                p.active
                    && p.id != exclude_id
                    && p.issuer_id == issuer_id
                    && p.batch_number == batch_number
            })
            .cloned()
            .collect())
    }

    async fn get_issuer(&self, id: Uuid) -> Result<Issuer> {
        self.tables
            .read()
            .await
            .issuers
            .get(&id)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(format!("issuer {id}")))
    }

    async fn list_verifications(
        &self,
        product_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Vec<VerificationRecord>> {
        Ok(self
            .tables
            .read()
            .await
            .verifications
            .iter()
            .filter(|v| v.product_id == product_id && v.timestamp >= since)
            .cloned()
            .collect())
    }

    async fn find_verification(&self, attempt_id: Uuid) -> Result<Option<VerificationRecord>> {
        Ok(self
            .tables
            .read()
            .await
            .verifications
            .iter()
            .find(|v| v.attempt_id == attempt_id)
            .cloned())
    }

    async fn append_verification(&self, record: NewVerification) -> Result<VerificationRecord> {
        let mut tables = self.tables.write().await;
        if let Some(existing) = tables
            .verifications
            .iter()
            .find(|v| v.attempt_id == record.attempt_id)
        {
            return Ok(existing.clone());
        }
        let stored = record.into_record(Uuid::new_v4());
        tables.verifications.push(stored.clone());
        Ok(stored)
    }
}

// ── MemoryContentStore ────────────────────────────────────────

/// Scripted fetch failure for a given hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchFailure {
    Unreachable,
    Malformed,
}

#[derive(Default)]
pub struct MemoryContentStore {
    snapshots: BTreeMap<String, ProductSnapshot>,
    failures: BTreeMap<String, FetchFailure>,
    latency: Option<Duration>,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(mut self, hash: impl Into<String>, snapshot: ProductSnapshot) -> Self {
        self.snapshots.insert(hash.into(), snapshot);
        self
    }

    pub fn with_failure(mut self, hash: impl Into<String>, failure: FetchFailure) -> Self {
        self.failures.insert(hash.into(), failure);
        self
    }

    /// Delay every fetch, e.g. to exercise caller timeouts.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn fetch(&self, hash: &str) -> Result<ProductSnapshot> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        match self.failures.get(hash) {
            Some(FetchFailure::Unreachable) => {
                return Err(EngineError::unavailable("content store", "connection refused"))
            }
            Some(FetchFailure::Malformed) => {
                return Err(EngineError::Malformed(format!(
                    "snapshot {hash} is not a product record"
                )))
            }
            None => {}
        }
        self.snapshots
            .get(hash)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(format!("snapshot {hash}")))
    }
}

// ── MemoryLedger ──────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryLedger {
    registered: BTreeSet<String>,
    /// Registrations the ledger reports as counterfeit on submission.
    flagged: BTreeSet<String>,
    unreachable: bool,
    submissions: Mutex<Vec<LedgerVerificationRequest>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_registration(mut self, registration_id: impl Into<String>) -> Self {
        self.registered.insert(registration_id.into());
        self
    }

    pub fn with_counterfeit_flag(mut self, registration_id: impl Into<String>) -> Self {
        self.flagged.insert(registration_id.into());
        self
    }

    pub fn unreachable(mut self) -> Self {
        self.unreachable = true;
        self
    }

    pub async fn submissions(&self) -> Vec<LedgerVerificationRequest> {
        self.submissions.lock().await.clone()
    }

    fn ensure_reachable(&self) -> Result<()> {
        if self.unreachable {
            Err(EngineError::unavailable("ledger", "node not responding"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn is_registered(&self, registration_id: &str) -> Result<bool> {
        self.ensure_reachable()?;
        Ok(self.registered.contains(registration_id))
    }

    async fn submit_verification(
        &self,
        request: &LedgerVerificationRequest,
    ) -> Result<LedgerSubmission> {
        self.ensure_reachable()?;
        let mut submissions = self.submissions.lock().await;
        submissions.push(request.clone());
        if !self.registered.contains(&request.registration_id) {
            return Ok(LedgerSubmission {
                success: false,
                verification_id: None,
                authentic: true,
            });
        }
        Ok(LedgerSubmission {
            success: true,
            verification_id: Some(format!("ledger-verification-{}", submissions.len())),
            authentic: !self.flagged.contains(&request.registration_id),
        })
    }
}
