//! YAML fixture worlds.
//!
//! A world file seeds every in-memory adapter at once:
//!
//! ```yaml
//! issuers:
//!   - { id: 00000000-0000-0000-0000-000000000064, name: Beecham Labs, active: true, trusted: true }
//! products:
//!   - id: 00000000-0000-0000-0000-000000000001
//!     fingerprint: 9f86d0...
//!     product_name: Amoxil 500mg
//!     batch_number: B-2026-001
//!     issuer_id: 00000000-0000-0000-0000-000000000064
//! snapshots:
//!   QmHash: { product_name: Amoxil 500mg, batch_number: B-2026-001 }
//! ledger:
//!   registrations: ["7"]
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use authenticity_core::{
    ContentStore, DetectionEngine, EngineConfig, HttpContentStore, Issuer, MemoryContentStore,
    MemoryLedger, MemoryStore, Product, ProductSnapshot, VerificationRecord,
};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct World {
    pub issuers: Vec<Issuer>,
    pub products: Vec<Product>,
    pub verifications: Vec<VerificationRecord>,
    pub snapshots: BTreeMap<String, ProductSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secondary_snapshots: Option<BTreeMap<String, ProductSnapshot>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ledger: Option<LedgerFixture>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct LedgerFixture {
    pub registrations: Vec<String>,
    pub counterfeit: Vec<String>,
    pub unreachable: bool,
}

impl World {
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading world {}", path.display()))?;
        Self::from_yaml(&raw).with_context(|| format!("parsing world {}", path.display()))
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(raw)?)
    }

    /// Write the world back as YAML. Comments in the original file are lost.
    pub fn save(&self, path: &Path) -> Result<()> {
        let raw = serde_yaml::to_string(self)?;
        std::fs::write(path, raw).with_context(|| format!("writing world {}", path.display()))
    }

    /// Wire an engine over this world. With `content_store_url` set, primary
    /// snapshots come from that HTTP endpoint instead of `snapshots`.
    ///
    /// The returned store holds the world's records plus whatever the engine
    /// appends; the world itself is left untouched.
    pub fn build_engine(
        &self,
        config: EngineConfig,
        content_store_url: Option<&str>,
    ) -> Result<(DetectionEngine, Arc<MemoryStore>)> {
        let store = self
            .issuers
            .iter()
            .cloned()
            .fold(MemoryStore::new(), |s, i| s.with_issuer(i));
        let store = self.products.iter().cloned().fold(store, |s, p| s.with_product(p));
        let store = Arc::new(
            self.verifications
                .iter()
                .cloned()
                .fold(store, |s, v| s.with_verification(v)),
        );

        let content: Arc<dyn ContentStore> = match content_store_url {
            Some(url) => Arc::new(HttpContentStore::new(url, config.content_store_timeout())?),
            None => Arc::new(memory_content(&self.snapshots)),
        };

        let mut engine = DetectionEngine::new(store.clone(), content, config);
        if let Some(secondary) = &self.secondary_snapshots {
            engine = engine.with_secondary_store(Arc::new(memory_content(secondary)));
        }
        if let Some(fixture) = &self.ledger {
            engine = engine.with_ledger(Arc::new(fixture.to_ledger()));
        }
        Ok((engine, store))
    }
}

impl LedgerFixture {
    fn to_ledger(&self) -> MemoryLedger {
        let ledger = self
            .registrations
            .iter()
            .fold(MemoryLedger::new(), |l, r| l.with_registration(r.as_str()));
        let ledger = self
            .counterfeit
            .iter()
            .fold(ledger, |l, r| l.with_counterfeit_flag(r.as_str()));
        if self.unreachable {
            ledger.unreachable()
        } else {
            ledger
        }
    }
}

fn memory_content(snapshots: &BTreeMap<String, ProductSnapshot>) -> MemoryContentStore {
    snapshots.iter().fold(MemoryContentStore::new(), |c, (hash, snap)| {
        c.with_snapshot(hash.as_str(), snap.clone())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use authenticity_core::{CheckName, VerificationContext};
    use uuid::Uuid;

    const WORLD: &str = r#"
issuers:
  - id: 00000000-0000-0000-0000-000000000064
    name: Beecham Labs
    active: true
    trusted: true
products:
  - id: 00000000-0000-0000-0000-000000000001
    fingerprint: 9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08
    product_name: Amoxil 500mg
    batch_number: B-2026-001
    manufacturing_date: 2026-03-01T00:00:00Z
    issuer_id: 00000000-0000-0000-0000-000000000064
    ledger_registration_id: "7"
    content_store_hash: QmGood
snapshots:
  QmGood:
    product_name: Amoxil 500mg
    batch_number: B-2026-001
secondary_snapshots: {}
ledger:
  registrations: ["7"]
"#;

    #[test]
    fn parses_fixture() {
        let world = World::from_yaml(WORLD).unwrap();
        assert_eq!(world.products.len(), 1);
        assert_eq!(world.issuers[0].id, Uuid::from_u128(100));
        assert!(world.verifications.is_empty());
        assert_eq!(world.ledger.as_ref().unwrap().registrations, vec!["7"]);
    }

    #[tokio::test]
    async fn fixture_engine_verifies_and_records() {
        let world = World::from_yaml(WORLD).unwrap();
        let (engine, store) = world.build_engine(EngineConfig::default(), None).unwrap();
        assert!(engine
            .check_names()
            .contains(&CheckName::SecondaryContentStore));

        let ctx = VerificationContext::new(Uuid::from_u128(7), "Kano clinic");
        let outcome = engine.verify(Uuid::from_u128(1), &ctx, None).await.unwrap();

        assert!(outcome.verdict.is_authentic);
        assert!(outcome
            .verdict
            .reasons
            .contains(&"snapshot integrity verified".to_string()));
        assert_eq!(store.verifications().await.len(), 1);
        assert!(world.verifications.is_empty());
    }

    #[tokio::test]
    async fn saved_world_keeps_appended_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("world.yaml");
        std::fs::write(&path, WORLD).unwrap();

        let mut world = World::from_file(&path).unwrap();
        let (engine, store) = world.build_engine(EngineConfig::default(), None).unwrap();
        let ctx = VerificationContext::new(Uuid::from_u128(7), "Kano clinic")
            .with_attempt_id(Uuid::from_u128(900));
        let outcome = engine.verify(Uuid::from_u128(1), &ctx, None).await.unwrap();

        world.verifications = store.verifications().await;
        world.save(&path).unwrap();

        let reloaded = World::from_file(&path).unwrap();
        assert_eq!(reloaded.verifications, vec![outcome.record]);
        assert_eq!(reloaded.products, world.products);
        assert_eq!(reloaded.ledger.unwrap().registrations, vec!["7"]);

        // Replaying the same attempt against the saved world appends nothing.
        let (engine, store) = World::from_file(&path)
            .unwrap()
            .build_engine(EngineConfig::default(), None)
            .unwrap();
        engine.verify(Uuid::from_u128(1), &ctx, None).await.unwrap();
        assert_eq!(store.verifications().await.len(), 1);
    }

    #[test]
    fn bundled_fixture_loads() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures/world.yaml");
        let world = World::from_file(&path).unwrap();
        assert_eq!(world.products.len(), 2);
        assert!(world.snapshots.contains_key("QmAmoxil500"));
    }

    #[test]
    fn empty_world_is_valid() {
        let world = World::from_yaml("{}").unwrap();
        assert!(world.products.is_empty());
        assert!(world.ledger.is_none());
    }
}
