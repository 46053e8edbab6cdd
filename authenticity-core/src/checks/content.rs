use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use super::{Check, CheckName, CheckOutcome, RiskFactor, Subject};
use crate::error::{with_timeout, Result};
use crate::ports::ContentStore;
use crate::types::Product;

/// Compares the product against the snapshot its issuer published.
///
/// The primary store is a hard gate when the store answers with something
/// inconsistent. The secondary (legacy) store only raises a risk factor.
/// Either way, an absent hash or an unreachable store is a signal-unavailable
/// advisory, never a failure.
pub struct ContentStoreCheck {
    name: CheckName,
    store: Arc<dyn ContentStore>,
    timeout: Duration,
}

impl ContentStoreCheck {
    pub fn primary(store: Arc<dyn ContentStore>, timeout: Duration) -> Self {
        Self {
            name: CheckName::ContentStore,
            store,
            timeout,
        }
    }

    pub fn secondary(store: Arc<dyn ContentStore>, timeout: Duration) -> Self {
        Self {
            name: CheckName::SecondaryContentStore,
            store,
            timeout,
        }
    }

    fn is_secondary(&self) -> bool {
        self.name == CheckName::SecondaryContentStore
    }

    fn hash<'p>(&self, product: &'p Product) -> Option<&'p str> {
        let hash = if self.is_secondary() {
            product.secondary_store_hash.as_deref()
        } else {
            product.content_store_hash.as_deref()
        };
        hash.filter(|h| !h.trim().is_empty())
    }

    fn labels(&self) -> (&'static str, &'static str) {
        if self.is_secondary() {
            ("secondary snapshot", "secondary content store")
        } else {
            ("snapshot", "content store")
        }
    }

    fn factor(&self) -> RiskFactor {
        if self.is_secondary() {
            RiskFactor::SecondaryStoreInvalid
        } else {
            RiskFactor::ContentStoreInvalid
        }
    }
}

#[async_trait]
impl Check for ContentStoreCheck {
    fn name(&self) -> CheckName {
        self.name
    }

    async fn run(&self, subject: &Subject<'_>) -> Result<CheckOutcome> {
        let product = subject.product;
        let (snapshot_label, store_label) = self.labels();
        let mut outcome = CheckOutcome::new(self.name);

        let Some(hash) = self.hash(product) else {
            outcome.unavailable(if self.is_secondary() {
                "no secondary snapshot available, limited verification"
            } else {
                "no external snapshot available, limited verification"
            });
            return Ok(outcome);
        };

        let snapshot = match with_timeout(store_label, self.timeout, self.store.fetch(hash)).await {
            Ok(snapshot) => snapshot,
            Err(e) if e.is_transport() => {
                warn!(product_id = %product.id, hash, error = %e, "{store_label} unreachable");
                outcome.unavailable(format!(
                    "{store_label} unreachable, limited verification: {e}"
                ));
                return Ok(outcome);
            }
            Err(e) => {
                outcome.fail(
                    format!("{snapshot_label} retrieval failed: {e}"),
                    self.factor(),
                );
                return Ok(outcome);
            }
        };

        let mut consistent = true;
        if snapshot.product_name.as_deref() != Some(product.product_name.as_str()) {
            consistent = false;
            outcome.fail(
                format!("{snapshot_label} product name mismatch"),
                self.factor(),
            );
        }
        if snapshot.batch_number.as_deref() != Some(product.batch_number.as_str()) {
            consistent = false;
            outcome.fail(
                format!("{snapshot_label} batch number mismatch"),
                self.factor(),
            );
        }
        if consistent {
            outcome.note(format!("{snapshot_label} integrity verified"));
        }

        Ok(outcome)
    }
}
