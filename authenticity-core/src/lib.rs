//! Product authenticity engine.
//!
//! Given a product, who is verifying it and an optional claimed fingerprint,
//! the engine runs a fixed set of signal checks concurrently, folds them into
//! a gate decision and a confidence score, and (through [`DetectionEngine::verify`])
//! appends one audit record per attempt.
//!
//! All collaborators sit behind the traits in [`ports`]. In-process adapters
//! live in [`store_memory`]; an HTTP content store is available with the
//! `http` feature.

pub mod aggregate;
pub mod checks;
pub mod config;
#[cfg(feature = "http")]
pub mod content_http;
pub mod engine;
pub mod error;
pub mod fingerprint;
pub mod ports;
pub mod scoring;
pub mod store_memory;
pub mod types;

pub use checks::{CheckName, RiskFactor};
pub use config::{EngineConfig, PatternConfig};
#[cfg(feature = "http")]
pub use content_http::HttpContentStore;
pub use engine::{DetectionEngine, ProductReport, VerificationOutcome, Verdict};
pub use error::{EngineError, Result};
pub use ports::{ContentStore, DataStore, Ledger};
pub use store_memory::{FetchFailure, MemoryContentStore, MemoryLedger, MemoryStore};
pub use types::*;
