//! Engine configuration.
//!
//! Loaded once at startup, either from a YAML file or from `AUTHENTICITY_*`
//! environment variables. Every field has a default, so partial files and
//! sparse environments are fine.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub pattern: PatternConfig,
    /// Products older than this get an advisory reason.
    pub max_product_age_years: u32,
    pub content_store_timeout_ms: u64,
    pub ledger_timeout_ms: u64,
    /// Ask the ledger whether a claimed registration actually exists.
    pub corroborate_ledger_registration: bool,
    /// Submit each persisted verification to the ledger before appending it.
    pub submit_to_ledger: bool,
}

/// Thresholds for the verification-history analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternConfig {
    pub window_days: i64,
    /// More attempts than this inside the window is suspicious.
    pub excessive_attempts: usize,
    pub high_frequency_attempts: usize,
    /// Counterfeit share above this is suspicious.
    pub suspicious_rate: f64,
    pub moderate_rate: f64,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            window_days: 30,
            excessive_attempts: 20,
            high_frequency_attempts: 10,
            suspicious_rate: 0.5,
            moderate_rate: 0.2,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            pattern: PatternConfig::default(),
            max_product_age_years: 10,
            content_store_timeout_ms: 5_000,
            ledger_timeout_ms: 5_000,
            corroborate_ledger_registration: false,
            submit_to_ledger: false,
        }
    }
}

impl EngineConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading engine config {}", path.display()))?;
        Self::from_yaml(&raw).with_context(|| format!("parsing engine config {}", path.display()))
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(raw)?)
    }

    /// Overlay `AUTHENTICITY_*` environment variables on the defaults.
    pub fn from_env() -> Result<Self> {
        Self::default().with_env_overrides(|key| std::env::var(key).ok())
    }

    fn with_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        fn parse<T: std::str::FromStr>(key: &str, raw: Option<String>) -> Result<Option<T>>
        where
            T::Err: std::fmt::Display,
        {
            raw.map(|v| {
                v.trim()
                    .parse::<T>()
                    .map_err(|e| anyhow::anyhow!("{key}={v:?}: {e}"))
            })
            .transpose()
        }

        macro_rules! overlay {
            ($key:literal => $field:expr) => {
                if let Some(v) = parse($key, lookup($key))? {
                    $field = v;
                }
            };
        }

        overlay!("AUTHENTICITY_PATTERN_WINDOW_DAYS" => self.pattern.window_days);
        overlay!("AUTHENTICITY_EXCESSIVE_ATTEMPTS" => self.pattern.excessive_attempts);
        overlay!("AUTHENTICITY_HIGH_FREQUENCY_ATTEMPTS" => self.pattern.high_frequency_attempts);
        overlay!("AUTHENTICITY_SUSPICIOUS_RATE" => self.pattern.suspicious_rate);
        overlay!("AUTHENTICITY_MODERATE_RATE" => self.pattern.moderate_rate);
        overlay!("AUTHENTICITY_MAX_PRODUCT_AGE_YEARS" => self.max_product_age_years);
        overlay!("AUTHENTICITY_CONTENT_STORE_TIMEOUT_MS" => self.content_store_timeout_ms);
        overlay!("AUTHENTICITY_LEDGER_TIMEOUT_MS" => self.ledger_timeout_ms);
        overlay!("AUTHENTICITY_CORROBORATE_LEDGER" => self.corroborate_ledger_registration);
        overlay!("AUTHENTICITY_SUBMIT_TO_LEDGER" => self.submit_to_ledger);

        Ok(self)
    }

    pub fn content_store_timeout(&self) -> Duration {
        Duration::from_millis(self.content_store_timeout_ms)
    }

    pub fn ledger_timeout(&self) -> Duration {
        Duration::from_millis(self.ledger_timeout_ms)
    }
}
