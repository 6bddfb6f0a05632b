use std::path::Path;

use anyhow::{anyhow, Context, Result};
use ark_ec::pairing::Pairing;
use serde::{Deserialize, Serialize};

use crate::elgamal::DEFAULT_DLOG_LIMIT;
use crate::parallel::set_parallel;
use crate::proofs::RangeBounds;
use crate::query::SurveyQuery;

const LOG_TARGET: &str = "drynx_proofs::config";

pub const PARALLEL_ENV: &str = "DRYNX_PARALLEL";
pub const DLOG_LIMIT_ENV: &str = "DRYNX_DLOG_LIMIT";

/// Fraction of arriving proofs each verifier checks, per category.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingThresholds {
    pub threshold: f64,
    pub aggregation: f64,
    pub obfuscation: f64,
    pub range: f64,
    pub key_switching: f64,
}

impl Default for SamplingThresholds {
    fn default() -> Self {
        Self {
            threshold: 1.0,
            aggregation: 1.0,
            obfuscation: 1.0,
            range: 1.0,
            key_switching: 1.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub parallel: bool,
    /// Plaintexts decrypt within `[-dlog_limit, dlog_limit]`.
    pub dlog_limit: i64,
    pub thresholds: SamplingThresholds,
    /// Default `[u, L]` for every output slot.
    pub range: RangeBounds,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            parallel: true,
            dlog_limit: DEFAULT_DLOG_LIMIT,
            thresholds: SamplingThresholds::default(),
            range: (16, 4),
        }
    }
}

impl CoreConfig {
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw).context("failed to parse core config JSON")?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read core config {}", path.display()))?;
        Self::from_json_str(&raw)
    }

    /// File (if any), then `.env`, then process environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenv::dotenv().ok();
        let base = match path {
            Some(path) => Self::from_json_file(path)?,
            None => Self::default(),
        };
        base.with_overrides(|key| std::env::var(key).ok())
    }

    /// Applies `DRYNX_PARALLEL` and `DRYNX_DLOG_LIMIT` as returned by `lookup`.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(raw) = lookup(PARALLEL_ENV) {
            self.parallel = match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                other => return Err(anyhow!("{PARALLEL_ENV} must be a boolean, got {other:?}")),
            };
        }
        if let Some(raw) = lookup(DLOG_LIMIT_ENV) {
            self.dlog_limit = raw
                .trim()
                .parse()
                .with_context(|| format!("{DLOG_LIMIT_ENV} must be an integer, got {raw:?}"))?;
        }
        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> Result<()> {
        if self.dlog_limit <= 0 {
            return Err(anyhow!("dlog_limit must be positive, got {}", self.dlog_limit));
        }
        let t = &self.thresholds;
        for (name, value) in [
            ("threshold", t.threshold),
            ("aggregation", t.aggregation),
            ("obfuscation", t.obfuscation),
            ("range", t.range),
            ("key_switching", t.key_switching),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(anyhow!("sampling threshold {name} = {value} outside [0, 1]"));
            }
        }
        let (u, l) = self.range;
        if u < 2 || l < 1 {
            return Err(anyhow!("range parameters [u={u}, L={l}] need u >= 2 and L >= 1"));
        }
        Ok(())
    }

    /// Sets the process-wide parallelism toggle.
    pub fn apply(&self) {
        set_parallel(self.parallel);
        tracing::debug!(
            target: LOG_TARGET,
            parallel = self.parallel,
            dlog_limit = self.dlog_limit,
            "core config applied"
        );
    }

    /// Copies the sampling thresholds onto a survey with proofs enabled.
    pub fn apply_thresholds<E: Pairing>(&self, survey: &mut SurveyQuery<E>) {
        let t = &self.thresholds;
        survey.threshold = t.threshold;
        survey.aggregation_proof_threshold = t.aggregation;
        survey.range_proof_threshold = t.range;
        survey.obfuscation_proof_threshold = t.obfuscation;
        survey.key_switching_proof_threshold = t.key_switching;
    }
}
