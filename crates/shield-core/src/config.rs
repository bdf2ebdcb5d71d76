//! # Shield Configuration
//!
//! One struct carries every tunable: signal weights, risk thresholds,
//! per-signal deadline, input size cap, and the optional signal configs.
//! Defaults are safe to run as-is; `validate` rejects configurations that
//! would silently misbehave (zero weight mass, inverted thresholds) before
//! any content is analyzed.
//!
//! The struct is plain serde data so deployments can keep it in a JSON
//! file and load it at startup.

use serde::{Deserialize, Serialize};
use shield_signals::{ClassifierConfig, EmbeddingConfig, PatternRuleSpec, PatternSignal};

use crate::error::{Result, ShieldError};
use crate::score::{RiskThresholds, SignalWeights};

/// Default per-signal deadline. Signals that exceed it are degraded for
/// that request, never killed process-wide.
pub const DEFAULT_SIGNAL_TIMEOUT_MS: u64 = 2_000;

/// Default cap on submitted content size.
pub const DEFAULT_MAX_CONTENT_BYTES: usize = 1_048_576;

/// Complete shield configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShieldConfig {
    /// Relative weight of each signal in the composite score.
    pub weights: SignalWeights,
    /// Risk category bucket edges.
    pub thresholds: RiskThresholds,
    /// Deadline applied to each signal invocation, in milliseconds.
    pub signal_timeout_ms: u64,
    /// Requests whose content exceeds this many bytes are rejected.
    pub max_content_bytes: usize,
    /// Replacement pattern rule table. `None` keeps the builtin rules.
    pub pattern_rules: Option<Vec<PatternRuleSpec>>,
    /// Trained-classifier signal settings.
    pub classifier: ClassifierConfig,
    /// Embedding-similarity signal settings.
    pub embedding: EmbeddingConfig,
}

impl Default for ShieldConfig {
    fn default() -> Self {
        Self {
            weights: SignalWeights::default(),
            thresholds: RiskThresholds::default(),
            signal_timeout_ms: DEFAULT_SIGNAL_TIMEOUT_MS,
            max_content_bytes: DEFAULT_MAX_CONTENT_BYTES,
            pattern_rules: None,
            classifier: ClassifierConfig::default(),
            embedding: EmbeddingConfig::default(),
        }
    }
}

impl ShieldConfig {
    /// Rejects configurations that cannot produce meaningful verdicts.
    ///
    /// Called by [`crate::Shield::new`]; a config that fails here never
    /// analyzes anything.
    pub fn validate(&self) -> Result<()> {
        let w = &self.weights;
        for (name, value) in [
            ("pattern", w.pattern),
            ("anomaly", w.anomaly),
            ("classifier", w.classifier),
            ("embedding", w.embedding),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ShieldError::Config(format!(
                    "signal weight '{name}' must be a non-negative number, got {value}"
                )));
            }
        }
        let weight_sum = w.pattern + w.anomaly + w.classifier + w.embedding;
        if weight_sum <= 0.0 {
            return Err(ShieldError::Config(
                "signal weights must not all be zero".into(),
            ));
        }

        let t = &self.thresholds;
        for (name, value) in [
            ("medium", t.medium),
            ("high", t.high),
            ("critical", t.critical),
        ] {
            if !value.is_finite() || !(0.0..=100.0).contains(&value) {
                return Err(ShieldError::Config(format!(
                    "risk threshold '{name}' must lie in [0, 100], got {value}"
                )));
            }
        }
        if !(t.medium < t.high && t.high < t.critical) {
            return Err(ShieldError::Config(format!(
                "risk thresholds must be strictly ordered medium < high < critical, \
                 got {} / {} / {}",
                t.medium, t.high, t.critical
            )));
        }

        if self.signal_timeout_ms == 0 {
            return Err(ShieldError::Config(
                "signal_timeout_ms must be positive".into(),
            ));
        }
        if self.max_content_bytes == 0 {
            return Err(ShieldError::Config(
                "max_content_bytes must be positive".into(),
            ));
        }

        if !(0.0..=1.0).contains(&self.classifier.flag_threshold) {
            return Err(ShieldError::Config(format!(
                "classifier flag_threshold must lie in [0, 1], got {}",
                self.classifier.flag_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.embedding.noise_floor) {
            return Err(ShieldError::Config(format!(
                "embedding noise_floor must lie in [0, 1], got {}",
                self.embedding.noise_floor
            )));
        }

        // Compile custom rules now so a bad regex fails startup instead of
        // the first request.
        if let Some(rules) = &self.pattern_rules {
            if rules.is_empty() {
                return Err(ShieldError::Config(
                    "pattern_rules must not be empty; omit the field to keep builtins".into(),
                ));
            }
            PatternSignal::from_specs(rules)
                .map_err(|e| ShieldError::Config(format!("invalid pattern rule: {e}")))?;
        }

        Ok(())
    }
}
