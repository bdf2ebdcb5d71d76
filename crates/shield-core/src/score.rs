//! # Composite Scorer
//!
//! Turns the per-signal results into one risk verdict. A pure function:
//! given the same signal results and the same weight configuration, the
//! output is always identical, and no segment is ever fabricated here -
//! only signal-reported ones are aggregated.
//!
//! ## Graceful degradation
//!
//! Weights are fixed per signal type but **renormalized** across the
//! currently-available signals, so the weights in effect always sum to 1
//! over the active set. Losing an optional detector must not
//! systematically depress the score merely because a weight went missing.
//!
//! ## Default policy
//!
//! | injection_score | risk category | recommended action |
//! |-----------------|---------------|----------------------|
//! | >= 80 | Critical | Block |
//! | >= 60 | High | Block |
//! | >= 40 | Medium | PassWithWarnings |
//! | otherwise | Low | Pass |
//!
//! Bucket edges are inclusive at the lower bound. The action mapping is a
//! default recommendation, independent of the sanitization mode; the
//! sanitizer may override the *effect*, never this field.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use shield_signals::{SignalKind, SignalResult};

/// Risk buckets derived from the injection score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskCategory {
    /// Negligible risk.
    Low,
    /// Suspicious, review recommended.
    Medium,
    /// Likely injection attempt.
    High,
    /// High-confidence injection attempt.
    Critical,
}

impl std::fmt::Display for RiskCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskCategory::Low => f.write_str("low"),
            RiskCategory::Medium => f.write_str("medium"),
            RiskCategory::High => f.write_str("high"),
            RiskCategory::Critical => f.write_str("critical"),
        }
    }
}

/// Recommended handling for the content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecommendedAction {
    /// Content is safe to forward.
    Pass,
    /// Forward, but surface the warnings.
    PassWithWarnings,
    /// Do not forward the content.
    Block,
}

impl RecommendedAction {
    /// True if the content should not be forwarded.
    pub fn is_block(&self) -> bool {
        matches!(self, RecommendedAction::Block)
    }
}

/// Per-signal aggregation weights, renormalized over available signals.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SignalWeights {
    /// Pattern signal weight.
    pub pattern: f64,
    /// Anomaly signal weight.
    pub anomaly: f64,
    /// Classifier signal weight.
    pub classifier: f64,
    /// Embedding signal weight.
    pub embedding: f64,
}

impl SignalWeights {
    /// Weight for one signal kind.
    pub fn weight_for(&self, kind: SignalKind) -> f64 {
        match kind {
            SignalKind::Pattern => self.pattern,
            SignalKind::Anomaly => self.anomaly,
            SignalKind::Classifier => self.classifier,
            SignalKind::Embedding => self.embedding,
        }
    }
}

impl Default for SignalWeights {
    fn default() -> Self {
        Self {
            pattern: 0.40,
            anomaly: 0.15,
            classifier: 0.25,
            embedding: 0.20,
        }
    }
}

/// Inclusive lower bounds for the risk buckets.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RiskThresholds {
    /// Lower bound of Critical.
    pub critical: f64,
    /// Lower bound of High.
    pub high: f64,
    /// Lower bound of Medium.
    pub medium: f64,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            critical: 80.0,
            high: 60.0,
            medium: 40.0,
        }
    }
}

/// The aggregated risk verdict for one request.
///
/// Derived, never persisted as ground truth: recomputable from the same
/// signal results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositeScore {
    /// Aggregate injection likelihood, 0 to 100.
    pub injection_score: f64,
    /// Safety score, 0 to 100. Computed independently; defaults to the
    /// complement of the injection score but is not enforced as such
    /// anywhere else in the system.
    pub safety_score: f64,
    /// Risk bucket.
    pub risk_category: RiskCategory,
    /// Default policy recommendation.
    pub recommended_action: RecommendedAction,
    /// Per-signal scores, including zero entries for unavailable signals.
    pub signal_breakdown: BTreeMap<String, f64>,
}

/// Aggregates signal results into a [`CompositeScore`].
#[derive(Debug, Clone)]
pub struct CompositeScorer {
    weights: SignalWeights,
    thresholds: RiskThresholds,
}

impl Default for CompositeScorer {
    fn default() -> Self {
        Self::new(SignalWeights::default(), RiskThresholds::default())
    }
}

impl CompositeScorer {
    /// Creates a scorer with the given policy.
    pub fn new(weights: SignalWeights, thresholds: RiskThresholds) -> Self {
        Self {
            weights,
            thresholds,
        }
    }

    /// Computes the composite verdict. Pure; the inputs are not consumed.
    pub fn aggregate(&self, signals: &[SignalResult]) -> CompositeScore {
        let mut weighted_sum = 0.0;
        let mut weight_total = 0.0;
        let mut breakdown = BTreeMap::new();

        for result in signals {
            breakdown.insert(result.kind.as_str().to_string(), round2(result.score));
            if result.available {
                let weight = self.weights.weight_for(result.kind);
                weighted_sum += weight * result.score;
                weight_total += weight;
            }
        }

        let injection_score = if weight_total > 0.0 {
            round2((weighted_sum / weight_total).clamp(0.0, 100.0))
        } else {
            0.0
        };
        let safety_score = round2((100.0 - injection_score).clamp(0.0, 100.0));

        let risk_category = self.bucket(injection_score);
        let recommended_action = match risk_category {
            RiskCategory::Critical | RiskCategory::High => RecommendedAction::Block,
            RiskCategory::Medium => RecommendedAction::PassWithWarnings,
            RiskCategory::Low => RecommendedAction::Pass,
        };

        CompositeScore {
            injection_score,
            safety_score,
            risk_category,
            recommended_action,
            signal_breakdown: breakdown,
        }
    }

    fn bucket(&self, injection_score: f64) -> RiskCategory {
        if injection_score >= self.thresholds.critical {
            RiskCategory::Critical
        } else if injection_score >= self.thresholds.high {
            RiskCategory::High
        } else if injection_score >= self.thresholds.medium {
            RiskCategory::Medium
        } else {
            RiskCategory::Low
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use shield_signals::SignalResult;
    use std::time::Duration;

    fn available(kind: SignalKind, score: f64) -> SignalResult {
        SignalResult::from_outcome(
            kind,
            shield_signals::SignalOutcome::new(score, Vec::new()),
            Duration::ZERO,
        )
    }

    fn scorer() -> CompositeScorer {
        CompositeScorer::new(SignalWeights::default(), RiskThresholds::default())
    }

    #[test]
    fn test_all_signals_available() {
        let results = vec![
            available(SignalKind::Pattern, 100.0),
            available(SignalKind::Anomaly, 100.0),
            available(SignalKind::Classifier, 100.0),
            available(SignalKind::Embedding, 100.0),
        ];
        let score = scorer().aggregate(&results);
        assert_eq!(score.injection_score, 100.0);
        assert_eq!(score.risk_category, RiskCategory::Critical);
        assert_eq!(score.recommended_action, RecommendedAction::Block);
    }

    #[test]
    fn test_renormalization_over_available_set() {
        // Risk driven by pattern/anomaly only: dropping the optional
        // signals entirely must not change the verdict.
        let with_unavailable = vec![
            available(SignalKind::Pattern, 80.0),
            available(SignalKind::Anomaly, 20.0),
            SignalResult::unavailable(SignalKind::Classifier),
            SignalResult::unavailable(SignalKind::Embedding),
        ];
        let without = vec![
            available(SignalKind::Pattern, 80.0),
            available(SignalKind::Anomaly, 20.0),
        ];
        let a = scorer().aggregate(&with_unavailable);
        let b = scorer().aggregate(&without);
        assert_eq!(a.injection_score, b.injection_score);
        assert_eq!(a.risk_category, b.risk_category);
        // (0.40*80 + 0.15*20) / 0.55
        assert!((a.injection_score - 63.64).abs() < 0.01);
        assert_eq!(a.risk_category, RiskCategory::High);
    }

    #[test]
    fn test_no_available_signals_scores_zero() {
        let results = vec![
            SignalResult::unavailable(SignalKind::Classifier),
            SignalResult::unavailable(SignalKind::Embedding),
        ];
        let score = scorer().aggregate(&results);
        assert_eq!(score.injection_score, 0.0);
        assert_eq!(score.risk_category, RiskCategory::Low);
        assert_eq!(score.recommended_action, RecommendedAction::Pass);
    }

    #[test]
    fn test_bucket_edges_inclusive() {
        let cases = [
            (80.0, RiskCategory::Critical),
            (79.99, RiskCategory::High),
            (60.0, RiskCategory::High),
            (59.99, RiskCategory::Medium),
            (40.0, RiskCategory::Medium),
            (39.99, RiskCategory::Low),
            (0.0, RiskCategory::Low),
        ];
        for (value, expected) in cases {
            let results = vec![available(SignalKind::Pattern, value)];
            let score = scorer().aggregate(&results);
            assert_eq!(score.risk_category, expected, "score {}", value);
        }
    }

    #[test]
    fn test_action_mapping() {
        let run = |v: f64| scorer().aggregate(&[available(SignalKind::Pattern, v)]);
        assert_eq!(run(90.0).recommended_action, RecommendedAction::Block);
        assert_eq!(run(65.0).recommended_action, RecommendedAction::Block);
        assert_eq!(
            run(45.0).recommended_action,
            RecommendedAction::PassWithWarnings
        );
        assert_eq!(run(10.0).recommended_action, RecommendedAction::Pass);
    }

    #[test]
    fn test_safety_complements_injection_in_default_policy() {
        let results = vec![
            available(SignalKind::Pattern, 73.0),
            available(SignalKind::Anomaly, 11.0),
        ];
        let score = scorer().aggregate(&results);
        assert!((score.injection_score + score.safety_score - 100.0).abs() < 0.01);
    }

    #[test]
    fn test_breakdown_includes_unavailable_signals() {
        let results = vec![
            available(SignalKind::Pattern, 50.0),
            SignalResult::unavailable(SignalKind::Embedding),
        ];
        let score = scorer().aggregate(&results);
        assert_eq!(score.signal_breakdown["pattern"], 50.0);
        assert_eq!(score.signal_breakdown["embedding"], 0.0);
    }

    #[test]
    fn test_degraded_signal_counts_as_available_zero() {
        // A degraded (timed-out) signal stays in the active set with score
        // zero, diluting rather than vanishing.
        let results = vec![
            available(SignalKind::Pattern, 80.0),
            SignalResult::degraded(SignalKind::Classifier, Duration::ZERO),
        ];
        let score = scorer().aggregate(&results);
        // (0.40*80 + 0.25*0) / 0.65
        assert!((score.injection_score - 49.23).abs() < 0.01);
    }
}
