//! # Core Types for Detection Signals
//!
//! This module defines the value types shared by every detection signal:
//! the flagged-segment record, the per-signal result envelope, and the
//! category taxonomy for injection payloads.
//!
//! ## Design Principles
//!
//! 1. **Uniform signal records** - Every signal, regardless of mechanism,
//!    produces the same `(score, segments, available)` shape so downstream
//!    aggregation is signal-agnostic and new signals need no scorer changes.
//! 2. **Request-scoped values** - Results are created once per signal per
//!    request and never mutated afterwards. Nothing here has identity
//!    beyond the request.
//! 3. **Offsets into the original** - Segment offsets always index the
//!    content the caller submitted, even when matching ran against a
//!    normalized view of it.
//! 4. **Serializable** - All types derive Serde traits so the excluded API
//!    and audit layers can ship them as JSON.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// The four detection signals, in fixed dispatch order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalKind {
    /// Rule-based regex/lexicon matching over known attack phrasings.
    Pattern,
    /// Statistical analysis of character distribution and encoding artifacts.
    Anomaly,
    /// Optional text classifier estimating P(malicious intent).
    Classifier,
    /// Optional nearest-neighbor similarity against known attack vectors.
    Embedding,
}

impl SignalKind {
    /// Stable lowercase name used in breakdowns and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalKind::Pattern => "pattern",
            SignalKind::Anomaly => "anomaly",
            SignalKind::Classifier => "classifier",
            SignalKind::Embedding => "embedding",
        }
    }
}

impl std::fmt::Display for SignalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sub-metrics of the anomaly signal.
///
/// Each sub-metric has its own threshold curve and flag threshold; segments
/// emitted by the anomaly signal name the sub-metric that fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnomalyMetric {
    /// Shannon entropy of the character distribution.
    Entropy,
    /// Fraction of the text inside base64/percent/hex-looking runs.
    Encoded,
    /// Ratio of non-printable and zero-width characters.
    Nonprintable,
    /// Repetition of imperative, instruction-like sentence starts.
    Imperative,
}

impl AnomalyMetric {
    /// Stable lowercase name, used in `anomaly:<submetric>` tags.
    pub fn as_str(&self) -> &'static str {
        match self {
            AnomalyMetric::Entropy => "entropy",
            AnomalyMetric::Encoded => "encoded",
            AnomalyMetric::Nonprintable => "nonprintable",
            AnomalyMetric::Imperative => "imperative",
        }
    }
}

impl std::fmt::Display for AnomalyMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Categories of injection payload a segment can be tagged with.
///
/// The taxonomy follows the attack classes documented for indirect prompt
/// injection (Greshake et al. 2023) and OWASP LLM01. Pattern rules, the
/// classifier, the embedding corpus, and the anomaly sub-metrics all tag
/// their findings with one of these so the sanitizer can render a
/// meaningful placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PatternCategory {
    /// DAN-style jailbreaks and "ignore previous instructions" phrasing.
    Jailbreak,
    /// Attempts to reassign the model's role or persona.
    RoleOverride,
    /// Injected replacement instructions ("new instructions:", overrides).
    InstructionHijack,
    /// Encoded or obfuscated payload carriers.
    EncodedPayload,
    /// System prompt extraction attempts.
    SystemPromptLeak,
    /// Chat-template or context-boundary manipulation markers.
    ContextManipulation,
    /// Whole-input flag from the intent classifier.
    MaliciousIntent,
    /// Statistical anomaly, qualified by the sub-metric that fired.
    Anomaly(AnomalyMetric),
}

impl std::fmt::Display for PatternCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PatternCategory::Jailbreak => f.write_str("jailbreak"),
            PatternCategory::RoleOverride => f.write_str("role-override"),
            PatternCategory::InstructionHijack => f.write_str("instruction-hijack"),
            PatternCategory::EncodedPayload => f.write_str("encoded-payload"),
            PatternCategory::SystemPromptLeak => f.write_str("system-prompt-leak"),
            PatternCategory::ContextManipulation => f.write_str("context-manipulation"),
            PatternCategory::MaliciousIntent => f.write_str("malicious-intent"),
            PatternCategory::Anomaly(metric) => write!(f, "anomaly:{}", metric),
        }
    }
}

/// A text span identified as suspicious by some signal.
///
/// Offsets are byte indices into the *original* content and always fall on
/// character boundaries: `0 <= start < end <= content.len()`. Segments from
/// different signals over overlapping offsets are never merged here; the
/// scorer keeps them attributed and the sanitizer reconciles overlaps by
/// interval union.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlaggedSegment {
    /// The flagged substring, as it appears in the original content.
    pub text: String,
    /// Byte offset of the span start in the original content.
    pub start: usize,
    /// Byte offset one past the span end in the original content.
    pub end: usize,
    /// Category of the suspected payload.
    pub pattern_type: PatternCategory,
    /// Confidence in the finding, 0.0 to 1.0.
    pub confidence: f64,
    /// Human-readable justification for the flag.
    pub reason: String,
}

impl FlaggedSegment {
    /// Creates a segment covering `start..end` of `content`.
    pub fn new(
        content: &str,
        start: usize,
        end: usize,
        pattern_type: PatternCategory,
        confidence: f64,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            text: content[start..end].to_string(),
            start,
            end,
            pattern_type,
            confidence: confidence.clamp(0.0, 1.0),
            reason: reason.into(),
        }
    }

    /// Creates a segment spanning the entire content.
    pub fn whole(
        content: &str,
        pattern_type: PatternCategory,
        confidence: f64,
        reason: impl Into<String>,
    ) -> Self {
        Self::new(content, 0, content.len(), pattern_type, confidence, reason)
    }

    /// Returns true if the span lies within `content_len` with `start < end`.
    pub fn in_bounds(&self, content_len: usize) -> bool {
        self.start < self.end && self.end <= content_len
    }
}

/// Raw output of one signal's analysis: a score and zero or more segments.
#[derive(Debug, Clone, Default)]
pub struct SignalOutcome {
    /// Signal score, 0 to 100.
    pub score: f64,
    /// Flagged spans, in offset order.
    pub segments: Vec<FlaggedSegment>,
}

impl SignalOutcome {
    /// An outcome with no findings.
    pub fn clean() -> Self {
        Self::default()
    }

    /// Creates an outcome, clamping the score into [0, 100].
    pub fn new(score: f64, segments: Vec<FlaggedSegment>) -> Self {
        Self {
            score: score.clamp(0.0, 100.0),
            segments,
        }
    }
}

/// The result envelope for one signal on one request.
///
/// Produced exactly once per signal per request and never mutated. A
/// degraded call (timeout, panic, internal error) yields
/// `available == true` with a zero score; a permanently unavailable signal
/// yields `available == false`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalResult {
    /// Which signal produced this result.
    pub kind: SignalKind,
    /// Signal score, 0 to 100.
    pub score: f64,
    /// Whether the signal was available for this request.
    pub available: bool,
    /// Flagged spans reported by the signal.
    pub segments: Vec<FlaggedSegment>,
    /// Wall-clock time the signal spent analyzing.
    pub elapsed: Duration,
}

impl SignalResult {
    /// Builds a result from a successful signal outcome.
    pub fn from_outcome(kind: SignalKind, outcome: SignalOutcome, elapsed: Duration) -> Self {
        Self {
            kind,
            score: outcome.score.clamp(0.0, 100.0),
            available: true,
            segments: outcome.segments,
            elapsed,
        }
    }

    /// Builds the zero-score result for a degraded call.
    ///
    /// The signal stays available; only this call's contribution is lost.
    pub fn degraded(kind: SignalKind, elapsed: Duration) -> Self {
        Self {
            kind,
            score: 0.0,
            available: true,
            segments: Vec::new(),
            elapsed,
        }
    }

    /// Builds the placeholder result for a signal that is not available.
    pub fn unavailable(kind: SignalKind) -> Self {
        Self {
            kind,
            score: 0.0,
            available: false,
            segments: Vec::new(),
            elapsed: Duration::ZERO,
        }
    }
}
