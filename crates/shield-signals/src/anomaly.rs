//! # Anomaly Signal
//!
//! Statistical analysis of the character-level shape of the content. Where
//! the pattern signal knows specific attack phrasings, this signal catches
//! payloads that *look wrong*: GCG-style adversarial gibberish, smuggled
//! base64 blobs, zero-width stuffing, and stacked imperative directives.
//!
//! ## Sub-metrics
//!
//! | Sub-metric | Measures | Weight |
//! |--------------|----------------------------------------------|--------|
//! | entropy | Shannon entropy, bits per character | 0.35 |
//! | encoded | fraction of text inside encoded-looking runs | 0.25 |
//! | nonprintable | control + zero-width character ratio | 0.20 |
//! | imperative | instruction-like sentence-start repetition | 0.20 |
//!
//! Each sub-metric passes through its own linear threshold curve into
//! [0, 100]; the signal score is the fixed-weight average of the four.
//! Segments are emitted only for sub-metrics that individually exceed
//! their flag threshold, tagged `anomaly:<submetric>`.
//!
//! ## Entropy benchmarks
//!
//! | Content type | Typical entropy (bits/char) |
//! |-----------------|-----------------------------|
//! | English prose | 3.5 - 4.2 |
//! | Source code | 4.2 - 4.8 |
//! | GCG suffixes | 5.0 - 6.0 |
//! | Base64 data | 5.9 - 6.0 |
//!
//! ## References
//!
//! - Shannon, C.E. (1948). "A Mathematical Theory of Communication"
//! - Zou et al. (2023). "Universal and Transferable Adversarial Attacks on
//!   Aligned Language Models" <https://arxiv.org/abs/2307.15043>

use std::collections::HashMap;

use regex::Regex;

use crate::error::Result;
use crate::models::{AnomalyMetric, FlaggedSegment, PatternCategory, SignalKind, SignalOutcome};
use crate::registry::Signal;

/// Minimum content length (chars) for anomaly analysis.
///
/// Shorter strings do not carry enough samples for a meaningful entropy or
/// ratio estimate; they score 0 across all sub-metrics.
pub const MIN_ANALYSIS_LENGTH: usize = 10;

/// Entropy below this scores 0; sits above the source-code range in the
/// benchmarks table so ordinary prose and code never register.
pub const ENTROPY_CURVE_LOW: f64 = 4.8;
/// Entropy at or above this scores 100.
pub const ENTROPY_CURVE_HIGH: f64 = 6.0;

/// Encoded-run coverage ratio mapped linearly between these bounds.
pub const ENCODED_CURVE_LOW: f64 = 0.15;
pub const ENCODED_CURVE_HIGH: f64 = 0.60;

/// Non-printable character ratio mapped linearly between these bounds.
pub const NONPRINTABLE_CURVE_LOW: f64 = 0.01;
pub const NONPRINTABLE_CURVE_HIGH: f64 = 0.10;

/// Imperative sentence-start ratio mapped linearly between these bounds.
pub const IMPERATIVE_CURVE_LOW: f64 = 0.30;
pub const IMPERATIVE_CURVE_HIGH: f64 = 0.90;

/// Fixed sub-metric weights; must sum to 1.0.
pub const ENTROPY_WEIGHT: f64 = 0.35;
pub const ENCODED_WEIGHT: f64 = 0.25;
pub const NONPRINTABLE_WEIGHT: f64 = 0.20;
pub const IMPERATIVE_WEIGHT: f64 = 0.20;

/// Per-sub-metric flag thresholds: a segment is emitted only when the
/// sub-metric's own score reaches this value.
pub const ENTROPY_FLAG_THRESHOLD: f64 = 60.0;
pub const ENCODED_FLAG_THRESHOLD: f64 = 50.0;
pub const NONPRINTABLE_FLAG_THRESHOLD: f64 = 50.0;
pub const IMPERATIVE_FLAG_THRESHOLD: f64 = 60.0;

/// Sentence starts treated as instruction-like imperatives.
const IMPERATIVE_VERBS: &[&str] = &[
    "ignore",
    "disregard",
    "forget",
    "override",
    "execute",
    "run",
    "send",
    "print",
    "repeat",
    "reveal",
    "show",
    "pretend",
    "act",
    "bypass",
    "delete",
    "output",
    "respond",
    "obey",
];

/// Maps `value` linearly onto [0, 100] between `low` and `high`.
fn linear_curve(value: f64, low: f64, high: f64) -> f64 {
    if value <= low {
        0.0
    } else if value >= high {
        100.0
    } else {
        (value - low) / (high - low) * 100.0
    }
}

/// Shannon entropy of the character distribution, in bits per character.
pub fn shannon_entropy(text: &str) -> f64 {
    if text.is_empty() {
        return 0.0;
    }
    let mut freq: HashMap<char, usize> = HashMap::new();
    let mut total = 0usize;
    for c in text.chars() {
        *freq.entry(c).or_insert(0) += 1;
        total += 1;
    }
    let total = total as f64;
    freq.values().fold(0.0, |entropy, &count| {
        let p = count as f64 / total;
        entropy - p * p.log2()
    })
}

/// The statistical anomaly signal. Always available.
pub struct AnomalySignal {
    base64_run: Regex,
    percent_run: Regex,
    hex_run: Regex,
}

impl AnomalySignal {
    /// Creates the signal with its compiled run detectors.
    pub fn new() -> Self {
        Self {
            // Long unbroken base64 alphabet runs, optionally padded.
            base64_run: Regex::new(r"[A-Za-z0-9+/]{24,}={0,2}").unwrap(),
            // Four or more consecutive percent-encoded bytes.
            percent_run: Regex::new(r"(?:%[0-9A-Fa-f]{2}){4,}").unwrap(),
            // Long bare hex runs (hashes, shellcode-style payloads).
            hex_run: Regex::new(r"\b[0-9a-fA-F]{32,}\b").unwrap(),
        }
    }

    /// Byte ranges of encoded-looking runs.
    fn encoded_runs(&self, text: &str) -> Vec<(usize, usize)> {
        let mut runs: Vec<(usize, usize)> = Vec::new();
        for regex in [&self.base64_run, &self.percent_run, &self.hex_run] {
            for m in regex.find_iter(text) {
                runs.push((m.start(), m.end()));
            }
        }
        runs.sort_unstable();
        // Overlaps between the run detectors collapse so coverage is not
        // double-counted.
        let mut merged: Vec<(usize, usize)> = Vec::with_capacity(runs.len());
        for (start, end) in runs {
            match merged.last_mut() {
                Some((_, last_end)) if start <= *last_end => *last_end = (*last_end).max(end),
                _ => merged.push((start, end)),
            }
        }
        merged
    }

    /// Ratio of control and zero-width characters, excluding ordinary
    /// line/tab whitespace.
    fn nonprintable_ratio(text: &str) -> f64 {
        let mut suspicious = 0usize;
        let mut total = 0usize;
        for c in text.chars() {
            total += 1;
            let unusual = (c.is_control() && !matches!(c, '\n' | '\r' | '\t'))
                || matches!(
                    c,
                    '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{FEFF}' | '\u{2060}' | '\u{00AD}'
                );
            if unusual {
                suspicious += 1;
            }
        }
        if total == 0 {
            0.0
        } else {
            suspicious as f64 / total as f64
        }
    }

    /// Ratio of sentences starting with an imperative directive.
    ///
    /// Requires at least two sentences and two imperative starts before it
    /// reports anything; a single "Ignore..." sentence is the pattern
    /// signal's job.
    fn imperative_ratio(text: &str) -> f64 {
        let sentences: Vec<&str> = text
            .split(['.', '!', '?', ';', '\n'])
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        if sentences.len() < 2 {
            return 0.0;
        }
        let imperative = sentences
            .iter()
            .filter(|s| {
                s.split_whitespace()
                    .next()
                    .map(|w| {
                        let w = w
                            .trim_matches(|c: char| !c.is_alphanumeric())
                            .to_lowercase();
                        IMPERATIVE_VERBS.contains(&w.as_str())
                    })
                    .unwrap_or(false)
            })
            .count();
        if imperative < 2 {
            return 0.0;
        }
        imperative as f64 / sentences.len() as f64
    }
}

impl Default for AnomalySignal {
    fn default() -> Self {
        Self::new()
    }
}

impl Signal for AnomalySignal {
    fn kind(&self) -> SignalKind {
        SignalKind::Anomaly
    }

    fn analyze(&self, content: &str) -> Result<SignalOutcome> {
        if content.chars().count() < MIN_ANALYSIS_LENGTH {
            return Ok(SignalOutcome::clean());
        }

        let entropy_score = linear_curve(
            shannon_entropy(content),
            ENTROPY_CURVE_LOW,
            ENTROPY_CURVE_HIGH,
        );

        let runs = self.encoded_runs(content);
        let covered: usize = runs.iter().map(|(s, e)| e - s).sum();
        let encoded_score = linear_curve(
            covered as f64 / content.len() as f64,
            ENCODED_CURVE_LOW,
            ENCODED_CURVE_HIGH,
        );

        let nonprintable_score = linear_curve(
            Self::nonprintable_ratio(content),
            NONPRINTABLE_CURVE_LOW,
            NONPRINTABLE_CURVE_HIGH,
        );

        let imperative_score = linear_curve(
            Self::imperative_ratio(content),
            IMPERATIVE_CURVE_LOW,
            IMPERATIVE_CURVE_HIGH,
        );

        let score = entropy_score * ENTROPY_WEIGHT
            + encoded_score * ENCODED_WEIGHT
            + nonprintable_score * NONPRINTABLE_WEIGHT
            + imperative_score * IMPERATIVE_WEIGHT;

        let mut segments = Vec::new();
        if entropy_score >= ENTROPY_FLAG_THRESHOLD {
            segments.push(FlaggedSegment::whole(
                content,
                PatternCategory::Anomaly(AnomalyMetric::Entropy),
                entropy_score / 100.0,
                format!(
                    "Character entropy {:.2} bits/char exceeds natural-language range",
                    shannon_entropy(content)
                ),
            ));
        }
        if encoded_score >= ENCODED_FLAG_THRESHOLD {
            for (start, end) in &runs {
                segments.push(FlaggedSegment::new(
                    content,
                    *start,
                    *end,
                    PatternCategory::Anomaly(AnomalyMetric::Encoded),
                    encoded_score / 100.0,
                    "Encoded-looking run (base64/percent/hex)",
                ));
            }
        }
        if nonprintable_score >= NONPRINTABLE_FLAG_THRESHOLD {
            segments.push(FlaggedSegment::whole(
                content,
                PatternCategory::Anomaly(AnomalyMetric::Nonprintable),
                nonprintable_score / 100.0,
                "Unusual density of non-printable or zero-width characters",
            ));
        }
        if imperative_score >= IMPERATIVE_FLAG_THRESHOLD {
            segments.push(FlaggedSegment::whole(
                content,
                PatternCategory::Anomaly(AnomalyMetric::Imperative),
                imperative_score / 100.0,
                "Repeated imperative, instruction-like sentence starts",
            ));
        }

        Ok(SignalOutcome::new(score, segments))
    }
}
