//! # Shield Signals
//!
//! Detection signals for IPI-Shield: four independent analysis methods over
//! inbound content, plus the registry that runs them concurrently with hard
//! failure isolation.
//!
//! ## Signals
//!
//! | Signal | Mechanism | Availability |
//! |--------------|------------------------------------------|--------------|
//! | [`PatternSignal`] | regex rules over normalized text | always |
//! | [`AnomalySignal`] | entropy / encoding / character statistics| always |
//! | [`ClassifierSignal`] | bag-of-words intent classifier | optional, lazy |
//! | [`EmbeddingSignal`] | trigram-embedding nearest neighbor | optional, lazy |
//!
//! Every signal produces the same uniform record - a 0-100 score plus zero
//! or more [`FlaggedSegment`]s with byte offsets into the *original*
//! content - so aggregation downstream is signal-agnostic and new signals
//! can be added without touching the scorer.
//!
//! ## Graceful degradation
//!
//! Optional signals load their artifacts lazily, exactly once; a failed
//! load marks the signal permanently unavailable without failing any
//! request. Timeouts, panics, and internal errors degrade a single call to
//! a zero score. See [`SignalRegistry`] for the full isolation contract.
//!
//! ## References
//!
//! - Greshake et al. (2023). "Not what you've signed up for: Compromising
//!   Real-World LLM-Integrated Applications with Indirect Prompt Injection"
//! - OWASP LLM Top 10: LLM01 Prompt Injection

mod anomaly;
mod classifier;
mod embedding;
mod error;
mod models;
mod normalize;
mod pattern;
mod registry;

pub use anomaly::{shannon_entropy, AnomalySignal, MIN_ANALYSIS_LENGTH};
pub use classifier::{ClassifierArtifact, ClassifierConfig, ClassifierSignal};
pub use embedding::{embed, CorpusEntry, EmbeddingConfig, EmbeddingSignal, EMBEDDING_DIM};
pub use error::{Result, SignalError};
pub use models::{
    AnomalyMetric, FlaggedSegment, PatternCategory, SignalKind, SignalOutcome, SignalResult,
};
pub use normalize::Normalized;
pub use pattern::{PatternRuleSpec, PatternSignal};
pub use registry::{Signal, SignalRegistry};
