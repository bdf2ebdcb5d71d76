//! Error types for detection signals.

use thiserror::Error;

/// Errors produced while building or running a detection signal.
///
/// Signal *degradation* (a timeout, an unavailable optional model) is not an
/// error; these variants cover genuine failures. The registry converts any
/// error returned by a signal into a degraded, zero-score result so that one
/// signal's failure can never abort another's.
#[derive(Debug, Error)]
pub enum SignalError {
    /// A configured pattern rule failed to compile.
    ///
    /// Raised at construction time, not during analysis. A malformed rule
    /// table must prevent the pipeline from serving requests.
    #[error("invalid pattern rule '{pattern}': {source}")]
    InvalidRule {
        /// The offending regex source.
        pattern: String,
        /// The underlying compile error.
        source: regex::Error,
    },

    /// The classifier model artifact could not be loaded or used.
    #[error("classifier artifact error: {0}")]
    Artifact(String),

    /// The embedding attack corpus could not be loaded or parsed.
    #[error("embedding corpus error: {0}")]
    Corpus(String),

    /// Unexpected failure inside a signal's analysis routine.
    #[error("signal analysis failed: {0}")]
    Analysis(String),
}

/// Result alias for signal operations.
pub type Result<T> = std::result::Result<T, SignalError>;
