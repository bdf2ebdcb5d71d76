//! Error taxonomy for the shield pipeline.
//!
//! Only four things can actually fail a request; everything else degrades:
//!
//! - **Input validation** - rejected before the pipeline runs, distinct
//!   from scoring.
//! - **Sanitizer failure** - fatal: silently passing unsanitized content is
//!   not acceptable.
//! - **Configuration failure** - fatal at initialization; a pipeline with
//!   undefined weights must not serve requests.
//! - **Signal construction failure** - a malformed rule table surfaces at
//!   `Shield::new`, never mid-request.
//!
//! Signal *degradation* (unavailable optional detector, timeout) is not an
//! error and never appears here.

use thiserror::Error;

/// Core error type for shield operations.
#[derive(Debug, Error)]
pub enum ShieldError {
    /// The request was rejected before entering the pipeline.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The sanitization engine itself failed.
    ///
    /// Fatal for the request: the caller must never receive unsanitized
    /// content presented as sanitized.
    #[error("sanitizer failure: {0}")]
    Sanitizer(String),

    /// Configuration was rejected at initialization.
    #[error("configuration error: {0}")]
    Config(String),

    /// Signal construction error passthrough.
    #[error("signal error: {0}")]
    Signal(#[from] shield_signals::SignalError),
}

/// Core result type for shield operations.
pub type Result<T> = std::result::Result<T, ShieldError>;
