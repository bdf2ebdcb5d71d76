//! # Shield Facade
//!
//! The single entry point callers interact with. A [`Shield`] owns the
//! signal registry and the composite scorer; `analyze` produces a verdict,
//! `sanitize` rewrites content according to a [`SanitizationMode`] and
//! verifies the rewrite with a second analysis pass.
//!
//! ## Degradation Contract
//!
//! Individual signal failures (timeout, panic, analysis error, missing
//! model) never fail a request; the affected signal scores as degraded and
//! the composite renormalizes over what remains. The only fatal errors are
//! caller mistakes (empty or oversized content), invalid configuration,
//! and corrupt span offsets during sanitization.

use std::sync::Arc;
use std::time::Duration;

use shield_signals::{
    AnomalySignal, ClassifierSignal, EmbeddingSignal, PatternSignal, SignalKind, SignalRegistry,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::ShieldConfig;
use crate::error::{Result, ShieldError};
use crate::request::{AnalysisReport, AnalysisRequest, ContentType};
use crate::sanitize::{rewrite_filtered, SanitizationMode, SanitizationResult, BLOCK_MARKER};
use crate::score::CompositeScorer;

/// Content-inspection middleware between an application and its model.
pub struct Shield {
    config: ShieldConfig,
    registry: SignalRegistry,
    scorer: CompositeScorer,
}

impl Shield {
    /// Builds a shield from a validated configuration.
    ///
    /// Pattern and anomaly signals are always registered. Classifier and
    /// embedding signals are registered when enabled; their model data
    /// loads lazily on first use, so a missing artifact surfaces as a
    /// degraded signal rather than a construction error.
    pub fn new(config: ShieldConfig) -> Result<Self> {
        config.validate()?;

        let mut registry = SignalRegistry::new(Duration::from_millis(config.signal_timeout_ms));

        let pattern = match &config.pattern_rules {
            Some(rules) => PatternSignal::from_specs(rules)?,
            None => PatternSignal::new(),
        };
        registry.register(Arc::new(pattern));
        registry.register(Arc::new(AnomalySignal::new()));
        if config.classifier.enabled {
            registry.register(Arc::new(ClassifierSignal::new(config.classifier.clone())));
        }
        if config.embedding.enabled {
            registry.register(Arc::new(EmbeddingSignal::new(config.embedding.clone())));
        }

        let scorer = CompositeScorer::new(config.weights, config.thresholds);
        info!(signals = registry.len(), "shield initialized");

        Ok(Self {
            config,
            registry,
            scorer,
        })
    }

    /// Builds a shield with default configuration.
    pub fn with_defaults() -> Result<Self> {
        Self::new(ShieldConfig::default())
    }

    pub fn config(&self) -> &ShieldConfig {
        &self.config
    }

    /// Kinds of signals that are currently able to analyze content.
    pub fn available_signals(&self) -> Vec<SignalKind> {
        self.registry.available_kinds()
    }

    /// Runs every registered signal against the request and aggregates
    /// the results into one verdict.
    pub async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisReport> {
        if request.content.trim().is_empty() {
            return Err(ShieldError::InvalidInput(
                "content must not be empty".into(),
            ));
        }
        if request.content.len() > self.config.max_content_bytes {
            return Err(ShieldError::InvalidInput(format!(
                "content is {} bytes, limit is {}",
                request.content.len(),
                self.config.max_content_bytes
            )));
        }

        let request_id = Uuid::new_v4();
        debug!(
            %request_id,
            content_type = %request.content_type,
            source = request.options.source_label.as_deref().unwrap_or("-"),
            bytes = request.content.len(),
            "analysis started"
        );

        let signals = self.registry.run(&request.content).await;
        let score = self.scorer.aggregate(&signals);

        info!(
            %request_id,
            injection_score = score.injection_score,
            risk = %score.risk_category,
            action = ?score.recommended_action,
            "analysis complete"
        );

        Ok(AnalysisReport {
            request_id,
            score,
            signals,
        })
    }

    /// Analyzes `content`, rewrites it per `mode`, and re-analyzes the
    /// rewritten text so the post score reflects what the model would
    /// actually receive.
    pub async fn sanitize(
        &self,
        content: &str,
        content_type: ContentType,
        mode: SanitizationMode,
    ) -> Result<SanitizationResult> {
        let request = AnalysisRequest::new(content, content_type);
        let report = self.analyze(&request).await?;
        let original_risk_score = report.score.injection_score;

        let mut warnings = Vec::new();
        let (sanitized_content, segments_modified) = match mode {
            SanitizationMode::Permissive => {
                if original_risk_score > 0.0 {
                    warnings.push(format!(
                        "permissive mode: content passed through with injection score {original_risk_score}"
                    ));
                }
                (content.to_string(), 0)
            }
            // Blocking withholds the content wholesale; no individual
            // spans were substituted, so the count stays zero.
            SanitizationMode::Strict if report.score.recommended_action.is_block() => {
                (BLOCK_MARKER.to_string(), 0)
            }
            SanitizationMode::Strict | SanitizationMode::Balanced => {
                let segments: Vec<_> = report.flagged_segments().map(|(_, s)| s).collect();
                rewrite_filtered(content, &segments)?
            }
        };

        // The rewrite must stand on its own merits: measure the output,
        // never assume placeholders scored it to zero.
        let post_request = AnalysisRequest::new(sanitized_content.clone(), content_type);
        let post_report = self.analyze(&post_request).await?;
        let post_sanitization_risk_score = post_report.score.injection_score;

        if mode != SanitizationMode::Permissive && post_sanitization_risk_score > 0.0 {
            warnings.push(format!(
                "residual injection score {post_sanitization_risk_score} after sanitization"
            ));
            warn!(
                mode = %mode,
                post_score = post_sanitization_risk_score,
                "sanitized content still scores above zero"
            );
        }

        info!(
            mode = %mode,
            segments_modified,
            original = original_risk_score,
            post = post_sanitization_risk_score,
            "sanitization complete"
        );

        Ok(SanitizationResult {
            mode,
            sanitized_content,
            segments_modified,
            original_risk_score,
            post_sanitization_risk_score,
            warnings,
        })
    }
}
