//! Experiment runner: score a corpus against a validated experiment and
//! assemble the fitness report.
//!
//! Validation failures and gateway setup problems are fatal. Individual
//! document scoring failures are not: the runner logs them, records a
//! warning, and keeps going with whatever documents did score. Only a corpus
//! where nothing scored aborts the run.

use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::error::ValidationError;
use crate::experiment::NormalizedExperiment;
use crate::framework::NormalizedFramework;
use crate::gateway::{GatewayError, ScoringGateway};
use crate::metrics::fitness::{
    anchor_independence_index, cartographic_resolution, framework_fitness_score,
    territorial_coverage, AnchorIndependence, CartographicResolution, FitnessScore,
    TerritorialCoverage, DEFAULT_VARIANCE_THRESHOLD,
};
use crate::metrics::orthogonal::{
    axis_independence, quadrant_distribution, validate_orthogonal_design, AxisGeometry,
    AxisIndependence, OrthogonalDesign, QuadrantDistribution,
    DEFAULT_INDEPENDENCE_THRESHOLD, DEFAULT_ORTHOGONALITY_TOLERANCE,
};
use crate::prompts::{parse_scores, scoring_prompt};
use crate::registry::{validate_hybrid_architecture, HybridArchitectureReport};

// =============================================================================
// Configuration and inputs
// =============================================================================

#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub variance_threshold: f64,
    pub independence_threshold: f64,
    pub orthogonality_tolerance: f64,
    /// When set, overrides the experiment's model roster entirely.
    pub model_override: Option<String>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            variance_threshold: DEFAULT_VARIANCE_THRESHOLD,
            independence_threshold: DEFAULT_INDEPENDENCE_THRESHOLD,
            orthogonality_tolerance: DEFAULT_ORTHOGONALITY_TOLERANCE,
            model_override: None,
        }
    }
}

/// One corpus document ready for scoring.
#[derive(Debug, Clone)]
pub struct CorpusDocument {
    pub id: String,
    pub text: String,
}

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("experiment has no enabled model and no override was given")]
    NoEnabledModel,

    #[error("corpus is empty")]
    EmptyCorpus,

    #[error("no document could be scored ({attempted} attempted)")]
    NothingScored { attempted: usize },
}

// =============================================================================
// Report
// =============================================================================

/// Per-document scoring outcome: anchor scores plus axis coordinates.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentSignature {
    pub document_id: String,
    pub anchor_scores: BTreeMap<String, f64>,
    /// One coordinate per axis, in axis order: positive-pole score minus
    /// negative-pole score, so each lies in [-1, 1].
    pub coordinates: Vec<f64>,
}

/// Metrics that only exist for exactly-2-axis frameworks.
#[derive(Debug, Clone, Serialize)]
pub struct TwoAxisMetrics {
    pub axis_independence: AxisIndependence,
    pub quadrant_distribution: QuadrantDistribution,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orthogonal_design: Option<OrthogonalDesign>,
}

/// Full output of one experiment run.
#[derive(Debug, Clone, Serialize)]
pub struct ExperimentReport {
    pub experiment: String,
    pub framework: String,
    pub model: String,
    pub documents_scored: usize,
    pub documents_failed: usize,
    pub compliance: HybridArchitectureReport,
    pub signatures: Vec<DocumentSignature>,
    pub territorial_coverage: TerritorialCoverage,
    pub anchor_independence: AnchorIndependence,
    pub cartographic_resolution: CartographicResolution,
    pub fitness: FitnessScore,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub two_axis: Option<TwoAxisMetrics>,
    pub warnings: Vec<String>,
}

// =============================================================================
// Runner
// =============================================================================

pub struct ExperimentRunner<G> {
    gateway: G,
    config: RunnerConfig,
}

impl<G: ScoringGateway> ExperimentRunner<G> {
    pub fn new(gateway: G) -> Self {
        Self::with_config(gateway, RunnerConfig::default())
    }

    pub fn with_config(gateway: G, config: RunnerConfig) -> Self {
        Self { gateway, config }
    }

    /// Score the corpus and compute the full fitness report.
    pub async fn run(
        &self,
        experiment: &NormalizedExperiment,
        corpus: &[CorpusDocument],
    ) -> Result<ExperimentReport, RunnerError> {
        let model = match &self.config.model_override {
            Some(id) => id.clone(),
            None => experiment
                .primary_model()
                .map(|m| m.model_id.clone())
                .ok_or(RunnerError::NoEnabledModel)?,
        };
        if corpus.is_empty() {
            return Err(RunnerError::EmptyCorpus);
        }

        let framework = &experiment.framework;
        info!(
            target: "discernus::runner",
            experiment = %experiment.name,
            framework = %framework.name,
            model = %model,
            documents = corpus.len(),
            "starting experiment run"
        );

        let compliance = validate_hybrid_architecture(framework.raw());
        if !compliance.registry.valid || !compliance.polar.polar_constraint_satisfied {
            warn!(
                target: "discernus::runner",
                registry_valid = compliance.registry.valid,
                polar_satisfied = compliance.polar.polar_constraint_satisfied,
                "framework architecture compliance degraded"
            );
        }

        let mut warnings = Vec::new();
        let mut signatures: Vec<DocumentSignature> = Vec::new();
        let mut failed = 0usize;

        for document in corpus {
            match self.score_document(&model, framework, document, &mut warnings).await {
                Some(signature) => signatures.push(signature),
                None => failed += 1,
            }
        }

        if signatures.is_empty() {
            return Err(RunnerError::NothingScored {
                attempted: corpus.len(),
            });
        }

        // Column vectors per anchor and per axis, over scored documents.
        let mut anchor_scores: BTreeMap<String, Vec<f64>> = BTreeMap::new();
        for anchor in framework.anchors.keys() {
            let column = signatures
                .iter()
                .map(|s| s.anchor_scores.get(anchor).copied().unwrap_or(0.0))
                .collect();
            anchor_scores.insert(anchor.clone(), column);
        }
        let signature_matrix: Vec<Vec<f64>> =
            signatures.iter().map(|s| s.coordinates.clone()).collect();

        let coverage = territorial_coverage(&signature_matrix, self.config.variance_threshold);
        let independence = anchor_independence_index(&anchor_scores);
        let resolution = cartographic_resolution(&signature_matrix, None);
        let fitness = framework_fitness_score(
            coverage.territorial_coverage,
            independence.anchor_independence_index,
            resolution.cartographic_resolution,
            None,
        );

        let two_axis = if framework.axes.len() == 2 {
            Some(self.two_axis_metrics(framework, &signature_matrix, &mut warnings))
        } else {
            None
        };

        info!(
            target: "discernus::runner",
            scored = signatures.len(),
            failed,
            fitness = fitness.framework_fitness_score,
            grade = ?fitness.fitness_grade,
            "experiment run complete"
        );

        Ok(ExperimentReport {
            experiment: experiment.name.clone(),
            framework: framework.name.clone(),
            model,
            documents_scored: signatures.len(),
            documents_failed: failed,
            compliance,
            signatures,
            territorial_coverage: coverage,
            anchor_independence: independence,
            cartographic_resolution: resolution,
            fitness,
            two_axis,
            warnings,
        })
    }

    /// Score one document. Any failure is downgraded to a warning and the
    /// document is skipped.
    async fn score_document(
        &self,
        model: &str,
        framework: &NormalizedFramework,
        document: &CorpusDocument,
        warnings: &mut Vec<String>,
    ) -> Option<DocumentSignature> {
        let prompt = scoring_prompt(framework, &document.text);

        let (raw, metadata) = match self.gateway.execute_call(model, &prompt).await {
            Ok(result) => result,
            Err(err) => {
                warn!(
                    target: "discernus::runner",
                    document = %document.id,
                    code = err.code(),
                    "scoring call failed, skipping document"
                );
                warnings.push(format!("document `{}`: {err}", document.id));
                return None;
            }
        };
        if !metadata.success {
            warnings.push(format!(
                "document `{}`: gateway reported an unsuccessful call",
                document.id
            ));
            return None;
        }

        let anchor_scores = match parse_scores(&raw) {
            Ok(scores) => scores,
            Err(err) => {
                warn!(
                    target: "discernus::runner",
                    document = %document.id,
                    error = %err,
                    "unparseable scoring response, skipping document"
                );
                warnings.push(format!("document `{}`: {err}", document.id));
                return None;
            }
        };

        for anchor in framework.anchors.keys() {
            if !anchor_scores.contains_key(anchor) {
                warnings.push(format!(
                    "document `{}`: response missing anchor `{anchor}`, treated as 0.0",
                    document.id
                ));
            }
        }

        // Pole names were resolved against the anchor map at validation
        // time, so a pole the anchors loop above did not already flag is a
        // dangling registry reference. Warn rather than zero it silently.
        let mut coordinates = Vec::with_capacity(framework.axes.len());
        for axis in &framework.axes {
            let mut poles = [0.0f64; 2];
            for (slot, pole) in axis.anchor_ids.iter().enumerate() {
                match anchor_scores.get(pole) {
                    Some(score) => poles[slot] = *score,
                    None if !framework.anchors.contains_key(pole) => {
                        warnings.push(format!(
                            "document `{}`: axis `{}` pole `{pole}` resolves to no \
                             extracted anchor, treated as 0.0",
                            document.id, axis.name
                        ));
                    }
                    None => {}
                }
            }
            coordinates.push(poles[0] - poles[1]);
        }

        Some(DocumentSignature {
            document_id: document.id.clone(),
            anchor_scores,
            coordinates,
        })
    }

    fn two_axis_metrics(
        &self,
        framework: &NormalizedFramework,
        signature_matrix: &[Vec<f64>],
        warnings: &mut Vec<String>,
    ) -> TwoAxisMetrics {
        let mut axis_columns: BTreeMap<String, Vec<f64>> = BTreeMap::new();
        for (index, axis) in framework.axes.iter().enumerate() {
            axis_columns.insert(
                axis.name.clone(),
                signature_matrix.iter().map(|row| row[index]).collect(),
            );
        }

        let independence = axis_independence(&axis_columns, self.config.independence_threshold);
        let quadrants = quadrant_distribution(signature_matrix);

        // The geometric check needs declared pole angles; skip it when a
        // framework positions anchors without them.
        let geometry: Vec<AxisGeometry> = framework
            .axes
            .iter()
            .filter_map(|axis| {
                framework
                    .anchors
                    .get(&axis.anchor_ids[0])
                    .and_then(|anchor| anchor.angle)
                    .map(|angle_degrees| AxisGeometry {
                        name: axis.name.clone(),
                        angle_degrees,
                    })
            })
            .collect();
        let orthogonal_design = if geometry.len() == 2 {
            Some(validate_orthogonal_design(
                signature_matrix,
                &geometry,
                self.config.orthogonality_tolerance,
            ))
        } else {
            warn!(
                target: "discernus::runner",
                "axes lack declared angles, skipping orthogonal design check"
            );
            warnings.push("axes lack declared angles; orthogonal design check skipped".into());
            None
        };

        TwoAxisMetrics {
            axis_independence: independence,
            quadrant_distribution: quadrants,
            orthogonal_design,
        }
    }
}
