//! Framework fitness metrics over a signature matrix.
//!
//! A signature matrix has one row per analyzed document and one column per
//! axis coordinate. The three component metrics — territorial coverage,
//! anchor independence, cartographic resolution — combine into a weighted
//! composite score with a letter grade.
//!
//! Territorial coverage runs PCA on the *unweighted* matrix. The
//! framework's stated formula calls for element-wise theoretical weighting
//! before PCA; that weighting is deliberately not applied here to stay
//! compatible with prior scoring runs. See DESIGN.md.

use std::collections::BTreeMap;

use nalgebra::linalg::SymmetricEigen;
use nalgebra::DMatrix;
use serde::Serialize;
use tracing::warn;

use super::stats::{is_rectangular, pearson, silhouette};
use super::orthogonal::quadrant_of;

/// Cumulative-variance threshold used when none is specified.
pub const DEFAULT_VARIANCE_THRESHOLD: f64 = 0.95;

/// Most principal components ever considered for coverage.
const MAX_COMPONENTS: usize = 3;

/// Eigenvalues below this are treated as numerical zero.
const EIGEN_TINY: f64 = 1e-12;

// =============================================================================
// Territorial coverage
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct TerritorialCoverage {
    /// Cumulative explained variance at `components_for_threshold`, in [0,1].
    pub territorial_coverage: f64,
    pub explained_variance_ratio: Vec<f64>,
    pub cumulative_variance: Vec<f64>,
    /// First component count at which the threshold is met, or the maximum
    /// available when it never is. 0 for degenerate input.
    pub components_for_threshold: usize,
    pub warnings: Vec<String>,
}

impl TerritorialCoverage {
    fn degenerate(message: impl Into<String>) -> Self {
        let message = message.into();
        warn!(target: "discernus::metrics", "territorial coverage uncomputable: {message}");
        Self {
            territorial_coverage: 0.0,
            explained_variance_ratio: Vec::new(),
            cumulative_variance: Vec::new(),
            components_for_threshold: 0,
            warnings: vec![message],
        }
    }
}

/// PCA cumulative explained variance of the signature point cloud.
pub fn territorial_coverage(signatures: &[Vec<f64>], variance_threshold: f64) -> TerritorialCoverage {
    if signatures.len() < 2 {
        return TerritorialCoverage::degenerate(format!(
            "signature matrix has {} rows (need at least 2)",
            signatures.len()
        ));
    }
    if !is_rectangular(signatures) {
        return TerritorialCoverage::degenerate("signature matrix is ragged or has empty rows");
    }
    if !(0.0..=1.0).contains(&variance_threshold) {
        return TerritorialCoverage::degenerate(format!(
            "variance threshold {variance_threshold} outside [0, 1]"
        ));
    }

    let n = signatures.len();
    let k = signatures[0].len();

    // Column-centered data, then the k×k covariance eigendecomposition.
    let mut data = DMatrix::from_fn(n, k, |r, c| signatures[r][c]);
    for c in 0..k {
        let mean = data.column(c).sum() / n as f64;
        for r in 0..n {
            data[(r, c)] -= mean;
        }
    }
    let cov = (data.transpose() * &data) / (n as f64 - 1.0);
    let eigen = SymmetricEigen::new(cov);

    let mut eigenvalues: Vec<f64> = eigen
        .eigenvalues
        .iter()
        .map(|&v| if v > EIGEN_TINY { v } else { 0.0 })
        .collect();
    eigenvalues.sort_by(|a, b| b.total_cmp(a));

    let total: f64 = eigenvalues.iter().sum();
    if total <= EIGEN_TINY {
        return TerritorialCoverage::degenerate("signature matrix has zero total variance");
    }

    let n_components = MAX_COMPONENTS.min(k).min(n);
    let ratios: Vec<f64> = eigenvalues
        .iter()
        .take(n_components)
        .map(|v| v / total)
        .collect();

    let mut cumulative = Vec::with_capacity(ratios.len());
    let mut running = 0.0;
    for r in &ratios {
        running += r;
        cumulative.push(running.min(1.0));
    }

    let components_for_threshold = cumulative
        .iter()
        .position(|&c| c >= variance_threshold)
        .map(|i| i + 1)
        .unwrap_or(n_components);

    TerritorialCoverage {
        territorial_coverage: cumulative[components_for_threshold - 1],
        explained_variance_ratio: ratios,
        cumulative_variance: cumulative,
        components_for_threshold,
        warnings: Vec::new(),
    }
}

// =============================================================================
// Anchor independence
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct AnchorIndependence {
    /// `1 − max |off-diagonal Pearson correlation|`, in [0,1].
    pub anchor_independence_index: f64,
    pub max_correlation: f64,
    /// Full correlation matrix in `anchor_names` order. Uncomputable pairs
    /// (zero variance, length mismatch) are NaN and excluded from the max.
    pub correlation_matrix: Vec<Vec<f64>>,
    pub anchor_names: Vec<String>,
    pub method: &'static str,
    pub warnings: Vec<String>,
}

/// How decorrelated the anchor score vectors are across documents.
pub fn anchor_independence_index(anchor_scores: &BTreeMap<String, Vec<f64>>) -> AnchorIndependence {
    let anchor_names: Vec<String> = anchor_scores.keys().cloned().collect();
    let vectors: Vec<&Vec<f64>> = anchor_scores.values().collect();
    let m = vectors.len();
    let mut warnings = Vec::new();

    if m < 2 {
        warnings.push(format!(
            "{m} anchor score vector(s); independence is vacuously 1.0"
        ));
        return AnchorIndependence {
            anchor_independence_index: 1.0,
            max_correlation: 0.0,
            correlation_matrix: vec![vec![1.0; m]; m],
            anchor_names,
            method: "pearson_max_offdiag",
            warnings,
        };
    }

    let mut matrix = vec![vec![f64::NAN; m]; m];
    let mut max_abs: Option<f64> = None;
    for i in 0..m {
        matrix[i][i] = 1.0;
        for j in (i + 1)..m {
            match pearson(vectors[i], vectors[j]) {
                Some(r) => {
                    matrix[i][j] = r;
                    matrix[j][i] = r;
                    let abs = r.abs();
                    max_abs = Some(max_abs.map_or(abs, |m| m.max(abs)));
                }
                None => {
                    // Zero-variance or mismatched vectors: excluded from the
                    // max, not treated as a failure.
                    warnings.push(format!(
                        "correlation between `{}` and `{}` is uncomputable",
                        anchor_names[i], anchor_names[j]
                    ));
                }
            }
        }
    }

    let max_correlation = max_abs.unwrap_or_else(|| {
        warnings.push("no computable anchor pair; independence defaults to 1.0".into());
        0.0
    });

    AnchorIndependence {
        anchor_independence_index: (1.0 - max_correlation).clamp(0.0, 1.0),
        max_correlation,
        correlation_matrix: matrix,
        anchor_names,
        method: "pearson_max_offdiag",
        warnings,
    }
}

// =============================================================================
// Cartographic resolution
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct CartographicResolution {
    /// `max(0, silhouette)` — never reported as negative quality.
    pub cartographic_resolution: f64,
    pub silhouette_score: f64,
    pub n_clusters: usize,
    pub warnings: Vec<String>,
}

impl CartographicResolution {
    fn degenerate(message: impl Into<String>) -> Self {
        let message = message.into();
        warn!(target: "discernus::metrics", "cartographic resolution uncomputable: {message}");
        Self {
            cartographic_resolution: 0.0,
            silhouette_score: 0.0,
            n_clusters: 0,
            warnings: vec![message],
        }
    }
}

/// Silhouette-based separability of the signature point cloud.
///
/// Without explicit labels each point gets a synthetic cluster from its 2D
/// quadrant sign. That conflates resolution with quadrant separability;
/// it is kept for behavioral parity with prior scoring runs and should not
/// be read as a general clustering-quality measure.
pub fn cartographic_resolution(
    signatures: &[Vec<f64>],
    cluster_labels: Option<&[usize]>,
) -> CartographicResolution {
    if signatures.len() < 2 {
        return CartographicResolution::degenerate(format!(
            "signature matrix has {} rows (need at least 2)",
            signatures.len()
        ));
    }
    if !is_rectangular(signatures) {
        return CartographicResolution::degenerate("signature matrix is ragged or has empty rows");
    }

    let labels: Vec<usize> = match cluster_labels {
        Some(labels) => {
            if labels.len() != signatures.len() {
                return CartographicResolution::degenerate(format!(
                    "{} cluster labels for {} points",
                    labels.len(),
                    signatures.len()
                ));
            }
            labels.to_vec()
        }
        None => {
            if signatures[0].len() < 2 {
                return CartographicResolution::degenerate(
                    "synthetic quadrant labels need at least 2 columns",
                );
            }
            signatures
                .iter()
                .map(|row| quadrant_of(row[0], row[1]).index())
                .collect()
        }
    };

    let mut distinct = labels.clone();
    distinct.sort_unstable();
    distinct.dedup();
    let n_clusters = distinct.len();

    match silhouette(signatures, &labels) {
        Some(score) => CartographicResolution {
            cartographic_resolution: score.max(0.0),
            silhouette_score: score,
            n_clusters,
            warnings: Vec::new(),
        },
        None => {
            let mut result = CartographicResolution::degenerate(format!(
                "{n_clusters} distinct cluster(s); need at least 2"
            ));
            result.n_clusters = n_clusters;
            result
        }
    }
}

// =============================================================================
// Composite fitness
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FitnessGrade {
    A,
    B,
    C,
    D,
    F,
}

impl FitnessGrade {
    fn from_score(score: f64) -> Self {
        if score >= 0.90 {
            Self::A
        } else if score >= 0.80 {
            Self::B
        } else if score >= 0.70 {
            Self::C
        } else if score >= 0.60 {
            Self::D
        } else {
            Self::F
        }
    }
}

/// Component weights for the composite score. Renormalized to sum to 1.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct FitnessWeights {
    pub coverage: f64,
    pub independence: f64,
    pub resolution: f64,
}

impl Default for FitnessWeights {
    fn default() -> Self {
        Self {
            coverage: 0.35,
            independence: 0.35,
            resolution: 0.30,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ComponentScores {
    pub territorial_coverage: f64,
    pub anchor_independence: f64,
    pub cartographic_resolution: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct FitnessScore {
    pub framework_fitness_score: f64,
    pub fitness_grade: FitnessGrade,
    pub component_scores: ComponentScores,
    pub weights_used: FitnessWeights,
    pub errors: Vec<String>,
}

/// Weighted composite of the three fitness components with a letter grade.
pub fn framework_fitness_score(
    coverage: f64,
    independence: f64,
    resolution: f64,
    weights: Option<FitnessWeights>,
) -> FitnessScore {
    let mut errors = Vec::new();
    let component_scores = ComponentScores {
        territorial_coverage: coverage,
        anchor_independence: independence,
        cartographic_resolution: resolution,
    };

    for (label, value) in [
        ("territorial_coverage", coverage),
        ("anchor_independence", independence),
        ("cartographic_resolution", resolution),
    ] {
        if !value.is_finite() {
            errors.push(format!("component `{label}` is not finite"));
        }
    }
    if !errors.is_empty() {
        warn!(target: "discernus::metrics", "fitness score uncomputable: non-finite components");
        return FitnessScore {
            framework_fitness_score: 0.0,
            fitness_grade: FitnessGrade::F,
            component_scores,
            weights_used: weights.unwrap_or_default(),
            errors,
        };
    }

    let mut weights = weights.unwrap_or_default();
    let sum = weights.coverage + weights.independence + weights.resolution;
    if !sum.is_finite() || sum <= 0.0 || weights.coverage < 0.0 || weights.independence < 0.0
        || weights.resolution < 0.0
    {
        errors.push("invalid fitness weights; falling back to defaults".into());
        weights = FitnessWeights::default();
    }
    let sum = weights.coverage + weights.independence + weights.resolution;
    let weights = FitnessWeights {
        coverage: weights.coverage / sum,
        independence: weights.independence / sum,
        resolution: weights.resolution / sum,
    };

    let score = weights.coverage * coverage
        + weights.independence * independence
        + weights.resolution * resolution;

    FitnessScore {
        framework_fitness_score: score,
        fitness_grade: FitnessGrade::from_score(score),
        component_scores,
        weights_used: weights,
        errors,
    }
}
