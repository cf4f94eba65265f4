//! Design metrics for exactly-2-axis frameworks.
//!
//! Axis independence (correlation threshold test with a p-value), quadrant
//! occupancy with a chi-square goodness-of-fit against a uniform prior, and
//! the composite orthogonal-design check (angular separation + diagonal
//! bias). Like the rest of the metrics layer these are fail-soft: bad input
//! produces a zeroed result with populated `errors`, never a panic.

use std::collections::BTreeMap;

use serde::Serialize;
use statrs::distribution::{ChiSquared, ContinuousCDF, StudentsT};
use tracing::warn;

use super::stats::pearson;

/// `|r|` below this counts as independent axes.
pub const DEFAULT_INDEPENDENCE_THRESHOLD: f64 = 0.3;

/// Angular tolerance as a fraction of 90°.
pub const DEFAULT_ORTHOGONALITY_TOLERANCE: f64 = 0.1;

/// Maximum tolerated diagonal imbalance `|p(Q1+Q3) − p(Q2+Q4)|`.
pub const DIAGONAL_BIAS_THRESHOLD: f64 = 0.4;

// =============================================================================
// Quadrants
// =============================================================================

/// Quadrant of the signature plane.
///
/// Boundary convention: points exactly on an axis belong to the positive
/// side — `(x≥0, y≥0) → Q1`, `(x<0, y≥0) → Q2`, `(x<0, y<0) → Q3`,
/// otherwise `Q4`. Preserved exactly for reproducibility of prior runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Quadrant {
    Q1,
    Q2,
    Q3,
    Q4,
}

impl Quadrant {
    pub fn index(self) -> usize {
        match self {
            Self::Q1 => 0,
            Self::Q2 => 1,
            Self::Q3 => 2,
            Self::Q4 => 3,
        }
    }

    const ALL: [Self; 4] = [Self::Q1, Self::Q2, Self::Q3, Self::Q4];
}

pub fn quadrant_of(x: f64, y: f64) -> Quadrant {
    if x >= 0.0 && y >= 0.0 {
        Quadrant::Q1
    } else if x < 0.0 && y >= 0.0 {
        Quadrant::Q2
    } else if x < 0.0 && y < 0.0 {
        Quadrant::Q3
    } else {
        Quadrant::Q4
    }
}

// =============================================================================
// Axis independence
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct AxisIndependence {
    pub axis_independence_satisfied: bool,
    pub correlation_coefficient: f64,
    pub p_value: f64,
    pub threshold: f64,
    pub errors: Vec<String>,
}

impl AxisIndependence {
    fn unsatisfied(threshold: f64, message: impl Into<String>) -> Self {
        let message = message.into();
        warn!(target: "discernus::metrics", "axis independence uncomputable: {message}");
        Self {
            axis_independence_satisfied: false,
            correlation_coefficient: 0.0,
            p_value: 1.0,
            threshold,
            errors: vec![message],
        }
    }
}

/// Pearson correlation test between the two axis coordinate vectors.
///
/// Independence holds when `|r| < threshold`. Requires exactly 2 axes and
/// at least 3 samples.
pub fn axis_independence(
    axis_scores: &BTreeMap<String, Vec<f64>>,
    threshold: f64,
) -> AxisIndependence {
    if axis_scores.len() != 2 {
        return AxisIndependence::unsatisfied(
            threshold,
            format!("need exactly 2 axes, got {}", axis_scores.len()),
        );
    }

    let mut vectors = axis_scores.values();
    let (Some(x), Some(y)) = (vectors.next(), vectors.next()) else {
        return AxisIndependence::unsatisfied(threshold, "need exactly 2 axes");
    };

    if x.len() != y.len() {
        return AxisIndependence::unsatisfied(
            threshold,
            format!("axis vectors differ in length ({} vs {})", x.len(), y.len()),
        );
    }
    let n = x.len();
    if n < 3 {
        return AxisIndependence::unsatisfied(
            threshold,
            format!("{n} samples; need at least 3"),
        );
    }

    let Some(r) = pearson(x, y) else {
        return AxisIndependence::unsatisfied(threshold, "an axis has zero variance");
    };

    AxisIndependence {
        axis_independence_satisfied: r.abs() < threshold,
        correlation_coefficient: r,
        p_value: correlation_p_value(r, n),
        threshold,
        errors: Vec::new(),
    }
}

/// Two-sided p-value for Pearson r via the t-distribution with n−2 df.
fn correlation_p_value(r: f64, n: usize) -> f64 {
    let df = (n - 2) as f64;
    let r2 = r * r;
    if r2 >= 1.0 {
        return 0.0;
    }
    let t = r.abs() * (df / (1.0 - r2)).sqrt();
    match StudentsT::new(0.0, 1.0, df) {
        Ok(dist) => (2.0 * (1.0 - dist.cdf(t))).clamp(0.0, 1.0),
        Err(_) => 1.0,
    }
}

// =============================================================================
// Quadrant distribution
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct QuadrantCell {
    pub quadrant: Quadrant,
    pub count: usize,
    pub proportion: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuadrantDistribution {
    pub quadrants: [QuadrantCell; 4],
    pub total: usize,
    pub dominant_quadrant: Option<Quadrant>,
    pub least_populated_quadrant: Option<Quadrant>,
    /// `1 − max|p − 0.25| / 0.25`; 1.0 for a perfectly uniform spread.
    pub uniformity_score: f64,
    /// Chi-square statistic against a uniform expectation, df = 3.
    pub chi_square_statistic: f64,
    pub chi_square_p_value: f64,
    pub errors: Vec<String>,
}

impl QuadrantDistribution {
    fn empty(message: impl Into<String>) -> Self {
        let message = message.into();
        warn!(target: "discernus::metrics", "quadrant distribution uncomputable: {message}");
        Self {
            quadrants: Quadrant::ALL.map(|quadrant| QuadrantCell {
                quadrant,
                count: 0,
                proportion: 0.0,
            }),
            total: 0,
            dominant_quadrant: None,
            least_populated_quadrant: None,
            uniformity_score: 0.0,
            chi_square_statistic: 0.0,
            chi_square_p_value: 1.0,
            errors: vec![message],
        }
    }
}

/// Occupancy of the four signature quadrants with a uniform-prior fit test.
pub fn quadrant_distribution(signatures: &[Vec<f64>]) -> QuadrantDistribution {
    if signatures.is_empty() {
        return QuadrantDistribution::empty("signature matrix is empty");
    }
    if signatures.iter().any(|row| row.len() < 2) {
        return QuadrantDistribution::empty("signature rows need at least 2 columns");
    }

    let mut counts = [0usize; 4];
    for row in signatures {
        counts[quadrant_of(row[0], row[1]).index()] += 1;
    }
    let total = signatures.len();
    let proportions = counts.map(|c| c as f64 / total as f64);

    let dominant = Quadrant::ALL[argmax(&counts)];
    let least = Quadrant::ALL[argmin(&counts)];

    let max_deviation = proportions
        .iter()
        .map(|p| (p - 0.25).abs())
        .fold(0.0, f64::max);
    let uniformity_score = 1.0 - max_deviation / 0.25;

    let expected = total as f64 / 4.0;
    let chi_square_statistic: f64 = counts
        .iter()
        .map(|&c| {
            let d = c as f64 - expected;
            d * d / expected
        })
        .sum();
    let chi_square_p_value = match ChiSquared::new(3.0) {
        Ok(dist) => (1.0 - dist.cdf(chi_square_statistic)).clamp(0.0, 1.0),
        Err(_) => 1.0,
    };

    let mut cells = Quadrant::ALL
        .iter()
        .map(|&quadrant| QuadrantCell {
            quadrant,
            count: counts[quadrant.index()],
            proportion: proportions[quadrant.index()],
        })
        .collect::<Vec<_>>();
    let quadrants: [QuadrantCell; 4] = [
        cells.remove(0),
        cells.remove(0),
        cells.remove(0),
        cells.remove(0),
    ];

    QuadrantDistribution {
        quadrants,
        total,
        dominant_quadrant: Some(dominant),
        least_populated_quadrant: Some(least),
        uniformity_score,
        chi_square_statistic,
        chi_square_p_value,
        errors: Vec::new(),
    }
}

fn argmax(counts: &[usize; 4]) -> usize {
    let mut best = 0;
    for i in 1..4 {
        if counts[i] > counts[best] {
            best = i;
        }
    }
    best
}

fn argmin(counts: &[usize; 4]) -> usize {
    let mut best = 0;
    for i in 1..4 {
        if counts[i] < counts[best] {
            best = i;
        }
    }
    best
}

// =============================================================================
// Orthogonal design
// =============================================================================

/// Declared geometry of one axis: the angular direction of its positive pole.
#[derive(Debug, Clone, Serialize)]
pub struct AxisGeometry {
    pub name: String,
    pub angle_degrees: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrthogonalDesign {
    pub orthogonal_design_valid: bool,
    /// Separation between the two axis directions, degrees in [0, 180].
    pub angular_separation: f64,
    pub separation_satisfied: bool,
    /// `|p(Q1+Q3) − p(Q2+Q4)|`.
    pub diagonal_bias: f64,
    pub diagonal_bias_satisfied: bool,
    pub bias_threshold: f64,
    pub quadrants: QuadrantDistribution,
    pub errors: Vec<String>,
}

/// Check that the two axes are geometrically near-orthogonal and that the
/// signature mass is not concentrated on one diagonal quadrant pairing.
pub fn validate_orthogonal_design(
    signatures: &[Vec<f64>],
    axis_configs: &[AxisGeometry],
    tolerance: f64,
) -> OrthogonalDesign {
    let quadrants = quadrant_distribution(signatures);
    let mut errors = Vec::new();

    let (angular_separation, separation_satisfied) = if axis_configs.len() != 2 {
        errors.push(format!(
            "need exactly 2 axis geometries, got {}",
            axis_configs.len()
        ));
        (0.0, false)
    } else {
        let raw = (axis_configs[0].angle_degrees - axis_configs[1].angle_degrees)
            .abs()
            .rem_euclid(360.0);
        let separation = if raw > 180.0 { 360.0 - raw } else { raw };
        let satisfied = (separation - 90.0).abs() <= tolerance * 90.0;
        (separation, satisfied)
    };

    let (diagonal_bias, diagonal_bias_satisfied) = if quadrants.total == 0 {
        errors.push("diagonal bias uncomputable without signatures".into());
        (0.0, false)
    } else {
        let p = &quadrants.quadrants;
        let bias = ((p[0].proportion + p[2].proportion) - (p[1].proportion + p[3].proportion))
            .abs();
        (bias, bias <= DIAGONAL_BIAS_THRESHOLD)
    };

    if !errors.is_empty() {
        warn!(target: "discernus::metrics", "orthogonal design check degraded: {errors:?}");
    }

    OrthogonalDesign {
        orthogonal_design_valid: separation_satisfied && diagonal_bias_satisfied,
        angular_separation,
        separation_satisfied,
        diagonal_bias,
        diagonal_bias_satisfied,
        bias_threshold: DIAGONAL_BIAS_THRESHOLD,
        quadrants,
        errors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundary_points_go_to_the_positive_side() {
        assert_eq!(quadrant_of(0.0, 0.0), Quadrant::Q1);
        assert_eq!(quadrant_of(0.0, -0.1), Quadrant::Q4);
        assert_eq!(quadrant_of(-0.1, 0.0), Quadrant::Q2);
        assert_eq!(quadrant_of(-0.1, -0.1), Quadrant::Q3);
    }

    #[test]
    fn uniform_four_corner_spread() {
        let signatures = vec![
            vec![1.0, 1.0],
            vec![-1.0, 1.0],
            vec![-1.0, -1.0],
            vec![1.0, -1.0],
        ];
        let dist = quadrant_distribution(&signatures);
        for cell in &dist.quadrants {
            assert_eq!(cell.count, 1);
            assert!((cell.proportion - 0.25).abs() < 1e-12);
        }
        assert!((dist.uniformity_score - 1.0).abs() < 1e-12);
        assert!(dist.chi_square_statistic.abs() < 1e-12);
        assert!(dist.chi_square_p_value > 0.99);
    }

    #[test]
    fn counts_always_sum_to_total() {
        let signatures = vec![
            vec![0.3, 0.1],
            vec![0.0, 0.0],
            vec![-2.0, 5.0],
            vec![-1.0, -1.0],
            vec![4.0, -0.5],
            vec![0.2, 0.9],
            vec![-0.1, 0.0],
        ];
        let dist = quadrant_distribution(&signatures);
        let count_sum: usize = dist.quadrants.iter().map(|c| c.count).sum();
        let prop_sum: f64 = dist.quadrants.iter().map(|c| c.proportion).sum();
        assert_eq!(count_sum, signatures.len());
        assert!((prop_sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn concentrated_spread_has_low_p_value() {
        let signatures: Vec<Vec<f64>> = (0..40).map(|i| vec![1.0 + i as f64, 1.0]).collect();
        let dist = quadrant_distribution(&signatures);
        assert_eq!(dist.dominant_quadrant, Some(Quadrant::Q1));
        assert!(dist.chi_square_p_value < 1e-6);
        assert!(dist.uniformity_score < 0.0); // deviation beyond 0.25 goes negative
    }

    #[test]
    fn empty_matrix_fails_soft() {
        let dist = quadrant_distribution(&[]);
        assert_eq!(dist.total, 0);
        assert!(dist.dominant_quadrant.is_none());
        assert!(!dist.errors.is_empty());
    }

    #[test]
    fn independent_axes_pass_the_threshold_test() {
        let mut scores = BTreeMap::new();
        scores.insert("x".to_string(), vec![1.0, -1.0, 1.0, -1.0, 1.0, -1.0]);
        scores.insert("y".to_string(), vec![1.0, 1.0, -1.0, -1.0, 1.0, 1.0]);
        let result = axis_independence(&scores, DEFAULT_INDEPENDENCE_THRESHOLD);
        assert!(result.axis_independence_satisfied);
        assert!(result.correlation_coefficient.abs() < 0.3);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn correlated_axes_fail_with_small_p() {
        let mut scores = BTreeMap::new();
        scores.insert("x".to_string(), (0..12).map(f64::from).collect::<Vec<_>>());
        scores.insert(
            "y".to_string(),
            (0..12).map(|i| 2.0 * f64::from(i) + 0.5).collect::<Vec<_>>(),
        );
        let result = axis_independence(&scores, DEFAULT_INDEPENDENCE_THRESHOLD);
        assert!(!result.axis_independence_satisfied);
        assert!((result.correlation_coefficient - 1.0).abs() < 1e-9);
        assert!(result.p_value < 1e-9);
    }

    #[test]
    fn too_few_samples_reports_error() {
        let mut scores = BTreeMap::new();
        scores.insert("x".to_string(), vec![1.0, 2.0]);
        scores.insert("y".to_string(), vec![2.0, 1.0]);
        let result = axis_independence(&scores, 0.3);
        assert!(!result.axis_independence_satisfied);
        assert!(result.errors[0].contains("at least 3"));
    }

    #[test]
    fn wrong_axis_count_reports_error() {
        let mut scores = BTreeMap::new();
        scores.insert("only".to_string(), vec![1.0, 2.0, 3.0]);
        let result = axis_independence(&scores, 0.3);
        assert!(!result.axis_independence_satisfied);
        assert!(result.errors[0].contains("exactly 2"));
    }

    #[test]
    fn orthogonal_design_accepts_perpendicular_axes() {
        let signatures = vec![
            vec![1.0, 1.0],
            vec![-1.0, 1.0],
            vec![-1.0, -1.0],
            vec![1.0, -1.0],
        ];
        let configs = vec![
            AxisGeometry { name: "x".into(), angle_degrees: 0.0 },
            AxisGeometry { name: "y".into(), angle_degrees: 90.0 },
        ];
        let result =
            validate_orthogonal_design(&signatures, &configs, DEFAULT_ORTHOGONALITY_TOLERANCE);
        assert!(result.orthogonal_design_valid);
        assert!((result.angular_separation - 90.0).abs() < 1e-12);
        assert!(result.diagonal_bias < 1e-12);
    }

    #[test]
    fn skewed_axes_fail_separation() {
        let signatures = vec![vec![1.0, 1.0], vec![-1.0, -1.0]];
        let configs = vec![
            AxisGeometry { name: "x".into(), angle_degrees: 0.0 },
            AxisGeometry { name: "y".into(), angle_degrees: 40.0 },
        ];
        let result = validate_orthogonal_design(&signatures, &configs, 0.1);
        assert!(!result.separation_satisfied);
        assert!(!result.orthogonal_design_valid);
    }

    #[test]
    fn diagonal_concentration_fails_bias() {
        // All mass on the Q1/Q3 diagonal.
        let signatures = vec![
            vec![1.0, 1.0],
            vec![2.0, 2.0],
            vec![-1.0, -1.0],
            vec![-2.0, -2.0],
        ];
        let configs = vec![
            AxisGeometry { name: "x".into(), angle_degrees: 0.0 },
            AxisGeometry { name: "y".into(), angle_degrees: 90.0 },
        ];
        let result = validate_orthogonal_design(&signatures, &configs, 0.1);
        assert!(result.separation_satisfied);
        assert!((result.diagonal_bias - 1.0).abs() < 1e-12);
        assert!(!result.diagonal_bias_satisfied);
        assert!(!result.orthogonal_design_valid);
    }

    #[test]
    fn reflex_angles_normalize_to_acute_separation() {
        let configs = vec![
            AxisGeometry { name: "x".into(), angle_degrees: 350.0 },
            AxisGeometry { name: "y".into(), angle_degrees: 80.0 },
        ];
        let signatures = vec![
            vec![1.0, 1.0],
            vec![-1.0, 1.0],
            vec![-1.0, -1.0],
            vec![1.0, -1.0],
        ];
        let result = validate_orthogonal_design(&signatures, &configs, 0.1);
        assert!((result.angular_separation - 90.0).abs() < 1e-9);
        assert!(result.separation_satisfied);
    }
}
