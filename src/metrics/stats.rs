//! Shared statistical helpers for the metrics layer.
//!
//! Degenerate input (too few samples, zero variance, length mismatch)
//! yields `None` rather than NaN so callers can decide how to report it.

/// Pearson correlation coefficient. `None` when fewer than 2 samples, the
/// lengths differ, or either vector has zero variance.
pub(crate) fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    let n = x.len();
    if n != y.len() || n < 2 {
        return None;
    }

    let mean_x = x.iter().sum::<f64>() / n as f64;
    let mean_y = y.iter().sum::<f64>() / n as f64;

    let mut num = 0.0;
    let mut den_x = 0.0;
    let mut den_y = 0.0;
    for i in 0..n {
        let dx = x[i] - mean_x;
        let dy = y[i] - mean_y;
        num += dx * dy;
        den_x += dx * dx;
        den_y += dy * dy;
    }

    if den_x == 0.0 || den_y == 0.0 {
        return None;
    }
    let r = num / (den_x.sqrt() * den_y.sqrt());
    r.is_finite().then_some(r.clamp(-1.0, 1.0))
}

/// Mean silhouette score over labelled points (euclidean distance).
///
/// `None` when there are fewer than 2 points or fewer than 2 distinct
/// labels. Points in singleton clusters contribute 0, matching the usual
/// convention.
pub(crate) fn silhouette(points: &[Vec<f64>], labels: &[usize]) -> Option<f64> {
    let n = points.len();
    if n < 2 || labels.len() != n {
        return None;
    }

    let mut clusters: Vec<usize> = labels.to_vec();
    clusters.sort_unstable();
    clusters.dedup();
    if clusters.len() < 2 {
        return None;
    }

    let mut total = 0.0;
    for i in 0..n {
        let own = labels[i];
        let own_size = labels.iter().filter(|&&l| l == own).count();
        if own_size == 1 {
            continue; // s(i) = 0 for singleton clusters
        }

        let mut intra = 0.0;
        for j in 0..n {
            if j != i && labels[j] == own {
                intra += euclidean(&points[i], &points[j]);
            }
        }
        let a = intra / (own_size - 1) as f64;

        let mut b = f64::INFINITY;
        for &other in &clusters {
            if other == own {
                continue;
            }
            let mut dist = 0.0;
            let mut count = 0usize;
            for j in 0..n {
                if labels[j] == other {
                    dist += euclidean(&points[i], &points[j]);
                    count += 1;
                }
            }
            if count > 0 {
                b = b.min(dist / count as f64);
            }
        }

        let denom = a.max(b);
        if denom > 0.0 && b.is_finite() {
            total += (b - a) / denom;
        }
    }

    Some(total / n as f64)
}

fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

/// True when every row has the same, non-zero width.
pub(crate) fn is_rectangular(rows: &[Vec<f64>]) -> bool {
    match rows.first() {
        Some(first) if !first.is_empty() => rows.iter().all(|r| r.len() == first.len()),
        _ => false,
    }
}
