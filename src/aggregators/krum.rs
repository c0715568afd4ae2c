//! Multi-Krum aggregation
//!
//! Implements Multi-Krum (Blanchard et al., 2017): every update is scored by
//! the summed squared distance to its closest neighbours, the best-scored
//! updates are kept and averaged.
//!
//! Reference: "Machine Learning with Adversaries: Byzantine Tolerant Gradient Descent"

use ndarray::{Array1, Array2, Axis};
use rayon::prelude::*;
use tracing::warn;

use crate::error::SiegeError;
use crate::math::l2_dist_sq;
use crate::verification::krum_condition_met;

/// Result of a Multi-Krum selection.
#[derive(Clone, Debug, PartialEq)]
pub struct KrumSelection {
    /// Mean of the selected updates
    pub aggregate: Array1<f32>,
    /// Selected submission indices, best score first
    pub selected: Vec<usize>,
    /// Krum score of every submission (non-finite scores are `f32::INFINITY`)
    pub scores: Vec<f32>,
}

/// Number of neighbours each score sums over: `n - f - 2`, kept in `[1, n - 1]`.
pub fn neighbour_count(n: usize, f: usize) -> usize {
    if n < 2 {
        return 0;
    }
    n.saturating_sub(f.saturating_add(2)).clamp(1, n - 1)
}

/// Number of updates Multi-Krum keeps: `n - f`, at least one.
pub fn selection_size(n: usize, f: usize) -> usize {
    n.saturating_sub(f).max(1).min(n)
}

/// Krum score of every row of `updates`.
///
/// The score of update `i` is the sum of squared Euclidean distances to its
/// [`neighbour_count`] nearest other updates.
pub fn krum_scores(updates: &Array2<f32>, f: usize) -> Vec<f32> {
    let n = updates.nrows();
    let k = neighbour_count(n, f);

    (0..n)
        .into_par_iter()
        .map(|i| {
            let row = updates.row(i);
            let mut distances: Vec<f32> = (0..n)
                .filter(|&j| j != i)
                .map(|j| {
                    let d = l2_dist_sq(row, updates.row(j));
                    if d.is_nan() {
                        f32::INFINITY
                    } else {
                        d
                    }
                })
                .collect();

            distances.sort_by(f32::total_cmp);

            let score: f32 = distances.iter().take(k).sum();
            if score.is_finite() {
                score
            } else {
                f32::INFINITY
            }
        })
        .collect()
}

/// Multi-Krum: keep the [`selection_size`] best-scored updates and average them.
///
/// # Arguments
/// * `updates` - Client delta updates, one row per client
/// * `f` - Maximum number of Byzantine (malicious) updates expected
///
/// # Selection order
/// Ascending score; equal scores keep submission order.
///
/// # Krum Condition
/// The guarantee requires `n >= 2f + 3`. If this condition is not met,
/// the selection proceeds best-effort with clamped neighbour and selection
/// counts.
pub fn multi_krum(updates: &Array2<f32>, f: usize) -> Result<KrumSelection, SiegeError> {
    let n = updates.nrows();
    if n > 0 && !krum_condition_met(n, f) {
        warn!(
            n,
            f,
            "Krum condition not met (n < 2f + 3), proceeding best-effort"
        );
    }
    select_best(updates, f)
}

/// [`multi_krum`] without the condition warning, for repeated local simulation.
pub(crate) fn select_best(updates: &Array2<f32>, f: usize) -> Result<KrumSelection, SiegeError> {
    let n = updates.nrows();
    if n == 0 {
        return Err(SiegeError::EmptyUpdates);
    }

    let scores = krum_scores(updates, f);

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));
    order.truncate(selection_size(n, f));

    let aggregate = updates
        .select(Axis(0), &order)
        .mean_axis(Axis(0))
        .ok_or(SiegeError::EmptyUpdates)?;

    Ok(KrumSelection {
        aggregate,
        selected: order,
        scores,
    })
}
