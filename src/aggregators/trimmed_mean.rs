//! Coordinate-wise trimmed mean aggregation
//!
//! Achieves Byzantine tolerance by trimming outliers per parameter coordinate.
//! Robustness is coordinate-local: an attacker that keeps every coordinate
//! inside the honest range is never trimmed, which is what the deviation
//! search in [`crate::attacks::deviation`] exploits.

use ndarray::{Array1, Array2};
use rayon::prelude::*;
use tracing::warn;

use crate::error::SiegeError;
use crate::math::nan_last_cmp;
use crate::verification::trim_condition_met;

/// Largest per-side trim that still leaves at least one value.
pub fn max_trim(n_updates: usize) -> usize {
    n_updates.saturating_sub(1) / 2
}

/// Coordinate-wise trimmed mean aggregation.
///
/// For each parameter coordinate, sorts values across all client updates,
/// drops the `k` smallest and `k` largest, then averages the rest.
///
/// # Byzantine Tolerance
///
/// Tolerates up to `k` arbitrary values per coordinate as long as more than
/// `2k` updates are honest: the output then stays inside the honest range.
///
/// # Arguments
///
/// * `updates` - Client delta updates, one row per client
/// * `k` - Values trimmed from each end. Clamped to [`max_trim`] when the
///   batch is too small, with a warning.
///
/// NaN sorts above every number regardless of sign, so NaN coordinates are
/// trimmed from the high end first.
pub fn trimmed_mean(updates: &Array2<f32>, k: usize) -> Result<Array1<f32>, SiegeError> {
    let n_clients = updates.nrows();
    if n_clients > 0 && !trim_condition_met(n_clients, k) {
        warn!(
            n_clients,
            requested = k,
            clamped = max_trim(n_clients),
            "Trim count leaves no values, clamping"
        );
    }
    trim_columns(updates, k)
}

/// [`trimmed_mean`] without the clamp warning, for repeated local simulation.
pub(crate) fn trim_columns(updates: &Array2<f32>, k: usize) -> Result<Array1<f32>, SiegeError> {
    let n_clients = updates.nrows();
    if n_clients == 0 {
        return Err(SiegeError::EmptyUpdates);
    }
    let n_trim = if trim_condition_met(n_clients, k) {
        k
    } else {
        max_trim(n_clients)
    };

    let result_vec: Vec<f32> = (0..updates.ncols())
        .into_par_iter()
        .map(|param_idx| {
            let mut values: Vec<f32> = updates.column(param_idx).to_vec();
            values.sort_by(nan_last_cmp);

            let trimmed = &values[n_trim..n_clients - n_trim];
            trimmed.iter().sum::<f32>() / trimmed.len() as f32
        })
        .collect();

    Ok(Array1::from(result_vec))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_honest_clients_only() {
        let updates = array![[1.0, 2.0], [1.0, 2.0], [1.0, 2.0]];
        let result = trimmed_mean(&updates, 1).unwrap();
        assert!((result[0] - 1.0).abs() < 1e-6);
        assert!((result[1] - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_30_percent_byzantine() {
        // 7 honest, 3 Byzantine (30%)
        let mut updates = Array2::from_elem((10, 1), 1.0f32);
        for i in 7..10 {
            updates[[i, 0]] = 100.0;
        }

        let result = trimmed_mean(&updates, 3).unwrap();

        // Should be close to honest mean (1.0), not Byzantine (100.0)
        assert!(
            (result[0] - 1.0).abs() < 0.5,
            "Expected ~1.0, got {}",
            result[0]
        );
    }

    #[test]
    fn test_empty_updates() {
        let updates = Array2::<f32>::zeros((0, 2));
        assert!(matches!(
            trimmed_mean(&updates, 1),
            Err(SiegeError::EmptyUpdates)
        ));
    }

    #[test]
    fn test_oversized_trim_is_clamped() {
        // k = 5 would remove everything; clamped to (4 - 1) / 2 = 1
        let updates = array![[1.0], [2.0], [3.0], [100.0]];
        let result = trimmed_mean(&updates, 5).unwrap();
        assert!((result[0] - 2.5).abs() < 1e-6);
    }

    #[test]
    fn test_unbounded_trim_is_clamped() {
        let updates = array![[1.0], [2.0], [3.0]];
        let result = trimmed_mean(&updates, usize::MAX).unwrap();
        assert!((result[0] - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_single_client_any_trim() {
        let updates = array![[42.0, 7.0]];
        let result = trimmed_mean(&updates, 3).unwrap();
        assert_eq!(result, array![42.0f32, 7.0]);
    }

    #[test]
    fn test_multi_coordinate() {
        let updates = array![
            [1.0, 2.0, 3.0, 4.0],
            [1.1, 2.1, 3.1, 4.1],
            [0.9, 1.9, 2.9, 3.9],
            [1.0, 2.0, 3.0, 4.0],
            [50.0, -50.0, 50.0, -50.0], // Byzantine
        ];
        let result = trimmed_mean(&updates, 1).unwrap();
        for (i, expected) in [1.0f32, 2.0, 3.0, 4.0].iter().enumerate() {
            assert!((result[i] - expected).abs() < 0.15);
        }
    }

    #[test]
    fn test_zero_trim_is_mean() {
        let updates = array![[1.0], [3.0], [5.0]];
        let result = trimmed_mean(&updates, 0).unwrap();
        assert!((result[0] - 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_nan_is_trimmed() {
        let updates = array![[1.0], [f32::NAN], [1.2], [0.8]];
        let result = trimmed_mean(&updates, 1).unwrap();
        assert!(result[0].is_finite());
        assert!((result[0] - 1.1).abs() < 1e-6);
    }

    #[test]
    fn test_negative_nan_is_trimmed_high() {
        // a sign-flipped NaN must not displace a low honest value
        let updates = array![[0.8], [-f32::NAN], [1.2], [1.0], [0.9]];
        let result = trimmed_mean(&updates, 1).unwrap();
        assert!((result[0] - (0.9 + 1.0 + 1.2) / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_max_trim() {
        assert_eq!(max_trim(0), 0);
        assert_eq!(max_trim(1), 0);
        assert_eq!(max_trim(2), 0);
        assert_eq!(max_trim(3), 1);
        assert_eq!(max_trim(10), 4);
    }
}
