//! FedAvg baseline aggregation (no Byzantine tolerance)
//!
//! Standard federated averaging as described by McMahan et al. (2017).
//! Vulnerable to even a single Byzantine client. Included as a baseline
//! for comparison against Byzantine-tolerant methods.

use ndarray::{Array1, Array2, Axis};

use crate::error::SiegeError;

/// Standard FedAvg aggregation (no Byzantine defense).
///
/// Computes the coordinate-wise arithmetic mean of the delta updates, one
/// update per row. A single malicious client can move the aggregate
/// arbitrarily far.
///
/// # Arguments
///
/// * `updates` - Client delta updates, one row per client
pub fn fedavg(updates: &Array2<f32>) -> Result<Array1<f32>, SiegeError> {
    if updates.nrows() == 0 {
        return Err(SiegeError::EmptyUpdates);
    }

    let n = updates.nrows() as f32;
    Ok(updates.sum_axis(Axis(0)) / n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_fedavg_unweighted() {
        let updates = array![[1.0, 2.0], [3.0, 4.0]];
        let result = fedavg(&updates).unwrap();
        assert!((result[0] - 2.0).abs() < 1e-6);
        assert!((result[1] - 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_fedavg_vulnerable_to_attack() {
        let updates = array![
            [1.0],
            [1.0],
            [100.0], // Single attacker poisons result
        ];
        let result = fedavg(&updates).unwrap();
        // FedAvg is corrupted: (1 + 1 + 100) / 3 = 34.0
        assert!(result[0] > 10.0, "FedAvg should be corrupted by attacker");
    }

    #[test]
    fn test_fedavg_empty() {
        let updates = Array2::<f32>::zeros((0, 3));
        assert!(matches!(fedavg(&updates), Err(SiegeError::EmptyUpdates)));
    }

    #[test]
    fn test_fedavg_single_client() {
        let updates = array![[42.0, 7.0]];
        let result = fedavg(&updates).unwrap();
        assert_eq!(result[0], 42.0);
        assert_eq!(result[1], 7.0);
    }

    #[test]
    fn test_fedavg_propagates_nan() {
        let updates = array![[1.0], [f32::NAN]];
        assert!(fedavg(&updates).unwrap()[0].is_nan());
    }
}
