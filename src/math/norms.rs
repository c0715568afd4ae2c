//! Norm computations for vectors.
//!
//! Provides L2 (Euclidean) norm functions used by aggregation and
//! attack modules.

use ndarray::ArrayView1;

/// Compute the L2 (Euclidean) norm of an f32 vector.
pub fn l2_norm(v: ArrayView1<'_, f32>) -> f32 {
    l2_norm_sq(v).sqrt()
}

/// Compute the squared L2 norm of an f32 vector (avoids sqrt).
pub fn l2_norm_sq(v: ArrayView1<'_, f32>) -> f32 {
    v.iter().map(|x| x * x).sum()
}

/// Squared Euclidean distance between two equal-length vectors.
///
/// Returns `f32::INFINITY` on length mismatch so the pair never looks close.
pub fn l2_dist_sq(a: ArrayView1<'_, f32>, b: ArrayView1<'_, f32>) -> f32 {
    if a.len() != b.len() {
        return f32::INFINITY;
    }
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_l2_norm_3_4_5() {
        let v = array![3.0f32, 4.0];
        assert!((l2_norm(v.view()) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_l2_norm_sq_3_4() {
        let v = array![3.0f32, 4.0];
        assert!((l2_norm_sq(v.view()) - 25.0).abs() < 1e-6);
    }

    #[test]
    fn test_l2_norm_empty() {
        let v = ndarray::Array1::<f32>::zeros(0);
        assert_eq!(l2_norm(v.view()), 0.0);
        assert_eq!(l2_norm_sq(v.view()), 0.0);
    }

    #[test]
    fn test_dist_sq_simple() {
        let a = array![0.0f32, 0.0];
        let b = array![3.0f32, 4.0];
        assert!((l2_dist_sq(a.view(), b.view()) - 25.0).abs() < 1e-6);
        assert_eq!(l2_dist_sq(a.view(), a.view()), 0.0);
    }

    #[test]
    fn test_dist_sq_length_mismatch() {
        let a = array![1.0f32];
        let b = array![1.0f32, 2.0];
        assert_eq!(l2_dist_sq(a.view(), b.view()), f32::INFINITY);
    }
}
