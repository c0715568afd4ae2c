//! Coordinate-wise statistics over update batches (one row per update).

use ndarray::{Array1, Array2, Axis};

/// Mean of each column. An empty batch yields zeros.
pub fn coordinate_mean(batch: &Array2<f32>) -> Array1<f32> {
    batch
        .mean_axis(Axis(0))
        .unwrap_or_else(|| Array1::zeros(batch.ncols()))
}

/// Sample standard deviation (n - 1 denominator) of each column.
///
/// Fewer than two rows carry no spread, so the result is all zeros.
pub fn coordinate_std(batch: &Array2<f32>) -> Array1<f32> {
    if batch.nrows() < 2 {
        return Array1::zeros(batch.ncols());
    }
    batch.std_axis(Axis(0), 1.0)
}
