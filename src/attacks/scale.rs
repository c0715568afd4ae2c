//! Model-replacement attack against unweighted averaging.

use ndarray::Array1;

use crate::model::GlobalModel;

/// Default multiplier applied to the global parameters.
pub const DEFAULT_SCALE_FACTOR: f32 = 100_000.0;

/// Malicious delta: `factor × global parameters`.
///
/// A single such row dominates a coordinate-wise mean, so one round of Mean
/// aggregation multiplies the model by roughly `factor × m / R`.
pub fn craft(global: &GlobalModel, factor: f32) -> Array1<f32> {
    global.params() * factor
}
