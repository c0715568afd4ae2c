//! Mathematical primitives for Siege-FL.
//!
//! Provides shared math utilities used by aggregation and attacks:
//!
//! - [`norms`]: L2 norms and distances
//! - [`stats`]: coordinate-wise mean and standard deviation of update batches
//! - [`order`]: stable argsorts and permutation checks

pub mod norms;
pub mod order;
pub mod stats;

pub use norms::{l2_dist_sq, l2_norm, l2_norm_sq};
pub use order::{argsort, argsort_f32, is_permutation, nan_last_cmp};
pub use stats::{coordinate_mean, coordinate_std};
