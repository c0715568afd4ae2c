//! Global model representation.
//!
//! A model is one flat parameter vector plus a [`ParameterSchema`] that maps
//! each named tensor to its `(offset, length)` slice. The schema is computed
//! once per model shape and shared by every copy of the model, so participant
//! models and the global model always flatten in the same order.

pub mod global;
pub mod schema;

pub use global::{GlobalModel, InitialScores};
pub use schema::{ParameterSchema, SchemaBuilder, TensorKind, TensorSpec, SCHEMA_VERSION};
