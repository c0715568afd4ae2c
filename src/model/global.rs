//! The shared model owned by the round orchestrator.

use std::sync::Arc;

use ndarray::{s, Array1, ArrayView1, ArrayViewMut1};

use crate::error::SiegeError;
use crate::math::argsort_f32;
use crate::model::schema::{ParameterSchema, TensorKind, TensorSpec};

/// Named parameter tensors stored as one flat vector.
#[derive(Clone, Debug, PartialEq)]
pub struct GlobalModel {
    schema: Arc<ParameterSchema>,
    params: Array1<f32>,
}

impl GlobalModel {
    /// A model with every parameter set to zero.
    pub fn zeros(schema: Arc<ParameterSchema>) -> Self {
        let params = Array1::zeros(schema.total_len());
        Self { schema, params }
    }

    /// Wrap an existing parameter vector. Its length must match the schema.
    pub fn from_vector(
        schema: Arc<ParameterSchema>,
        params: Array1<f32>,
    ) -> Result<Self, SiegeError> {
        if params.len() != schema.total_len() {
            return Err(SiegeError::DimensionMismatch {
                expected: schema.total_len(),
                actual: params.len(),
            });
        }
        Ok(Self { schema, params })
    }

    /// Layout shared by this model.
    pub fn schema(&self) -> &Arc<ParameterSchema> {
        &self.schema
    }

    /// The flat parameter vector.
    pub fn params(&self) -> &Array1<f32> {
        &self.params
    }

    /// Mutable access to the flat parameter vector.
    pub fn params_mut(&mut self) -> &mut Array1<f32> {
        &mut self.params
    }

    /// Number of scalars in the model.
    pub fn dim(&self) -> usize {
        self.params.len()
    }

    /// View of one tensor by name.
    pub fn tensor(&self, name: &str) -> Result<ArrayView1<'_, f32>, SiegeError> {
        let spec = self.schema.tensor(name)?;
        Ok(self.params.slice(s![spec.range()]))
    }

    /// Mutable view of one tensor by name.
    pub fn tensor_mut(&mut self, name: &str) -> Result<ArrayViewMut1<'_, f32>, SiegeError> {
        let range = self.schema.tensor(name)?.range();
        Ok(self.params.slice_mut(s![range]))
    }

    /// View of the tensor described by `spec`.
    pub fn view(&self, spec: &TensorSpec) -> ArrayView1<'_, f32> {
        self.params.slice(s![spec.range()])
    }

    /// Fail unless `other` was built from the same schema.
    pub fn ensure_compatible(&self, other: &GlobalModel) -> Result<(), SiegeError> {
        if Arc::ptr_eq(&self.schema, &other.schema) {
            return Ok(());
        }
        self.schema.ensure_same(&other.schema)
    }

    /// Parameter difference `self - received`.
    pub fn delta_from(&self, received: &GlobalModel) -> Result<Array1<f32>, SiegeError> {
        self.ensure_compatible(received)?;
        Ok(&self.params - &received.params)
    }

    /// Add a delta to the parameters in place.
    pub fn apply_delta(&mut self, delta: ArrayView1<'_, f32>) -> Result<(), SiegeError> {
        if delta.len() != self.params.len() {
            return Err(SiegeError::DimensionMismatch {
                expected: self.params.len(),
                actual: delta.len(),
            });
        }
        self.params += &delta;
        Ok(())
    }

    /// Overwrite the score tensor at `layer` (index among score tensors).
    pub fn set_scores(&mut self, layer: usize, scores: ArrayView1<'_, f32>) -> Result<(), SiegeError> {
        let range = self
            .schema
            .score_tensors()
            .nth(layer)
            .map(|t| t.range())
            .ok_or_else(|| SiegeError::UnknownTensor(format!("score layer #{}", layer)))?;
        if scores.len() != range.len() {
            return Err(SiegeError::DimensionMismatch {
                expected: range.len(),
                actual: scores.len(),
            });
        }
        self.params.slice_mut(s![range]).assign(&scores);
        Ok(())
    }

    /// Binary mask of a score tensor: the top `ceil(len * density)` scores are kept.
    pub fn mask(&self, name: &str, density: f32) -> Result<Vec<bool>, SiegeError> {
        let spec = self.schema.tensor(name)?;
        if spec.kind != TensorKind::Score {
            return Err(SiegeError::InvalidConfig(format!(
                "tensor '{}' is not a score layer",
                name
            )));
        }
        let scores = self.view(spec).to_vec();
        let keep = ((scores.len() as f32 * density.clamp(0.0, 1.0)).ceil() as usize)
            .min(scores.len());
        let order = argsort_f32(&scores);
        let mut mask = vec![false; scores.len()];
        for &pos in &order[scores.len() - keep..] {
            mask[pos] = true;
        }
        Ok(mask)
    }

    /// Whether every parameter is finite.
    pub fn is_finite(&self) -> bool {
        self.params.iter().all(|x| x.is_finite())
    }
}

/// Sorted copy of each score tensor, captured when the run starts.
///
/// Rank aggregation never invents score values; it only decides which
/// position receives which of these values.
#[derive(Clone, Debug, PartialEq)]
pub struct InitialScores {
    layers: Vec<Array1<f32>>,
}

impl InitialScores {
    /// Capture the ascending score values of every score tensor in `model`.
    pub fn capture(model: &GlobalModel) -> Self {
        let layers = model
            .schema()
            .score_tensors()
            .map(|spec| {
                let mut values = model.view(spec).to_vec();
                values.sort_by(f32::total_cmp);
                Array1::from(values)
            })
            .collect();
        Self { layers }
    }

    /// Sorted scores per score layer.
    pub fn layers(&self) -> &[Array1<f32>] {
        &self.layers
    }

    /// Number of score layers.
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Whether the model has no score layers.
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}
