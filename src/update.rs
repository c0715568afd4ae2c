//! Participant updates and the per-round update arena.
//!
//! An update is either a parameter delta or a per-layer ranking of score
//! positions. One form is used for a whole run; [`UpdateBatch`] is sized once
//! per round and each participant writes into its own slot.

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::error::SiegeError;
use crate::math::argsort_f32;
use crate::model::GlobalModel;

/// Which representation a run exchanges.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateForm {
    /// Parameter-vector difference
    Delta,
    /// Per-layer permutation of score positions
    Rank,
}

/// Per-layer rankings: `layers[l][j]` is the position holding the j-th
/// smallest score of score layer `l`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RankUpdate {
    layers: Vec<Vec<u32>>,
}

impl RankUpdate {
    /// Wrap rankings, one per score layer.
    pub fn new(layers: Vec<Vec<u32>>) -> Self {
        Self { layers }
    }

    /// Rank every score layer of a trained model by ascending score.
    pub fn from_model(model: &GlobalModel) -> Self {
        let layers = model
            .schema()
            .score_tensors()
            .map(|spec| {
                let scores = model.view(spec).to_vec();
                argsort_f32(&scores).into_iter().map(|i| i as u32).collect()
            })
            .collect();
        Self { layers }
    }

    /// Rankings per score layer.
    pub fn layers(&self) -> &[Vec<u32>] {
        &self.layers
    }
}

/// One participant's submission for a round.
#[derive(Clone, Debug, PartialEq)]
pub enum Update {
    /// `trained - received` parameters
    Delta(Array1<f32>),
    /// Rankings of score positions
    Rank(RankUpdate),
}

impl Update {
    /// Representation of this update.
    pub fn form(&self) -> UpdateForm {
        match self {
            Update::Delta(_) => UpdateForm::Delta,
            Update::Rank(_) => UpdateForm::Rank,
        }
    }

    /// Derive the update a participant submits after training from `received`.
    pub fn derive(
        form: UpdateForm,
        trained: &GlobalModel,
        received: &GlobalModel,
    ) -> Result<Update, SiegeError> {
        match form {
            UpdateForm::Delta => Ok(Update::Delta(trained.delta_from(received)?)),
            UpdateForm::Rank => {
                trained.ensure_compatible(received)?;
                Ok(Update::Rank(RankUpdate::from_model(trained)))
            }
        }
    }
}

/// Pre-sized arena holding every submission of one round, indexed by slot.
#[derive(Clone, Debug, PartialEq)]
pub enum UpdateBatch {
    /// One row per slot, one column per parameter
    Delta(Array2<f32>),
    /// Per score layer: one row per slot, one column per position
    Rank(Vec<Array2<u32>>),
}

impl UpdateBatch {
    /// Arena with `slots` rows shaped for `model` in the given form.
    pub fn for_model(form: UpdateForm, slots: usize, model: &GlobalModel) -> Self {
        match form {
            UpdateForm::Delta => UpdateBatch::Delta(Array2::zeros((slots, model.dim()))),
            UpdateForm::Rank => UpdateBatch::rank(slots, &model.schema().score_lengths()),
        }
    }

    /// Rank arena for layers of the given lengths.
    pub fn rank(slots: usize, layer_lens: &[usize]) -> Self {
        UpdateBatch::Rank(
            layer_lens
                .iter()
                .map(|&len| Array2::zeros((slots, len)))
                .collect(),
        )
    }

    /// Representation stored in this batch.
    pub fn form(&self) -> UpdateForm {
        match self {
            UpdateBatch::Delta(_) => UpdateForm::Delta,
            UpdateBatch::Rank(_) => UpdateForm::Rank,
        }
    }

    /// Number of slots.
    pub fn slots(&self) -> usize {
        match self {
            UpdateBatch::Delta(rows) => rows.nrows(),
            UpdateBatch::Rank(layers) => layers.first().map_or(0, |l| l.nrows()),
        }
    }

    /// Write `update` into `slot`.
    pub fn set(&mut self, slot: usize, update: &Update) -> Result<(), SiegeError> {
        let capacity = self.slots();
        if slot >= capacity {
            return Err(SiegeError::SlotOutOfRange { slot, capacity });
        }
        match (self, update) {
            (UpdateBatch::Delta(rows), Update::Delta(delta)) => {
                if delta.len() != rows.ncols() {
                    return Err(SiegeError::DimensionMismatch {
                        expected: rows.ncols(),
                        actual: delta.len(),
                    });
                }
                rows.row_mut(slot).assign(delta);
                Ok(())
            }
            (UpdateBatch::Rank(layers), Update::Rank(rank)) => {
                if rank.layers().len() != layers.len() {
                    return Err(SiegeError::DimensionMismatch {
                        expected: layers.len(),
                        actual: rank.layers().len(),
                    });
                }
                for (arena, ranking) in layers.iter_mut().zip(rank.layers()) {
                    if ranking.len() != arena.ncols() {
                        return Err(SiegeError::DimensionMismatch {
                            expected: arena.ncols(),
                            actual: ranking.len(),
                        });
                    }
                    for (dst, &src) in arena.row_mut(slot).iter_mut().zip(ranking) {
                        *dst = src;
                    }
                }
                Ok(())
            }
            (batch, update) => Err(SiegeError::InvalidConfig(format!(
                "cannot store a {:?} update in a {:?} batch",
                update.form(),
                batch.form()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ParameterSchema;
    use ndarray::array;
    use std::sync::Arc;

    fn model(values: Array1<f32>) -> GlobalModel {
        let schema = Arc::new(
            ParameterSchema::builder()
                .weight("w", &[1])
                .score("s", &[3])
                .build()
                .unwrap(),
        );
        GlobalModel::from_vector(schema, values).unwrap()
    }

    #[test]
    fn test_rank_from_model_ascending() {
        let m = model(array![5.0, 0.9, 0.1, 0.5]);
        let rank = RankUpdate::from_model(&m);
        assert_eq!(rank.layers(), &[vec![1u32, 2, 0]]);
    }

    #[test]
    fn test_derive_delta() {
        let received = model(array![1.0, 1.0, 1.0, 1.0]);
        let trained = model(array![2.0, 1.0, 0.5, 1.0]);
        let update = Update::derive(UpdateForm::Delta, &trained, &received).unwrap();
        assert_eq!(update, Update::Delta(array![1.0, 0.0, -0.5, 0.0]));
        assert_eq!(update.form(), UpdateForm::Delta);
    }

    #[test]
    fn test_batch_slots_and_set() {
        let m = model(array![0.0, 0.0, 0.0, 0.0]);
        let mut batch = UpdateBatch::for_model(UpdateForm::Delta, 2, &m);
        assert_eq!(batch.slots(), 2);
        batch
            .set(1, &Update::Delta(array![1.0, 2.0, 3.0, 4.0]))
            .unwrap();
        match &batch {
            UpdateBatch::Delta(rows) => assert_eq!(rows[[1, 3]], 4.0),
            UpdateBatch::Rank(_) => panic!("expected delta batch"),
        }
    }

    #[test]
    fn test_batch_rejects_bad_slot_and_width() {
        let m = model(array![0.0, 0.0, 0.0, 0.0]);
        let mut batch = UpdateBatch::for_model(UpdateForm::Delta, 1, &m);
        assert!(matches!(
            batch.set(1, &Update::Delta(array![0.0, 0.0, 0.0, 0.0])),
            Err(SiegeError::SlotOutOfRange { slot: 1, capacity: 1 })
        ));
        assert!(matches!(
            batch.set(0, &Update::Delta(array![0.0])),
            Err(SiegeError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_batch_rejects_mixed_forms() {
        let m = model(array![0.0, 0.0, 0.0, 0.0]);
        let mut batch = UpdateBatch::for_model(UpdateForm::Rank, 1, &m);
        assert_eq!(batch.form(), UpdateForm::Rank);
        assert!(batch
            .set(0, &Update::Delta(array![0.0, 0.0, 0.0, 0.0]))
            .is_err());
        batch
            .set(0, &Update::Rank(RankUpdate::new(vec![vec![2, 1, 0]])))
            .unwrap();
    }
}
