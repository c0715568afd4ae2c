//! Versioned tensor layout shared by all copies of a model.

use std::collections::BTreeMap;
use std::hash::Hasher;
use std::ops::Range;

use fnv::FnvHasher;
use serde::{Deserialize, Serialize};

use crate::error::SiegeError;

/// Layout version mixed into every fingerprint.
pub const SCHEMA_VERSION: u32 = 1;

/// Role of a tensor in the model.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TensorKind {
    /// Ordinary trainable parameter
    Weight,
    /// Importance scores of a maskable layer (rank form)
    Score,
}

/// Placement of one named tensor inside the flat parameter vector.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TensorSpec {
    /// Tensor name, unique within the schema
    pub name: String,
    /// Logical shape; its product is `len`
    pub shape: Vec<usize>,
    /// Whether this tensor is a weight or a score layer
    pub kind: TensorKind,
    /// Start index in the flat vector
    pub offset: usize,
    /// Number of scalars
    pub len: usize,
}

impl TensorSpec {
    /// Index range of this tensor in the flat vector.
    pub fn range(&self) -> Range<usize> {
        self.offset..self.offset + self.len
    }
}

/// Ordered name → `(offset, length)` mapping for a model shape.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParameterSchema {
    version: u32,
    fingerprint: u64,
    tensors: Vec<TensorSpec>,
    index: BTreeMap<String, usize>,
    total_len: usize,
}

impl ParameterSchema {
    /// Start building a schema.
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    /// Layout version this schema was built with.
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Stable hash over version, names, shapes and kinds.
    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }

    /// Total number of scalars in the flat vector.
    pub fn total_len(&self) -> usize {
        self.total_len
    }

    /// All tensors in flattening order.
    pub fn tensors(&self) -> &[TensorSpec] {
        &self.tensors
    }

    /// Look up a tensor by name.
    pub fn tensor(&self, name: &str) -> Result<&TensorSpec, SiegeError> {
        self.index
            .get(name)
            .map(|&i| &self.tensors[i])
            .ok_or_else(|| SiegeError::UnknownTensor(name.to_string()))
    }

    /// Score tensors in flattening order. These are the maskable layers.
    pub fn score_tensors(&self) -> impl Iterator<Item = &TensorSpec> {
        self.tensors.iter().filter(|t| t.kind == TensorKind::Score)
    }

    /// Lengths of all score tensors, in order.
    pub fn score_lengths(&self) -> Vec<usize> {
        self.score_tensors().map(|t| t.len).collect()
    }

    /// Fail unless `other` has the same layout.
    pub fn ensure_same(&self, other: &ParameterSchema) -> Result<(), SiegeError> {
        if self.fingerprint == other.fingerprint {
            Ok(())
        } else {
            Err(SiegeError::SchemaMismatch {
                expected: self.fingerprint,
                actual: other.fingerprint,
            })
        }
    }
}

/// Incremental constructor for [`ParameterSchema`].
///
/// ```rust
/// use siege_fl::model::ParameterSchema;
///
/// let schema = ParameterSchema::builder()
///     .weight("fc.weight", &[4, 3])
///     .score("fc.scores", &[12])
///     .build()
///     .unwrap();
/// assert_eq!(schema.total_len(), 24);
/// assert_eq!(schema.tensor("fc.scores").unwrap().offset, 12);
/// ```
#[derive(Clone, Debug, Default)]
pub struct SchemaBuilder {
    entries: Vec<(String, Vec<usize>, TensorKind)>,
}

impl SchemaBuilder {
    /// Append a weight tensor.
    pub fn weight(self, name: impl Into<String>, shape: &[usize]) -> Self {
        self.tensor(name, shape, TensorKind::Weight)
    }

    /// Append a score (maskable) tensor.
    pub fn score(self, name: impl Into<String>, shape: &[usize]) -> Self {
        self.tensor(name, shape, TensorKind::Score)
    }

    /// Append a tensor of any kind.
    pub fn tensor(mut self, name: impl Into<String>, shape: &[usize], kind: TensorKind) -> Self {
        self.entries.push((name.into(), shape.to_vec(), kind));
        self
    }

    /// Compute offsets and the fingerprint.
    pub fn build(self) -> Result<ParameterSchema, SiegeError> {
        let mut tensors = Vec::with_capacity(self.entries.len());
        let mut index = BTreeMap::new();
        let mut offset = 0usize;
        let mut hasher = FnvHasher::default();
        write_field(&mut hasher, &u64::from(SCHEMA_VERSION).to_le_bytes());

        for (name, shape, kind) in self.entries {
            if index.contains_key(&name) {
                return Err(SiegeError::InvalidConfig(format!(
                    "duplicate tensor name '{}' in schema",
                    name
                )));
            }
            let len: usize = shape.iter().product();
            write_field(&mut hasher, name.as_bytes());
            write_field(&mut hasher, &(shape.len() as u64).to_le_bytes());
            for &d in &shape {
                write_field(&mut hasher, &(d as u64).to_le_bytes());
            }
            write_field(&mut hasher, &[matches!(kind, TensorKind::Score) as u8]);

            index.insert(name.clone(), tensors.len());
            tensors.push(TensorSpec {
                name,
                shape,
                kind,
                offset,
                len,
            });
            offset += len;
        }

        Ok(ParameterSchema {
            version: SCHEMA_VERSION,
            fingerprint: hasher.finish(),
            tensors,
            index,
            total_len: offset,
        })
    }
}

/// Hash one field followed by a separator, so "ab"+"c" differs from "a"+"bc".
/// Integers go in little-endian so fingerprints agree across platforms.
fn write_field(hasher: &mut FnvHasher, bytes: &[u8]) {
    hasher.write(bytes);
    hasher.write_u8(0xff);
}
