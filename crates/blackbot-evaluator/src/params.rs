//! Named parameter arrays and the architecture-specific key sets they must match.
//!
//! A [`ParamSet`] is what a bot is made of: an ordered mapping from parameter
//! key (`constant`, `state0l`, ...) to a rectangular numeric array. Each bot
//! architecture declares a [`ParamSpec`] listing exactly which keys it needs,
//! their shapes, and how they are drawn. Sets are checked against the spec
//! when a bot is built, and training directives are checked against it before
//! a session starts.

use std::collections::{BTreeMap, btree_map};

use serde::{Deserialize, Serialize};

use crate::ConfigError;

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum ParamError {
    #[display("missing parameter array '{key}'")]
    Missing { key: String },
    #[display("parameter array '{key}' has shape {got:?}, expected {expected:?}")]
    ShapeMismatch {
        key: String,
        expected: Vec<usize>,
        got: Vec<usize>,
    },
    #[display("unexpected parameter array '{key}'")]
    Unexpected { key: String },
    #[display("parameter array '{key}' has {got} values for shape {shape:?}")]
    Malformed {
        key: String,
        shape: Vec<usize>,
        got: usize,
    },
}

/// A dense, row-major array of parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamArray {
    shape: Vec<usize>,
    values: Vec<f32>,
}

impl ParamArray {
    /// Wraps `values` as an array of the given shape.
    ///
    /// Returns `None` if the number of values does not match the shape.
    #[must_use]
    pub fn new(shape: Vec<usize>, values: Vec<f32>) -> Option<Self> {
        (shape.iter().product::<usize>() == values.len()).then_some(Self { shape, values })
    }

    #[must_use]
    pub fn zeros(shape: Vec<usize>) -> Self {
        let len = shape.iter().product();
        Self {
            shape,
            values: vec![0.0; len],
        }
    }

    /// One-dimensional array.
    #[must_use]
    pub fn from_vec(values: Vec<f32>) -> Self {
        Self {
            shape: vec![values.len()],
            values,
        }
    }

    #[must_use]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    #[must_use]
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut [f32] {
        &mut self.values
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Length of the innermost axis (1 for scalars).
    #[must_use]
    pub fn row_len(&self) -> usize {
        self.shape.last().copied().unwrap_or(1)
    }

    /// Contiguous slice of the values along the innermost axis.
    #[must_use]
    pub fn row(&self, index: usize) -> &[f32] {
        let len = self.row_len();
        &self.values[index * len..(index + 1) * len]
    }

    pub fn scale(&mut self, factor: f32) {
        for v in &mut self.values {
            *v *= factor;
        }
    }

    fn is_consistent(&self) -> bool {
        self.shape.iter().product::<usize>() == self.values.len()
    }
}

/// Ordered mapping from parameter key to array.
///
/// Keys are unique and iterate in sorted order, which makes serialized sets
/// and their descriptions stable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamSet {
    arrays: BTreeMap<String, ParamArray>,
}

impl ParamSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&ParamArray> {
        self.arrays.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut ParamArray> {
        self.arrays.get_mut(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, array: ParamArray) -> Option<ParamArray> {
        self.arrays.insert(key.into(), array)
    }

    pub fn remove(&mut self, key: &str) -> Option<ParamArray> {
        self.arrays.remove(key)
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.arrays.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.arrays.keys().map(String::as_str)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, ParamArray> {
        self.arrays.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.arrays.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.arrays.is_empty()
    }

    /// Looks up `key`, failing with [`ParamError::Missing`].
    pub fn require(&self, key: &str) -> Result<&ParamArray, ParamError> {
        self.get(key).ok_or_else(|| ParamError::Missing {
            key: key.to_owned(),
        })
    }
}

impl<'a> IntoIterator for &'a ParamSet {
    type Item = (&'a String, &'a ParamArray);
    type IntoIter = btree_map::Iter<'a, String, ParamArray>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl FromIterator<(String, ParamArray)> for ParamSet {
    fn from_iter<T: IntoIterator<Item = (String, ParamArray)>>(iter: T) -> Self {
        Self {
            arrays: iter.into_iter().collect(),
        }
    }
}

/// How the values of a parameter array are drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// Free real values, drawn from the `real` distribution by default.
    Real,
    /// Values constrained to `[0, 1]`, drawn from the `unit` distribution by default.
    Unit,
    /// Metadata fixed at construction; never drawn or varied.
    Fixed,
}

/// One entry of a [`ParamSpec`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamDef {
    pub key: String,
    pub shape: Vec<usize>,
    pub kind: ParamKind,
    /// Whether the innermost axis runs over state features, so that
    /// per-feature emphases apply to its coordinates.
    pub per_feature: bool,
}

impl ParamDef {
    #[must_use]
    pub fn new(key: &str, shape: Vec<usize>, kind: ParamKind, per_feature: bool) -> Self {
        Self {
            key: key.to_owned(),
            shape,
            kind,
            per_feature,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.shape.iter().product()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Feature index of the flat coordinate `index`, if this array is per-feature.
    #[must_use]
    pub fn feature_of(&self, index: usize) -> Option<usize> {
        let row = *self.shape.last()?;
        self.per_feature.then(|| index % row)
    }
}

/// The fixed, ordered key set of one bot architecture on one level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSpec {
    defs: Vec<ParamDef>,
}

impl ParamSpec {
    #[must_use]
    pub fn new(defs: Vec<ParamDef>) -> Self {
        Self { defs }
    }

    #[must_use]
    pub fn defs(&self) -> &[ParamDef] {
        &self.defs
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&ParamDef> {
        self.defs.iter().find(|d| d.key == key)
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.defs.iter().map(|d| d.key.as_str())
    }

    /// Fails with [`ConfigError::UnknownParam`] unless `key` belongs to this spec.
    pub fn check_key(&self, directive: &'static str, key: &str) -> Result<(), ConfigError> {
        if self.contains(key) {
            Ok(())
        } else {
            Err(ConfigError::UnknownParam {
                directive,
                key: key.to_owned(),
            })
        }
    }

    /// Checks that `params` holds exactly the arrays of this spec, with the declared shapes.
    pub fn validate(&self, params: &ParamSet) -> Result<(), ParamError> {
        for def in &self.defs {
            let array = params.require(&def.key)?;
            if !array.is_consistent() {
                return Err(ParamError::Malformed {
                    key: def.key.clone(),
                    shape: array.shape.clone(),
                    got: array.values.len(),
                });
            }
            if array.shape() != def.shape.as_slice() {
                return Err(ParamError::ShapeMismatch {
                    key: def.key.clone(),
                    expected: def.shape.clone(),
                    got: array.shape().to_vec(),
                });
            }
        }
        if let Some(key) = params.keys().find(|k| !self.contains(k)) {
            return Err(ParamError::Unexpected {
                key: key.to_owned(),
            });
        }
        Ok(())
    }
}
