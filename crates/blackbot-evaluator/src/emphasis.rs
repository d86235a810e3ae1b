use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Per-feature weights scaling how strongly trainers vary coefficients.
///
/// One weight per state feature, `1.0` by default. A weight above one makes
/// trainers move coefficients of that feature further, below one keeps them
/// closer to their current values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Emphases(Vec<f32>);

impl Emphases {
    #[must_use]
    pub fn uniform(features: usize) -> Self {
        Self(vec![1.0; features])
    }

    /// Builds weights from `(index, weight)` pairs; negative indices count from the end.
    ///
    /// # Examples
    ///
    /// ```
    /// use blackbot_evaluator::emphasis::Emphases;
    ///
    /// let e = Emphases::from_pairs(4, &[(0, 2.0), (-1, 10.0)]).unwrap();
    /// assert_eq!(e.weights(), &[2.0, 1.0, 1.0, 10.0]);
    /// ```
    pub fn from_pairs(features: usize, pairs: &[(i64, f32)]) -> Result<Self, ConfigError> {
        let mut weights = vec![1.0; features];
        for &(index, weight) in pairs {
            let resolved = if index < 0 {
                usize::try_from(index.unsigned_abs())
                    .ok()
                    .and_then(|back| features.checked_sub(back))
            } else {
                usize::try_from(index).ok().filter(|i| *i < features)
            };
            let i = resolved.ok_or(ConfigError::EmphasisIndex { index, features })?;
            weights[i] = weight;
        }
        Ok(Self(weights))
    }

    #[must_use]
    pub fn weights(&self) -> &[f32] {
        &self.0
    }

    /// Weight of feature `index`, `1.0` when out of range.
    #[must_use]
    pub fn weight(&self, index: usize) -> f32 {
        self.0.get(index).copied().unwrap_or(1.0)
    }

    /// `(index, weight)` for every weight that differs from one.
    pub fn non_default(&self) -> impl Iterator<Item = (usize, f32)> + '_ {
        self.0
            .iter()
            .copied()
            .enumerate()
            .filter(|(_, w)| (*w - 1.0).abs() > f32::EPSILON)
    }
}
