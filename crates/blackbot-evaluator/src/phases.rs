use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Phase boundaries of a level, as fractions of its duration.
///
/// A strictly increasing sequence of ends in `(0, 1)`, always terminated by
/// `1.0`. `[0.25, 0.5, 1.0]` splits a level into a quarter, a quarter and a
/// half. Multi-phase bots keep one parameter sub-array per phase and switch
/// between them as the level progresses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f32>", into = "Vec<f32>")]
pub struct Phases(Vec<f32>);

impl Default for Phases {
    fn default() -> Self {
        Self::whole()
    }
}

impl Phases {
    /// A single phase covering the whole level.
    #[must_use]
    pub fn whole() -> Self {
        Self(vec![1.0])
    }

    /// Validates user-given phase ends and appends the final `1.0`.
    ///
    /// # Examples
    ///
    /// ```
    /// use blackbot_evaluator::phases::Phases;
    ///
    /// assert_eq!(Phases::normalize(&[]).unwrap().ends(), &[1.0]);
    /// assert_eq!(Phases::normalize(&[0.5]).unwrap().ends(), &[0.5, 1.0]);
    /// assert!(Phases::normalize(&[0.9, 0.5]).is_err());
    /// ```
    pub fn normalize(fractions: &[f32]) -> Result<Self, ConfigError> {
        let mut previous = None;
        for &value in fractions {
            if !(value > 0.0 && value < 1.0) {
                return Err(ConfigError::PhaseOutOfRange { value });
            }
            if let Some(previous) = previous
                && value <= previous
            {
                return Err(ConfigError::PhaseNotIncreasing { previous, value });
            }
            previous = Some(value);
        }
        let mut ends = fractions.to_vec();
        ends.push(1.0);
        Ok(Self(ends))
    }

    /// Accepts a stored sequence that already carries its trailing `1.0`.
    pub fn from_ends(ends: &[f32]) -> Result<Self, ConfigError> {
        match ends.split_last() {
            Some((&last, init)) if (last - 1.0).abs() <= f32::EPSILON => Self::normalize(init),
            Some((&value, _)) => Err(ConfigError::PhaseOutOfRange { value }),
            None => Ok(Self::whole()),
        }
    }

    #[must_use]
    pub fn ends(&self) -> &[f32] {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Index of the phase containing the elapsed fraction `progress`.
    #[must_use]
    pub fn phase_at(&self, progress: f32) -> usize {
        self.0
            .iter()
            .position(|&end| progress < end)
            .unwrap_or(self.0.len() - 1)
    }
}

impl TryFrom<Vec<f32>> for Phases {
    type Error = ConfigError;

    fn try_from(ends: Vec<f32>) -> Result<Self, Self::Error> {
        Self::from_ends(&ends)
    }
}

impl From<Phases> for Vec<f32> {
    fn from(phases: Phases) -> Self {
        phases.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_is_whole_level() {
        assert_eq!(Phases::normalize(&[]).unwrap(), Phases::whole());
    }

    #[test]
    fn test_appends_final_end() {
        let p = Phases::normalize(&[0.25, 0.5, 0.75]).unwrap();
        assert_eq!(p.ends(), &[0.25, 0.5, 0.75, 1.0]);
        assert_eq!(p.len(), 4);
    }

    #[test]
    fn test_rejects_out_of_range() {
        for bad in [0.0, 1.0, -0.1, 1.5, f32::NAN] {
            assert!(matches!(
                Phases::normalize(&[bad]),
                Err(ConfigError::PhaseOutOfRange { .. })
            ));
        }
    }

    #[test]
    fn test_rejects_non_increasing() {
        assert!(matches!(
            Phases::normalize(&[0.9, 0.5]),
            Err(ConfigError::PhaseNotIncreasing { .. })
        ));
        assert!(matches!(
            Phases::normalize(&[0.5, 0.5]),
            Err(ConfigError::PhaseNotIncreasing { .. })
        ));
    }

    #[test]
    fn test_phase_at() {
        let p = Phases::normalize(&[0.25, 0.5]).unwrap();
        assert_eq!(p.phase_at(0.0), 0);
        assert_eq!(p.phase_at(0.25), 1);
        assert_eq!(p.phase_at(0.49), 1);
        assert_eq!(p.phase_at(0.99), 2);
        assert_eq!(p.phase_at(1.0), 2);
    }

    #[test]
    fn test_from_ends_requires_trailing_one() {
        assert_eq!(
            Phases::from_ends(&[0.5, 1.0]).unwrap(),
            Phases::normalize(&[0.5]).unwrap()
        );
        assert!(Phases::from_ends(&[0.5, 0.8]).is_err());
    }

    #[test]
    fn test_serde_validates() {
        let p: Phases = serde_json::from_str("[0.5, 1.0]").unwrap();
        assert_eq!(p.len(), 2);
        assert!(serde_json::from_str::<Phases>("[0.7, 0.2, 1.0]").is_err());
    }
}
