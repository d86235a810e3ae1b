//! Bots: parameterized policies scored against a level.
//!
//! Trainers only rely on the [`Bot`] capability: a bot exposes its parameters
//! and their spec, can be rebuilt with a modified parameter set, and evaluates
//! to a score (higher is better). The concrete architectures form the closed
//! set [`BotKind`].
//!
//! # Architectures
//!
//! | key        | arrays                                                                 |
//! |------------|------------------------------------------------------------------------|
//! | `linear`   | `constant[A]`, `state0l[A, F]`                                         |
//! | `states_1` | `constant[A]`, `state0l[A, F]`, `state1l[A, F]`, `mix[F]` (unit range) |
//! | `linear_m` | `_phases[P]`, `constant[P, A]`, `state0l[P, A, F]`                     |
//!
//! (`A` actions, `F` features, `P` phases.) Every architecture picks the
//! action with the highest linear activation; `states_1` adds a term over an
//! exponential moving average of past states, `linear_m` switches coefficient
//! sets as the level progresses.

use std::{fmt, str::FromStr, sync::Arc};

use blackbot_engine::{Level, LevelDesc, SessionRng};
use serde::{Deserialize, Serialize};

use crate::{
    ConfigError,
    params::{ParamArray, ParamDef, ParamError, ParamKind, ParamSet, ParamSpec},
    phases::Phases,
};

pub use self::{builder::*, linear::*, states::*};

mod builder;
mod linear;
mod states;

pub const PHASES_KEY: &str = "_phases";

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum BotError {
    #[display("{_0}")]
    Params(ParamError),
    #[display("{_0}")]
    Config(ConfigError),
    #[display("evaluation produced a non-finite score ({score})")]
    NonFiniteScore { score: f64 },
}

impl From<ParamError> for BotError {
    fn from(e: ParamError) -> Self {
        Self::Params(e)
    }
}

impl From<ConfigError> for BotError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

/// A constructible, evaluable policy.
pub trait Bot: fmt::Debug {
    fn params(&self) -> &ParamSet;

    fn spec(&self) -> &ParamSpec;

    /// Builds a bot of the same architecture on the same level with other parameters.
    fn with_params(&self, params: ParamSet) -> Result<Box<dyn Bot>, BotError>;

    /// Average score over `runs` episodes.
    fn evaluate(&self, runs: usize, rng: &mut SessionRng) -> Result<f64, BotError>;
}

/// Checks a raw evaluation result.
pub fn checked_score(score: f64) -> Result<f64, BotError> {
    if score.is_finite() {
        Ok(score)
    } else {
        Err(BotError::NonFiniteScore { score })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BotKind {
    #[serde(rename = "linear")]
    Linear,
    #[serde(rename = "states_1")]
    States1,
    #[serde(rename = "linear_m")]
    LinearMulti,
}

impl BotKind {
    pub const ALL: [Self; 3] = [Self::Linear, Self::States1, Self::LinearMulti];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Linear => "linear",
            Self::States1 => "states_1",
            Self::LinearMulti => "linear_m",
        }
    }

    /// Whether the architecture keeps one coefficient set per level phase.
    #[must_use]
    pub const fn is_phased(self) -> bool {
        matches!(self, Self::LinearMulti)
    }

    /// The key set of this architecture on `level`.
    ///
    /// `phases` only matters for phased architectures.
    #[must_use]
    pub fn param_spec(self, level: &LevelDesc, phases: &Phases) -> ParamSpec {
        let (a, f) = (level.actions, level.features);
        let defs = match self {
            Self::Linear => vec![
                ParamDef::new("constant", vec![a], ParamKind::Real, false),
                ParamDef::new("state0l", vec![a, f], ParamKind::Real, true),
            ],
            Self::States1 => vec![
                ParamDef::new("constant", vec![a], ParamKind::Real, false),
                ParamDef::new("mix", vec![f], ParamKind::Unit, true),
                ParamDef::new("state0l", vec![a, f], ParamKind::Real, true),
                ParamDef::new("state1l", vec![a, f], ParamKind::Real, true),
            ],
            Self::LinearMulti => {
                let p = phases.len();
                vec![
                    ParamDef::new(PHASES_KEY, vec![p], ParamKind::Fixed, false),
                    ParamDef::new("constant", vec![p, a], ParamKind::Real, false),
                    ParamDef::new("state0l", vec![p, a, f], ParamKind::Real, true),
                ]
            }
        };
        ParamSpec::new(defs)
    }

    /// Phases stored in `params`, whole-level if there are none.
    pub fn stored_phases(self, params: &ParamSet) -> Result<Phases, ConfigError> {
        match params.get(PHASES_KEY) {
            Some(array) if self.is_phased() => Phases::from_ends(array.values()),
            _ => Ok(Phases::whole()),
        }
    }

    /// Builds a bot from a complete parameter set.
    pub fn build(self, level: Arc<Level>, params: ParamSet) -> Result<Box<dyn Bot>, BotError> {
        let phases = self.stored_phases(&params)?;
        let spec = self.param_spec(level.desc(), &phases);
        spec.validate(&params)?;
        let bot: Box<dyn Bot> = match self {
            Self::Linear | Self::LinearMulti => {
                Box::new(LinearBot::new(self, level, spec, params, phases))
            }
            Self::States1 => Box::new(StatesBot::new(level, spec, params)),
        };
        Ok(bot)
    }
}

impl fmt::Display for BotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BotKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.name() == s)
            .ok_or_else(|| ConfigError::UnknownBot { name: s.to_owned() })
    }
}

/// `constant[offset + a] + coeffs[offset + a]·state` for every action, as in all architectures.
fn activations<'a>(
    constant: &'a ParamArray,
    coeffs: &'a ParamArray,
    offset: usize,
    state: &'a [f32],
) -> impl Iterator<Item = f32> + 'a {
    let actions = constant.row_len();
    (0..actions).map(move |a| {
        let row = coeffs.row(offset + a);
        constant.values()[offset + a] + row.iter().zip(state).map(|(c, s)| c * s).sum::<f32>()
    })
}

/// Index of the largest value; the first one wins ties.
fn argmax<I>(values: I) -> usize
where
    I: IntoIterator<Item = f32>,
{
    let mut best = (0, f32::NEG_INFINITY);
    for (i, v) in values.into_iter().enumerate() {
        if v > best.1 {
            best = (i, v);
        }
    }
    best.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn level() -> Arc<Level> {
        Arc::new(Level::new(LevelDesc::new("t", 3, 2, 10, 1)).unwrap())
    }

    #[test]
    fn test_kind_names_round_trip() {
        for kind in BotKind::ALL {
            assert_eq!(kind.name().parse::<BotKind>().unwrap(), kind);
        }
        assert!(matches!(
            "quadratic".parse::<BotKind>(),
            Err(ConfigError::UnknownBot { .. })
        ));
    }

    #[test]
    fn test_phased_spec_shapes() {
        let phases = Phases::normalize(&[0.5]).unwrap();
        let spec = BotKind::LinearMulti.param_spec(level().desc(), &phases);
        assert_eq!(spec.get("constant").unwrap().shape, vec![2, 2]);
        assert_eq!(spec.get("state0l").unwrap().shape, vec![2, 2, 3]);
        assert_eq!(spec.get(PHASES_KEY).unwrap().kind, ParamKind::Fixed);
    }

    #[test]
    fn test_build_rejects_wrong_shape() {
        let mut params = ParamSet::new();
        params.insert("constant", ParamArray::zeros(vec![2]));
        params.insert("state0l", ParamArray::zeros(vec![3, 2]));
        assert!(matches!(
            BotKind::Linear.build(level(), params),
            Err(BotError::Params(ParamError::ShapeMismatch { .. }))
        ));
    }

    #[test]
    fn test_argmax_prefers_first_on_ties() {
        assert_eq!(argmax([1.0, 3.0, 3.0, 2.0]), 1);
        assert_eq!(argmax([f32::NAN, 0.0]), 1);
    }

    #[test]
    fn test_checked_score() {
        assert!(checked_score(1.5).is_ok());
        assert!(matches!(
            checked_score(f64::NAN),
            Err(BotError::NonFiniteScore { .. })
        ));
    }
}
