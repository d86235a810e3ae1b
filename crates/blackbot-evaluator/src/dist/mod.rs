//! Configured statistical samplers.
//!
//! A [`Dist`] is a distribution family with its shape parameters, location
//! and scale bound at construction. Sampling follows the location-scale
//! convention: a standard variate of the family is drawn, then mapped to
//! `loc + scale * x`. So `beta 1 27 2 6` draws `Beta(2, 6)` stretched over
//! `[1, 28]`.
//!
//! Families and their shape parameters:
//!
//! | name      | shape args | standard variate          |
//! |-----------|------------|---------------------------|
//! | `norm`    |            | `N(0, 1)`                 |
//! | `uniform` |            | `U[0, 1)`                 |
//! | `beta`    | `a b`      | `Beta(a, b)`              |
//! | `gamma`   | `a`        | `Gamma(a, 1)`             |
//! | `lognorm` | `s`        | `exp(s · N(0, 1))`        |
//! | `cauchy`  |            | standard Cauchy           |
//! | `expon`   |            | `Exp(1)`                  |
//! | `t`       | `df`       | Student's t with `df`     |
//!
//! [`DistributionConfig`] groups the six distributions a training session uses.

use std::fmt;

use rand::{
    Rng,
    distr::{Distribution, Uniform},
};
use rand_distr::{Beta, Cauchy, Exp, Gamma, LogNormal, Normal, StudentT};
use serde::{Deserialize, Serialize};

use crate::ConfigError;

pub use self::config::*;

mod config;

/// A supported distribution family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistFamily {
    Norm,
    Uniform,
    Beta,
    Gamma,
    LogNorm,
    Cauchy,
    Expon,
    StudentT,
}

impl DistFamily {
    pub const ALL: [Self; 8] = [
        Self::Norm,
        Self::Uniform,
        Self::Beta,
        Self::Gamma,
        Self::LogNorm,
        Self::Cauchy,
        Self::Expon,
        Self::StudentT,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Norm => "norm",
            Self::Uniform => "uniform",
            Self::Beta => "beta",
            Self::Gamma => "gamma",
            Self::LogNorm => "lognorm",
            Self::Cauchy => "cauchy",
            Self::Expon => "expon",
            Self::StudentT => "t",
        }
    }

    /// Number of shape parameters the family takes.
    #[must_use]
    pub const fn arity(self) -> usize {
        match self {
            Self::Norm | Self::Uniform | Self::Cauchy | Self::Expon => 0,
            Self::Gamma | Self::LogNorm | Self::StudentT => 1,
            Self::Beta => 2,
        }
    }

    pub fn from_name(name: &str) -> Result<Self, ConfigError> {
        Self::ALL
            .into_iter()
            .find(|f| f.name() == name)
            .ok_or_else(|| ConfigError::UnknownDistribution {
                name: name.to_owned(),
            })
    }
}

#[derive(Debug, Clone)]
enum Standard {
    Norm(Normal<f64>),
    Uniform(Uniform<f64>),
    Beta(Beta<f64>),
    Gamma(Gamma<f64>),
    LogNorm(LogNormal<f64>),
    Cauchy(Cauchy<f64>),
    Expon(Exp<f64>),
    StudentT(StudentT<f64>),
}

impl Standard {
    fn new(family: DistFamily, shape: &[f64]) -> Result<Self, String> {
        let arg = |i: usize| shape[i];
        let standard = match family {
            DistFamily::Norm => Self::Norm(Normal::new(0.0, 1.0).map_err(|e| e.to_string())?),
            DistFamily::Uniform => {
                Self::Uniform(Uniform::new(0.0, 1.0).map_err(|e| e.to_string())?)
            }
            DistFamily::Beta => {
                Self::Beta(Beta::new(arg(0), arg(1)).map_err(|e| e.to_string())?)
            }
            DistFamily::Gamma => Self::Gamma(Gamma::new(arg(0), 1.0).map_err(|e| e.to_string())?),
            DistFamily::LogNorm => {
                Self::LogNorm(LogNormal::new(0.0, arg(0)).map_err(|e| e.to_string())?)
            }
            DistFamily::Cauchy => Self::Cauchy(Cauchy::new(0.0, 1.0).map_err(|e| e.to_string())?),
            DistFamily::Expon => Self::Expon(Exp::new(1.0).map_err(|e| e.to_string())?),
            DistFamily::StudentT => {
                Self::StudentT(StudentT::new(arg(0)).map_err(|e| e.to_string())?)
            }
        };
        Ok(standard)
    }

    fn sample<R>(&self, rng: &mut R) -> f64
    where
        R: Rng + ?Sized,
    {
        match self {
            Self::Norm(d) => d.sample(rng),
            Self::Uniform(d) => d.sample(rng),
            Self::Beta(d) => d.sample(rng),
            Self::Gamma(d) => d.sample(rng),
            Self::LogNorm(d) => d.sample(rng),
            Self::Cauchy(d) => d.sample(rng),
            Self::Expon(d) => d.sample(rng),
            Self::StudentT(d) => d.sample(rng),
        }
    }
}

/// Serialized form of a [`Dist`]: enough to rebuild it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct DistRepr {
    family: String,
    #[serde(default)]
    shape: Vec<f64>,
    loc: f64,
    scale: f64,
}

/// A distribution with fixed shape, location and scale.
///
/// Immutable once built; build failures are configuration errors.
///
/// # Examples
///
/// ```
/// use blackbot_engine::SessionRng;
/// use blackbot_evaluator::dist::Dist;
///
/// let dist = Dist::parse(&["beta", "1", "27", "2", "6"]).unwrap();
/// let mut rng = SessionRng::from_seed(0);
/// let x = dist.sample_one(&mut rng);
/// assert!((1.0..=28.0).contains(&x));
/// assert_eq!(dist.to_string(), "beta(2, 6, l=1, s=27)");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "DistRepr", into = "DistRepr")]
pub struct Dist {
    family: DistFamily,
    shape: Vec<f64>,
    loc: f64,
    scale: f64,
    standard: Standard,
}

impl Dist {
    pub fn new(family: DistFamily, shape: Vec<f64>, loc: f64, scale: f64) -> Result<Self, ConfigError> {
        if shape.len() != family.arity() {
            return Err(ConfigError::DistributionArity {
                name: family.name(),
                expected: family.arity(),
                got: shape.len(),
            });
        }
        if !(loc.is_finite() && scale.is_finite() && scale > 0.0) {
            return Err(ConfigError::DistributionParams {
                name: family.name(),
                reason: format!("loc must be finite and scale positive (loc={loc}, scale={scale})"),
            });
        }
        let standard = Standard::new(family, &shape).map_err(|reason| {
            ConfigError::DistributionParams {
                name: family.name(),
                reason,
            }
        })?;
        Ok(Self {
            family,
            shape,
            loc,
            scale,
            standard,
        })
    }

    /// Builds a distribution from a family name and `[loc [scale [shape...]]]`.
    ///
    /// `loc` defaults to 0 and `scale` to 1.
    pub fn from_args(name: &str, args: &[f64]) -> Result<Self, ConfigError> {
        let family = DistFamily::from_name(name)?;
        let loc = args.first().copied().unwrap_or(0.0);
        let scale = args.get(1).copied().unwrap_or(1.0);
        let shape = args.get(2..).unwrap_or_default().to_vec();
        Self::new(family, shape, loc, scale)
    }

    /// Parses the word form used on the command line: `name [loc [scale [shape...]]]`.
    pub fn parse<S>(words: &[S]) -> Result<Self, ConfigError>
    where
        S: AsRef<str>,
    {
        let (name, args) = words.split_first().ok_or(ConfigError::MissingDistribution)?;
        let args = args
            .iter()
            .map(|w| {
                let w = w.as_ref();
                w.parse::<f64>().map_err(|_| ConfigError::DistributionNumber {
                    text: w.to_owned(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_args(name.as_ref(), &args)
    }

    #[must_use]
    pub fn family(&self) -> DistFamily {
        self.family
    }

    #[must_use]
    pub fn loc(&self) -> f64 {
        self.loc
    }

    #[must_use]
    pub fn scale(&self) -> f64 {
        self.scale
    }

    #[must_use]
    pub fn shape(&self) -> &[f64] {
        &self.shape
    }

    pub fn sample_one<R>(&self, rng: &mut R) -> f64
    where
        R: Rng + ?Sized,
    {
        self.loc + self.scale * self.standard.sample(rng)
    }

    /// Draws `count` values as parameters.
    #[expect(clippy::cast_possible_truncation)]
    pub fn sample<R>(&self, rng: &mut R, count: usize) -> Vec<f32>
    where
        R: Rng + ?Sized,
    {
        (0..count).map(|_| self.sample_one(rng) as f32).collect()
    }
}

impl PartialEq for Dist {
    fn eq(&self, other: &Self) -> bool {
        self.family == other.family
            && self.shape == other.shape
            && self.loc == other.loc
            && self.scale == other.scale
    }
}

impl fmt::Display for Dist {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.family.name())?;
        for arg in &self.shape {
            write!(f, "{arg}, ")?;
        }
        write!(f, "l={}, s={})", self.loc, self.scale)
    }
}

impl TryFrom<DistRepr> for Dist {
    type Error = ConfigError;

    fn try_from(repr: DistRepr) -> Result<Self, Self::Error> {
        Self::new(
            DistFamily::from_name(&repr.family)?,
            repr.shape,
            repr.loc,
            repr.scale,
        )
    }
}

impl From<Dist> for DistRepr {
    fn from(dist: Dist) -> Self {
        Self {
            family: dist.family.name().to_owned(),
            shape: dist.shape,
            loc: dist.loc,
            scale: dist.scale,
        }
    }
}
