//! Bots and the parameters they are built from.
//!
//! A bot is a parameterized policy: given the current level state it picks an
//! action. This crate defines what bots are made of and how they are built,
//! so that trainers can treat them as opaque scored objects.
//!
//! - [`params`] - [`ParamSet`](params::ParamSet) arrays and per-architecture [`ParamSpec`](params::ParamSpec)
//! - [`transform`] - map/scale/freeze directives for moving sets between architectures
//! - [`phases`] - validated level phase splits for multi-phase bots
//! - [`emphasis`] - per-feature mutation weights
//! - [`dist`] - configured distributions for drawing and varying parameters
//! - [`bot`] - the [`Bot`](bot::Bot) capability, concrete architectures and [`BotBuilder`](bot::BotBuilder)
//!
//! # Architecture
//!
//! ```text
//! DistributionConfig ─┐
//! ParamTransform ─────┼─> BotBuilder ──> Box<dyn Bot> ──evaluate──> score
//! Phases ─────────────┘        │
//!                      ParamSpec (validated key set)
//! ```
//!
//! All configuration is validated against the architecture's key set before
//! anything is drawn or evaluated; mistakes surface as [`ConfigError`].

pub mod bot;
pub mod dist;
pub mod emphasis;
pub mod params;
pub mod phases;
pub mod transform;

/// A configuration mistake, detected before any search work starts.
#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum ConfigError {
    #[display("no such distribution '{name}'")]
    UnknownDistribution { name: String },
    #[display("missing distribution name")]
    MissingDistribution,
    #[display("distribution '{name}' takes {expected} shape argument(s), got {got}")]
    DistributionArity {
        name: &'static str,
        expected: usize,
        got: usize,
    },
    #[display("invalid arguments for distribution '{name}': {reason}")]
    DistributionParams { name: &'static str, reason: String },
    #[display("'{text}' is not a number")]
    DistributionNumber { text: String },
    #[display("phase ends must be level time fractions in (0, 1), got {value}")]
    PhaseOutOfRange { value: f32 },
    #[display("phase ends must be strictly increasing, got {value} after {previous}")]
    PhaseNotIncreasing { previous: f32, value: f32 },
    #[display("{directive} names unknown parameter '{key}'")]
    UnknownParam { directive: &'static str, key: String },
    #[display("emphasis index {index} out of range for {features} features")]
    EmphasisIndex { index: i64, features: usize },
    #[display("unknown bot '{name}'")]
    UnknownBot { name: String },
}
