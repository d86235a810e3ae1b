//! Gradient-free training of bot parameters.
//!
//! This crate searches parameter space for bots that score well on a level.
//! It never looks inside a bot: candidates are built through
//! [`BotFactory`](seed_pool::BotFactory) and scored with
//! [`Bot::evaluate`](blackbot_evaluator::bot::Bot::evaluate).
//!
//! # How Training Works
//!
//! 1. **Seeding** - [`SeedPool`](seed_pool::SeedPool) collects stored parameter
//!    sets and the best of a pool of random draws
//! 2. **Start** - the trainer re-evaluates the seeds and starts from the best
//! 3. **Search** - each step proposes a mutated parameter set, evaluates it
//!    and decides whether to move there
//! 4. **Record** - the best parameters leave with their seed's history plus
//!    one [`HistoryRecord`](history::HistoryRecord) describing the session
//!
//! # Architecture
//!
//! ```text
//! SeedConfig ──> SeedPool::build ──> Vec<Seed>
//!                                       │
//! TrainerConfig ──> Trainer::train <────┘
//!                        │ propose / evaluate / accept
//!                        ▼
//!                   TrainOutput (ParamSet + history)
//! ```
//!
//! [`TrainingSession`](session::TrainingSession) strings these steps together
//! and also scores the result on the evaluation levels.
//!
//! # Strategies
//!
//! - `local` / `local_d` - hill climbing, the latter tolerating a shrinking decline
//! - `anneal` / `anneal_d` - annealing with a linear or exponential cooling schedule
//! - `comb` - exhaustive sweeps over fixed-size coordinate subsets
//! - `select` - no search, only picks the best seed
//!
//! See the [`trainer`] module for the exact acceptance rules.
//!
//! # Reproducibility
//!
//! All randomness flows through one [`SessionRng`](blackbot_engine::SessionRng)
//! passed down explicitly. Given the same seed and configuration, a session
//! draws, evaluates and accepts exactly the same candidates.

use blackbot_evaluator::{ConfigError, bot::BotError, params::ParamError};

pub mod history;
pub mod propose;
pub mod seed_pool;
pub mod session;
pub mod trainer;

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum TrainError {
    #[display("{_0}")]
    Config(ConfigError),
    #[display("{_0}")]
    Bot(BotError),
    #[display("{_0}")]
    Params(ParamError),
    #[display("cannot choose {count} seeds from a pool of just {pool}")]
    SeedCount { count: usize, pool: usize },
    #[display("random seeds take a pool size and an optional count, got {got} values")]
    SeedArgs { got: usize },
    #[display("no seeds to start training from")]
    NoSeeds,
    #[display("unknown trainer '{name}'")]
    UnknownTrainer { name: String },
    #[display("trainer '{trainer}' takes at most {max} config values, got {got}")]
    TrainerArity {
        trainer: &'static str,
        max: usize,
        got: usize,
    },
    #[display("invalid config for trainer '{trainer}': {reason}")]
    TrainerConfig {
        trainer: &'static str,
        reason: String,
    },
}

impl From<ConfigError> for TrainError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<BotError> for TrainError {
    fn from(e: BotError) -> Self {
        Self::Bot(e)
    }
}

impl From<ParamError> for TrainError {
    fn from(e: ParamError) -> Self {
        Self::Params(e)
    }
}
