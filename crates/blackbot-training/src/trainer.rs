//! Search strategies.
//!
//! Every strategy starts from the best seed (seeds are re-evaluated, the
//! first one wins ties) and repeats one step primitive for a fixed number of
//! steps:
//!
//! 1. **Propose** - draw a variation count `k` (at least the strategy's
//!    minimum) and vary `k` distinct mutable coordinates, see [`propose`](crate::propose)
//! 2. **Evaluate** - build the candidate bot and average `runs` evaluations
//! 3. **Accept** - decide whether the candidate replaces the current bot
//!
//! # Acceptance
//!
//! With `t` the step index, `T` the step count and `Δ = candidate - current`:
//!
//! | trainer    | accepts when                                                     |
//! |------------|------------------------------------------------------------------|
//! | `local`    | `Δ ≥ 0`                                                          |
//! | `local_d`  | `Δ ≥ -decline · (1 - t/T)`                                       |
//! | `anneal`   | `Δ ≥ 0` or `Δ ≥ a · temperature · (1 - t/T)`                     |
//! | `anneal_d` | `Δ ≥ 0` or `Δ ≥ a · temperature · final^(t/T)`                   |
//! | `comb`     | best neighbour of a full sweep has `Δ ≥ 0`                       |
//! | `select`   | never steps                                                      |
//!
//! where `a` is drawn from the acceptance distribution for each decision. With
//! the default acceptance distribution `a` is close to `-10`, so early steps
//! tolerate declines of about ten temperatures and later ones almost none.
//!
//! `comb` does not sample coordinates: each step is a sweep over every
//! `arity`-sized coordinate subset in lexicographic order, each subset varied
//! once from the current bot.
//!
//! Trainers that may move downhill return the best parameters seen, not the
//! last accepted ones.

use std::{fmt, str::FromStr};

use blackbot_engine::SessionRng;
use blackbot_evaluator::{
    bot::Bot, dist::DistributionConfig, emphasis::Emphases, params::ParamSet,
    transform::ParamTransform,
};

use crate::{
    TrainError,
    history::{HistoryItem, HistoryRecord},
    propose::{Combinations, Proposer},
    seed_pool::Seed,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrainerKind {
    Local,
    LocalDecline,
    Anneal,
    AnnealDecay,
    Comb,
    Select,
}

impl TrainerKind {
    pub const ALL: [Self; 6] = [
        Self::Local,
        Self::LocalDecline,
        Self::Anneal,
        Self::AnnealDecay,
        Self::Comb,
        Self::Select,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::LocalDecline => "local_d",
            Self::Anneal => "anneal",
            Self::AnnealDecay => "anneal_d",
            Self::Comb => "comb",
            Self::Select => "select",
        }
    }

    /// Names of the config values, in order; the first one is always the step count.
    #[must_use]
    pub const fn config_names(self) -> &'static [&'static str] {
        match self {
            Self::Local => &["steps", "min_variations"],
            Self::LocalDecline => &["steps", "min_variations", "decline"],
            Self::Anneal => &["steps", "min_variations", "temperature"],
            Self::AnnealDecay => &["steps", "min_variations", "temperature", "final"],
            Self::Comb => &["steps", "arity"],
            Self::Select => &["steps"],
        }
    }
}

impl fmt::Display for TrainerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TrainerKind {
    type Err = TrainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.name() == s)
            .ok_or_else(|| TrainError::UnknownTrainer { name: s.to_owned() })
    }
}

/// A validated strategy with its parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum TrainerConfig {
    Local {
        steps: usize,
        min_variations: usize,
    },
    LocalDecline {
        steps: usize,
        min_variations: usize,
        decline: f64,
    },
    Anneal {
        steps: usize,
        min_variations: usize,
        temperature: f64,
    },
    AnnealDecay {
        steps: usize,
        min_variations: usize,
        temperature: f64,
        final_factor: f64,
    },
    Comb {
        steps: usize,
        arity: usize,
    },
    Select,
}

struct ConfigReader<'a> {
    kind: TrainerKind,
    values: &'a [f64],
}

impl ConfigReader<'_> {
    fn invalid(&self, reason: String) -> TrainError {
        TrainError::TrainerConfig {
            trainer: self.kind.name(),
            reason,
        }
    }

    fn real(&self, index: usize, default: Option<f64>) -> Result<f64, TrainError> {
        let name = self.kind.config_names()[index];
        match (self.values.get(index), default) {
            (Some(v), _) if v.is_finite() => Ok(*v),
            (Some(v), _) => Err(self.invalid(format!("{name} must be finite, got {v}"))),
            (None, Some(d)) => Ok(d),
            (None, None) => Err(self.invalid(format!("missing {name}"))),
        }
    }

    #[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn count(&self, index: usize, default: Option<usize>, minimum: usize) -> Result<usize, TrainError> {
        let name = self.kind.config_names()[index];
        #[expect(clippy::cast_precision_loss)]
        let value = self.real(index, default.map(|d| d as f64))?;
        if value.fract() != 0.0 || value < 0.0 {
            return Err(self.invalid(format!("{name} must be a whole number, got {value}")));
        }
        let count = value as usize;
        if count < minimum {
            return Err(self.invalid(format!("{name} must be at least {minimum}, got {count}")));
        }
        Ok(count)
    }

    fn positive(&self, index: usize, default: f64) -> Result<f64, TrainError> {
        let name = self.kind.config_names()[index];
        let value = self.real(index, Some(default))?;
        if value > 0.0 {
            Ok(value)
        } else {
            Err(self.invalid(format!("{name} must be positive, got {value}")))
        }
    }
}

impl TrainerConfig {
    /// Parses the numeric config list of `kind`.
    ///
    /// `select` ignores a given step count.
    pub fn parse(kind: TrainerKind, values: &[f64]) -> Result<Self, TrainError> {
        let max = kind.config_names().len();
        if values.len() > max {
            return Err(TrainError::TrainerArity {
                trainer: kind.name(),
                max,
                got: values.len(),
            });
        }
        let r = ConfigReader { kind, values };
        let config = match kind {
            TrainerKind::Local => Self::Local {
                steps: r.count(0, None, 0)?,
                min_variations: r.count(1, Some(1), 1)?,
            },
            TrainerKind::LocalDecline => {
                let decline = r.real(2, Some(0.1))?;
                if decline < 0.0 {
                    return Err(r.invalid(format!("decline must not be negative, got {decline}")));
                }
                Self::LocalDecline {
                    steps: r.count(0, None, 0)?,
                    min_variations: r.count(1, Some(1), 1)?,
                    decline,
                }
            }
            TrainerKind::Anneal => Self::Anneal {
                steps: r.count(0, None, 0)?,
                min_variations: r.count(1, Some(1), 1)?,
                temperature: r.positive(2, 1.0)?,
            },
            TrainerKind::AnnealDecay => Self::AnnealDecay {
                steps: r.count(0, None, 0)?,
                min_variations: r.count(1, Some(1), 1)?,
                temperature: r.positive(2, 1.0)?,
                final_factor: r.positive(3, 0.1)?,
            },
            TrainerKind::Comb => Self::Comb {
                steps: r.count(0, None, 0)?,
                arity: r.count(1, Some(1), 1)?,
            },
            TrainerKind::Select => Self::Select,
        };
        Ok(config)
    }

    #[must_use]
    pub fn kind(&self) -> TrainerKind {
        match self {
            Self::Local { .. } => TrainerKind::Local,
            Self::LocalDecline { .. } => TrainerKind::LocalDecline,
            Self::Anneal { .. } => TrainerKind::Anneal,
            Self::AnnealDecay { .. } => TrainerKind::AnnealDecay,
            Self::Comb { .. } => TrainerKind::Comb,
            Self::Select => TrainerKind::Select,
        }
    }

    #[must_use]
    pub fn steps(&self) -> usize {
        match *self {
            Self::Local { steps, .. }
            | Self::LocalDecline { steps, .. }
            | Self::Anneal { steps, .. }
            | Self::AnnealDecay { steps, .. }
            | Self::Comb { steps, .. } => steps,
            Self::Select => 0,
        }
    }

    /// The full config list, defaults included, as recorded in history.
    #[must_use]
    #[expect(clippy::cast_precision_loss)]
    pub fn values(&self) -> Vec<f64> {
        match *self {
            Self::Local {
                steps,
                min_variations,
            } => vec![steps as f64, min_variations as f64],
            Self::LocalDecline {
                steps,
                min_variations,
                decline,
            } => vec![steps as f64, min_variations as f64, decline],
            Self::Anneal {
                steps,
                min_variations,
                temperature,
            } => vec![steps as f64, min_variations as f64, temperature],
            Self::AnnealDecay {
                steps,
                min_variations,
                temperature,
                final_factor,
            } => vec![steps as f64, min_variations as f64, temperature, final_factor],
            Self::Comb { steps, arity } => vec![steps as f64, arity as f64],
            Self::Select => vec![],
        }
    }
}

/// Result of a training run.
#[derive(Debug, Clone)]
pub struct TrainOutput {
    params: ParamSet,
    score: f64,
    carried: Vec<HistoryItem>,
    record: HistoryRecord,
}

impl TrainOutput {
    #[must_use]
    pub fn params(&self) -> &ParamSet {
        &self.params
    }

    /// Training-level score of the returned parameters.
    #[must_use]
    pub fn score(&self) -> f64 {
        self.score
    }

    /// The record describing this run, appended last to the history.
    #[must_use]
    pub fn record(&self) -> &HistoryRecord {
        &self.record
    }

    pub fn record_mut(&mut self) -> &mut HistoryRecord {
        &mut self.record
    }

    /// Length of the history including this run's record.
    #[must_use]
    pub fn history_len(&self) -> usize {
        self.carried.len() + 1
    }

    /// The parameters and the winning seed's history extended by this run's record.
    #[must_use]
    pub fn into_parts(self) -> (ParamSet, Vec<HistoryItem>) {
        let mut history = self.carried;
        history.push(self.record.into());
        (self.params, history)
    }
}

/// State of a running search.
struct Search {
    current: Box<dyn Bot>,
    score: f64,
    best: ParamSet,
    best_score: f64,
    history: Vec<HistoryItem>,
    accepted: usize,
}

impl Search {
    /// Re-evaluates the seeds and starts from the first best one.
    fn start(seeds: Vec<Seed>, runs: usize, rng: &mut SessionRng) -> Result<Self, TrainError> {
        let mut best: Option<(Seed, f64)> = None;
        for seed in seeds {
            let score = seed.bot.evaluate(runs, rng)?;
            if best.as_ref().is_none_or(|(_, s)| score > *s) {
                best = Some((seed, score));
            }
        }
        let (seed, score) = best.ok_or(TrainError::NoSeeds)?;
        Ok(Self {
            best: seed.bot.params().clone(),
            current: seed.bot,
            score,
            best_score: score,
            history: seed.history,
            accepted: 0,
        })
    }

    fn accept(&mut self, candidate: Box<dyn Bot>, score: f64) {
        self.accepted += 1;
        if score >= self.best_score {
            self.best = candidate.params().clone();
            self.best_score = score;
        }
        self.current = candidate;
        self.score = score;
    }
}

/// Runs one strategy over a seed population.
#[derive(Debug, Clone)]
pub struct Trainer<'a> {
    config: TrainerConfig,
    dists: &'a DistributionConfig,
    emphases: &'a Emphases,
    transform: &'a ParamTransform,
    runs: usize,
}

impl<'a> Trainer<'a> {
    /// `transform` supplies the frozen keys; its other directives were applied to the seeds already.
    #[must_use]
    pub fn new(
        config: TrainerConfig,
        dists: &'a DistributionConfig,
        emphases: &'a Emphases,
        transform: &'a ParamTransform,
        runs: usize,
    ) -> Self {
        Self {
            config,
            dists,
            emphases,
            transform,
            runs,
        }
    }

    #[must_use]
    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    /// Searches from the best of `seeds` and appends `record` to the winner's history.
    ///
    /// `record.steps` is set to the number of steps taken.
    pub fn train(
        &self,
        seeds: Vec<Seed>,
        mut record: HistoryRecord,
        rng: &mut SessionRng,
    ) -> Result<TrainOutput, TrainError> {
        let mut search = Search::start(seeds, self.runs, rng)?;
        let mutable = self.transform.freeze_mask(search.current.params());
        let proposer = Proposer::new(search.current.spec(), &mutable, self.emphases, self.dists);
        let steps = self.config.steps();
        tracing::info!(
            trainer = %self.config.kind(),
            steps,
            coordinates = proposer.coordinates().len(),
            score = search.score,
            "training started"
        );

        for t in 0..steps {
            match self.config {
                TrainerConfig::Comb { arity, .. } => self.sweep(&proposer, arity, &mut search, rng)?,
                _ => self.step(&proposer, t, &mut search, rng)?,
            }
        }

        tracing::info!(
            score = search.best_score,
            accepted = search.accepted,
            "training finished"
        );
        record.steps = steps;
        Ok(TrainOutput {
            params: search.best,
            score: search.best_score,
            carried: search.history,
            record,
        })
    }

    fn min_variations(&self) -> usize {
        match self.config {
            TrainerConfig::Local { min_variations, .. }
            | TrainerConfig::LocalDecline { min_variations, .. }
            | TrainerConfig::Anneal { min_variations, .. }
            | TrainerConfig::AnnealDecay { min_variations, .. } => min_variations,
            TrainerConfig::Comb { arity, .. } => arity,
            TrainerConfig::Select => 1,
        }
    }

    fn step(
        &self,
        proposer: &Proposer<'_>,
        t: usize,
        search: &mut Search,
        rng: &mut SessionRng,
    ) -> Result<(), TrainError> {
        let k = self.dists.sample_variations(self.min_variations(), rng);
        let chosen = proposer.choose(k, rng);
        let params = proposer.vary(search.current.params(), &chosen, rng);
        let candidate = search.current.with_params(params)?;
        let score = candidate.evaluate(self.runs, rng)?;
        tracing::trace!(step = t, variations = chosen.len(), score, "evaluated candidate");
        if self.accepts(t, search.score, score, rng) {
            tracing::debug!(step = t, from = search.score, to = score, "accepted candidate");
            search.accept(candidate, score);
        }
        Ok(())
    }

    fn sweep(
        &self,
        proposer: &Proposer<'_>,
        arity: usize,
        search: &mut Search,
        rng: &mut SessionRng,
    ) -> Result<(), TrainError> {
        let n = proposer.coordinates().len();
        let mut best: Option<(Box<dyn Bot>, f64)> = None;
        for subset in Combinations::new(n, arity.min(n)) {
            let params = proposer.vary(search.current.params(), &subset, rng);
            let candidate = search.current.with_params(params)?;
            let score = candidate.evaluate(self.runs, rng)?;
            if best.as_ref().is_none_or(|(_, s)| score > *s) {
                best = Some((candidate, score));
            }
        }
        if let Some((candidate, score)) = best
            && score >= search.score
        {
            tracing::debug!(from = search.score, to = score, "accepted sweep neighbour");
            search.accept(candidate, score);
        }
        Ok(())
    }

    #[expect(clippy::cast_precision_loss)]
    fn accepts(&self, t: usize, current: f64, candidate: f64, rng: &mut SessionRng) -> bool {
        let delta = candidate - current;
        let progress = t as f64 / self.config.steps().max(1) as f64;
        match self.config {
            TrainerConfig::LocalDecline { decline, .. } => delta >= -decline * (1.0 - progress),
            TrainerConfig::Anneal { temperature, .. } => {
                delta >= 0.0
                    || delta >= self.dists.sample_acceptance(rng) * temperature * (1.0 - progress)
            }
            TrainerConfig::AnnealDecay {
                temperature,
                final_factor,
                ..
            } => {
                delta >= 0.0
                    || delta
                        >= self.dists.sample_acceptance(rng)
                            * temperature
                            * final_factor.powf(progress)
            }
            TrainerConfig::Local { .. } | TrainerConfig::Comb { .. } | TrainerConfig::Select => {
                delta >= 0.0
            }
        }
    }
}
