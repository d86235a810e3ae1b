//! Starting points for trainers.
//!
//! A training session starts from stored parameter sets (curated priors,
//! always kept) and from the best of a pool of random draws. The pool is a
//! bounded min-heap keyed on `(score, insertion index)`: whenever it holds
//! more than `stored + count` entries the lowest scored one is evicted, the
//! oldest first among equal scores. Bots themselves are never compared.

use std::{
    cmp::{Ordering, Reverse},
    collections::{BTreeMap, BinaryHeap},
};

use blackbot_engine::SessionRng;
use blackbot_evaluator::{
    bot::{Bot, BotBuilder, BotError},
    params::ParamSet,
};

use crate::{TrainError, history::HistoryItem};

/// Builds the bots the pool is filled with.
pub trait BotFactory {
    fn random(&self, rng: &mut SessionRng) -> Result<Box<dyn Bot>, BotError>;

    fn from_stored(&self, params: &ParamSet, rng: &mut SessionRng) -> Result<Box<dyn Bot>, BotError>;
}

impl BotFactory for BotBuilder {
    fn random(&self, rng: &mut SessionRng) -> Result<Box<dyn Bot>, BotError> {
        BotBuilder::random(self, rng)
    }

    fn from_stored(&self, params: &ParamSet, rng: &mut SessionRng) -> Result<Box<dyn Bot>, BotError> {
        BotBuilder::from_stored(self, params, rng)
    }
}

/// A parameter set loaded from storage, with the history it carries.
#[derive(Debug, Clone)]
pub struct StoredSeed {
    pub key: String,
    pub params: ParamSet,
    pub history: Vec<HistoryItem>,
}

/// Which seeds to hand to the trainer.
#[derive(Debug, Clone)]
pub struct SeedConfig {
    stored: Vec<StoredSeed>,
    pool: usize,
    count: usize,
}

impl SeedConfig {
    /// Fails when more random seeds are requested than the pool draws.
    pub fn new(stored: Vec<StoredSeed>, pool: usize, count: usize) -> Result<Self, TrainError> {
        if count > pool {
            return Err(TrainError::SeedCount { count, pool });
        }
        Ok(Self {
            stored,
            pool,
            count,
        })
    }

    /// Builds the config from a `[pool [count]]` list.
    ///
    /// The count defaults to one. Without stored seeds a zero pool is
    /// replaced by a single random seed, so training always has a start.
    pub fn from_args(stored: Vec<StoredSeed>, random: &[usize]) -> Result<Self, TrainError> {
        let (pool, count) = match *random {
            [pool] => (pool, 1),
            [pool, count] => (pool, count),
            _ => return Err(TrainError::SeedArgs { got: random.len() }),
        };
        let (pool, count) = if stored.is_empty() && pool == 0 {
            (1, 1)
        } else {
            (pool, count)
        };
        Self::new(stored, pool, count)
    }

    #[must_use]
    pub fn stored(&self) -> &[StoredSeed] {
        &self.stored
    }

    #[must_use]
    pub fn pool(&self) -> usize {
        self.pool
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.count
    }

    #[must_use]
    pub fn stored_keys(&self) -> Vec<String> {
        self.stored.iter().map(|s| s.key.clone()).collect()
    }
}

/// A bot to start training from.
#[derive(Debug)]
pub struct Seed {
    pub bot: Box<dyn Bot>,
    pub history: Vec<HistoryItem>,
    /// Score the seed was ranked by; infinite for stored seeds.
    pub score: f64,
}

#[derive(Debug, Clone, Copy)]
struct Rank {
    score: f64,
    index: usize,
}

impl PartialEq for Rank {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Rank {}

impl PartialOrd for Rank {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Rank {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then(self.index.cmp(&other.index))
    }
}

/// The seeds a trainer starts from, in insertion order.
#[derive(Debug)]
pub struct SeedPool {
    seeds: Vec<Seed>,
}

impl SeedPool {
    /// Loads the stored seeds and keeps the best `count` of `pool` random draws.
    ///
    /// Random bots are scored by averaging `runs` evaluations.
    pub fn build<F>(
        config: SeedConfig,
        factory: &F,
        runs: usize,
        rng: &mut SessionRng,
    ) -> Result<Self, TrainError>
    where
        F: BotFactory + ?Sized,
    {
        let SeedConfig {
            stored,
            pool,
            count,
        } = config;
        let capacity = stored.len() + count;
        let mut heap = BinaryHeap::new();
        let mut payloads = BTreeMap::new();

        for (index, seed) in stored.into_iter().enumerate() {
            let bot = factory.from_stored(&seed.params, rng)?;
            tracing::debug!(key = %seed.key, "loaded stored seed");
            heap.push(Reverse(Rank {
                score: f64::INFINITY,
                index,
            }));
            payloads.insert(index, (bot, seed.history));
        }

        let offset = payloads.len();
        for i in 0..pool {
            let bot = factory.random(rng)?;
            let score = bot.evaluate(runs, rng)?;
            let index = offset + i;
            tracing::trace!(index, score, "drew random seed");
            heap.push(Reverse(Rank { score, index }));
            payloads.insert(index, (bot, vec![]));
            if heap.len() > capacity
                && let Some(Reverse(evicted)) = heap.pop()
            {
                payloads.remove(&evicted.index);
            }
        }

        let mut ranks: Vec<Rank> = heap.into_iter().map(|Reverse(rank)| rank).collect();
        ranks.sort_unstable_by_key(|rank| rank.index);
        let seeds: Vec<Seed> = ranks
            .into_iter()
            .filter_map(|rank| {
                let (bot, history) = payloads.remove(&rank.index)?;
                Some(Seed {
                    bot,
                    history,
                    score: rank.score,
                })
            })
            .collect();

        tracing::info!(
            seeds = seeds.len(),
            stored = offset,
            random = seeds.len() - offset,
            pool,
            "built seed pool"
        );
        Ok(Self { seeds })
    }

    #[must_use]
    pub fn seeds(&self) -> &[Seed] {
        &self.seeds
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.seeds.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seeds.is_empty()
    }

    #[must_use]
    pub fn into_seeds(self) -> Vec<Seed> {
        self.seeds
    }
}
