use rand::{Rng, SeedableRng as _};
use rand_distr::StandardNormal;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use crate::{Episode, LevelError, Policy, SessionRng};

/// Immutable description of a level.
///
/// `features`, `actions` and `steps` are what bots are sized and scored
/// against. `seed` fixes the generated dynamics, so the same descriptor always
/// yields the same [`Level`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelDesc {
    pub key: String,
    pub features: usize,
    pub actions: usize,
    pub steps: usize,
    #[serde(default)]
    pub seed: u64,
}

impl LevelDesc {
    #[must_use]
    pub fn new(key: impl Into<String>, features: usize, actions: usize, steps: usize, seed: u64) -> Self {
        Self {
            key: key.into(),
            features,
            actions,
            steps,
            seed,
        }
    }
}

/// A synthetic environment.
///
/// The state is a vector of `features` reals. Each step the chosen action
/// pushes the state by a fixed per-action offset, every component decays
/// towards zero and leaks into its neighbour, and Gaussian noise drawn from
/// the session generator is added. The step reward is a fixed linear function
/// of the new state; the episode score is the sum of rewards.
///
/// ```text
/// s'[f] = decay[f]·s[f] + coupling[f]·s[f+1] + effect[a][f] + noise
/// r     = Σ reward[f]·s'[f]
/// ```
#[derive(Debug, Clone)]
pub struct Level {
    desc: LevelDesc,
    decay: Vec<f32>,
    coupling: Vec<f32>,
    effects: Vec<Vec<f32>>,
    reward: Vec<f32>,
}

const NOISE_SIGMA: f32 = 0.3;
const INITIAL_SIGMA: f32 = 1.0;
const COUPLING_SIGMA: f32 = 0.1;
const EFFECT_SIGMA: f32 = 0.5;
const REWARD_SIGMA: f32 = 1.0;

/// A centered normal draw with standard deviation `sigma`.
fn gaussian<R>(rng: &mut R, sigma: f32) -> f32
where
    R: Rng + ?Sized,
{
    sigma * rng.sample::<f32, _>(StandardNormal)
}

impl Level {
    pub fn new(desc: LevelDesc) -> Result<Self, LevelError> {
        for (count, what) in [
            (desc.features, "feature"),
            (desc.actions, "action"),
            (desc.steps, "step"),
        ] {
            if count == 0 {
                return Err(LevelError::Empty {
                    key: desc.key.clone(),
                    what,
                });
            }
        }

        let mut gen_rng = Pcg32::seed_from_u64(desc.seed);

        let decay = (0..desc.features)
            .map(|_| gen_rng.random_range(0.5..0.95))
            .collect();
        let coupling = (0..desc.features)
            .map(|_| gaussian(&mut gen_rng, COUPLING_SIGMA))
            .collect();
        let effects = (0..desc.actions)
            .map(|_| {
                (0..desc.features)
                    .map(|_| gaussian(&mut gen_rng, EFFECT_SIGMA))
                    .collect()
            })
            .collect();
        let reward = (0..desc.features)
            .map(|_| gaussian(&mut gen_rng, REWARD_SIGMA))
            .collect();

        tracing::trace!(key = %desc.key, seed = desc.seed, "generated level dynamics");

        Ok(Self {
            desc,
            decay,
            coupling,
            effects,
            reward,
        })
    }

    #[must_use]
    pub fn desc(&self) -> &LevelDesc {
        &self.desc
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.desc.key
    }

    #[must_use]
    pub fn features(&self) -> usize {
        self.desc.features
    }

    #[must_use]
    pub fn actions(&self) -> usize {
        self.desc.actions
    }

    #[must_use]
    pub fn steps(&self) -> usize {
        self.desc.steps
    }

    /// Starts a new episode with a random initial state.
    pub fn start<R>(&self, rng: &mut R) -> Episode<'_>
    where
        R: Rng + ?Sized,
    {
        let state = (0..self.features())
            .map(|_| gaussian(rng, INITIAL_SIGMA))
            .collect();
        Episode::new(self, state)
    }

    pub(crate) fn advance<R>(&self, state: &mut [f32], action: usize, rng: &mut R) -> f32
    where
        R: Rng + ?Sized,
    {
        let n = state.len();
        let previous = state.to_vec();
        let effect = &self.effects[action];
        for f in 0..n {
            state[f] = self.decay[f] * previous[f]
                + self.coupling[f] * previous[(f + 1) % n]
                + effect[f]
                + gaussian(rng, NOISE_SIGMA);
        }
        state.iter().zip(&self.reward).map(|(s, r)| s * r).sum()
    }

    /// Plays `runs` episodes with the given policy and returns the mean score.
    ///
    /// The policy is reset before each episode.
    pub fn play<P>(&self, runs: usize, rng: &mut SessionRng, policy: &mut P) -> f64
    where
        P: Policy + ?Sized,
    {
        let runs = runs.max(1);
        let mut total = 0.0;
        for _ in 0..runs {
            policy.reset();
            let mut episode = self.start(rng);
            while !episode.is_done() {
                let action = policy.act(episode.state(), episode.progress());
                episode.step(action, rng);
            }
            total += episode.score();
        }
        #[expect(clippy::cast_precision_loss)]
        let mean = total / runs as f64;
        mean
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desc() -> LevelDesc {
        LevelDesc::new("test", 4, 3, 20, 11)
    }

    #[test]
    fn test_rejects_empty_dimensions() {
        let mut d = desc();
        d.actions = 0;
        assert!(matches!(
            Level::new(d),
            Err(LevelError::Empty { what: "action", .. })
        ));
    }

    #[test]
    fn test_generation_is_deterministic() {
        let a = Level::new(desc()).unwrap();
        let b = Level::new(desc()).unwrap();
        assert_eq!(a.decay, b.decay);
        assert_eq!(a.effects, b.effects);
        assert_eq!(a.reward, b.reward);
    }

    #[test]
    fn test_play_is_reproducible_given_seed() {
        let level = Level::new(desc()).unwrap();
        let score = |seed| {
            let mut rng = SessionRng::from_seed(seed);
            level.play(3, &mut rng, &mut |state: &[f32], _: f32| usize::from(state[0] > 0.0))
        };
        assert_eq!(score(5).to_bits(), score(5).to_bits());
    }

    #[test]
    fn test_actions_matter() {
        let level = Level::new(desc()).unwrap();
        let fixed = |action: usize| {
            let mut rng = SessionRng::from_seed(3);
            level.play(1, &mut rng, &mut |_: &[f32], _: f32| action)
        };
        assert_ne!(fixed(0).to_bits(), fixed(1).to_bits());
    }

    #[test]
    fn test_desc_json_seed_defaults_to_zero() {
        let d: LevelDesc =
            serde_json::from_str(r#"{"key":"x","features":2,"actions":2,"steps":5}"#).unwrap();
        assert_eq!(d.seed, 0);
    }
}
