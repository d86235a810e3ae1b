use std::sync::Arc;

use blackbot_engine::{Level, Policy, SessionRng};

use crate::params::{ParamArray, ParamSet, ParamSpec};

use super::{Bot, BotError, BotKind, activations, argmax, checked_score};

/// Linear policy with one step of memory.
///
/// Besides the current state, the policy keeps an exponential moving average
/// of past states, `memory[f] ← mix[f]·memory[f] + (1 - mix[f])·state[f]`, and
/// adds `state1l · memory` to each action's activation.
#[derive(Debug, Clone)]
pub struct StatesBot {
    level: Arc<Level>,
    spec: ParamSpec,
    params: ParamSet,
}

impl StatesBot {
    pub(super) fn new(level: Arc<Level>, spec: ParamSpec, params: ParamSet) -> Self {
        Self {
            level,
            spec,
            params,
        }
    }

    fn policy(&self) -> Option<StatesPolicy<'_>> {
        Some(StatesPolicy {
            constant: self.params.get("constant")?,
            state0l: self.params.get("state0l")?,
            state1l: self.params.get("state1l")?,
            mix: self.params.get("mix")?,
            memory: None,
        })
    }
}

#[derive(Debug)]
struct StatesPolicy<'a> {
    constant: &'a ParamArray,
    state0l: &'a ParamArray,
    state1l: &'a ParamArray,
    mix: &'a ParamArray,
    memory: Option<Vec<f32>>,
}

impl Policy for StatesPolicy<'_> {
    fn act(&mut self, state: &[f32], _progress: f32) -> usize {
        let memory = self.memory.get_or_insert_with(|| state.to_vec());
        for ((m, s), k) in memory.iter_mut().zip(state).zip(self.mix.values()) {
            *m = k * *m + (1.0 - k) * s;
        }
        let memory = &*memory;
        let now = activations(self.constant, self.state0l, 0, state);
        let past = (0..self.constant.len()).map(|a| {
            self.state1l
                .row(a)
                .iter()
                .zip(memory)
                .map(|(c, m)| c * m)
                .sum::<f32>()
        });
        argmax(now.zip(past).map(|(n, p)| n + p))
    }

    fn reset(&mut self) {
        self.memory = None;
    }
}

impl Bot for StatesBot {
    fn params(&self) -> &ParamSet {
        &self.params
    }

    fn spec(&self) -> &ParamSpec {
        &self.spec
    }

    fn with_params(&self, params: ParamSet) -> Result<Box<dyn Bot>, BotError> {
        BotKind::States1.build(Arc::clone(&self.level), params)
    }

    fn evaluate(&self, runs: usize, rng: &mut SessionRng) -> Result<f64, BotError> {
        // arrays were validated against the param spec on construction
        let Some(mut policy) = self.policy() else {
            return Ok(f64::NEG_INFINITY);
        };
        checked_score(self.level.play(runs, rng, &mut policy))
    }
}
