use std::sync::Arc;

use blackbot_engine::{Level, SessionRng};

use crate::{
    params::{ParamSet, ParamSpec},
    phases::Phases,
};

use super::{Bot, BotError, BotKind, activations, argmax, checked_score};

/// Linear policy, optionally with one coefficient set per level phase.
///
/// ```text
/// action = argmax_a ( constant[p][a] + Σ_f state0l[p][a][f] · state[f] )
/// ```
///
/// where `p` is the phase containing the elapsed fraction of the level
/// (always 0 for the single-phase `linear` architecture).
#[derive(Debug, Clone)]
pub struct LinearBot {
    kind: BotKind,
    level: Arc<Level>,
    spec: ParamSpec,
    params: ParamSet,
    phases: Phases,
}

impl LinearBot {
    pub(super) fn new(
        kind: BotKind,
        level: Arc<Level>,
        spec: ParamSpec,
        params: ParamSet,
        phases: Phases,
    ) -> Self {
        Self {
            kind,
            level,
            spec,
            params,
            phases,
        }
    }

    #[must_use]
    pub fn phases(&self) -> &Phases {
        &self.phases
    }

    /// Action for `state` at the elapsed fraction `progress`.
    #[must_use]
    pub fn act(&self, state: &[f32], progress: f32) -> usize {
        // both arrays were validated against the param spec on construction
        let (Some(constant), Some(coeffs)) = (self.params.get("constant"), self.params.get("state0l"))
        else {
            return 0;
        };
        let offset = self.phases.phase_at(progress) * self.level.actions();
        argmax(activations(constant, coeffs, offset, state))
    }
}

impl Bot for LinearBot {
    fn params(&self) -> &ParamSet {
        &self.params
    }

    fn spec(&self) -> &ParamSpec {
        &self.spec
    }

    fn with_params(&self, params: ParamSet) -> Result<Box<dyn Bot>, BotError> {
        self.kind.build(Arc::clone(&self.level), params)
    }

    fn evaluate(&self, runs: usize, rng: &mut SessionRng) -> Result<f64, BotError> {
        let score = self
            .level
            .play(runs, rng, &mut |state: &[f32], progress: f32| self.act(state, progress));
        checked_score(score)
    }
}
