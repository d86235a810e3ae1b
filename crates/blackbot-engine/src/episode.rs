use rand::Rng;

use crate::Level;

/// Chooses actions during an episode.
///
/// Implemented for plain closures taking the state and the elapsed fraction
/// of the level. Policies with per-episode memory override [`Policy::reset`].
pub trait Policy {
    fn act(&mut self, state: &[f32], progress: f32) -> usize;

    /// Called before each episode starts.
    fn reset(&mut self) {}
}

impl<F> Policy for F
where
    F: FnMut(&[f32], f32) -> usize,
{
    fn act(&mut self, state: &[f32], progress: f32) -> usize {
        self(state, progress)
    }
}

/// A single pass through a [`Level`].
///
/// Created by [`Level::start`]. Each call to [`Episode::step`] applies one
/// action and accumulates its reward until the level's step budget runs out.
#[derive(Debug, Clone)]
pub struct Episode<'a> {
    level: &'a Level,
    state: Vec<f32>,
    time: usize,
    score: f64,
}

impl<'a> Episode<'a> {
    pub(crate) fn new(level: &'a Level, state: Vec<f32>) -> Self {
        Self {
            level,
            state,
            time: 0,
            score: 0.0,
        }
    }

    #[must_use]
    pub fn state(&self) -> &[f32] {
        &self.state
    }

    #[must_use]
    pub fn time(&self) -> usize {
        self.time
    }

    /// Elapsed fraction of the level, in `[0, 1)` while the episode runs.
    #[must_use]
    #[expect(clippy::cast_precision_loss)]
    pub fn progress(&self) -> f32 {
        self.time as f32 / self.level.steps() as f32
    }

    #[must_use]
    pub fn score(&self) -> f64 {
        self.score
    }

    #[must_use]
    pub fn is_done(&self) -> bool {
        self.time >= self.level.steps()
    }

    /// Applies `action` and returns the step reward.
    ///
    /// # Panics
    ///
    /// Panics if `action` is not below the level's action count or the
    /// episode is already done.
    pub fn step<R>(&mut self, action: usize, rng: &mut R) -> f32
    where
        R: Rng + ?Sized,
    {
        assert!(!self.is_done(), "episode already finished");
        assert!(action < self.level.actions(), "action {action} out of range");
        let reward = self.level.advance(&mut self.state, action, rng);
        self.score += f64::from(reward);
        self.time += 1;
        reward
    }
}
