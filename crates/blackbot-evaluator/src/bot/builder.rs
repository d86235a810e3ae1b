use std::sync::Arc;

use blackbot_engine::{Level, SessionRng};

use crate::{
    ConfigError,
    dist::DistributionConfig,
    params::{ParamArray, ParamKind, ParamSet, ParamSpec},
    phases::Phases,
    transform::ParamTransform,
};

use super::{Bot, BotError, BotKind, PHASES_KEY};

/// Builds bots of one architecture on one level.
///
/// Holds the validated session configuration: the distributions fresh
/// parameters are drawn from, the directives applied to stored parameter
/// sets, and the phase split of phased architectures.
#[derive(Debug, Clone)]
pub struct BotBuilder {
    kind: BotKind,
    level: Arc<Level>,
    dists: DistributionConfig,
    transform: ParamTransform,
    phases: Option<Phases>,
    spec: ParamSpec,
}

impl BotBuilder {
    /// Validates `dists` and `transform` against the architecture's key set.
    ///
    /// `phases` overrides the phases stored with imported parameters; without
    /// it fresh phased bots cover the whole level.
    pub fn new(
        kind: BotKind,
        level: Arc<Level>,
        dists: &DistributionConfig,
        transform: &ParamTransform,
        phases: Option<Phases>,
    ) -> Result<Self, ConfigError> {
        if phases.is_some() && !kind.is_phased() {
            tracing::warn!(bot = %kind, "phases given for a single-phase bot, ignoring them");
        }
        let phases = phases.filter(|_| kind.is_phased());
        let spec = kind.param_spec(level.desc(), phases.as_ref().unwrap_or(&Phases::whole()));
        dists.validate(&spec)?;
        transform.validate(&spec)?;
        Ok(Self {
            kind,
            level,
            dists: dists.clone(),
            transform: transform.clone(),
            phases,
            spec,
        })
    }

    #[must_use]
    pub fn kind(&self) -> BotKind {
        self.kind
    }

    #[must_use]
    pub fn level(&self) -> &Arc<Level> {
        &self.level
    }

    #[must_use]
    pub fn dists(&self) -> &DistributionConfig {
        &self.dists
    }

    #[must_use]
    pub fn transform(&self) -> &ParamTransform {
        &self.transform
    }

    /// Key set of freshly drawn bots.
    #[must_use]
    pub fn spec(&self) -> &ParamSpec {
        &self.spec
    }

    /// A bot with every parameter drawn from its initial distribution.
    pub fn random(&self, rng: &mut SessionRng) -> Result<Box<dyn Bot>, BotError> {
        let phases = self.phases.clone().unwrap_or_default();
        let mut params = ParamSet::new();
        self.fill(&self.spec, &phases, &mut params, rng);
        self.kind.build(Arc::clone(&self.level), params)
    }

    /// A bot seeded from a stored parameter set.
    ///
    /// The set is mapped and scaled by the directives, keys the architecture
    /// does not have are dropped, and missing keys are drawn fresh.
    pub fn from_stored(&self, stored: &ParamSet, rng: &mut SessionRng) -> Result<Box<dyn Bot>, BotError> {
        let mapped = self.transform.apply_map(stored)?;
        let mut params = self.transform.apply_scale(&mapped);

        let phases = match &self.phases {
            Some(phases) => phases.clone(),
            None => self.kind.stored_phases(&params)?,
        };
        let spec = self.kind.param_spec(self.level.desc(), &phases);

        let dropped: Vec<String> = params
            .keys()
            .filter(|k| !spec.contains(k))
            .map(str::to_owned)
            .collect();
        for key in &dropped {
            params.remove(key);
        }
        if !dropped.is_empty() {
            tracing::debug!(keys = ?dropped, "dropped stored parameters unknown to {}", self.kind);
        }

        self.fill(&spec, &phases, &mut params, rng);
        self.kind.build(Arc::clone(&self.level), params)
    }

    fn fill(&self, spec: &ParamSpec, phases: &Phases, params: &mut ParamSet, rng: &mut SessionRng) {
        for def in spec.defs() {
            if def.kind == ParamKind::Fixed {
                if def.key == PHASES_KEY {
                    params.insert(PHASES_KEY, ParamArray::from_vec(phases.ends().to_vec()));
                }
                continue;
            }
            if params.contains_key(&def.key) {
                continue;
            }
            let values = self.dists.sample(&def.key, def.kind, def.len(), rng);
            if let Some(array) = ParamArray::new(def.shape.clone(), values) {
                params.insert(def.key.clone(), array);
            }
            tracing::trace!(key = %def.key, "drew fresh parameter");
        }
    }
}

#[cfg(test)]
mod tests {
    use blackbot_engine::LevelDesc;

    use crate::{dist::Dist, params::ParamError};

    use super::*;

    fn level() -> Arc<Level> {
        Arc::new(Level::new(LevelDesc::new("t", 3, 2, 10, 1)).unwrap())
    }

    fn builder(kind: BotKind, transform: &ParamTransform, phases: Option<Phases>) -> BotBuilder {
        BotBuilder::new(kind, level(), &DistributionConfig::default(), transform, phases).unwrap()
    }

    #[test]
    fn test_random_bots_match_spec() {
        let mut rng = SessionRng::from_seed(2);
        for kind in BotKind::ALL {
            let b = builder(kind, &ParamTransform::default(), None);
            let bot = b.random(&mut rng).unwrap();
            assert_eq!(bot.spec(), b.spec());
        }
    }

    #[test]
    fn test_unit_params_stay_in_range() {
        let mut dists = DistributionConfig::default();
        dists.new.insert("mix".into(), Dist::parse(&["norm", "0.5", "3"]).unwrap());
        let b = BotBuilder::new(
            BotKind::States1,
            level(),
            &dists,
            &ParamTransform::default(),
            None,
        )
        .unwrap();
        let bot = b.random(&mut SessionRng::from_seed(4)).unwrap();
        assert!(
            bot.params()
                .get("mix")
                .unwrap()
                .values()
                .iter()
                .all(|v| (0.0..=1.0).contains(v))
        );
    }

    #[test]
    fn test_rejects_unknown_directive_keys() {
        let transform = ParamTransform::from_pairs([], ["state1l".to_owned()], []);
        assert!(matches!(
            BotBuilder::new(
                BotKind::Linear,
                level(),
                &DistributionConfig::default(),
                &transform,
                None
            ),
            Err(ConfigError::UnknownParam { directive: "param_freeze", .. })
        ));

        let mut dists = DistributionConfig::default();
        dists.vary.insert("coeffs".into(), Dist::parse(&["norm"]).unwrap());
        assert!(matches!(
            BotBuilder::new(
                BotKind::Linear,
                level(),
                &dists,
                &ParamTransform::default(),
                None
            ),
            Err(ConfigError::UnknownParam { directive: "dist_param_vary", .. })
        ));
    }

    #[test]
    fn test_stored_linear_seeds_states_bot() {
        let mut rng = SessionRng::from_seed(5);
        let linear = builder(BotKind::Linear, &ParamTransform::default(), None)
            .random(&mut rng)
            .unwrap();
        let transform = ParamTransform::from_pairs(
            [("state0l".to_owned(), "state1l".to_owned())],
            [],
            [("state1l".to_owned(), 0.5)],
        );
        let bot = builder(BotKind::States1, &transform, None)
            .from_stored(linear.params(), &mut rng)
            .unwrap();

        let state0l = linear.params().get("state0l").unwrap().values();
        assert_eq!(bot.params().get("state0l").unwrap().values(), state0l);
        let halved: Vec<f32> = state0l.iter().map(|v| v * 0.5).collect();
        assert_eq!(bot.params().get("state1l").unwrap().values(), halved.as_slice());
        assert_eq!(bot.params().get("mix").unwrap().len(), 3);
    }

    #[test]
    fn test_stored_keys_unknown_to_architecture_are_dropped() {
        let mut rng = SessionRng::from_seed(6);
        let states = builder(BotKind::States1, &ParamTransform::default(), None)
            .random(&mut rng)
            .unwrap();
        let bot = builder(BotKind::Linear, &ParamTransform::default(), None)
            .from_stored(states.params(), &mut rng)
            .unwrap();
        assert!(!bot.params().contains_key("mix"));
        assert_eq!(bot.params().get("constant"), states.params().get("constant"));
    }

    #[test]
    fn test_stored_shape_mismatch_is_rejected() {
        let mut params = ParamSet::new();
        params.insert("constant", ParamArray::zeros(vec![5]));
        let err = builder(BotKind::Linear, &ParamTransform::default(), None)
            .from_stored(&params, &mut SessionRng::from_seed(0))
            .unwrap_err();
        assert!(matches!(
            err,
            BotError::Params(ParamError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_explicit_phases_override_stored() {
        let mut rng = SessionRng::from_seed(7);
        let stored = builder(
            BotKind::LinearMulti,
            &ParamTransform::default(),
            Some(Phases::normalize(&[0.3]).unwrap()),
        )
        .random(&mut rng)
        .unwrap();
        assert_eq!(stored.params().get(PHASES_KEY).unwrap().values(), &[0.3, 1.0]);

        // stored phases are kept when none are given
        let kept = builder(BotKind::LinearMulti, &ParamTransform::default(), None)
            .from_stored(stored.params(), &mut rng)
            .unwrap();
        assert_eq!(kept.params().get(PHASES_KEY), stored.params().get(PHASES_KEY));

        // a different split needs arrays of a different shape
        let err = builder(
            BotKind::LinearMulti,
            &ParamTransform::default(),
            Some(Phases::normalize(&[0.2, 0.6]).unwrap()),
        )
        .from_stored(stored.params(), &mut rng)
        .unwrap_err();
        assert!(matches!(err, BotError::Params(ParamError::ShapeMismatch { .. })));
    }
}
