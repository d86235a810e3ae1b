use std::collections::BTreeMap;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{
    ConfigError,
    params::{ParamKind, ParamSpec},
};

use super::Dist;

/// How a trainer should vary one coordinate.
#[derive(Debug, Clone, Copy)]
pub enum Variation<'a> {
    /// Add a scaled draw to the current value (from a `vary` override).
    Offset(&'a Dist),
    /// Move towards a fresh draw of the initial distribution.
    Redraw(&'a Dist),
}

/// The distributions of one training session.
///
/// `new` and `vary` only override specific parameter keys; every other key
/// falls back to `unit` when its values are constrained to `[0, 1]` and to
/// `real` otherwise. `variations` gives the number of coordinates changed per
/// trainer step and `acceptance` the threshold used by annealing trainers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionConfig {
    pub real: Dist,
    pub unit: Dist,
    #[serde(default)]
    pub new: BTreeMap<String, Dist>,
    #[serde(default)]
    pub vary: BTreeMap<String, Dist>,
    pub variations: Dist,
    pub acceptance: Dist,
}

impl Default for DistributionConfig {
    fn default() -> Self {
        let dist = |words: &[&str]| Dist::parse(words).expect("default distributions are valid");
        Self {
            real: dist(&["norm", "0", "11"]),
            unit: dist(&["beta", "0", "1", "1.2", "1.2"]),
            new: BTreeMap::new(),
            vary: BTreeMap::new(),
            variations: dist(&["beta", "1", "27", "2", "6"]),
            acceptance: dist(&["beta", "-10", ".001", "19", "1"]),
        }
    }
}

impl DistributionConfig {
    /// Rejects overrides for keys the architecture does not have.
    pub fn validate(&self, spec: &ParamSpec) -> Result<(), ConfigError> {
        for key in self.new.keys() {
            spec.check_key("dist_param_new", key)?;
        }
        for key in self.vary.keys() {
            spec.check_key("dist_param_vary", key)?;
        }
        Ok(())
    }

    fn fallback(&self, kind: ParamKind) -> &Dist {
        match kind {
            ParamKind::Unit => &self.unit,
            ParamKind::Real | ParamKind::Fixed => &self.real,
        }
    }

    /// Distribution for initial draws of `key`.
    #[must_use]
    pub fn initial(&self, key: &str, kind: ParamKind) -> &Dist {
        self.new.get(key).unwrap_or_else(|| self.fallback(kind))
    }

    /// How to vary `key`: a `vary` override adds offsets, anything else redraws.
    #[must_use]
    pub fn variation(&self, key: &str, kind: ParamKind) -> Variation<'_> {
        match self.vary.get(key) {
            Some(dist) => Variation::Offset(dist),
            None => Variation::Redraw(self.initial(key, kind)),
        }
    }

    /// Draws `count` initial values for `key`, clamped to `[0, 1]` for unit parameters.
    pub fn sample<R>(&self, key: &str, kind: ParamKind, count: usize, rng: &mut R) -> Vec<f32>
    where
        R: Rng + ?Sized,
    {
        let mut values = self.initial(key, kind).sample(rng, count);
        if kind == ParamKind::Unit {
            for v in &mut values {
                *v = v.clamp(0.0, 1.0);
            }
        }
        values
    }

    /// Number of coordinates to change in one step, rounded and at least `minimum`.
    #[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn sample_variations<R>(&self, minimum: usize, rng: &mut R) -> usize
    where
        R: Rng + ?Sized,
    {
        let drawn = self.variations.sample_one(rng).round();
        if drawn.is_finite() && drawn > 0.0 {
            (drawn as usize).max(minimum)
        } else {
            minimum
        }
    }

    pub fn sample_acceptance<R>(&self, rng: &mut R) -> f64
    where
        R: Rng + ?Sized,
    {
        self.acceptance.sample_one(rng)
    }
}

#[cfg(test)]
mod tests {
    use blackbot_engine::SessionRng;

    use crate::params::ParamDef;

    use super::*;

    fn config() -> DistributionConfig {
        let mut c = DistributionConfig::default();
        c.new
            .insert("constant".into(), Dist::parse(&["uniform", "100", "1"]).unwrap());
        c.vary
            .insert("state0l".into(), Dist::parse(&["norm", "0", ".01"]).unwrap());
        c
    }

    #[test]
    fn test_resolution_order() {
        let c = config();
        assert_eq!(c.initial("constant", ParamKind::Real), &c.new["constant"]);
        assert_eq!(c.initial("state0l", ParamKind::Real), &c.real);
        assert_eq!(c.initial("mix", ParamKind::Unit), &c.unit);

        assert!(matches!(c.variation("state0l", ParamKind::Real), Variation::Offset(d) if d == &c.vary["state0l"]));
        assert!(matches!(c.variation("constant", ParamKind::Real), Variation::Redraw(d) if d == &c.new["constant"]));
        assert!(matches!(c.variation("mix", ParamKind::Unit), Variation::Redraw(d) if d == &c.unit));
    }

    #[test]
    fn test_sample_uses_override() {
        let c = config();
        let mut rng = SessionRng::from_seed(0);
        assert!(c
            .sample("constant", ParamKind::Real, 20, &mut rng)
            .iter()
            .all(|v| (100.0..=101.0).contains(v)));
    }

    #[test]
    fn test_unit_samples_are_clamped() {
        let mut c = DistributionConfig::default();
        c.unit = Dist::parse(&["norm", "0.5", "3"]).unwrap();
        let mut rng = SessionRng::from_seed(1);
        assert!(c
            .sample("mix", ParamKind::Unit, 100, &mut rng)
            .iter()
            .all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn test_variations_respect_minimum() {
        let mut c = DistributionConfig::default();
        c.variations = Dist::parse(&["uniform", "-5", "1"]).unwrap();
        let mut rng = SessionRng::from_seed(2);
        for _ in 0..20 {
            assert_eq!(c.sample_variations(3, &mut rng), 3);
        }
        let c = DistributionConfig::default();
        for _ in 0..20 {
            let k = c.sample_variations(1, &mut rng);
            assert!((1..=28).contains(&k));
        }
    }

    #[test]
    fn test_validate_rejects_unknown_override() {
        let spec = ParamSpec::new(vec![ParamDef::new("constant", vec![2], ParamKind::Real, false)]);
        let c = config();
        assert!(matches!(
            c.validate(&spec),
            Err(ConfigError::UnknownParam { directive: "dist_param_vary", key }) if key == "state0l"
        ));
    }

    #[test]
    fn test_serde_roundtrip_keeps_overrides() {
        let c = config();
        let back: DistributionConfig =
            serde_json::from_str(&serde_json::to_string(&c).unwrap()).unwrap();
        assert_eq!(back, c);
    }
}
