//! Directives for moving parameter sets between bot architectures.
//!
//! When seeding a bot with parameters trained for another architecture, some
//! arrays have to be copied under new keys (`param_map`), rescaled
//! (`param_scale`) or kept out of training altogether (`param_freeze`). The
//! three operations are independent and each one is the identity when its
//! directive is empty.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::{
    ConfigError,
    params::{ParamError, ParamSet, ParamSpec},
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamTransform {
    /// Source key to destination keys; the source array is copied to each destination.
    #[serde(default)]
    pub map: BTreeMap<String, Vec<String>>,
    /// Keys trainers must never vary.
    #[serde(default)]
    pub freeze: BTreeSet<String>,
    /// Multipliers applied to stored arrays.
    #[serde(default)]
    pub scale: BTreeMap<String, f32>,
}

impl ParamTransform {
    /// Builds directives from the command-line style pair lists.
    ///
    /// Repeated sources accumulate destinations in the order given.
    #[must_use]
    pub fn from_pairs<M, F, S>(map: M, freeze: F, scale: S) -> Self
    where
        M: IntoIterator<Item = (String, String)>,
        F: IntoIterator<Item = String>,
        S: IntoIterator<Item = (String, f32)>,
    {
        let mut this = Self::default();
        for (from, to) in map {
            this.map.entry(from).or_default().push(to);
        }
        this.freeze.extend(freeze);
        this.scale.extend(scale);
        this
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty() && self.freeze.is_empty() && self.scale.is_empty()
    }

    /// Checks that every key the directives produce or touch exists in `spec`.
    ///
    /// Map sources are not checked: they name arrays of the stored set, which
    /// may come from a different architecture.
    pub fn validate(&self, spec: &ParamSpec) -> Result<(), ConfigError> {
        for dest in self.map.values().flatten() {
            spec.check_key("param_map", dest)?;
        }
        for key in &self.freeze {
            spec.check_key("param_freeze", key)?;
        }
        for key in self.scale.keys() {
            spec.check_key("param_scale", key)?;
        }
        Ok(())
    }

    /// Copies each mapped source array to all of its destinations.
    ///
    /// Destinations are overwritten; sources and unmapped keys stay as they are.
    pub fn apply_map(&self, params: &ParamSet) -> Result<ParamSet, ParamError> {
        let mut mapped = params.clone();
        for (source, dests) in &self.map {
            let array = params.require(source)?;
            for dest in dests {
                mapped.insert(dest.clone(), array.clone());
            }
        }
        Ok(mapped)
    }

    /// Multiplies each listed array by its factor; keys absent from `params` are skipped.
    #[must_use]
    pub fn apply_scale(&self, params: &ParamSet) -> ParamSet {
        let mut scaled = params.clone();
        for (key, factor) in &self.scale {
            if let Some(array) = scaled.get_mut(key) {
                array.scale(*factor);
            }
        }
        scaled
    }

    /// Keys of `params` that trainers are allowed to vary.
    #[must_use]
    pub fn freeze_mask(&self, params: &ParamSet) -> BTreeSet<String> {
        params
            .keys()
            .filter(|k| !self.freeze.contains(*k))
            .map(str::to_owned)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use crate::params::{ParamArray, ParamDef, ParamKind};

    use super::*;

    fn set(entries: &[(&str, &[f32])]) -> ParamSet {
        entries
            .iter()
            .map(|(k, v)| ((*k).to_owned(), ParamArray::from_vec(v.to_vec())))
            .collect()
    }

    #[test]
    fn test_map_copies_source_to_destination() {
        let p = set(&[("state0l", &[1.0, 2.0])]);
        let t = ParamTransform::from_pairs([("state0l".into(), "state1l".into())], [], []);
        let mapped = t.apply_map(&p).unwrap();
        assert_eq!(mapped.get("state1l"), p.get("state0l"));
        assert_eq!(mapped.get("state0l"), p.get("state0l"));
    }

    #[test]
    fn test_map_to_multiple_destinations_overwrites() {
        let p = set(&[("a", &[1.0]), ("b", &[5.0]), ("c", &[7.0])]);
        let t = ParamTransform::from_pairs(
            [("a".into(), "b".into()), ("a".into(), "d".into())],
            [],
            [],
        );
        let mapped = t.apply_map(&p).unwrap();
        assert_eq!(mapped.get("b").unwrap().values(), &[1.0]);
        assert_eq!(mapped.get("d").unwrap().values(), &[1.0]);
        assert_eq!(mapped.get("c").unwrap().values(), &[7.0]);
    }

    #[test]
    fn test_map_missing_source_fails() {
        let p = set(&[("a", &[1.0])]);
        let t = ParamTransform::from_pairs([("x".into(), "a".into())], [], []);
        assert!(matches!(t.apply_map(&p), Err(ParamError::Missing { key }) if key == "x"));
    }

    #[test]
    fn test_scale_only_touches_listed_keys() {
        let p = set(&[("a", &[1.0, -2.0]), ("b", &[3.0])]);
        let t = ParamTransform::from_pairs([], [], [("a".into(), 0.5), ("zzz".into(), 2.0)]);
        let scaled = t.apply_scale(&p);
        assert_eq!(scaled.get("a").unwrap().values(), &[0.5, -1.0]);
        assert_eq!(scaled.get("b"), p.get("b"));
    }

    #[test]
    fn test_empty_directives_are_identity() {
        let p = set(&[("a", &[1.0, 2.0]), ("b", &[3.0])]);
        let t = ParamTransform::default();
        assert_eq!(t.apply_map(&p).unwrap(), p);
        assert_eq!(t.apply_scale(&t.apply_scale(&p)), p);
        assert_eq!(t.freeze_mask(&p).len(), 2);
    }

    #[test]
    fn test_freeze_mask_is_complement() {
        let p = set(&[("a", &[1.0]), ("b", &[2.0]), ("c", &[3.0])]);
        let t = ParamTransform::from_pairs([], ["b".to_owned(), "nope".to_owned()], []);
        let mask: Vec<_> = t.freeze_mask(&p).into_iter().collect();
        assert_eq!(mask, ["a", "c"]);
    }

    #[test]
    fn test_validate_checks_destinations_not_sources() {
        let spec = ParamSpec::new(vec![ParamDef::new("state1l", vec![1], ParamKind::Real, false)]);
        let ok = ParamTransform::from_pairs([("foreign".into(), "state1l".into())], [], []);
        ok.validate(&spec).unwrap();

        let bad = ParamTransform::from_pairs([], [], [("state9l".into(), 1.0)]);
        assert!(matches!(
            bad.validate(&spec),
            Err(ConfigError::UnknownParam { directive: "param_scale", .. })
        ));
    }
}
