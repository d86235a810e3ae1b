//! Proposing candidate parameter sets.
//!
//! A proposal changes a few coordinates of the current parameter set. Only
//! coordinates of mutable arrays are eligible: frozen keys and fixed metadata
//! such as phase splits are never touched. Each changed coordinate moves by an
//! amount drawn from its configured distribution, scaled by the emphasis
//! weight of the state feature it multiplies:
//!
//! ```text
//! offset (vary override):  v' = v + w · draw
//! redraw (otherwise):      v' = v + w · (draw - v)
//! ```
//!
//! With `w = 1` a redraw replaces the value outright; smaller weights keep
//! the new value closer to the old one. Unit-range values are clamped back
//! into `[0, 1]`.

use std::collections::BTreeSet;

use blackbot_engine::SessionRng;
use blackbot_evaluator::{
    dist::{DistributionConfig, Variation},
    emphasis::Emphases,
    params::{ParamKind, ParamSet, ParamSpec},
};
use rand::seq::index;

/// One mutable scalar of a parameter set.
#[derive(Debug, Clone, PartialEq)]
pub struct Coordinate {
    pub key: String,
    pub index: usize,
    pub kind: ParamKind,
    /// Emphasis weight of the feature this coordinate multiplies.
    pub weight: f32,
}

#[derive(Debug, Clone)]
pub struct Proposer<'a> {
    dists: &'a DistributionConfig,
    coordinates: Vec<Coordinate>,
}

impl<'a> Proposer<'a> {
    /// Collects the coordinates of the `mutable` keys of `spec`.
    #[must_use]
    pub fn new(
        spec: &ParamSpec,
        mutable: &BTreeSet<String>,
        emphases: &Emphases,
        dists: &'a DistributionConfig,
    ) -> Self {
        let mut coordinates = vec![];
        for def in spec.defs() {
            if def.kind == ParamKind::Fixed || !mutable.contains(&def.key) {
                continue;
            }
            for index in 0..def.len() {
                coordinates.push(Coordinate {
                    key: def.key.clone(),
                    index,
                    kind: def.kind,
                    weight: def.feature_of(index).map_or(1.0, |f| emphases.weight(f)),
                });
            }
        }
        Self { dists, coordinates }
    }

    #[must_use]
    pub fn coordinates(&self) -> &[Coordinate] {
        &self.coordinates
    }

    /// `count` distinct coordinate indices, or all of them if there are fewer.
    pub fn choose(&self, count: usize, rng: &mut SessionRng) -> Vec<usize> {
        let len = self.coordinates.len();
        index::sample(rng, len, count.min(len)).into_vec()
    }

    /// A copy of `params` with the `chosen` coordinates varied.
    #[expect(clippy::cast_possible_truncation)]
    pub fn vary(&self, params: &ParamSet, chosen: &[usize], rng: &mut SessionRng) -> ParamSet {
        let mut varied = params.clone();
        for coord in chosen.iter().filter_map(|&i| self.coordinates.get(i)) {
            let Some(value) = varied
                .get_mut(&coord.key)
                .and_then(|array| array.values_mut().get_mut(coord.index))
            else {
                continue;
            };
            let current = f64::from(*value);
            let weight = f64::from(coord.weight);
            let next = match self.dists.variation(&coord.key, coord.kind) {
                Variation::Offset(dist) => current + weight * dist.sample_one(rng),
                Variation::Redraw(dist) => current + weight * (dist.sample_one(rng) - current),
            };
            *value = next as f32;
            if coord.kind == ParamKind::Unit {
                *value = value.clamp(0.0, 1.0);
            }
        }
        varied
    }
}

/// Lexicographic `k`-subsets of `0..n`.
#[derive(Debug, Clone)]
pub struct Combinations {
    n: usize,
    indices: Option<Vec<usize>>,
}

impl Combinations {
    /// Empty when `k` is zero or larger than `n`.
    #[must_use]
    pub fn new(n: usize, k: usize) -> Self {
        let indices = (k > 0 && k <= n).then(|| (0..k).collect());
        Self { n, indices }
    }
}

impl Iterator for Combinations {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.indices.clone()?;
        let indices = self.indices.as_mut()?;
        let k = indices.len();
        // rightmost position that can still move right
        match (0..k).rev().find(|&i| indices[i] < self.n - k + i) {
            Some(i) => {
                indices[i] += 1;
                for j in i + 1..k {
                    indices[j] = indices[j - 1] + 1;
                }
            }
            None => self.indices = None,
        }
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use blackbot_evaluator::{
        dist::Dist,
        params::{ParamArray, ParamDef},
    };

    use super::*;

    fn spec() -> ParamSpec {
        ParamSpec::new(vec![
            ParamDef::new("_phases", vec![2], ParamKind::Fixed, false),
            ParamDef::new("mix", vec![2], ParamKind::Unit, true),
            ParamDef::new("state0l", vec![2, 2], ParamKind::Real, true),
        ])
    }

    fn params() -> ParamSet {
        let mut p = ParamSet::new();
        p.insert("_phases", ParamArray::from_vec(vec![0.5, 1.0]));
        p.insert("mix", ParamArray::from_vec(vec![0.5, 0.5]));
        p.insert("state0l", ParamArray::zeros(vec![2, 2]));
        p
    }

    fn all_keys() -> BTreeSet<String> {
        params().keys().map(str::to_owned).collect()
    }

    #[test]
    fn test_fixed_and_frozen_keys_have_no_coordinates() {
        let dists = DistributionConfig::default();
        let emphases = Emphases::uniform(2);
        let p = Proposer::new(&spec(), &all_keys(), &emphases, &dists);
        assert_eq!(p.coordinates().len(), 6);
        assert!(p.coordinates().iter().all(|c| c.key != "_phases"));

        let mutable = BTreeSet::from(["mix".to_owned()]);
        let p = Proposer::new(&spec(), &mutable, &emphases, &dists);
        assert_eq!(p.coordinates().len(), 2);
    }

    #[test]
    fn test_emphasis_follows_feature_axis() {
        let dists = DistributionConfig::default();
        let emphases = Emphases::from_pairs(2, &[(-1, 3.0)]).unwrap();
        let p = Proposer::new(&spec(), &all_keys(), &emphases, &dists);
        let weights: Vec<f32> = p
            .coordinates()
            .iter()
            .filter(|c| c.key == "state0l")
            .map(|c| c.weight)
            .collect();
        assert_eq!(weights, vec![1.0, 3.0, 1.0, 3.0]);
    }

    #[test]
    fn test_choose_is_distinct_and_bounded() {
        let dists = DistributionConfig::default();
        let emphases = Emphases::uniform(2);
        let p = Proposer::new(&spec(), &all_keys(), &emphases, &dists);
        let mut rng = SessionRng::from_seed(0);
        let mut chosen = p.choose(4, &mut rng);
        chosen.sort_unstable();
        chosen.dedup();
        assert_eq!(chosen.len(), 4);
        assert_eq!(p.choose(100, &mut rng).len(), 6);
    }

    #[test]
    fn test_vary_changes_only_chosen_coordinates() {
        let dists = DistributionConfig::default();
        let emphases = Emphases::uniform(2);
        let p = Proposer::new(&spec(), &all_keys(), &emphases, &dists);
        let index = p
            .coordinates()
            .iter()
            .position(|c| c.key == "state0l" && c.index == 3)
            .unwrap();
        let varied = p.vary(&params(), &[index], &mut SessionRng::from_seed(1));
        let values = varied.get("state0l").unwrap().values();
        assert!(values[..3].iter().all(|v| *v == 0.0));
        assert_ne!(values[3], 0.0);
        assert_eq!(varied.get("mix"), params().get("mix"));
        assert_eq!(varied.get("_phases"), params().get("_phases"));
    }

    #[test]
    fn test_offset_variation_scales_with_emphasis() {
        let mut dists = DistributionConfig::default();
        dists.vary.insert("state0l".into(), Dist::parse(&["uniform", "1", "1e-9"]).unwrap());
        let emphases = Emphases::from_pairs(2, &[(0, 0.5)]).unwrap();
        let p = Proposer::new(&spec(), &all_keys(), &emphases, &dists);
        let chosen: Vec<usize> = p
            .coordinates()
            .iter()
            .enumerate()
            .filter(|(_, c)| c.key == "state0l")
            .map(|(i, _)| i)
            .collect();
        let varied = p.vary(&params(), &chosen, &mut SessionRng::from_seed(2));
        assert_eq!(varied.get("state0l").unwrap().values(), &[0.5, 1.0, 0.5, 1.0]);
    }

    #[test]
    fn test_unit_values_are_clamped() {
        let mut dists = DistributionConfig::default();
        dists.vary.insert("mix".into(), Dist::parse(&["uniform", "5", "1e-9"]).unwrap());
        let emphases = Emphases::uniform(2);
        let p = Proposer::new(&spec(), &all_keys(), &emphases, &dists);
        let varied = p.vary(&params(), &[0, 1], &mut SessionRng::from_seed(3));
        assert_eq!(varied.get("mix").unwrap().values(), &[1.0, 1.0]);
    }

    #[test]
    fn test_combinations_are_lexicographic() {
        let all: Vec<_> = Combinations::new(4, 2).collect();
        assert_eq!(
            all,
            vec![
                vec![0, 1],
                vec![0, 2],
                vec![0, 3],
                vec![1, 2],
                vec![1, 3],
                vec![2, 3]
            ]
        );
        assert_eq!(Combinations::new(3, 3).count(), 1);
        assert_eq!(Combinations::new(2, 3).count(), 0);
        assert_eq!(Combinations::new(2, 0).count(), 0);
    }
}
