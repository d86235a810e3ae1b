//! Params and level files under a data directory.
//!
//! ```text
//! <root>/params/<bot>_<key>.json   parameter arrays plus a reserved "__history" list
//! <root>/levels/<key>.json         level descriptors
//! ```

use std::path::PathBuf;

use anyhow::{Context, bail};
use blackbot_engine::{Level, LevelDesc};
use blackbot_evaluator::{
    bot::BotKind,
    params::{ParamArray, ParamSet},
};
use blackbot_training::{
    history::{HistoryItem, load_history},
    seed_pool::StoredSeed,
};
use serde_json::{Map, Value};

use crate::util::{self, Output};

const HISTORY_KEY: &str = "__history";
const LEGACY_HISTORY_KEY: &str = "history";

/// A params file after backward-compatible normalization.
#[derive(Debug, Clone)]
pub struct LoadedParams {
    pub key: String,
    pub params: ParamSet,
    pub history: Vec<HistoryItem>,
}

impl From<LoadedParams> for StoredSeed {
    fn from(loaded: LoadedParams) -> Self {
        StoredSeed {
            key: loaded.key,
            params: loaded.params,
            history: loaded.history,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Store {
    root: PathBuf,
}

impl Store {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn params_path(&self, key: &str) -> PathBuf {
        util::keyed_path(&self.root, "params", key, "json")
    }

    fn level_path(&self, key: &str) -> PathBuf {
        util::keyed_path(&self.root, "levels", key, "json")
    }

    /// The first index `i` for which `params/<prefix>_<i>.json` does not exist.
    pub fn first_free(&self, prefix: &str) -> usize {
        (0..)
            .find(|i| !self.params_path(&format!("{prefix}_{i}")).exists())
            .unwrap_or_default()
    }

    /// Resolves a params key in the context of `bot`.
    ///
    /// All-digit keys get the bot prefix, other keys are used whole so sets of
    /// another bot can be named. `last` is the highest numbered set of `bot`.
    pub fn resolve(&self, bot: BotKind, key: &str) -> anyhow::Result<String> {
        if key == "last" {
            let Some(last) = self.first_free(bot.name()).checked_sub(1) else {
                bail!("No params saved for {bot} yet");
            };
            return Ok(format!("{bot}_{last}"));
        }
        if !key.is_empty() && key.bytes().all(|b| b.is_ascii_digit()) {
            return Ok(format!("{bot}_{key}"));
        }
        let key = key.strip_prefix("params/").unwrap_or(key);
        Ok(key.strip_suffix(".json").unwrap_or(key).to_owned())
    }

    pub fn load_params(&self, bot: BotKind, key: &str) -> anyhow::Result<LoadedParams> {
        let key = self.resolve(bot, key)?;
        let path = self.params_path(&key);
        tracing::debug!(path = %path.display(), "loading params");
        let mut file: Map<String, Value> = util::read_json_file("params", &path)?;

        let history = match file
            .remove(HISTORY_KEY)
            .or_else(|| file.remove(LEGACY_HISTORY_KEY))
        {
            Some(Value::Array(items)) => load_history(items)
                .with_context(|| format!("Failed to read history of params: {}", path.display()))?,
            Some(_) => bail!("History of params {} is not a list", path.display()),
            None => vec![],
        };

        let mut params = ParamSet::new();
        for (name, value) in file {
            let array: ParamArray = serde_json::from_value(value).with_context(|| {
                format!("Failed to read array '{name}' of params: {}", path.display())
            })?;
            if ParamArray::new(array.shape().to_vec(), array.values().to_vec()).is_none() {
                bail!("Array '{name}' of params {} does not match its shape", path.display());
            }
            params.insert(name, array);
        }
        split_legacy_coeffs(&key, &mut params);

        Ok(LoadedParams {
            key,
            params,
            history,
        })
    }

    pub fn save_params(
        &self,
        key: &str,
        params: &ParamSet,
        history: &[HistoryItem],
    ) -> anyhow::Result<PathBuf> {
        let file = params_json(params, history)?;
        let path = self.params_path(key);
        tracing::debug!(path = %path.display(), "saving params");
        Output::create(path.clone())?.write_json(&file)?;
        Ok(path)
    }

    pub fn load_level(&self, key: &str) -> anyhow::Result<Level> {
        let path = self.level_path(key);
        tracing::debug!(path = %path.display(), "loading level");
        let desc: LevelDesc = util::read_json_file("level", &path)?;
        Level::new(desc).with_context(|| format!("Invalid level file: {}", path.display()))
    }

    pub fn level_exists(&self, key: &str) -> bool {
        self.level_path(key).exists()
    }

    pub fn save_level(&self, desc: &LevelDesc) -> anyhow::Result<PathBuf> {
        let path = self.level_path(&desc.key);
        Output::create(path.clone())?.write_json(desc)?;
        Ok(path)
    }
}

/// The on-disk form of a params set: its arrays plus the history list.
pub fn params_json(params: &ParamSet, history: &[HistoryItem]) -> serde_json::Result<Value> {
    let mut file = Map::new();
    for (name, array) in params {
        file.insert(name.clone(), serde_json::to_value(array)?);
    }
    file.insert(HISTORY_KEY.to_owned(), serde_json::to_value(history)?);
    Ok(Value::Object(file))
}

/// Splits the single `coeffs` array older files stored.
///
/// `linear` kept one `[actions, features + 1]` matrix with the constants
/// last; `states_1` kept two of them, one per state term.
fn split_legacy_coeffs(key: &str, params: &mut ParamSet) {
    let Some(coeffs) = params.get("coeffs") else {
        return;
    };
    let split = if key.starts_with("linear") {
        split_matrix(coeffs.shape(), coeffs.values()).map(|(constant, state)| {
            vec![("constant", constant), ("state0l", state)]
        })
    } else if key.starts_with("states_1") {
        split_states(coeffs)
    } else {
        None
    };
    let Some(arrays) = split else {
        return;
    };
    params.remove("coeffs");
    for (name, array) in arrays {
        params.insert(name, array);
    }
}

/// `[rows, cols]` into the last column and the rest.
fn split_matrix(shape: &[usize], values: &[f32]) -> Option<(ParamArray, ParamArray)> {
    let &[rows, cols] = shape else {
        return None;
    };
    let inner = cols.checked_sub(1)?;
    let mut constant = Vec::with_capacity(rows);
    let mut state = Vec::with_capacity(rows * inner);
    for row in values.chunks(cols) {
        let (coeffs, last) = row.split_at(inner);
        state.extend_from_slice(coeffs);
        constant.push(last[0]);
    }
    Some((
        ParamArray::from_vec(constant),
        ParamArray::new(vec![rows, inner], state)?,
    ))
}

fn split_states(coeffs: &ParamArray) -> Option<Vec<(&'static str, ParamArray)>> {
    let &[2, rows, cols] = coeffs.shape() else {
        return None;
    };
    let (first, second) = coeffs.values().split_at(rows * cols);
    let (c0, s0) = split_matrix(&[rows, cols], first)?;
    let (c1, s1) = split_matrix(&[rows, cols], second)?;
    let constant = c0.values().iter().zip(c1.values()).map(|(a, b)| a + b).collect();
    Some(vec![
        ("constant", ParamArray::from_vec(constant)),
        ("state0l", s0),
        ("state1l", s1),
    ])
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn store() -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path());
        (dir, store)
    }

    fn params() -> ParamSet {
        let mut p = ParamSet::new();
        p.insert("constant", ParamArray::from_vec(vec![1.0, 2.0]));
        p.insert(
            "state0l",
            ParamArray::new(vec![2, 2], vec![0.5, -0.5, 1.5, 2.5]).unwrap(),
        );
        p
    }

    fn write_raw(store: &Store, key: &str, value: &Value) {
        let path = store.params_path(key);
        Output::create(path).unwrap().write_json(value).unwrap();
    }

    #[test]
    fn test_save_then_load_keeps_arrays_and_history() {
        let (_dir, store) = store();
        let history = vec![HistoryItem::Combined(vec![json!("a")])];
        store.save_params("linear_0", &params(), &history).unwrap();
        let loaded = store.load_params(BotKind::Linear, "0").unwrap();
        assert_eq!(loaded.key, "linear_0");
        assert_eq!(loaded.params, params());
        assert_eq!(loaded.history, history);
    }

    #[test]
    fn test_first_free_and_last() {
        let (_dir, store) = store();
        assert_eq!(store.first_free("linear"), 0);
        assert!(store.resolve(BotKind::Linear, "last").is_err());
        for key in ["linear_0", "linear_1", "linear_3"] {
            store.save_params(key, &params(), &[]).unwrap();
        }
        assert_eq!(store.first_free("linear"), 2);
        assert_eq!(store.resolve(BotKind::Linear, "last").unwrap(), "linear_1");
        assert_eq!(store.resolve(BotKind::Linear, "12").unwrap(), "linear_12");
        assert_eq!(store.resolve(BotKind::Linear, "states_1_4").unwrap(), "states_1_4");
        assert_eq!(
            store.resolve(BotKind::Linear, "params/linear_3.json").unwrap(),
            "linear_3"
        );
    }

    #[test]
    fn test_legacy_linear_coeffs_are_split() {
        let (_dir, store) = store();
        let raw = json!({
            "coeffs": {"shape": [2, 3], "values": [1.0, 2.0, 3.0, 4.0, 5.0, 6.0]},
        });
        write_raw(&store, "linear_0", &raw);
        let loaded = store.load_params(BotKind::Linear, "0").unwrap();
        assert!(loaded.params.get("coeffs").is_none());
        assert_eq!(loaded.params.get("constant").unwrap().values(), &[3.0, 6.0]);
        let state = loaded.params.get("state0l").unwrap();
        assert_eq!(state.shape(), &[2, 2]);
        assert_eq!(state.values(), &[1.0, 2.0, 4.0, 5.0]);
    }

    #[test]
    fn test_legacy_states_coeffs_are_split() {
        let (_dir, store) = store();
        let raw = json!({
            "coeffs": {"shape": [2, 1, 2], "values": [1.0, 2.0, 3.0, 4.0]},
        });
        write_raw(&store, "states_1_0", &raw);
        let loaded = store.load_params(BotKind::States1, "0").unwrap();
        assert_eq!(loaded.params.get("constant").unwrap().values(), &[6.0]);
        assert_eq!(loaded.params.get("state0l").unwrap().values(), &[1.0]);
        assert_eq!(loaded.params.get("state1l").unwrap().values(), &[3.0]);
    }

    #[test]
    fn test_legacy_history_key_is_normalized() {
        let (_dir, store) = store();
        let raw = json!({
            "constant": {"shape": [1], "values": [0.0]},
            "history": [[{"bot": "linear"}]],
        });
        write_raw(&store, "linear_0", &raw);
        let loaded = store.load_params(BotKind::Linear, "0").unwrap();
        assert!(loaded.params.get("history").is_none());
        assert!(matches!(loaded.history[..], [HistoryItem::Combined(_)]));
    }

    #[test]
    fn test_malformed_array_is_rejected() {
        let (_dir, store) = store();
        let raw = json!({"constant": {"shape": [3], "values": [0.0]}});
        write_raw(&store, "linear_0", &raw);
        let err = store.load_params(BotKind::Linear, "0").unwrap_err();
        assert!(format!("{err:#}").contains("does not match its shape"));
    }

    #[test]
    fn test_level_round_trip() {
        let (_dir, store) = store();
        let desc = LevelDesc::new("train", 4, 3, 50, 7);
        assert!(!store.level_exists("train"));
        store.save_level(&desc).unwrap();
        assert!(store.level_exists("train"));
        assert_eq!(store.load_level("train").unwrap().desc(), &desc);
        assert!(store.load_level("test").is_err());
    }
}
