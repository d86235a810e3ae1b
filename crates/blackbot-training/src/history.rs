//! Training history attached to parameter sets.
//!
//! Every completed session appends one [`HistoryRecord`] to the history its
//! starting seed carried, so a parameter set keeps the full lineage of the
//! sessions that produced it. Entries that were merged from several lineages
//! are kept verbatim as [`HistoryItem::Combined`].
//!
//! Histories written by older versions used different key names and omitted
//! some fields. [`normalize_record`] rewrites such records into the current
//! shape once, on load, so nothing else has to know about the old layouts.

use std::collections::{BTreeMap, BTreeSet};

use blackbot_evaluator::dist::DistributionConfig;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// Starting points of a session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedsRecord {
    /// Params keys of the stored seeds.
    pub stored: Vec<String>,
    /// Random seeds handed to the trainer.
    pub count: usize,
    /// Random seeds drawn to choose them from.
    pub pool: usize,
}

/// The level a session trained on; counts are `-1` when unknown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelRecord {
    pub key: String,
    pub features: i64,
    pub actions: i64,
    pub steps: i64,
}

/// Description of one completed training session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub date: DateTime<Utc>,
    pub bot: String,
    pub trainer: String,
    /// Trainer config values; `None` for records that did not save them.
    pub config: Option<Vec<f64>>,
    pub dists: DistributionConfig,
    /// Per-feature weights; empty when all are one.
    #[serde(default)]
    pub emphases: Vec<f32>,
    pub phases: Vec<f32>,
    pub seeds: SeedsRecord,
    #[serde(default)]
    pub param_map: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub param_freeze: BTreeSet<String>,
    #[serde(default)]
    pub param_scale: BTreeMap<String, f32>,
    pub level: LevelRecord,
    #[serde(default = "default_runs")]
    pub runs: usize,
    #[serde(default)]
    pub output: String,
    /// Trainer steps actually taken.
    #[serde(default)]
    pub steps: usize,
    /// Final score on each evaluation level.
    #[serde(default)]
    pub scores: BTreeMap<String, f64>,
    /// Wall-clock duration in seconds.
    #[serde(default)]
    pub time: f64,
    pub prngs_seed: Option<u64>,
}

fn default_runs() -> usize {
    1
}

/// One history entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HistoryItem {
    Record(Box<HistoryRecord>),
    /// Histories of several parameter sets merged into one; kept as stored.
    Combined(Vec<Value>),
}

impl HistoryItem {
    #[must_use]
    pub fn as_record(&self) -> Option<&HistoryRecord> {
        match self {
            Self::Record(record) => Some(record),
            Self::Combined(_) => None,
        }
    }
}

impl From<HistoryRecord> for HistoryItem {
    fn from(record: HistoryRecord) -> Self {
        Self::Record(Box::new(record))
    }
}

/// Normalizes and parses a stored history list.
pub fn load_history(values: Vec<Value>) -> Result<Vec<HistoryItem>, serde_json::Error> {
    values
        .into_iter()
        .map(|value| match value {
            Value::Array(items) => Ok(HistoryItem::Combined(items)),
            other => serde_json::from_value(normalize_record(other)).map(HistoryItem::Record),
        })
        .collect()
}

fn rename(record: &mut Map<String, Value>, old: &str, new: &str) {
    if !record.contains_key(new)
        && let Some(value) = record.remove(old)
    {
        record.insert(new.to_owned(), value);
    }
}

fn fill(record: &mut Map<String, Value>, key: &str, default: Value) {
    record.entry(key).or_insert(default);
}

/// Date after which `anneal` records really were annealing sessions.
fn anneal_cutoff() -> Option<DateTime<Utc>> {
    Some(
        NaiveDate::from_ymd_opt(2016, 5, 28)?
            .and_hms_opt(10, 0, 0)?
            .and_utc(),
    )
}

/// Rewrites a record in any older layout into the current one.
///
/// Records that already have the current layout come out unchanged.
#[must_use]
pub fn normalize_record(value: Value) -> Value {
    let Value::Object(mut record) = value else {
        return value;
    };

    let bot = match record.get("bot").and_then(Value::as_str) {
        Some("linear_1") => Some("linear"),
        Some("linear_2") => Some("states_1"),
        Some("quadratic_1") => Some("quadratic"),
        _ => None,
    };
    if let Some(bot) = bot {
        record.insert("bot".into(), bot.into());
    }

    let date = record
        .get("date")
        .cloned()
        .and_then(|d| serde_json::from_value::<DateTime<Utc>>(d).ok());
    let early = matches!((date, anneal_cutoff()), (Some(d), Some(cut)) if d < cut);
    let trainer = match record.get("trainer").and_then(Value::as_str) {
        Some("local_dec") => Some("local_d"),
        Some("anneal") if early => Some("local_d"),
        Some("anneal_dec") => Some("anneal"),
        _ => None,
    };
    if let Some(trainer) = trainer {
        record.insert("trainer".into(), trainer.into());
    }

    fill(&mut record, "config", Value::Null);

    if let Some(Value::Object(dists)) = record.get_mut("dists") {
        rename(dists, "float", "real");
        rename(dists, "float01", "unit");
        fill(dists, "new", json!({}));
        fill(dists, "vary", json!({}));
    }

    fill(&mut record, "emphases", json!([]));
    fill(&mut record, "phases", json!([1.0]));

    normalize_seeds(&mut record);

    rename(&mut record, "params_map", "param_map");
    fill(&mut record, "param_map", json!({}));
    if let Some(Value::Object(map)) = record.get_mut("param_map") {
        for dests in map.values_mut() {
            if dests.is_string() {
                *dests = Value::Array(vec![dests.take()]);
            }
        }
    }
    rename(&mut record, "params_freeze", "param_freeze");
    fill(&mut record, "param_freeze", json!([]));
    fill(&mut record, "param_scale", json!({}));

    if let Some(Value::String(key)) = record.get("level") {
        let level = json!({"key": key, "features": -1, "actions": -1, "steps": -1});
        record.insert("level".into(), level);
    }

    match record.remove("scores") {
        Some(Value::Array(scores)) => {
            let train = scores.into_iter().next().unwrap_or(Value::Null);
            record.insert("scores".into(), train_score(train));
        }
        Some(scores) => {
            record.insert("scores".into(), scores);
        }
        None => {
            let train = record.remove("best_score").unwrap_or(Value::Null);
            record.insert("scores".into(), train_score(train));
        }
    }

    rename(&mut record, "rand_seed", "prngs_seed");
    if !record.get("prngs_seed").is_some_and(Value::is_u64) {
        record.insert("prngs_seed".into(), Value::Null);
    }

    Value::Object(record)
}

/// `{train: score}`, or no scores at all when none was saved.
fn train_score(score: Value) -> Value {
    if score.is_number() {
        json!({ "train": score })
    } else {
        json!({})
    }
}

fn normalize_seeds(record: &mut Map<String, Value>) {
    let bot = record
        .get("bot")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_owned();
    let Some(seeds) = record.get_mut("seeds") else {
        record.insert("seeds".into(), json!({"stored": [], "count": 0, "pool": 0}));
        return;
    };
    if let Value::Array(parts) = seeds {
        let mut parts = std::mem::take(parts).into_iter();
        let stored = parts.next().unwrap_or_else(|| json!([]));
        let count = parts.next().unwrap_or_else(|| json!(0));
        let pool = parts.next().unwrap_or_else(|| json!(0));
        *seeds = json!({"stored": stored, "count": count, "pool": pool});
    }
    if let Some(Value::Array(stored)) = seeds.get_mut("stored") {
        for key in stored.iter_mut() {
            let Some(text) = key.as_str() else { continue };
            let renamed = if !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit()) {
                format!("{bot}_{text}")
            } else if let Some(rest) = text.strip_prefix("linear_1_") {
                format!("linear_{rest}")
            } else {
                continue;
            };
            *key = renamed.into();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn current() -> HistoryRecord {
        HistoryRecord {
            date: "2020-01-02T03:04:05Z".parse().unwrap(),
            bot: "linear".into(),
            trainer: "local".into(),
            config: Some(vec![100.0, 1.0]),
            dists: DistributionConfig::default(),
            emphases: vec![],
            phases: vec![1.0],
            seeds: SeedsRecord {
                stored: vec!["linear_0".into()],
                count: 1,
                pool: 5,
            },
            param_map: BTreeMap::new(),
            param_freeze: BTreeSet::new(),
            param_scale: BTreeMap::new(),
            level: LevelRecord {
                key: "train".into(),
                features: 4,
                actions: 3,
                steps: 100,
            },
            runs: 1,
            output: "linear_1".into(),
            steps: 100,
            scores: BTreeMap::from([("train".into(), 12.5)]),
            time: 0.25,
            prngs_seed: Some(7),
        }
    }

    fn legacy() -> Value {
        let dists = serde_json::to_value(DistributionConfig::default()).unwrap();
        let mut dists = dists.as_object().unwrap().clone();
        dists.insert("float".into(), dists["real"].clone());
        dists.insert("float01".into(), dists["unit"].clone());
        for key in ["real", "unit", "new", "vary"] {
            dists.remove(key);
        }
        json!({
            "date": "2016-05-01T00:00:00Z",
            "bot": "linear_2",
            "trainer": "anneal",
            "dists": dists,
            "seeds": [["3", "linear_1_4", "linear_12"], 1, 10],
            "params_map": {"state0l": "state1l"},
            "params_freeze": ["state0l"],
            "level": "train",
            "best_score": 42.0,
            "rand_seed": 99,
        })
    }

    #[test]
    fn test_current_records_are_unchanged() {
        let value = serde_json::to_value(current()).unwrap();
        assert_eq!(normalize_record(value.clone()), value);
        let items = load_history(vec![value]).unwrap();
        assert_eq!(items, vec![HistoryItem::from(current())]);
    }

    #[test]
    fn test_legacy_record_is_normalized() {
        let items = load_history(vec![legacy()]).unwrap();
        let record = items[0].as_record().unwrap();
        assert_eq!(record.bot, "states_1");
        assert_eq!(record.trainer, "local_d");
        assert_eq!(record.config, None);
        assert_eq!(record.dists, DistributionConfig::default());
        assert!(record.emphases.is_empty());
        assert_eq!(record.phases, vec![1.0]);
        assert_eq!(record.seeds.stored, vec!["states_1_3", "linear_4", "linear_12"]);
        assert_eq!((record.seeds.count, record.seeds.pool), (1, 10));
        assert_eq!(record.param_map["state0l"], vec!["state1l"]);
        assert!(record.param_freeze.contains("state0l"));
        assert!(record.param_scale.is_empty());
        assert_eq!(record.level.features, -1);
        assert_eq!(record.scores.get("train"), Some(&42.0));
        assert_eq!(record.prngs_seed, Some(99));
    }

    #[test]
    fn test_trainer_renames_depend_on_date() {
        let mut late = legacy();
        late["date"] = json!("2017-01-01T00:00:00Z");
        let record = normalize_record(late);
        assert_eq!(record["trainer"], "anneal");

        let mut dec = legacy();
        dec["trainer"] = json!("anneal_dec");
        assert_eq!(normalize_record(dec)["trainer"], "anneal");
    }

    #[test]
    fn test_missing_scores_and_list_scores() {
        let mut none = legacy();
        none.as_object_mut().unwrap().remove("best_score");
        assert_eq!(normalize_record(none)["scores"], json!({}));

        let mut list = legacy();
        list["scores"] = json!([3.5, 1.0]);
        assert_eq!(normalize_record(list)["scores"], json!({"train": 3.5}));
    }

    #[test]
    fn test_combined_entries_are_kept() {
        let combined = json!([{"bot": "linear"}, {"bot": "states_1"}]);
        let items = load_history(vec![combined.clone()]).unwrap();
        assert!(matches!(&items[0], HistoryItem::Combined(v) if v.len() == 2));
        assert_eq!(serde_json::to_value(&items[0]).unwrap(), combined);
    }
}
