//! Human-readable descriptions of records, parameters and results.
//!
//! `verbosity` 0 asks for the condensed one-line forms, anything above for
//! the expanded ones. `precision` is the number of decimals printed.

use std::collections::BTreeMap;

use blackbot_evaluator::{
    dist::{Dist, DistributionConfig},
    params::ParamSet,
};
use blackbot_training::history::{HistoryRecord, LevelRecord, SeedsRecord};
use chrono::{DateTime, Utc};

pub fn date_desc(date: &DateTime<Utc>) -> String {
    date.format("%Y-%m-%d %H:%M (UTC)").to_string()
}

/// One `<name> <dist>` line per distribution, overrides after their defaults.
pub fn dists_desc(dists: &DistributionConfig) -> String {
    let mut entries: Vec<(String, String, &Dist)> = vec![
        ("0".into(), "real".into(), &dists.real),
        ("1".into(), "unit".into(), &dists.unit),
        ("2".into(), "variations".into(), &dists.variations),
        ("3".into(), "acceptance".into(), &dists.acceptance),
    ];
    for (key, dist) in &dists.new {
        entries.push((format!("{key}new"), format!("new {key}"), dist));
    }
    for (key, dist) in &dists.vary {
        entries.push((format!("{key}vary"), format!("vary {key}"), dist));
    }
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    entries
        .iter()
        .map(|(_, name, dist)| format!("{name} {dist}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// One-based `index weight` pairs of the weights that differ from one.
pub fn emphases_desc(emphases: &[f32]) -> String {
    emphases
        .iter()
        .enumerate()
        .filter(|(_, w)| **w != 1.0)
        .map(|(i, w)| format!("{} {w}", i + 1))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn phases_desc(phases: &[f32], precision: usize) -> String {
    let precision = precision.saturating_sub(2);
    let ends: Vec<String> = phases
        .iter()
        .map(|p| format!("{:.precision$}%", f64::from(*p) * 100.0))
        .collect();
    format!("{:.precision$}% - {}", 0.0, ends.join(" - "))
}

/// `stored a, b, and random 1 out of 5`, or `a, b, 1 of 5` condensed.
pub fn seeds_desc(seeds: &SeedsRecord, verbosity: u8) -> String {
    let verbose = verbosity > 0;
    let mut desc = String::new();
    if !seeds.stored.is_empty() {
        if verbose {
            desc.push_str("stored ");
        }
        desc.push_str(&seeds.stored.join(", "));
    }
    if seeds.count > 0 {
        if !seeds.stored.is_empty() {
            desc.push_str(if verbose { ", and " } else { ", " });
        }
        if verbose {
            desc.push_str("random ");
        }
        desc.push_str(&seeds.count.to_string());
        if seeds.pool > 0 {
            desc.push_str(if verbose { " out of " } else { " of " });
            desc.push_str(&seeds.pool.to_string());
        }
    }
    desc
}

pub fn param_map_desc(map: &BTreeMap<String, Vec<String>>) -> String {
    map.iter()
        .map(|(from, to)| format!("{from}: {}", to.join(" ")))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn param_scale_desc(scale: &BTreeMap<String, f32>) -> String {
    scale
        .iter()
        .map(|(key, factor)| format!("{key} {factor}"))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn level_desc(level: &LevelRecord) -> String {
    format!(
        "{} ({}, {}, {})",
        level.key, level.features, level.actions, level.steps
    )
}

#[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn time_desc(duration: f64, precision: usize) -> String {
    let seconds = duration.rem_euclid(60.0);
    let minutes = (duration / 60.0).floor().max(0.0) as u64;
    let (hours, minutes) = (minutes / 60, minutes % 60);
    let mut desc = format!("{seconds:.precision$} s");
    if minutes > 0 || hours > 0 {
        desc = format!("{minutes} m, {desc}");
        if hours > 0 {
            desc = format!("{hours} h, {desc}");
        }
    }
    desc
}

pub fn scores_desc<'a, I>(scores: I, verbosity: u8, precision: usize) -> String
where
    I: IntoIterator<Item = (&'a str, f64)>,
{
    let scores = scores.into_iter();
    if verbosity == 0 {
        scores
            .map(|(_, s)| format!("{s:.precision$}"))
            .collect::<Vec<_>>()
            .join(" ")
    } else {
        scores
            .map(|(level, s)| format!("{level} {s:.precision$}"))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

pub fn config_desc(config: Option<&[f64]>) -> String {
    match config {
        Some(values) => values
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" "),
        None => "not saved".into(),
    }
}

/// Continuation lines of `text` indented by `width` spaces.
fn hang(text: &str, width: usize) -> String {
    text.lines()
        .collect::<Vec<_>>()
        .join(&format!("\n{}", " ".repeat(width)))
}

/// The lines describing one training record.
pub fn training_desc(record: &HistoryRecord, verbosity: u8, precision: usize) -> Vec<String> {
    let trainer = [
        record.trainer.clone(),
        config_desc(record.config.as_deref()),
    ]
    .join(" ");
    let prngs = record
        .prngs_seed
        .map_or_else(|| "---".to_owned(), |seed| seed.to_string());
    let scores = record.scores.iter().map(|(k, v)| (k.as_str(), *v));
    let mut desc = vec![
        format!("Date: {}", date_desc(&record.date)),
        format!("Bot: {}, Trainer: {}", record.bot, trainer.trim_end()),
        format!("Dists: {}", hang(&dists_desc(&record.dists), 7)),
        format!("Seeds: {}", seeds_desc(&record.seeds, verbosity)),
        format!(
            "Level: {}, Runs: {}, Time: {}",
            level_desc(&record.level),
            record.runs,
            time_desc(record.time, precision)
        ),
        format!(
            "Output: {}, PRNGs: {prngs}, Scores: {}",
            record.output,
            scores_desc(scores, verbosity, precision)
        ),
    ];
    if !record.phases.is_empty() {
        desc.insert(3, format!("Phases: {}", phases_desc(&record.phases, precision)));
    }
    if !record.emphases.is_empty() {
        desc.insert(3, format!("Emphases: {}", emphases_desc(&record.emphases)));
    }
    // param lines go right before Seeds, Level and Output
    let at = desc.len() - 3;
    if !record.param_scale.is_empty() {
        desc.insert(
            at,
            format!("Scaled params: {}", param_scale_desc(&record.param_scale)),
        );
    }
    if !record.param_freeze.is_empty() {
        let frozen: Vec<&str> = record.param_freeze.iter().map(String::as_str).collect();
        desc.insert(at, format!("Frozen params: {}", frozen.join(", ")));
    }
    if !record.param_map.is_empty() {
        desc.insert(
            at,
            format!("Params map: {}", hang(&param_map_desc(&record.param_map), 12)),
        );
    }
    desc
}

/// Nested rows, continuation lines aligned one past the opening bracket at `column`.
fn array_desc(shape: &[usize], values: &[f32], precision: usize, column: usize) -> String {
    match shape {
        [] | [_] => {
            let items: Vec<String> = values.iter().map(|v| format!("{v:.precision$}")).collect();
            format!("[{}]", items.join(", "))
        }
        [_, rest @ ..] => {
            let step = rest.iter().product::<usize>().max(1);
            let rows: Vec<String> = values
                .chunks(step)
                .map(|row| array_desc(rest, row, precision, column + 1))
                .collect();
            format!("[{}]", rows.join(&format!(",\n{}", " ".repeat(column + 1))))
        }
    }
}

/// `'key': [...]` per array, in key order.
pub fn params_desc(params: &ParamSet, precision: usize) -> String {
    let mut desc = String::new();
    for (key, array) in params {
        let column = key.len() + 4;
        let value = array_desc(array.shape(), array.values(), precision, column);
        desc.push_str(&format!("'{key}': {value}\n"));
    }
    desc
}

/// Prefixes every non-empty line of `text` with `prefix`.
pub fn indent(text: &str, prefix: &str) -> String {
    text.lines()
        .map(|line| {
            if line.is_empty() {
                String::new()
            } else {
                format!("{prefix}{line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
