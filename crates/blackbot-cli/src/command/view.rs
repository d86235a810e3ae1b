use blackbot_evaluator::bot::BotKind;
use blackbot_training::history::HistoryItem;

use crate::{
    describe::{indent, params_desc, seeds_desc, training_desc},
    store::{self, LoadedParams},
    util::Output,
};

use super::CommonArg;

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct ViewArg {
    /// Bot the params belong to
    bot: BotKind,
    /// Params key: a number, bot_key or "last"; params/<bot>_<params>.json
    params: String,
    /// Print the normalized params file as JSON instead
    #[arg(long)]
    json: bool,
    #[clap(flatten)]
    pub(super) common: CommonArg,
}

/// Params, history records and the chain of seeds that led to the set.
fn view_desc(loaded: &LoadedParams, verbosity: u8, precision: usize) -> String {
    let mut history = String::new();
    let mut trace = vec![];
    if loaded.history.is_empty() {
        history.push_str("\nThese parameters were saved without history.\n");
    }
    for item in &loaded.history {
        match item {
            HistoryItem::Combined(_) => history.push_str("\nCombined from multiple.\n"),
            HistoryItem::Record(record) => {
                let lines = training_desc(record, verbosity, precision);
                history.push_str(&format!("\n{}\n", lines.join("\n")));
                trace.push(seeds_desc(&record.seeds, 0));
            }
        }
    }
    trace.push(loaded.key.clone());

    if verbosity == 0 {
        return trace.join(" ");
    }
    format!(
        "\nParams:\n\n{}\n\nHistory:\n{}\n\nTrace:\n\n{}\n",
        indent(&params_desc(&loaded.params, precision), "    "),
        indent(&history, "    "),
        indent(&trace.join(" - "), "    ")
    )
}

pub(crate) fn run(arg: &ViewArg) -> anyhow::Result<()> {
    let store = arg.common.store();
    let loaded = store.load_params(arg.bot, &arg.params)?;
    if arg.json {
        let value = store::params_json(&loaded.params, &loaded.history)?;
        return Output::stdout().write_json(&value);
    }
    println!(
        "{}",
        view_desc(&loaded, arg.common.verbosity(), arg.common.precision())
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use blackbot_evaluator::{
        dist::DistributionConfig,
        params::{ParamArray, ParamSet},
    };
    use blackbot_training::history::{HistoryRecord, LevelRecord, SeedsRecord};
    use chrono::{DateTime, Utc};
    use serde_json::json;

    use super::*;

    fn record(stored: &[&str], output: &str) -> HistoryItem {
        HistoryRecord {
            date: DateTime::<Utc>::UNIX_EPOCH,
            bot: "linear".into(),
            trainer: "local".into(),
            config: Some(vec![10.0]),
            dists: DistributionConfig::default(),
            emphases: vec![],
            phases: vec![],
            seeds: SeedsRecord {
                stored: stored.iter().map(|s| (*s).to_owned()).collect(),
                count: 1,
                pool: 1,
            },
            param_map: Default::default(),
            param_freeze: Default::default(),
            param_scale: Default::default(),
            level: LevelRecord {
                key: "train".into(),
                features: 2,
                actions: 2,
                steps: 10,
            },
            runs: 1,
            output: output.into(),
            steps: 10,
            scores: [("train".to_owned(), 4.0)].into_iter().collect(),
            time: 1.0,
            prngs_seed: Some(7),
        }
        .into()
    }

    fn loaded(history: Vec<HistoryItem>) -> LoadedParams {
        let mut params = ParamSet::new();
        params.insert("constant", ParamArray::from_vec(vec![1.0, 2.0]));
        LoadedParams {
            key: "linear_1".into(),
            params,
            history,
        }
    }

    #[test]
    fn test_trace_follows_stored_seeds() {
        let loaded = loaded(vec![record(&[], "0"), record(&["linear_0"], "1")]);
        assert_eq!(view_desc(&loaded, 0, 0), "1 of 1 linear_0, 1 of 1 linear_1");
        let desc = view_desc(&loaded, 1, 1);
        assert!(desc.starts_with("\nParams:\n\n    'constant': [1.0, 2.0]\n\nHistory:\n"));
        assert!(desc.contains("    Bot: linear, Trainer: local 10\n"));
        assert!(desc.ends_with("Trace:\n\n    1 of 1 - linear_0, 1 of 1 - linear_1\n"));
    }

    #[test]
    fn test_history_placeholders() {
        let desc = view_desc(&loaded(vec![]), 1, 0);
        assert!(desc.contains("\n    These parameters were saved without history.\n"));
        assert!(desc.ends_with("    linear_1\n"));

        let desc = view_desc(&loaded(vec![HistoryItem::Combined(vec![json!({})])]), 1, 0);
        assert!(desc.contains("\n    Combined from multiple.\n"));
    }
}
