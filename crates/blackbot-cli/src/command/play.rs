use std::{sync::Arc, time::Instant};

use anyhow::Context;
use blackbot_engine::{Level, SessionRng};
use blackbot_evaluator::{bot::BotKind, params::ParamSet};
use chrono::{DateTime, Utc};

use crate::{
    describe::{date_desc, scores_desc, time_desc},
    store::Store,
};

use super::CommonArg;

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct PlayArg {
    /// Bot to run
    bot: BotKind,
    /// Params to run with: a key, bot_key or "last"; for instance: 7 12 last states_1_5
    #[arg(required = true)]
    params: Vec<String>,
    /// Levels to evaluate on
    #[arg(short, long, num_args = 1.., default_values = ["train", "test"])]
    levels: Vec<String>,
    /// Number of repetitions to average scores over
    #[arg(short, long, default_value_t = 1)]
    runs: usize,
    /// Fixed seed for the session random generator
    #[arg(short = 's', long)]
    prngs_seed: Option<u64>,
    /// Continue with the following params sets if one fails
    #[arg(long)]
    ignore_errors: bool,
    #[clap(flatten)]
    pub(super) common: CommonArg,
}

/// Scores of one params set.
#[derive(Debug)]
struct PlayResult {
    date: DateTime<Utc>,
    params_key: String,
    scores: Vec<(String, f64)>,
    time: f64,
    prngs_seed: u64,
}

/// Keeps the arrays `bot` uses, so sets saved for other bots can be played.
fn restrict(bot: BotKind, level: &Level, params: &ParamSet) -> anyhow::Result<ParamSet> {
    let phases = bot.stored_phases(params)?;
    let spec = bot.param_spec(level.desc(), &phases);
    Ok(params
        .iter()
        .filter(|(key, _)| spec.contains(key))
        .map(|(key, array)| (key.clone(), array.clone()))
        .collect())
}

fn play(
    store: &Store,
    arg: &PlayArg,
    levels: &[Arc<Level>],
    key: &str,
) -> anyhow::Result<PlayResult> {
    let start = Instant::now();
    let mut rng = SessionRng::from_optional_seed(arg.prngs_seed);
    let loaded = store.load_params(arg.bot, key)?;
    let mut scores = Vec::with_capacity(levels.len());
    for level in levels {
        let params = restrict(arg.bot, level, &loaded.params)?;
        let bot = arg
            .bot
            .build(Arc::clone(level), params)
            .with_context(|| format!("Cannot run {} with params {}", arg.bot, loaded.key))?;
        let score = bot.evaluate(arg.runs, &mut rng)?;
        tracing::info!(params = %loaded.key, level = level.key(), score, "evaluated");
        scores.push((level.key().to_owned(), score));
    }
    Ok(PlayResult {
        date: Utc::now(),
        params_key: loaded.key,
        scores,
        time: start.elapsed().as_secs_f64(),
        prngs_seed: rng.seed(),
    })
}

fn report(arg: &PlayArg, result: &PlayResult) -> String {
    let (verbosity, precision) = (arg.common.verbosity(), arg.common.precision());
    let scores = scores_desc(
        result.scores.iter().map(|(k, v)| (k.as_str(), *v)),
        verbosity,
        precision,
    );
    if verbosity == 0 {
        format!("{} {} {scores}", arg.bot, result.params_key)
    } else {
        format!(
            "\nDate: {}\nBot: {}, params: {}, runs: {}\nScores: {scores}\nTime: {}, PRNGs: {}",
            date_desc(&result.date),
            arg.bot,
            result.params_key,
            arg.runs,
            time_desc(result.time, precision),
            result.prngs_seed,
        )
    }
}

pub(crate) fn run(arg: &PlayArg) -> anyhow::Result<()> {
    let store = arg.common.store();
    let levels = arg
        .levels
        .iter()
        .map(|key| store.load_level(key).map(Arc::new))
        .collect::<anyhow::Result<Vec<_>>>()?;

    for key in &arg.params {
        match play(&store, arg, &levels, key) {
            Ok(result) => println!("{}", report(arg, &result)),
            Err(e) if arg.ignore_errors => {
                tracing::warn!(params = %key, "skipping params: {e:#}");
            }
            Err(e) => return Err(e),
        }
    }
    if arg.common.verbosity() != 0 {
        println!();
    }
    Ok(())
}
