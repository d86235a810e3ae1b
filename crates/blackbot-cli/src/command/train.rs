use std::{collections::BTreeMap, sync::Arc};

use anyhow::{Context, bail};
use blackbot_engine::SessionRng;
use blackbot_evaluator::{
    bot::BotKind,
    dist::{Dist, DistributionConfig},
    params::ParamSet,
    transform::ParamTransform,
};
use blackbot_training::{
    history::HistoryRecord,
    seed_pool::{SeedConfig, StoredSeed},
    session::{SessionConfig, TrainingSession},
    trainer::{TrainerConfig, TrainerKind},
};
use clap::ArgAction;

use crate::describe::{params_desc, scores_desc, training_desc};

use super::CommonArg;

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct TrainArg {
    /// Bot to train
    bot: BotKind,
    /// Trainer to use
    trainer: TrainerKind,
    /// Options to pass to the trainer; the first one is the step count
    #[arg(allow_negative_numbers = true)]
    config: Vec<f64>,
    /// Distribution of free, real parameters: a name with loc, scale and shape args
    #[arg(long, num_args = 1.., allow_negative_numbers = true, default_values = ["norm", "0", "11"])]
    dist_real: Vec<String>,
    /// Distribution of free parameters limited to the [0, 1] interval
    #[arg(long, num_args = 1.., allow_negative_numbers = true, default_values = ["beta", "0", "1", "1.2", "1.2"])]
    dist_unit: Vec<String>,
    /// Distribution of the number of changes to make per trainer step
    #[arg(long, num_args = 1.., allow_negative_numbers = true, default_values = ["beta", "1", "27", "2", "6"])]
    dist_variations: Vec<String>,
    /// Distribution for accepting declines; supported below zero, declines may be accepted
    #[arg(long, num_args = 1.., allow_negative_numbers = true, default_values = ["beta", "-10", ".001", "19", "1"])]
    dist_acceptance: Vec<String>,
    /// Distribution for drawing a specific param, for example: state1l norm 0 .001
    #[arg(long, value_names = ["KEY", "DIST"], num_args = 2.., action = ArgAction::Append, allow_negative_numbers = true)]
    dist_param_new: Vec<Vec<String>>,
    /// Distribution of offsets added when varying a specific param
    #[arg(long, value_names = ["KEY", "DIST"], num_args = 2.., action = ArgAction::Append, allow_negative_numbers = true)]
    dist_param_vary: Vec<Vec<String>>,
    /// Put emphasis on some state component; negative indices count from the end
    #[arg(short, long = "emphasis", value_names = ["INDEX", "WEIGHT"], num_args = 2, action = ArgAction::Append, allow_negative_numbers = true)]
    emphases: Vec<Vec<f64>>,
    /// Phase ends of a multi-phase bot, for example: .25 .5 .75
    #[arg(long, num_args = 1..)]
    phases: Option<Vec<f32>>,
    /// Pool of random seeds to choose from, and optionally the number of seeds to pass on
    #[arg(long, num_args = 1..=2, default_values_t = [0, 0])]
    random_seeds: Vec<usize>,
    /// Starting parameters, as params keys
    #[arg(long, num_args = 1..)]
    stored_seeds: Vec<String>,
    /// Reuse a stored param under a different key
    #[arg(long, value_names = ["FROM", "TO"], num_args = 2, action = ArgAction::Append)]
    param_map: Vec<Vec<String>>,
    /// Do not let trainers vary these params
    #[arg(long, num_args = 1..)]
    param_freeze: Vec<String>,
    /// Scale a stored param, to adapt it for another bot
    #[arg(long, value_names = ["KEY", "FACTOR"], num_args = 2, action = ArgAction::Append, allow_negative_numbers = true)]
    param_scale: Vec<Vec<String>>,
    /// Level to train on
    #[arg(short, long, default_value = "train")]
    level: String,
    /// Levels to evaluate after the training session
    #[arg(long, num_args = 1.., default_values = ["train", "test"])]
    eval_levels: Vec<String>,
    /// Count of full training sessions
    #[arg(short, long, default_value_t = 1)]
    iterations: usize,
    /// Number of repetitions for each params evaluation
    #[arg(short, long, default_value_t = 1)]
    runs: usize,
    /// Fixed seed for the session random generator
    #[arg(short = 's', long)]
    prngs_seed: Option<u64>,
    /// Params key suffix to save under, params/<bot>_<output>.json
    #[arg(short, long)]
    output: Option<String>,
    #[clap(flatten)]
    pub(super) common: CommonArg,
}

impl TrainArg {
    fn dists(&self) -> anyhow::Result<DistributionConfig> {
        let parse = |option: &str, words: &[String]| {
            Dist::parse(words).with_context(|| format!("Invalid --{option}"))
        };
        let overrides = |option: &str, entries: &[Vec<String>]| {
            entries
                .iter()
                .map(|entry| {
                    let (key, words) = entry
                        .split_first()
                        .with_context(|| format!("--{option} takes a key and a distribution"))?;
                    Ok((key.clone(), parse(option, words)?))
                })
                .collect::<anyhow::Result<BTreeMap<_, _>>>()
        };
        Ok(DistributionConfig {
            real: parse("dist-real", &self.dist_real)?,
            unit: parse("dist-unit", &self.dist_unit)?,
            new: overrides("dist-param-new", &self.dist_param_new)?,
            vary: overrides("dist-param-vary", &self.dist_param_vary)?,
            variations: parse("dist-variations", &self.dist_variations)?,
            acceptance: parse("dist-acceptance", &self.dist_acceptance)?,
        })
    }

    #[expect(clippy::cast_possible_truncation)]
    fn emphases(&self) -> anyhow::Result<Vec<(i64, f32)>> {
        self.emphases
            .iter()
            .map(|pair| match pair[..] {
                [index, weight] if index.fract() == 0.0 => Ok((index as i64, weight as f32)),
                _ => bail!("--emphasis takes a whole index and a weight, got {pair:?}"),
            })
            .collect()
    }

    fn transform(&self) -> anyhow::Result<ParamTransform> {
        let pairs = |option: &str, entries: &[Vec<String>]| {
            entries
                .iter()
                .map(|entry| match &entry[..] {
                    [a, b] => Ok((a.clone(), b.clone())),
                    _ => bail!("--{option} takes two values, got {entry:?}"),
                })
                .collect::<anyhow::Result<Vec<_>>>()
        };
        let scale = pairs("param-scale", &self.param_scale)?
            .into_iter()
            .map(|(key, factor)| {
                let factor = factor
                    .parse::<f32>()
                    .with_context(|| format!("Invalid --param-scale factor for {key}: {factor}"))?;
                Ok((key, factor))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(ParamTransform::from_pairs(
            pairs("param-map", &self.param_map)?,
            self.param_freeze.iter().cloned(),
            scale,
        ))
    }
}

fn report(record: &HistoryRecord, params: &ParamSet, verbosity: u8, precision: usize) -> String {
    if verbosity == 0 {
        let scores = record.scores.iter().map(|(k, v)| (k.as_str(), *v));
        format!(
            "{} {} {}",
            record.bot,
            record.output,
            scores_desc(scores, verbosity, precision)
        )
    } else {
        format!(
            "{}\n{}",
            training_desc(record, verbosity, precision).join("\n"),
            params_desc(params, 8)
        )
    }
}

pub(crate) fn run(arg: &TrainArg) -> anyhow::Result<()> {
    if arg.iterations > 1 && arg.output.is_some() {
        bail!("Cannot use --output with --iterations");
    }
    let store = arg.common.store();
    let trainer = TrainerConfig::parse(arg.trainer, &arg.config)?;
    let dists = arg.dists()?;
    let emphases = arg.emphases()?;
    let transform = arg.transform()?;
    let level = Arc::new(store.load_level(&arg.level)?);
    let eval_levels = arg
        .eval_levels
        .iter()
        .map(|key| store.load_level(key).map(Arc::new))
        .collect::<anyhow::Result<Vec<_>>>()?;
    let (verbosity, precision) = (arg.common.verbosity(), arg.common.precision());

    for iteration in 0..arg.iterations {
        let output = arg
            .output
            .clone()
            .unwrap_or_else(|| store.first_free(arg.bot.name()).to_string());
        let stored = arg
            .stored_seeds
            .iter()
            .map(|key| store.load_params(arg.bot, key).map(StoredSeed::from))
            .collect::<anyhow::Result<Vec<_>>>()?;
        let seeds = SeedConfig::from_args(stored, &arg.random_seeds)?;
        let config = SessionConfig {
            bot: arg.bot,
            trainer: trainer.clone(),
            dists: dists.clone(),
            emphases: emphases.clone(),
            phases: arg.phases.clone(),
            transform: transform.clone(),
            runs: arg.runs,
            output: output.clone(),
        };
        let session = TrainingSession::new(config, Arc::clone(&level), eval_levels.clone())?;

        let mut rng = SessionRng::from_optional_seed(arg.prngs_seed);
        tracing::info!(iteration, output = %output, prngs_seed = rng.seed(), "starting session");
        let result = session.run(seeds, &mut rng)?;
        let record = result.record().clone();
        let (params, history) = result.into_parts();
        let path = store.save_params(&format!("{}_{output}", arg.bot), &params, &history)?;
        tracing::info!(path = %path.display(), "saved params");

        println!("{}", report(&record, &params, verbosity, precision));
    }
    Ok(())
}
