use std::{sync::Arc, time::Instant};

use blackbot_engine::{Level, SessionRng};
use blackbot_evaluator::{
    bot::{BotBuilder, BotKind},
    dist::DistributionConfig,
    emphasis::Emphases,
    phases::Phases,
    transform::ParamTransform,
};
use chrono::Utc;

use crate::{
    TrainError,
    history::{HistoryRecord, LevelRecord, SeedsRecord},
    seed_pool::{SeedConfig, SeedPool},
    trainer::{TrainOutput, Trainer, TrainerConfig},
};

/// Everything a training session is configured with, before validation.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub bot: BotKind,
    pub trainer: TrainerConfig,
    pub dists: DistributionConfig,
    /// `(feature index, weight)` pairs; negative indices count from the end.
    pub emphases: Vec<(i64, f32)>,
    /// Phase ends without the final `1.0`; `None` keeps stored phases.
    pub phases: Option<Vec<f32>>,
    pub transform: ParamTransform,
    pub runs: usize,
    /// Params key the result will be saved under.
    pub output: String,
}

/// A validated session: one bot architecture trained on one level.
#[derive(Debug)]
pub struct TrainingSession {
    config: SessionConfig,
    builder: BotBuilder,
    emphases: Emphases,
    phases: Option<Phases>,
    eval_levels: Vec<Arc<Level>>,
}

fn count(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(-1)
}

impl TrainingSession {
    /// Validates every directive against the architecture on `level`.
    ///
    /// Nothing is drawn or evaluated here, so configuration mistakes
    /// surface before any search work.
    pub fn new(
        config: SessionConfig,
        level: Arc<Level>,
        eval_levels: Vec<Arc<Level>>,
    ) -> Result<Self, TrainError> {
        let emphases = Emphases::from_pairs(level.features(), &config.emphases)?;
        let phases = config
            .phases
            .as_deref()
            .map(Phases::normalize)
            .transpose()?;
        let builder = BotBuilder::new(
            config.bot,
            level,
            &config.dists,
            &config.transform,
            phases.clone(),
        )?;
        Ok(Self {
            config,
            builder,
            emphases,
            phases,
            eval_levels,
        })
    }

    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    #[must_use]
    pub fn level(&self) -> &Arc<Level> {
        self.builder.level()
    }

    /// Builds the seed pool, trains, and scores the result on the evaluation levels.
    ///
    /// The returned record is complete; its `prngs_seed` is the seed `rng`
    /// was started from.
    pub fn run(&self, seeds: SeedConfig, rng: &mut SessionRng) -> Result<TrainOutput, TrainError> {
        let started = Instant::now();
        let runs = self.config.runs;
        let record = self.draft_record(&seeds, rng.seed());

        let pool = SeedPool::build(seeds, &self.builder, runs, rng)?;
        let trainer = Trainer::new(
            self.config.trainer.clone(),
            &self.config.dists,
            &self.emphases,
            &self.config.transform,
            runs,
        );
        let mut output = trainer.train(pool.into_seeds(), record, rng)?;

        for level in &self.eval_levels {
            let bot = self
                .builder
                .kind()
                .build(Arc::clone(level), output.params().clone())?;
            let score = bot.evaluate(runs, rng)?;
            tracing::info!(level = level.key(), score, "evaluated trained bot");
            output.record_mut().scores.insert(level.key().to_owned(), score);
        }
        output.record_mut().time = started.elapsed().as_secs_f64();
        Ok(output)
    }

    fn draft_record(&self, seeds: &SeedConfig, prngs_seed: u64) -> HistoryRecord {
        let config = &self.config;
        let level = self.builder.level();
        let emphases = if self.emphases.non_default().next().is_some() {
            self.emphases.weights().to_vec()
        } else {
            vec![]
        };
        HistoryRecord {
            date: Utc::now(),
            bot: config.bot.name().to_owned(),
            trainer: config.trainer.kind().name().to_owned(),
            config: Some(config.trainer.values()),
            dists: config.dists.clone(),
            emphases,
            phases: self
                .phases
                .clone()
                .unwrap_or_default()
                .ends()
                .to_vec(),
            seeds: SeedsRecord {
                stored: seeds.stored_keys(),
                count: seeds.count(),
                pool: seeds.pool(),
            },
            param_map: config.transform.map.clone(),
            param_freeze: config.transform.freeze.clone(),
            param_scale: config.transform.scale.clone(),
            level: LevelRecord {
                key: level.key().to_owned(),
                features: count(level.features()),
                actions: count(level.actions()),
                steps: count(level.steps()),
            },
            runs: config.runs,
            output: config.output.clone(),
            steps: 0,
            scores: Default::default(),
            time: 0.0,
            prngs_seed: Some(prngs_seed),
        }
    }
}

#[cfg(test)]
mod tests {
    use blackbot_engine::LevelDesc;
    use blackbot_evaluator::{ConfigError, dist::Dist};

    use crate::{seed_pool::StoredSeed, trainer::TrainerKind};

    use super::*;

    fn level(key: &str, seed: u64) -> Arc<Level> {
        Arc::new(Level::new(LevelDesc::new(key, 3, 2, 20, seed)).unwrap())
    }

    fn config(trainer: TrainerKind, values: &[f64]) -> SessionConfig {
        SessionConfig {
            bot: BotKind::Linear,
            trainer: TrainerConfig::parse(trainer, values).unwrap(),
            dists: DistributionConfig::default(),
            emphases: vec![],
            phases: None,
            transform: ParamTransform::default(),
            runs: 2,
            output: "linear_0".into(),
        }
    }

    fn session(config: SessionConfig) -> Result<TrainingSession, TrainError> {
        TrainingSession::new(config, level("train", 1), vec![level("train", 1), level("test", 2)])
    }

    #[test]
    fn test_record_describes_session() {
        let session = session(config(TrainerKind::Local, &[5.0])).unwrap();
        let seeds = SeedConfig::from_args(vec![], &[3, 1]).unwrap();
        let out = session.run(seeds, &mut SessionRng::from_seed(9)).unwrap();
        let record = out.record();
        assert_eq!(record.bot, "linear");
        assert_eq!(record.trainer, "local");
        assert_eq!(record.config, Some(vec![5.0, 1.0]));
        assert_eq!((record.seeds.pool, record.seeds.count), (3, 1));
        assert_eq!(record.steps, 5);
        assert_eq!(record.level.features, 3);
        assert_eq!(record.phases, vec![1.0]);
        assert_eq!(record.prngs_seed, Some(9));
        assert!(record.emphases.is_empty());
        assert_eq!(record.scores.keys().collect::<Vec<_>>(), ["test", "train"]);
        assert!(record.time >= 0.0);
    }

    #[test]
    fn test_same_seed_same_result() {
        let session = session(config(TrainerKind::Anneal, &[10.0])).unwrap();
        let run = |seed| {
            let seeds = SeedConfig::from_args(vec![], &[4, 2]).unwrap();
            session.run(seeds, &mut SessionRng::from_seed(seed)).unwrap()
        };
        let (a, b) = (run(3), run(3));
        assert_eq!(a.params(), b.params());
        assert_eq!(a.record().scores, b.record().scores);
    }

    #[test]
    fn test_stored_seed_history_is_extended() {
        let first = session(config(TrainerKind::Select, &[])).unwrap();
        let seeds = SeedConfig::from_args(vec![], &[1]).unwrap();
        let (params, history) = first
            .run(seeds, &mut SessionRng::from_seed(0))
            .unwrap()
            .into_parts();

        let mut cfg = config(TrainerKind::Local, &[3.0]);
        cfg.transform = ParamTransform::from_pairs([], ["constant".to_owned()], []);
        let second = session(cfg).unwrap();
        let stored = StoredSeed {
            key: "linear_0".into(),
            params: params.clone(),
            history,
        };
        let seeds = SeedConfig::from_args(vec![stored], &[0, 0]).unwrap();
        let out = second.run(seeds, &mut SessionRng::from_seed(1)).unwrap();
        assert_eq!(out.history_len(), 2);
        assert_eq!(out.record().seeds.stored, vec!["linear_0".to_owned()]);
        assert_eq!(out.params().get("constant"), params.get("constant"));
    }

    #[test]
    fn test_emphases_are_recorded_in_full() {
        let mut cfg = config(TrainerKind::Select, &[]);
        cfg.emphases = vec![(-1, 10.0)];
        let session = session(cfg).unwrap();
        let seeds = SeedConfig::from_args(vec![], &[1]).unwrap();
        let out = session.run(seeds, &mut SessionRng::from_seed(0)).unwrap();
        assert_eq!(out.record().emphases, vec![1.0, 1.0, 10.0]);
    }

    #[test]
    fn test_configuration_errors_surface_early() {
        let mut cfg = config(TrainerKind::Local, &[1.0]);
        cfg.emphases = vec![(3, 2.0)];
        assert!(matches!(
            session(cfg),
            Err(TrainError::Config(ConfigError::EmphasisIndex { .. }))
        ));

        let mut cfg = config(TrainerKind::Local, &[1.0]);
        cfg.phases = Some(vec![0.9, 0.5]);
        assert!(matches!(
            session(cfg),
            Err(TrainError::Config(ConfigError::PhaseNotIncreasing { .. }))
        ));

        let mut cfg = config(TrainerKind::Local, &[1.0]);
        cfg.dists
            .new
            .insert("diffs0l".into(), Dist::parse(&["norm", "0", "1"]).unwrap());
        assert!(matches!(
            session(cfg),
            Err(TrainError::Config(ConfigError::UnknownParam { .. }))
        ));
    }
}
