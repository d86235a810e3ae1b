use anyhow::{Context, bail};
use blackbot_engine::{Level, LevelDesc};

use super::CommonArg;

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct NewLevelArg {
    /// Level key, saved as levels/<key>.json
    key: String,
    /// Length of the state vector
    #[arg(long)]
    features: usize,
    /// Number of actions a bot chooses from
    #[arg(long)]
    actions: usize,
    /// Steps per episode
    #[arg(long)]
    steps: usize,
    /// Seed of the generated dynamics
    #[arg(long, default_value_t = 0)]
    seed: u64,
    /// Replace an existing level file
    #[arg(long)]
    force: bool,
    #[clap(flatten)]
    pub(super) common: CommonArg,
}

pub(crate) fn run(arg: &NewLevelArg) -> anyhow::Result<()> {
    let store = arg.common.store();
    if store.level_exists(&arg.key) && !arg.force {
        bail!("Level '{}' already exists, pass --force to replace it", arg.key);
    }
    let desc = LevelDesc::new(&arg.key, arg.features, arg.actions, arg.steps, arg.seed);
    // reject descriptors that would not load back
    Level::new(desc.clone()).with_context(|| format!("Invalid level '{}'", arg.key))?;
    let path = store.save_level(&desc)?;
    tracing::info!(path = %path.display(), "saved level");
    if arg.common.verbosity() > 0 {
        println!("{}", path.display());
    }
    Ok(())
}
