use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::EnvFilter;

use crate::store::Store;

use self::{new_level::NewLevelArg, play::PlayArg, train::TrainArg, view::ViewArg};

mod new_level;
mod play;
mod train;
mod view;

#[derive(Debug, Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub struct CommandArgs {
    /// What mode to run the program in
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Debug, Clone, Subcommand)]
enum Mode {
    /// Train a bot to optimize its parameters
    Train(#[clap(flatten)] TrainArg),
    /// Evaluate a bot with params on some levels
    Play(#[clap(flatten)] PlayArg),
    /// Display a params set and its history
    View(#[clap(flatten)] ViewArg),
    /// Generate a level file
    NewLevel(#[clap(flatten)] NewLevelArg),
}

impl Mode {
    fn common(&self) -> &CommonArg {
        match self {
            Mode::Train(arg) => &arg.common,
            Mode::Play(arg) => &arg.common,
            Mode::View(arg) => &arg.common,
            Mode::NewLevel(arg) => &arg.common,
        }
    }
}

/// Options every command takes.
#[derive(Debug, Clone, clap::Args)]
pub(crate) struct CommonArg {
    /// 0 = condensed, 1 = expanded, 4+ = debugging info
    #[arg(short, long, default_value_t = 1)]
    verbosity: u8,
    /// How many decimal digits of floats to print
    #[arg(short, long)]
    precision: Option<usize>,
    /// Directory holding the params/ and levels/ directories
    #[arg(long, default_value = ".")]
    data_dir: PathBuf,
}

impl CommonArg {
    pub(crate) fn verbosity(&self) -> u8 {
        self.verbosity
    }

    /// Whole numbers when condensed, three decimals otherwise.
    pub(crate) fn precision(&self) -> usize {
        self.precision
            .unwrap_or(if self.verbosity == 0 { 0 } else { 3 })
    }

    pub(crate) fn store(&self) -> Store {
        Store::new(&self.data_dir)
    }

    /// Log level when `RUST_LOG` is not set.
    fn log_level(&self) -> Level {
        match self.verbosity {
            0 | 1 => Level::WARN,
            2 | 3 => Level::INFO,
            4 => Level::DEBUG,
            _ => Level::TRACE,
        }
    }
}

/// Logs go to stderr so stdout only carries results.
fn init_logging(level: Level) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .ok();
}

pub fn run() -> anyhow::Result<()> {
    let args = CommandArgs::parse();
    init_logging(args.mode.common().log_level());
    match args.mode {
        Mode::Train(arg) => train::run(&arg)?,
        Mode::Play(arg) => play::run(&arg)?,
        Mode::View(arg) => view::run(&arg)?,
        Mode::NewLevel(arg) => new_level::run(&arg)?,
    }
    Ok(())
}
