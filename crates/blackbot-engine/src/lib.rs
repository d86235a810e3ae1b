//! Environment side of the bot trainer.
//!
//! This crate provides the levels bots are evaluated against and the random
//! context every session threads through its sampling:
//!
//! - [`LevelDesc`] - Immutable level descriptor (feature count, action count, step budget)
//! - [`Level`] - Synthetic environment generated deterministically from a descriptor
//! - [`Episode`] - A single pass through a level, driven one action at a time
//! - [`SessionRng`] - Explicit, seedable random state owned by one session
//!
//! # Example
//!
//! ```
//! use blackbot_engine::{Level, LevelDesc, SessionRng};
//!
//! let level = Level::new(LevelDesc::new("demo", 4, 3, 50, 7)).unwrap();
//! let mut rng = SessionRng::from_seed(1);
//!
//! let mut episode = level.start(&mut rng);
//! while !episode.is_done() {
//!     episode.step(0, &mut rng);
//! }
//! println!("score: {}", episode.score());
//! ```

pub use self::{episode::*, level::*, rng::*};

mod episode;
mod level;
mod rng;

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum LevelError {
    #[display("level '{key}' must have at least one {what}")]
    Empty { key: String, what: &'static str },
}
