pub mod benchmark;
pub mod bots;
pub mod runner;
pub mod ticker;
pub mod util;

pub use runner::{read_proof, run_bot, write_proof, RunArtifact, RunMetrics};
pub use ticker::{Driver, SharedSession, TickLoop};
