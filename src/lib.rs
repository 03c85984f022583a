pub mod compiler;
pub mod config;
pub mod dedup;
pub mod error;
pub mod filter;
pub mod graph;
pub mod index;
pub mod mapping;
pub mod merge;
pub mod metrics;
pub mod moves;
pub mod parser;
pub mod plan;
pub mod query;
pub mod relation;
pub mod ruleset;
pub mod simulator;
pub mod state;
pub mod symbol;
pub mod trace;

#[cfg(test)]
pub(crate) mod test_utils;

pub use config::EngineConfig;
pub use error::{GdlError, Result};
pub use graph::ProofGraph;
pub use moves::Move;
pub use relation::Relation;
pub use ruleset::RuleSet;
pub use simulator::{Phase, Rollout, RolloutStatus, SequenceOutcome, Simulator};
pub use state::StateSnapshot;
pub use symbol::{Symbol, SymbolTable};
