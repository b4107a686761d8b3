pub mod backend;
pub mod cli;
pub mod config;
pub mod dialog;
pub mod error;
pub mod executor;
pub mod failure;
pub mod indicator;
pub mod input;
pub mod login;
pub mod orchestrator;
pub mod resolution;
pub mod row;
pub mod session;

pub use autoplan_common::{formatter, normalizer, plan, report};
pub use orchestrator::Orchestrator;
