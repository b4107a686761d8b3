use super::strategy::Strategy;
use crate::backend::ElementHandle;
use thiserror::Error;

/// A live element chosen by the cascade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub element: ElementHandle,
    pub strategy: Strategy,
    /// The label that produced the match.
    pub label: String,
}

#[derive(Debug, Clone, Error)]
#[error("Resolution failed for target '{target}': {reason}")]
pub struct ResolutionError {
    pub target: String,
    pub reason: String,
    /// Strategies tried, as `strategy(label)`, in the order they ran.
    pub attempted: Vec<String>,
    /// Labels the caller asked for.
    pub labels: Vec<String>,
}
