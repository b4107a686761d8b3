use thiserror::Error;

/// Raised while normalizing or validating an Automation Plan, before any
/// browser session exists.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("Invalid plan: missing required field '{0}'")]
    MissingField(String),

    #[error("Invalid plan: unknown action type '{0}'")]
    UnknownAction(String),

    #[error("Invalid plan: {0}")]
    Invalid(String),
}
