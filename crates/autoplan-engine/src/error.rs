use autoplan_common::error::{BackendError, PlanError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    InvalidPlan(#[from] PlanError),

    #[error("Login failed: {0}")]
    LoginFailed(String),

    #[error("Element not found for '{target}' (tried: {})", attempted.join(", "))]
    ElementNotFound {
        target: String,
        attempted: Vec<String>,
    },

    #[error("Click failed on '{target}': {reason}")]
    ClickFailed { target: String, reason: String },

    #[error("Required field '{field}' has no value for data key '{data_key}'")]
    MissingData { field: String, data_key: String },

    #[error("Required action {index} ({action_type}) failed: {reason}")]
    ActionFailed {
        index: usize,
        action_type: String,
        reason: String,
    },

    #[error("Timed out waiting for {what} after {timeout_ms}ms")]
    IndicatorTimeout { what: String, timeout_ms: u64 },

    #[error("Failure indicator '{0}' appeared: the application rejected the row (validation or application error)")]
    FailureDetected(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Session expired: {0}")]
    SessionExpired(String),

    #[error(transparent)]
    Backend(BackendError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<BackendError> for EngineError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Network(msg) => EngineError::Network(msg),
            other => EngineError::Backend(other),
        }
    }
}

impl EngineError {
    /// Stable error name recorded in failure metadata.
    pub fn name(&self) -> &'static str {
        match self {
            EngineError::InvalidPlan(_) => "InvalidPlan",
            EngineError::LoginFailed(_) => "LoginFailed",
            EngineError::ElementNotFound { .. } => "ElementNotFound",
            EngineError::ClickFailed { .. } => "ClickFailed",
            EngineError::MissingData { .. } => "MissingData",
            EngineError::ActionFailed { .. } => "ActionFailed",
            EngineError::IndicatorTimeout { .. } => "IndicatorTimeout",
            EngineError::FailureDetected(_) => "FailureDetected",
            EngineError::Network(_) => "NetworkError",
            EngineError::SessionExpired(_) => "SessionExpired",
            EngineError::Backend(BackendError::Timeout { .. }) => "TimeoutError",
            EngineError::Backend(_) => "BackendError",
            EngineError::Config(_) => "ConfigError",
        }
    }
}
