use thiserror::Error;

/// Errors surfaced by a browser automation driver session.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Session not ready")]
    NotReady,

    #[error("Failed to launch browser: {0}")]
    Launch(String),

    #[error("Navigation error: {0}")]
    Navigation(String),

    #[error("Element {id} is no longer attached to the page")]
    ElementStale { id: u32 },

    #[error("Element {id} is not interactable: {reason}")]
    NotInteractable { id: u32, reason: String },

    #[error("Invalid selector: {selector}")]
    SelectorInvalid { selector: String },

    #[error("Option not found in select: {value}")]
    OptionNotFound { value: String },

    #[error("Timeout waiting for {operation}")]
    Timeout { operation: String },

    #[error("Script error: {0}")]
    Script(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Backend error: {0}")]
    Other(String),
}
