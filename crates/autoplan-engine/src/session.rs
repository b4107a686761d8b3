use crate::backend::{Backend, BackendError};
use crate::dialog::DialogGuard;
use tracing::{info, warn};

/// A driver session together with the per-session state the engine tracks.
pub struct Session {
    backend: Box<dyn Backend>,
    dialog: DialogGuard,
}

impl Session {
    pub fn new(backend: Box<dyn Backend>) -> Self {
        Self {
            backend,
            dialog: DialogGuard::default(),
        }
    }

    pub fn backend(&mut self) -> &mut dyn Backend {
        &mut *self.backend
    }

    pub async fn arm_dialog_guard(&mut self) -> Result<(), BackendError> {
        self.dialog.arm(&mut *self.backend).await
    }

    /// Best-effort current URL; empty when the driver cannot report one.
    pub async fn current_url(&mut self) -> String {
        self.backend.current_url().await.unwrap_or_default()
    }

    pub async fn close(mut self) {
        match self.backend.close().await {
            Ok(()) => info!("Session closed"),
            Err(e) => warn!("Failed to close session cleanly: {}", e),
        }
    }
}
