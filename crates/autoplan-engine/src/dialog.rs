use crate::backend::{Backend, BackendError};
use tracing::{debug, info};

/// Auto-accepts native dialogs (alert, confirm, prompt). Installed at most once per session.
#[derive(Debug, Default)]
pub struct DialogGuard {
    armed: bool,
}

impl DialogGuard {
    /// Install the accept handler unless it is already in place.
    pub async fn arm(&mut self, backend: &mut dyn Backend) -> Result<(), BackendError> {
        if self.armed {
            debug!("Dialog guard already armed");
            return Ok(());
        }
        backend.accept_dialogs().await?;
        self.armed = true;
        info!("Dialog guard armed: native dialogs will be accepted");
        Ok(())
    }
}
