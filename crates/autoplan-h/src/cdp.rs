use autoplan_engine::backend::{BackendError, SessionOptions};
use chromiumoxide::cdp::browser_protocol::browser::{GrantPermissionsParams, PermissionType};
use chromiumoxide::cdp::browser_protocol::page::{
    EventJavascriptDialogOpening, HandleJavaScriptDialogParams,
};
use chromiumoxide::cdp::js_protocol::runtime::EventConsoleApiCalled;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::task::JoinHandle;

pub struct CdpClient {
    pub browser: Browser,
    pub handler_task: JoinHandle<()>,
    pub page: Page,
    dialog_task: Option<JoinHandle<()>>,
    user_data_dir: PathBuf,
    cleanup_user_data_dir: bool,
}

impl CdpClient {
    pub async fn launch(options: &SessionOptions) -> Result<Self, BackendError> {
        let mut config_builder = BrowserConfig::builder();
        config_builder = config_builder.no_sandbox(); // Often needed in docker/CI/restricted envs
        let (user_data_dir, cleanup_user_data_dir) = resolve_user_data_dir(options)?;
        config_builder = config_builder.user_data_dir(&user_data_dir);

        if options.headless {
            tracing::info!("Launching browser in headless mode");
        } else {
            tracing::info!("Launching browser in visible mode");
            config_builder = config_builder.with_head();
        }

        if let Some(executable) = &options.executable {
            tracing::info!("Using custom Chrome binary: {}", executable.display());
            config_builder = config_builder.chrome_executable(executable);
        }

        let config = config_builder
            .build()
            .map_err(|e| BackendError::Launch(format!("invalid browser config: {}", e)))?;
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| BackendError::Launch(e.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if let Err(e) = h {
                    tracing::debug!("Browser handler error (ignoring): {}", e);
                    continue;
                }
            }
            tracing::debug!("Browser handler task ended");
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| BackendError::Launch(format!("failed to create page: {}", e)))?;

        let mut console_events = page
            .event_listener::<EventConsoleApiCalled>()
            .await
            .map_err(|e| BackendError::Launch(format!("console events: {}", e)))?;

        tokio::spawn(async move {
            while let Some(event) = console_events.next().await {
                let args: Vec<String> = event
                    .args
                    .iter()
                    .map(|arg| arg.description.clone().unwrap_or_default())
                    .collect();
                tracing::debug!("Browser console [{:?}]: {}", event.r#type, args.join(" "));
            }
        });

        Ok(Self {
            browser,
            handler_task,
            page,
            dialog_task: None,
            user_data_dir,
            cleanup_user_data_dir,
        })
    }

    /// Accept every alert/confirm/prompt, replacing any earlier handler.
    pub async fn install_dialog_handler(&mut self) -> Result<(), BackendError> {
        let mut dialog_events = self
            .page
            .event_listener::<EventJavascriptDialogOpening>()
            .await
            .map_err(|e| BackendError::Other(format!("dialog events: {}", e)))?;

        let page = self.page.clone();
        let task = tokio::spawn(async move {
            while let Some(event) = dialog_events.next().await {
                tracing::info!(
                    "Accepting JavaScript dialog ({:?}): {}",
                    event.r#type,
                    event.message
                );
                if let Err(e) = page.execute(HandleJavaScriptDialogParams::new(true)).await {
                    tracing::warn!("Failed to handle dialog: {}", e);
                }
            }
        });

        if let Some(previous) = self.dialog_task.replace(task) {
            previous.abort();
        }
        Ok(())
    }

    pub async fn grant_permissions(&self, names: &[String]) -> Result<(), BackendError> {
        let mut permissions = Vec::with_capacity(names.len());
        for name in names {
            let permission = PermissionType::from_str(name)
                .map_err(|_| BackendError::Other(format!("unknown permission '{}'", name)))?;
            permissions.push(permission);
        }
        if permissions.is_empty() {
            return Ok(());
        }

        self.browser
            .execute(GrantPermissionsParams::new(permissions))
            .await
            .map_err(|e| BackendError::Other(format!("grant permissions failed: {}", e)))?;
        Ok(())
    }

    pub async fn close(mut self) -> Result<(), BackendError> {
        if let Some(task) = self.dialog_task.take() {
            task.abort();
        }
        self.browser
            .close()
            .await
            .map_err(|e| BackendError::Other(format!("Error closing browser: {}", e)))?;
        self.handler_task
            .await
            .map_err(|e| BackendError::Other(format!("Error awaiting handler: {}", e)))?;

        if self.cleanup_user_data_dir
            && let Err(e) = std::fs::remove_dir_all(&self.user_data_dir)
        {
            tracing::debug!(
                "Failed to clean up user-data-dir {}: {}",
                self.user_data_dir.display(),
                e
            );
        }

        Ok(())
    }
}

fn resolve_user_data_dir(options: &SessionOptions) -> Result<(PathBuf, bool), BackendError> {
    if let Some(dir) = &options.user_data_dir {
        std::fs::create_dir_all(dir)?;
        tracing::info!("Using configured user data dir: {}", dir.display());
        return Ok((dir.clone(), false));
    }

    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| BackendError::Launch(format!("System clock error: {}", e)))?
        .as_nanos();
    let unique = format!("autoplan-chromium-profile-{}-{}", std::process::id(), nanos);
    let path = std::env::temp_dir().join(unique);
    std::fs::create_dir_all(&path)?;
    tracing::debug!("Using isolated user data dir: {}", path.display());
    Ok((path, true))
}
