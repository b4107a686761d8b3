use async_trait::async_trait;
pub use autoplan_common::error::BackendError;
use std::path::PathBuf;
use std::time::Duration;

/// Poll interval used by the default `wait_for_*` implementations.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Opaque handle to an element registered by the driver session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementHandle(pub u32);

/// How an accessible name or text content is compared against a label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameMatch {
    /// Trimmed text equals the value.
    Exact(String),
    /// Regular expression source matched against the trimmed text.
    Pattern(String),
    /// Case-insensitive substring.
    Contains(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    Css(String),
    /// Elements with an explicit or implicit ARIA role and a matching accessible name.
    Role { role: String, name: NameMatch },
    /// Innermost elements whose own text matches.
    Text(NameMatch),
    XPath(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickMode {
    /// Actionability check only: the element must receive the pointer at its center.
    Trial,
    /// Pointer click at the element center.
    Normal,
    /// Pointer click without actionability checks.
    Force,
    /// `element.click()` in page context.
    Dom,
    /// Synthetic mousedown/mouseup/click events dispatched on the element.
    Dispatch,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone)]
pub struct NavigationResult {
    pub url: String,
    pub title: String,
    pub status: u16,
}

#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    pub headless: bool,
    pub executable: Option<PathBuf>,
    pub user_data_dir: Option<PathBuf>,
}

/// Launches browser sessions. Injected into the orchestrator, one session per run.
#[async_trait]
pub trait Driver: Send + Sync {
    async fn launch_session(
        &self,
        options: &SessionOptions,
    ) -> Result<Box<dyn Backend>, BackendError>;
}

/// A live, exclusively owned browser session.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Navigate the page to `url` and wait for the load event.
    async fn navigate(&mut self, url: &str) -> Result<NavigationResult, BackendError>;

    async fn current_url(&mut self) -> Result<String, BackendError>;

    /// Wait until the page has settled (document loaded, network quiet).
    async fn wait_for_load(&mut self, _timeout: Duration) -> Result<(), BackendError> {
        Ok(())
    }

    /// Wait for a navigation triggered by a previous action to finish.
    async fn wait_for_navigation(&mut self, _timeout: Duration) -> Result<(), BackendError> {
        Ok(())
    }

    /// Execute a script in the page context.
    async fn evaluate(&mut self, _script: &str) -> Result<serde_json::Value, BackendError> {
        Err(BackendError::NotSupported("evaluate".into()))
    }

    /// Capture a PNG screenshot of the current viewport.
    async fn screenshot(&mut self) -> Result<Vec<u8>, BackendError> {
        Err(BackendError::NotSupported("screenshot".into()))
    }

    /// Close the session and release browser resources.
    async fn close(&mut self) -> Result<(), BackendError>;

    /// All elements matching `locator`, in document order.
    async fn query(&mut self, locator: &Locator) -> Result<Vec<ElementHandle>, BackendError>;

    /// Descendants of `root` matching a CSS selector, in document order.
    async fn query_within(
        &mut self,
        root: ElementHandle,
        selector: &str,
    ) -> Result<Vec<ElementHandle>, BackendError>;

    /// Nearest inclusive ancestor of `element` matching a CSS selector.
    async fn closest(
        &mut self,
        element: ElementHandle,
        selector: &str,
    ) -> Result<Option<ElementHandle>, BackendError>;

    async fn parent(&mut self, element: ElementHandle)
    -> Result<Option<ElementHandle>, BackendError>;

    async fn text_content(&mut self, element: ElementHandle) -> Result<String, BackendError>;

    async fn attribute(
        &mut self,
        element: ElementHandle,
        name: &str,
    ) -> Result<Option<String>, BackendError>;

    async fn is_attached(&mut self, element: ElementHandle) -> Result<bool, BackendError>;

    async fn is_visible(&mut self, element: ElementHandle) -> Result<bool, BackendError>;

    async fn is_enabled(&mut self, element: ElementHandle) -> Result<bool, BackendError>;

    async fn bounding_box(
        &mut self,
        element: ElementHandle,
    ) -> Result<Option<BoundingBox>, BackendError>;

    async fn scroll_into_view(&mut self, element: ElementHandle) -> Result<(), BackendError>;

    async fn click(&mut self, element: ElementHandle, mode: ClickMode)
    -> Result<(), BackendError>;

    async fn check(&mut self, element: ElementHandle, checked: bool) -> Result<(), BackendError>;

    /// Select the option whose value or label equals `value`.
    async fn select_option(
        &mut self,
        element: ElementHandle,
        value: &str,
    ) -> Result<(), BackendError>;

    async fn clear(&mut self, element: ElementHandle) -> Result<(), BackendError>;

    async fn focus(&mut self, element: ElementHandle) -> Result<(), BackendError>;

    /// Type a single character into the focused `element`.
    async fn type_char(&mut self, element: ElementHandle, ch: char) -> Result<(), BackendError>;

    /// Replace the element's value in one step.
    async fn fill(&mut self, element: ElementHandle, value: &str) -> Result<(), BackendError>;

    /// Install a session-wide handler that accepts native dialogs.
    async fn accept_dialogs(&mut self) -> Result<(), BackendError> {
        Err(BackendError::NotSupported("accept_dialogs".into()))
    }

    async fn grant_permissions(&mut self, _permissions: &[String]) -> Result<(), BackendError> {
        Err(BackendError::NotSupported("grant_permissions".into()))
    }

    /// Whether any element matching `selector` is currently visible.
    async fn selector_visible(&mut self, selector: &str) -> Result<bool, BackendError> {
        let elements = self.query(&Locator::Css(selector.to_string())).await?;
        for element in elements {
            if self.is_visible(element).await.unwrap_or(false) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Whether any element containing `text` is currently visible.
    async fn text_visible(&mut self, text: &str) -> Result<bool, BackendError> {
        let elements = self
            .query(&Locator::Text(NameMatch::Contains(text.to_string())))
            .await?;
        for element in elements {
            if self.is_visible(element).await.unwrap_or(false) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn wait_for_selector(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> Result<(), BackendError> {
        let waited = tokio::time::timeout(timeout, async {
            loop {
                if self.selector_visible(selector).await.unwrap_or(false) {
                    return;
                }
                tokio::time::sleep(DEFAULT_POLL_INTERVAL).await;
            }
        })
        .await;
        waited.map_err(|_| BackendError::Timeout {
            operation: format!("selector '{}'", selector),
        })
    }

    async fn wait_for_text(&mut self, text: &str, timeout: Duration) -> Result<(), BackendError> {
        let waited = tokio::time::timeout(timeout, async {
            loop {
                if self.text_visible(text).await.unwrap_or(false) {
                    return;
                }
                tokio::time::sleep(DEFAULT_POLL_INTERVAL).await;
            }
        })
        .await;
        waited.map_err(|_| BackendError::Timeout {
            operation: format!("text '{}'", text),
        })
    }

    async fn wait_for_url(&mut self, fragment: &str, timeout: Duration) -> Result<(), BackendError> {
        let waited = tokio::time::timeout(timeout, async {
            loop {
                if let Ok(url) = self.current_url().await
                    && url.contains(fragment)
                {
                    return;
                }
                tokio::time::sleep(DEFAULT_POLL_INTERVAL).await;
            }
        })
        .await;
        waited.map_err(|_| BackendError::Timeout {
            operation: format!("url containing '{}'", fragment),
        })
    }
}
