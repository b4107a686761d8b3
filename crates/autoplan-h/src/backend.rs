use crate::cdp::CdpClient;
use crate::inject;
use async_trait::async_trait;
use autoplan_engine::backend::{
    Backend, BackendError, BoundingBox, ClickMode, DEFAULT_POLL_INTERVAL, Driver,
    ElementHandle, Locator, NameMatch, NavigationResult, SessionOptions,
};
use chromiumoxide::cdp::browser_protocol::input::{
    DispatchKeyEventParams, DispatchKeyEventType, DispatchMouseEventParams,
    DispatchMouseEventType, MouseButton,
};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::info;

/// Launches one Chromium instance per session.
#[derive(Debug, Default, Clone)]
pub struct ChromiumDriver;

impl ChromiumDriver {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Driver for ChromiumDriver {
    async fn launch_session(
        &self,
        options: &SessionOptions,
    ) -> Result<Box<dyn Backend>, BackendError> {
        info!("Launching Chromium session...");
        let client = CdpClient::launch(options).await?;
        Ok(Box::new(ChromiumSession {
            client: Some(client),
        }))
    }
}

pub struct ChromiumSession {
    client: Option<CdpClient>,
}

#[derive(Debug, Deserialize)]
struct Point {
    x: f64,
    y: f64,
}

#[derive(Debug, Deserialize)]
struct Rect {
    x: f64,
    y: f64,
    width: f64,
    height: f64,
}

fn name_json(name: &NameMatch) -> Value {
    match name {
        NameMatch::Exact(v) => json!({"kind": "exact", "value": v}),
        NameMatch::Pattern(v) => json!({"kind": "pattern", "value": v}),
        NameMatch::Contains(v) => json!({"kind": "contains", "value": v}),
    }
}

fn locator_json(locator: &Locator) -> Value {
    match locator {
        Locator::Css(selector) => json!({"kind": "css", "value": selector}),
        Locator::Role { role, name } => {
            json!({"kind": "role", "role": role, "name": name_json(name)})
        }
        Locator::Text(name) => json!({"kind": "text", "name": name_json(name)}),
        Locator::XPath(expression) => json!({"kind": "xpath", "value": expression}),
    }
}

fn handles(ids: Vec<u32>) -> Vec<ElementHandle> {
    ids.into_iter().map(ElementHandle).collect()
}

/// Chromium reports failed loads as `net::ERR_*`.
fn navigation_error(err: impl std::fmt::Display) -> BackendError {
    let message = err.to_string();
    if message.contains("net::ERR_") {
        BackendError::Network(message)
    } else {
        BackendError::Navigation(message)
    }
}

impl ChromiumSession {
    fn client(&self) -> Result<&CdpClient, BackendError> {
        self.client.as_ref().ok_or(BackendError::NotReady)
    }

    async fn dom<T: DeserializeOwned>(&self, method: &str, args: Value) -> Result<T, BackendError> {
        let client = self.client()?;
        let value = inject::call(&client.page, method, args).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn navigation_result(&self) -> Result<NavigationResult, BackendError> {
        let page = &self.client()?.page;
        let title = page
            .get_title()
            .await
            .unwrap_or_default()
            .unwrap_or_default();
        let url = page
            .url()
            .await
            .map_err(|e| BackendError::Navigation(e.to_string()))?
            .unwrap_or_default();
        Ok(NavigationResult {
            url,
            title,
            status: 200,
        })
    }

    /// Move, press and release the left button at a viewport point.
    async fn mouse_click(&self, point: Point) -> Result<(), BackendError> {
        let page = &self.client()?.page;
        for (event_type, clicks) in [
            (DispatchMouseEventType::MouseMoved, 0),
            (DispatchMouseEventType::MousePressed, 1),
            (DispatchMouseEventType::MouseReleased, 1),
        ] {
            let mut builder = DispatchMouseEventParams::builder()
                .r#type(event_type)
                .x(point.x)
                .y(point.y);
            if clicks > 0 {
                builder = builder.button(MouseButton::Left).click_count(clicks);
            }
            let event = builder
                .build()
                .map_err(|e| BackendError::Other(format!("Failed to build mouse event: {}", e)))?;
            page.execute(event)
                .await
                .map_err(|e| BackendError::Other(format!("mouse event failed: {}", e)))?;
        }
        Ok(())
    }
}

#[async_trait]
impl Backend for ChromiumSession {
    async fn navigate(&mut self, url: &str) -> Result<NavigationResult, BackendError> {
        let client = self.client()?;
        info!("Navigating to: {}", url);
        client.page.goto(url).await.map_err(navigation_error)?;
        self.navigation_result().await
    }

    async fn current_url(&mut self) -> Result<String, BackendError> {
        let page = &self.client()?.page;
        Ok(page
            .url()
            .await
            .map_err(|e| BackendError::Navigation(e.to_string()))?
            .unwrap_or_default())
    }

    async fn wait_for_load(&mut self, timeout: Duration) -> Result<(), BackendError> {
        let page = &self.client()?.page;
        let waited = tokio::time::timeout(timeout, async {
            loop {
                if let Ok(state) = inject::evaluate(page, "document.readyState").await
                    && state == "complete"
                {
                    return;
                }
                tokio::time::sleep(DEFAULT_POLL_INTERVAL).await;
            }
        })
        .await;
        waited.map_err(|_| BackendError::Timeout {
            operation: "page load".into(),
        })
    }

    async fn wait_for_navigation(&mut self, timeout: Duration) -> Result<(), BackendError> {
        let page = &self.client()?.page;
        match tokio::time::timeout(timeout, page.wait_for_navigation()).await {
            Err(_) => Err(BackendError::Timeout {
                operation: "navigation".into(),
            }),
            Ok(Err(e)) => Err(navigation_error(e)),
            Ok(Ok(_)) => Ok(()),
        }
    }

    async fn evaluate(&mut self, script: &str) -> Result<Value, BackendError> {
        inject::evaluate(&self.client()?.page, script).await
    }

    async fn screenshot(&mut self) -> Result<Vec<u8>, BackendError> {
        let client = self.client()?;
        client
            .page
            .screenshot(chromiumoxide::page::ScreenshotParams::builder().build())
            .await
            .map_err(|e| BackendError::Other(format!("Screenshot failed: {}", e)))
    }

    async fn close(&mut self) -> Result<(), BackendError> {
        if let Some(client) = self.client.take() {
            client.close().await?;
        }
        Ok(())
    }

    async fn query(&mut self, locator: &Locator) -> Result<Vec<ElementHandle>, BackendError> {
        let ids: Vec<u32> = self.dom("query", locator_json(locator)).await?;
        Ok(handles(ids))
    }

    async fn query_within(
        &mut self,
        root: ElementHandle,
        selector: &str,
    ) -> Result<Vec<ElementHandle>, BackendError> {
        let ids: Vec<u32> = self
            .dom("within", json!({"id": root.0, "selector": selector}))
            .await?;
        Ok(handles(ids))
    }

    async fn closest(
        &mut self,
        element: ElementHandle,
        selector: &str,
    ) -> Result<Option<ElementHandle>, BackendError> {
        let id: Option<u32> = self
            .dom("closest", json!({"id": element.0, "selector": selector}))
            .await?;
        Ok(id.map(ElementHandle))
    }

    async fn parent(
        &mut self,
        element: ElementHandle,
    ) -> Result<Option<ElementHandle>, BackendError> {
        let id: Option<u32> = self.dom("parent", json!({"id": element.0})).await?;
        Ok(id.map(ElementHandle))
    }

    async fn text_content(&mut self, element: ElementHandle) -> Result<String, BackendError> {
        self.dom("text", json!({"id": element.0})).await
    }

    async fn attribute(
        &mut self,
        element: ElementHandle,
        name: &str,
    ) -> Result<Option<String>, BackendError> {
        self.dom("attr", json!({"id": element.0, "name": name}))
            .await
    }

    async fn is_attached(&mut self, element: ElementHandle) -> Result<bool, BackendError> {
        self.dom("attached", json!({"id": element.0})).await
    }

    async fn is_visible(&mut self, element: ElementHandle) -> Result<bool, BackendError> {
        self.dom("visible", json!({"id": element.0})).await
    }

    async fn is_enabled(&mut self, element: ElementHandle) -> Result<bool, BackendError> {
        self.dom("enabled", json!({"id": element.0})).await
    }

    async fn bounding_box(
        &mut self,
        element: ElementHandle,
    ) -> Result<Option<BoundingBox>, BackendError> {
        let rect: Option<Rect> = self.dom("box", json!({"id": element.0})).await?;
        Ok(rect.map(|r| BoundingBox {
            x: r.x,
            y: r.y,
            width: r.width,
            height: r.height,
        }))
    }

    async fn scroll_into_view(&mut self, element: ElementHandle) -> Result<(), BackendError> {
        let _: Value = self.dom("scroll", json!({"id": element.0})).await?;
        Ok(())
    }

    async fn click(&mut self, element: ElementHandle, mode: ClickMode) -> Result<(), BackendError> {
        let args = json!({"id": element.0});
        match mode {
            ClickMode::Trial => {
                let _: Point = self.dom("trial", args).await?;
            }
            ClickMode::Normal => {
                let _: Value = self.dom("scroll", args.clone()).await?;
                let point: Point = self.dom("trial", args).await?;
                self.mouse_click(point).await?;
            }
            ClickMode::Force => {
                let _: Value = self.dom("scroll", args.clone()).await?;
                let point: Point = self.dom("center", args).await?;
                self.mouse_click(point).await?;
            }
            ClickMode::Dom => {
                let _: Value = self.dom("domClick", args).await?;
            }
            ClickMode::Dispatch => {
                let _: Value = self.dom("dispatch", args).await?;
            }
        }
        Ok(())
    }

    async fn check(&mut self, element: ElementHandle, checked: bool) -> Result<(), BackendError> {
        let _: Value = self
            .dom("check", json!({"id": element.0, "checked": checked}))
            .await?;
        Ok(())
    }

    async fn select_option(
        &mut self,
        element: ElementHandle,
        value: &str,
    ) -> Result<(), BackendError> {
        let _: Value = self
            .dom("select", json!({"id": element.0, "value": value}))
            .await?;
        Ok(())
    }

    async fn clear(&mut self, element: ElementHandle) -> Result<(), BackendError> {
        let _: Value = self.dom("clear", json!({"id": element.0})).await?;
        Ok(())
    }

    async fn focus(&mut self, element: ElementHandle) -> Result<(), BackendError> {
        let _: Value = self.dom("focus", json!({"id": element.0})).await?;
        Ok(())
    }

    async fn type_char(&mut self, _element: ElementHandle, ch: char) -> Result<(), BackendError> {
        let page = &self.client()?.page;
        let text = if ch == '\n' {
            "\r".to_string()
        } else {
            ch.to_string()
        };
        let event = DispatchKeyEventParams::builder()
            .r#type(DispatchKeyEventType::Char)
            .text(text)
            .build()
            .map_err(|e| BackendError::Other(format!("Failed to build key event: {:?}", e)))?;
        page.execute(event)
            .await
            .map_err(|e| BackendError::Other(format!("type_char failed: {}", e)))?;
        Ok(())
    }

    async fn fill(&mut self, element: ElementHandle, value: &str) -> Result<(), BackendError> {
        let _: Value = self
            .dom("fill", json!({"id": element.0, "value": value}))
            .await?;
        Ok(())
    }

    async fn accept_dialogs(&mut self) -> Result<(), BackendError> {
        let client = self.client.as_mut().ok_or(BackendError::NotReady)?;
        client.install_dialog_handler().await
    }

    async fn grant_permissions(&mut self, permissions: &[String]) -> Result<(), BackendError> {
        self.client()?.grant_permissions(permissions).await
    }

    async fn selector_visible(&mut self, selector: &str) -> Result<bool, BackendError> {
        self.dom("selectorVisible", json!({"selector": selector}))
            .await
    }

    async fn text_visible(&mut self, text: &str) -> Result<bool, BackendError> {
        self.dom("textVisible", json!({"text": text})).await
    }
}
