use crate::backend::{Backend, ElementHandle, Locator};
use crate::error::EngineError;
use crate::executor::ActionExecutor;
use autoplan_common::plan::{AutomationPlan, LoginConfig};
use tracing::{info, warn};

const USERNAME_SELECTORS: &[&str] = &[
    "input[type=\"email\"]",
    "input[name*=\"user\"]",
    "input[name*=\"email\"]",
    "input[name*=\"login\"]",
    "input[id*=\"user\"]",
    "input[id*=\"email\"]",
    "input[type=\"text\"]",
];

const PASSWORD_SELECTORS: &[&str] = &["input[type=\"password\"]", "input[name*=\"pass\"]"];

const SUBMIT_SELECTORS: &[&str] = &[
    "button[type=\"submit\"]",
    "input[type=\"submit\"]",
    "button[name*=\"login\"]",
    "button[id*=\"login\"]",
    "form button",
];

/// Log in with the plan's credentials. Any missing field or button aborts the run.
pub async fn perform_login(
    backend: &mut dyn Backend,
    actions: &ActionExecutor<'_>,
    plan: &AutomationPlan,
    login: &LoginConfig,
) -> Result<(), EngineError> {
    let url = login
        .url
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .unwrap_or(plan.target.url.as_str());

    info!("Logging in at {}", url);
    backend
        .navigate(url)
        .await
        .map_err(|e| EngineError::LoginFailed(format!("could not open login page: {}", e)))?;
    actions.settle(backend).await;

    let username = find_first(
        backend,
        login.username_selector.as_deref(),
        USERNAME_SELECTORS,
    )
    .await
    .ok_or_else(|| EngineError::LoginFailed("username field not found".into()))?;
    actions
        .input()
        .type_into(backend, username, &login.username)
        .await
        .map_err(|e| EngineError::LoginFailed(format!("could not type username: {}", e)))?;

    let password = find_first(
        backend,
        login.password_selector.as_deref(),
        PASSWORD_SELECTORS,
    )
    .await
    .ok_or_else(|| EngineError::LoginFailed("password field not found".into()))?;
    actions
        .input()
        .type_into(backend, password, &login.password)
        .await
        .map_err(|e| EngineError::LoginFailed(format!("could not type password: {}", e)))?;

    let submit = find_first(backend, login.submit_selector.as_deref(), SUBMIT_SELECTORS)
        .await
        .ok_or_else(|| EngineError::LoginFailed("submit button not found".into()))?;
    actions
        .click_element(backend, submit, "login submit")
        .await
        .map_err(|e| EngineError::LoginFailed(e.to_string()))?;

    let timeout = actions.config().timeouts.navigation();
    if let Err(e) = backend.wait_for_navigation(timeout).await {
        warn!("No navigation after login submit: {}", e);
    }
    actions.settle(backend).await;
    info!("Login submitted");
    Ok(())
}

/// First visible element matching the explicit selector, then the built-in list.
async fn find_first(
    backend: &mut dyn Backend,
    explicit: Option<&str>,
    defaults: &[&str],
) -> Option<ElementHandle> {
    let explicit = explicit.map(str::trim).filter(|s| !s.is_empty());
    for selector in explicit.into_iter().chain(defaults.iter().copied()) {
        let Ok(found) = backend.query(&Locator::Css(selector.to_string())).await else {
            continue;
        };
        for el in found {
            if backend.is_visible(el).await.unwrap_or(false) {
                return Some(el);
            }
        }
    }
    None
}
