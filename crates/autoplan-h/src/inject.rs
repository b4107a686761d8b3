use autoplan_engine::backend::BackendError;
use chromiumoxide::Page;
use serde::Deserialize;
use serde_json::Value;
use std::future::Future;
use std::time::Duration;

const DOM_JS: &str = include_str!("dom.js");

/// Upper bound for a single page evaluation.
/// An open alert/confirm/prompt blocks the JS thread until it is answered.
const EVAL_TIMEOUT: Duration = Duration::from_secs(10);

/// Maximum retries for context errors during page navigation.
const MAX_CONTEXT_RETRIES: u32 = 10;

const CONTEXT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Check if an error indicates the page context is unavailable (e.g., during navigation).
pub(crate) fn is_context_error(err: &str) -> bool {
    err.contains("Cannot find context")
        || err.contains("Execution context was destroyed")
        || err.contains("-32000")
}

/// Retry an async operation that may fail due to context errors during page navigation.
/// Returns immediately on success or non-context errors.
async fn retry_on_context_error<T, F, Fut>(
    operation_name: &str,
    mut operation: F,
) -> Result<T, BackendError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, EvalError>>,
{
    let mut last_error = None;

    for attempt in 0..MAX_CONTEXT_RETRIES {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(EvalError::Context(err)) => {
                tracing::debug!(
                    "{} context error (attempt {}/{}), retrying...",
                    operation_name,
                    attempt + 1,
                    MAX_CONTEXT_RETRIES
                );
                last_error = Some(err);
                tokio::time::sleep(CONTEXT_RETRY_DELAY).await;
            }
            Err(EvalError::Timeout) => {
                return Err(BackendError::Timeout {
                    operation: format!("{} (page blocked, possibly by a dialog)", operation_name),
                });
            }
            Err(EvalError::Other(err)) => return Err(BackendError::Script(err)),
        }
    }

    Err(BackendError::Script(last_error.unwrap_or_else(|| {
        format!("{} failed after retries", operation_name)
    })))
}

pub(crate) enum EvalError {
    Timeout,
    Context(String),
    Other(String),
}

pub(crate) async fn evaluate_with_timeout(page: &Page, expression: &str) -> Result<Value, EvalError> {
    let eval_result = tokio::time::timeout(EVAL_TIMEOUT, page.evaluate(expression)).await;

    match eval_result {
        Err(_) => Err(EvalError::Timeout),
        Ok(Err(e)) => {
            let err_str = e.to_string();
            if is_context_error(&err_str) {
                Err(EvalError::Context(err_str))
            } else {
                Err(EvalError::Other(err_str))
            }
        }
        // Statements such as `el.click()` evaluate to undefined, which has no JSON value.
        Ok(Ok(remote_object)) => Ok(remote_object
            .into_value::<Value>()
            .unwrap_or(Value::Null)),
    }
}

/// Evaluate an arbitrary script, retrying while the page is between documents.
pub async fn evaluate(page: &Page, script: &str) -> Result<Value, BackendError> {
    retry_on_context_error("Evaluation", || evaluate_with_timeout(page, script)).await
}

async fn ensure_injected(page: &Page) -> Result<(), EvalError> {
    let loaded = evaluate_with_timeout(page, "typeof window.__autoplan !== 'undefined'").await?;
    if loaded != Value::Bool(true) {
        evaluate_with_timeout(page, DOM_JS).await?;
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
struct Reply {
    ok: bool,
    #[serde(default)]
    value: Value,
    #[serde(default)]
    kind: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    id: Option<u32>,
    #[serde(default)]
    selector: Option<String>,
}

impl Reply {
    fn into_result(self) -> Result<Value, BackendError> {
        if self.ok {
            return Ok(self.value);
        }
        let message = self.message.unwrap_or_default();
        let err = match self.kind.as_deref() {
            Some("stale") => BackendError::ElementStale {
                id: self.id.unwrap_or_default(),
            },
            Some("interactable") => BackendError::NotInteractable {
                id: self.id.unwrap_or_default(),
                reason: message,
            },
            Some("selector") => BackendError::SelectorInvalid {
                selector: self.selector.unwrap_or(message),
            },
            Some("option") => BackendError::OptionNotFound {
                value: self.value.as_str().map(str::to_string).unwrap_or(message),
            },
            _ => BackendError::Script(message),
        };
        Err(err)
    }
}

/// Invoke a method of the injected DOM helper, injecting it first when the
/// current document does not have it yet.
pub async fn call(page: &Page, method: &str, args: Value) -> Result<Value, BackendError> {
    let expression = format!(
        "window.__autoplan.call({}, {})",
        serde_json::to_string(method)?,
        serde_json::to_string(&args)?
    );
    tracing::trace!("dom call: {}", expression);

    let expression = expression.as_str();
    let reply = retry_on_context_error("DOM call", || async move {
        ensure_injected(page).await?;
        evaluate_with_timeout(page, expression).await
    })
    .await?;

    let reply: Reply = serde_json::from_value(reply)?;
    reply.into_result()
}
