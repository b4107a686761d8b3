//! Execution of single plan actions.
//!
//! `ActionExecutor` runs one [`Action`] against the session: resolve the
//! target, act on it, then verify the optional `waitFor` indicator. Errors
//! are classified into a failed [`ActionResult`] instead of being raised.

use crate::backend::{Backend, ClickMode, ElementHandle};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::failure;
use crate::indicator::IndicatorEvaluator;
use crate::input::HumanInput;
use crate::resolution::ElementResolver;
use crate::session::Session;
use autoplan_common::failure::FailureContext;
use autoplan_common::plan::{
    Action, ActionKind, AutomationPlan, ConditionKind, DataRow, FieldMapping, FieldType,
    Indicator, cell_to_string, is_truthy,
};
use autoplan_common::report::ActionResult;
use std::time::Duration;
use tracing::{debug, info, warn};

const CLICK_FALLBACKS: [ClickMode; 4] = [
    ClickMode::Normal,
    ClickMode::Force,
    ClickMode::Dom,
    ClickMode::Dispatch,
];

const SUBMIT_SELECTORS: &[&str] = &["button[type=submit]", "input[type=submit]"];

/// Everything an action may read about the row it runs for.
#[derive(Debug, Clone, Copy)]
pub struct RowContext<'a> {
    pub plan: &'a AutomationPlan,
    pub row: &'a DataRow,
    pub row_index: usize,
    pub safe_run: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    Done,
    /// Nothing was done on purpose; the reason is reported.
    Skipped(String),
}

pub struct ActionExecutor<'a> {
    config: &'a EngineConfig,
    resolver: ElementResolver<'a>,
    input: HumanInput,
    indicators: IndicatorEvaluator,
}

impl<'a> ActionExecutor<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        Self {
            config,
            resolver: ElementResolver::new(config),
            input: HumanInput::new(&config.typing),
            indicators: IndicatorEvaluator::new(config.timeouts.check()),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        self.config
    }

    pub fn indicators(&self) -> &IndicatorEvaluator {
        &self.indicators
    }

    pub fn input(&self) -> &HumanInput {
        &self.input
    }

    /// Run `action` and report the outcome. Never fails; errors become a
    /// failed result carrying failure metadata.
    pub async fn execute(
        &self,
        session: &mut Session,
        action: &Action,
        index: usize,
        ctx: &RowContext<'_>,
    ) -> ActionResult {
        let action_type = action.kind.type_name();
        let target = action.kind.target();
        debug!(
            "Row {} action {}: {} {:?}",
            ctx.row_index, index, action_type, target
        );

        match self.perform(session, action, ctx).await {
            Ok(ActionOutcome::Done) => {
                info!("Row {} action {} ({}) succeeded", ctx.row_index, index, action_type);
                ActionResult::succeeded(action_type, target)
            }
            Ok(ActionOutcome::Skipped(reason)) => {
                info!(
                    "Row {} action {} ({}) skipped: {}",
                    ctx.row_index, index, action_type, reason
                );
                ActionResult::skipped(action_type, target, reason)
            }
            Err(e) => {
                warn!(
                    "Row {} action {} ({}) failed: {}",
                    ctx.row_index, index, action_type, e
                );
                let field_name = match &action.kind {
                    ActionKind::Fill { field, .. } => Some(field.clone()),
                    _ => None,
                };
                let context = FailureContext {
                    row_index: Some(ctx.row_index),
                    action_index: Some(index),
                    action_type: Some(action_type.to_string()),
                    target: target.map(str::to_string),
                    field_name,
                    page_url: Some(session.current_url().await),
                    data_row: Some(ctx.row.clone()),
                };
                let metadata = failure::record(&e, context);
                ActionResult::failed(action_type, target, e.to_string(), metadata)
            }
        }
    }

    /// Run `action`, raising errors to the caller.
    pub async fn perform(
        &self,
        session: &mut Session,
        action: &Action,
        ctx: &RowContext<'_>,
    ) -> Result<ActionOutcome, EngineError> {
        let outcome = match &action.kind {
            ActionKind::Fill { field, value } => {
                self.fill(session.backend(), field, value.as_deref(), ctx)
                    .await?
            }
            ActionKind::Click { target } => self.click(session.backend(), target, ctx).await?,
            ActionKind::Wait { seconds } => {
                let pause = Duration::try_from_secs_f64(*seconds).unwrap_or_default();
                tokio::time::sleep(pause).await;
                ActionOutcome::Done
            }
            ActionKind::HandleDialog { .. } => {
                session.arm_dialog_guard().await?;
                ActionOutcome::Done
            }
            ActionKind::Navigate { url } => {
                self.navigate(session.backend(), url.as_deref(), ctx.plan)
                    .await?;
                ActionOutcome::Done
            }
        };

        if outcome == ActionOutcome::Done
            && let Some(indicator) = &action.wait_for
        {
            self.wait_for(session.backend(), indicator).await?;
        }

        Ok(outcome)
    }

    async fn fill(
        &self,
        backend: &mut dyn Backend,
        field: &str,
        override_value: Option<&str>,
        ctx: &RowContext<'_>,
    ) -> Result<ActionOutcome, EngineError> {
        let mapping = ctx.plan.field_mapping(field).ok_or_else(|| {
            autoplan_common::error::PlanError::Invalid(format!(
                "fill action refers to unknown field mapping '{}'",
                field
            ))
        })?;

        if let Some(reason) = self.conditional_skip(backend, mapping, ctx.row).await {
            return Ok(ActionOutcome::Skipped(reason));
        }

        let value = override_value
            .map(str::to_string)
            .or_else(|| ctx.row.get(&mapping.data_key).and_then(cell_to_string))
            .unwrap_or_default();

        if mapping.required && value.is_empty() {
            return Err(EngineError::MissingData {
                field: mapping.name.clone(),
                data_key: mapping.data_key.clone(),
            });
        }

        self.settle(backend).await;

        let resolved = self
            .resolver
            .resolve_field(backend, mapping)
            .await
            .map_err(|e| EngineError::ElementNotFound {
                target: e.target,
                attempted: e.labels,
            })?;
        let element = resolved.element;

        if let Err(e) = backend.scroll_into_view(element).await {
            debug!("scroll_into_view failed for field '{}': {}", mapping.name, e);
        }

        match mapping.field_type {
            FieldType::Checkbox | FieldType::Radio => {
                backend.check(element, is_truthy(&value)).await?;
            }
            FieldType::Select => {
                backend.select_option(element, &value).await?;
            }
            FieldType::Text | FieldType::Textarea => {
                self.input.type_into(backend, element, &value).await?;
            }
        }

        Ok(ActionOutcome::Done)
    }

    async fn conditional_skip(
        &self,
        backend: &mut dyn Backend,
        mapping: &FieldMapping,
        row: &DataRow,
    ) -> Option<String> {
        let cond = mapping.conditional.as_ref()?;
        match cond.kind {
            ConditionKind::DataExists => {
                let present = row
                    .get(&cond.value)
                    .and_then(cell_to_string)
                    .is_some_and(|v| !v.trim().is_empty());
                (!present).then(|| format!("conditional: no data for '{}'", cond.value))
            }
            ConditionKind::ElementExists => {
                let present = self
                    .indicators
                    .check(backend, &Indicator::selector(cond.value.clone()))
                    .await;
                (!present).then(|| format!("conditional: no element matches '{}'", cond.value))
            }
        }
    }

    async fn click(
        &self,
        backend: &mut dyn Backend,
        target: &str,
        ctx: &RowContext<'_>,
    ) -> Result<ActionOutcome, EngineError> {
        if ctx.safe_run && is_submit_like(target, &self.config.safe_run.keywords) {
            return Ok(ActionOutcome::Skipped(format!(
                "safe run: submit-like click on '{}' not performed",
                target
            )));
        }

        self.settle(backend).await;

        let resolved = self
            .resolver
            .resolve_click(backend, target)
            .await
            .map_err(|e| EngineError::ElementNotFound {
                target: e.target,
                attempted: e.labels,
            })?;

        self.click_element(backend, resolved.element, target).await?;
        self.settle(backend).await;
        Ok(ActionOutcome::Done)
    }

    /// Scroll, wait for visibility, then try each click mode in turn.
    pub async fn click_element(
        &self,
        backend: &mut dyn Backend,
        element: ElementHandle,
        target: &str,
    ) -> Result<(), EngineError> {
        if let Err(e) = backend.scroll_into_view(element).await {
            debug!("scroll_into_view failed for '{}': {}", target, e);
        }
        if !wait_visible(backend, element, self.config.timeouts.check()).await {
            debug!("'{}' still not visible, clicking anyway", target);
        }

        let mut last_error = None;
        for mode in CLICK_FALLBACKS {
            match backend.click(element, mode).await {
                Ok(()) => {
                    debug!("Clicked '{}' with {:?}", target, mode);
                    return Ok(());
                }
                Err(e) => {
                    debug!("{:?} click on '{}' failed: {}", mode, target, e);
                    last_error = Some(e);
                }
            }
        }

        Err(EngineError::ClickFailed {
            target: target.to_string(),
            reason: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no click strategy succeeded".to_string()),
        })
    }

    async fn navigate(
        &self,
        backend: &mut dyn Backend,
        url: Option<&str>,
        plan: &AutomationPlan,
    ) -> Result<(), EngineError> {
        let destination = url
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .unwrap_or(plan.target.url.as_str());

        info!("Navigating to {}", destination);
        backend.navigate(destination).await?;
        self.settle(backend).await;

        if destination == plan.target.url {
            self.wait_page_ready(backend, plan).await?;
        }
        Ok(())
    }

    /// Best-effort wait for the page to settle.
    pub async fn settle(&self, backend: &mut dyn Backend) {
        if let Err(e) = backend.wait_for_load(self.config.timeouts.navigation()).await {
            debug!("Page did not settle: {}", e);
        }
    }

    pub async fn wait_page_ready(
        &self,
        backend: &mut dyn Backend,
        plan: &AutomationPlan,
    ) -> Result<(), EngineError> {
        self.indicators
            .wait(
                backend,
                &plan.target.page_ready_indicator,
                "page-ready indicator",
                self.config.timeouts.page_ready(),
            )
            .await
    }

    async fn wait_for(
        &self,
        backend: &mut dyn Backend,
        indicator: &Indicator,
    ) -> Result<(), EngineError> {
        self.indicators
            .wait(
                backend,
                indicator,
                "indicator",
                self.config.timeouts.action_wait(),
            )
            .await
    }
}

async fn wait_visible(backend: &mut dyn Backend, element: ElementHandle, timeout: Duration) -> bool {
    tokio::time::timeout(timeout, async {
        loop {
            if backend.is_visible(element).await.unwrap_or(false) {
                return;
            }
            tokio::time::sleep(crate::backend::DEFAULT_POLL_INTERVAL).await;
        }
    })
    .await
    .is_ok()
}

/// Whether a click target looks like a form submission.
pub fn is_submit_like(target: &str, keywords: &[String]) -> bool {
    let lowered = target.to_lowercase();
    if keywords
        .iter()
        .any(|k| !k.is_empty() && lowered.contains(&k.to_lowercase()))
    {
        return true;
    }
    let compact: String = lowered
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '"' && *c != '\'')
        .collect();
    SUBMIT_SELECTORS.contains(&compact.as_str())
}
