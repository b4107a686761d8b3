use crate::error::EngineError;
use crate::executor::{ActionExecutor, RowContext};
use crate::failure;
use crate::session::Session;
use autoplan_common::failure::{FailureContext, FailureMetadata};
use autoplan_common::report::{RowExecutionResult, RowStatus};
use tokio::time::Instant;
use tracing::{info, warn};
use url::Url;

/// Runs the action flow for one data row and decides its status.
pub struct RowExecutor<'a> {
    actions: &'a ActionExecutor<'a>,
}

impl<'a> RowExecutor<'a> {
    pub fn new(actions: &'a ActionExecutor<'a>) -> Self {
        Self { actions }
    }

    /// Never fails: aborts are reported as a `failed` row with failure metadata.
    pub async fn run(&self, session: &mut Session, ctx: &RowContext<'_>) -> RowExecutionResult {
        let started = Instant::now();
        let plan = ctx.plan;
        let mut result = RowExecutionResult {
            row_index: ctx.row_index,
            status: RowStatus::Success,
            data: ctx.row.clone(),
            actions: Vec::with_capacity(plan.actions.len()),
            warnings: Vec::new(),
            duration: 0,
            error: None,
            failure_metadata: None,
        };

        if let Err(e) = self.ensure_target_page(session, ctx).await {
            self.abort(session, ctx, &mut result, e, None).await;
            result.duration = started.elapsed().as_millis() as u64;
            return result;
        }

        let mut aborted = false;
        for (index, action) in plan.actions.iter().enumerate() {
            let action_result = self.actions.execute(session, action, index, ctx).await;
            let failed = !action_result.success;
            let reason = action_result.error.clone().unwrap_or_default();
            let metadata = action_result.failure_metadata.clone();
            result.actions.push(action_result);

            if failed && action.required {
                let err = EngineError::ActionFailed {
                    index,
                    action_type: action.kind.type_name().to_string(),
                    reason,
                };
                self.abort(session, ctx, &mut result, err, metadata).await;
                aborted = true;
                break;
            }
            if failed {
                result.warnings.push(format!(
                    "Optional action {} ({}) failed: {}",
                    index,
                    action.kind.type_name(),
                    reason
                ));
            }
        }

        if !aborted {
            self.decide_status(session, ctx, &mut result).await;
        }

        result.duration = started.elapsed().as_millis() as u64;
        info!("Row {} finished: {:?}", ctx.row_index, result.status);
        result
    }

    /// Navigate back to the target URL when the page has drifted to another path.
    async fn ensure_target_page(
        &self,
        session: &mut Session,
        ctx: &RowContext<'_>,
    ) -> Result<(), EngineError> {
        let current = session.current_url().await;
        if same_path(&current, &ctx.plan.target.url) {
            return Ok(());
        }

        info!(
            "Row {}: page is at {}, returning to {}",
            ctx.row_index, current, ctx.plan.target.url
        );
        let backend = session.backend();
        backend.navigate(&ctx.plan.target.url).await?;
        self.actions.settle(backend).await;

        if let Some(login_url) = ctx.plan.target.login.as_ref().and_then(|l| l.url.as_deref())
            && !same_path(login_url, &ctx.plan.target.url)
        {
            let landed = backend.current_url().await.unwrap_or_default();
            if same_path(&landed, login_url) {
                return Err(EngineError::SessionExpired(format!(
                    "redirected to login page {}",
                    landed
                )));
            }
        }

        self.actions.wait_page_ready(backend, ctx.plan).await
    }

    async fn decide_status(
        &self,
        session: &mut Session,
        ctx: &RowContext<'_>,
        result: &mut RowExecutionResult,
    ) {
        let plan = ctx.plan;
        let indicators = self.actions.indicators();

        if let Some(failure) = &plan.failure_indicator
            && indicators.check(session.backend(), failure).await
        {
            let err = EngineError::FailureDetected(failure.value.clone());
            self.abort(session, ctx, result, err, None).await;
            return;
        }

        let all_succeeded = result.actions.iter().all(|a| a.success);
        result.status = match &plan.success_indicator {
            Some(success) => {
                if indicators.check(session.backend(), success).await {
                    RowStatus::Success
                } else {
                    result
                        .warnings
                        .push(format!("Success indicator {} not found", success));
                    RowStatus::Partial
                }
            }
            None if all_succeeded && plan.failure_indicator.is_none() => RowStatus::Success,
            None if all_succeeded => {
                result.warnings.push(
                    "No success indicator configured; an absent failure indicator does not confirm success"
                        .to_string(),
                );
                RowStatus::Partial
            }
            None => RowStatus::Partial,
        };
    }

    async fn abort(
        &self,
        session: &mut Session,
        ctx: &RowContext<'_>,
        result: &mut RowExecutionResult,
        err: EngineError,
        metadata: Option<FailureMetadata>,
    ) {
        warn!("Row {} failed: {}", ctx.row_index, err);
        let metadata = match metadata {
            Some(m) => m,
            None => {
                let context = FailureContext {
                    row_index: Some(ctx.row_index),
                    page_url: Some(session.current_url().await),
                    data_row: Some(ctx.row.clone()),
                    ..FailureContext::default()
                };
                failure::record(&err, context)
            }
        };
        result.status = RowStatus::Failed;
        result.error = Some(err.to_string());
        result.failure_metadata = Some(metadata);
    }
}

/// Compare the path components of two URLs; falls back to string equality
/// when either side does not parse.
pub fn same_path(current: &str, target: &str) -> bool {
    match (Url::parse(current), Url::parse(target)) {
        (Ok(a), Ok(b)) => a.path().trim_end_matches('/') == b.path().trim_end_matches('/'),
        _ => current.trim_end_matches('/') == target.trim_end_matches('/'),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_path() {
        assert!(same_path(
            "https://app.test/form?step=2",
            "https://app.test/form"
        ));
        assert!(same_path("https://app.test/form/", "https://app.test/form"));
        assert!(!same_path("https://app.test/done", "https://app.test/form"));
        assert!(!same_path("about:blank", "https://app.test/form"));
        assert!(!same_path("", "https://app.test/form"));
    }
}
