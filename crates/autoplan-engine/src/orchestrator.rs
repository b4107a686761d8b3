//! Run-level orchestration.
//!
//! The orchestrator opens one session per run, bootstraps it (permissions,
//! dialog guard, login, navigation steps, target page) and then dispatches
//! rows according to the plan's data and execution modes. The session is
//! always closed and a report is always produced once the plan is valid.

use crate::backend::{Driver, SessionOptions};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::executor::{ActionExecutor, RowContext};
use crate::login::perform_login;
use crate::row::RowExecutor;
use crate::session::Session;
use autoplan_common::normalizer;
use autoplan_common::plan::{AutomationPlan, DataRow, RowMode, StopWhen};
use autoplan_common::report::{ExecutionReport, RowExecutionResult, RowStatus};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

pub struct Orchestrator {
    driver: Arc<dyn Driver>,
    config: EngineConfig,
}

impl Orchestrator {
    pub fn new(driver: Arc<dyn Driver>, config: EngineConfig) -> Self {
        Self { driver, config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Normalize a raw plan document and run it.
    pub async fn run_document(
        &self,
        raw: &serde_json::Value,
        safe_run: bool,
    ) -> Result<ExecutionReport, EngineError> {
        let plan = normalizer::normalize(raw)?;
        self.run(&plan, safe_run).await
    }

    /// Execute `plan`. Only an invalid plan is returned as an error; every
    /// other failure is reported with `status: error` and the rows collected so far.
    pub async fn run(
        &self,
        plan: &AutomationPlan,
        safe_run: bool,
    ) -> Result<ExecutionReport, EngineError> {
        plan.validate()?;
        for field in plan.unlocatable_fields() {
            warn!(
                "Field mapping '{}' has no labels; fills of it will fail to resolve",
                field
            );
        }

        let started_at = Utc::now();
        info!(
            "Starting run against {} ({} row(s), safe_run={})",
            plan.target.url,
            plan.data_source.rows.len(),
            safe_run
        );

        let options = SessionOptions {
            headless: self.config.browser.headless,
            executable: self.config.browser.executable.clone(),
            user_data_dir: self.config.browser.user_data_dir.clone(),
        };
        let backend = match self.driver.launch_session(&options).await {
            Ok(b) => b,
            Err(e) => {
                error!("Failed to open session: {}", e);
                return Ok(ExecutionReport::assemble(
                    Vec::new(),
                    safe_run,
                    started_at,
                    Some(e.to_string()),
                ));
            }
        };

        let mut session = Session::new(backend);
        let mut results = Vec::new();
        let outcome = self.drive(&mut session, plan, safe_run, &mut results).await;
        session.close().await;

        let run_error = match outcome {
            Ok(()) => None,
            Err(e) => {
                error!("Run aborted: {}", e);
                Some(e.to_string())
            }
        };

        let report = ExecutionReport::assemble(results, safe_run, started_at, run_error);
        info!(
            "Run finished: {:?} (success={}, failed={}, partial={})",
            report.status, report.summary.success, report.summary.failed, report.summary.partial
        );
        Ok(report)
    }

    async fn drive(
        &self,
        session: &mut Session,
        plan: &AutomationPlan,
        safe_run: bool,
        results: &mut Vec<RowExecutionResult>,
    ) -> Result<(), EngineError> {
        let actions = ActionExecutor::new(&self.config);

        self.bootstrap(session, plan, &actions, safe_run).await?;

        let rows = RowExecutor::new(&actions);
        match plan.data_source.mode {
            RowMode::Batch => {
                self.run_batch(session, plan, &rows, &actions, safe_run, results)
                    .await
            }
            RowMode::Single if plan.is_loop() => {
                self.run_loop(session, plan, &rows, &actions, safe_run, results)
                    .await
            }
            RowMode::Single => {
                let index = plan.data_source.selected_row_index;
                let row = plan.row(index).ok_or_else(|| {
                    EngineError::Config(format!("selected row {} does not exist", index))
                })?;
                let ctx = RowContext {
                    plan,
                    row,
                    row_index: index,
                    safe_run,
                };
                let result = rows.run(session, &ctx).await;
                results.push(self.with_screenshot(session, result).await);
                Ok(())
            }
        }
    }

    async fn bootstrap(
        &self,
        session: &mut Session,
        plan: &AutomationPlan,
        actions: &ActionExecutor<'_>,
        safe_run: bool,
    ) -> Result<(), EngineError> {
        let permissions = &self.config.browser.permissions;
        if !permissions.is_empty()
            && let Err(e) = session.backend().grant_permissions(permissions).await
        {
            warn!("Could not grant permissions {:?}: {}", permissions, e);
        }

        if plan.has_dialog_actions() {
            session.arm_dialog_guard().await?;
        }

        if let Some(login) = &plan.target.login {
            perform_login(session.backend(), actions, plan, login).await?;
        }

        if !plan.target.navigation_steps.is_empty() {
            let empty = DataRow::new();
            let ctx = RowContext {
                plan,
                row: &empty,
                row_index: 0,
                safe_run,
            };
            for (i, step) in plan.target.navigation_steps.iter().enumerate() {
                info!("Navigation step {}: {}", i, step.kind.type_name());
                actions.perform(session, step, &ctx).await?;
            }
        }

        let backend = session.backend();
        info!("Opening target page {}", plan.target.url);
        backend.navigate(&plan.target.url).await?;
        actions.settle(backend).await;
        actions.wait_page_ready(backend, plan).await?;
        Ok(())
    }

    async fn run_batch(
        &self,
        session: &mut Session,
        plan: &AutomationPlan,
        rows: &RowExecutor<'_>,
        actions: &ActionExecutor<'_>,
        safe_run: bool,
        results: &mut Vec<RowExecutionResult>,
    ) -> Result<(), EngineError> {
        let total = plan.data_source.rows.len();
        for (index, row) in plan.data_source.rows.iter().enumerate() {
            info!("Batch row {}/{}", index + 1, total);
            let ctx = RowContext {
                plan,
                row,
                row_index: index,
                safe_run,
            };
            let mut result = rows.run(session, &ctx).await;
            let failed = result.status == RowStatus::Failed;

            if failed
                && let Some(indicator) = &plan.failure_indicator
                && actions.indicators().check(session.backend(), indicator).await
            {
                let remaining = total - index - 1;
                warn!(
                    "Failure indicator {} visible after row {}, stopping batch",
                    indicator, index
                );
                result.warnings.push(format!(
                    "Batch stopped early: failure indicator {} still visible; {} row(s) not run",
                    indicator, remaining
                ));
                results.push(self.with_screenshot(session, result).await);
                break;
            }

            results.push(self.with_screenshot(session, result).await);
        }
        Ok(())
    }

    async fn run_loop(
        &self,
        session: &mut Session,
        plan: &AutomationPlan,
        rows: &RowExecutor<'_>,
        actions: &ActionExecutor<'_>,
        safe_run: bool,
        results: &mut Vec<RowExecutionResult>,
    ) -> Result<(), EngineError> {
        let loop_config = plan
            .execution
            .loop_config
            .as_ref()
            .ok_or_else(|| EngineError::Config("loop mode requires execution.loop".into()))?;
        let indicator = loop_config
            .indicator
            .as_ref()
            .ok_or_else(|| EngineError::Config("loop mode requires a loop indicator".into()))?;

        let row_index = plan.data_source.selected_row_index;
        let row = plan
            .row(row_index)
            .ok_or_else(|| EngineError::Config(format!("selected row {} does not exist", row_index)))?;
        let delay = Duration::try_from_secs_f64(loop_config.delay_seconds).unwrap_or_default();
        let max = loop_config.max_iterations as usize;
        let mut stopped = false;

        for iteration in 0..max {
            let visible = actions.indicators().check(session.backend(), indicator).await;
            let stop = match loop_config.stop_when {
                StopWhen::Visible => visible,
                StopWhen::NotVisible => !visible,
            };
            if stop {
                info!("Loop stop condition met before iteration {}", iteration);
                if iteration == 0 {
                    results.push(RowExecutionResult {
                        row_index: 0,
                        status: RowStatus::Success,
                        data: row.clone(),
                        actions: Vec::new(),
                        warnings: vec![format!(
                            "Stop condition ({} {:?}) already met before the first iteration; nothing to do",
                            indicator, loop_config.stop_when
                        )],
                        duration: 0,
                        error: None,
                        failure_metadata: None,
                    });
                }
                stopped = true;
                break;
            }

            info!("Loop iteration {}/{}", iteration + 1, max);
            let ctx = RowContext {
                plan,
                row,
                row_index: iteration,
                safe_run,
            };
            let mut result = rows.run(session, &ctx).await;

            if let Some(failure) = &plan.failure_indicator
                && actions.indicators().check(session.backend(), failure).await
            {
                warn!("Failure indicator {} visible, aborting loop", failure);
                result.warnings.push(format!(
                    "Loop aborted after iteration {}: failure indicator {} visible",
                    iteration, failure
                ));
                results.push(self.with_screenshot(session, result).await);
                stopped = true;
                break;
            }

            results.push(self.with_screenshot(session, result).await);

            if iteration + 1 < max && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }

        if !stopped
            && max > 0
            && let Some(last) = results.last_mut()
        {
            last.warnings.push(format!(
                "Loop reached maxIterations ({}) before the stop condition was met",
                max
            ));
        }
        Ok(())
    }

    /// Attach a failure screenshot path to failed rows when a screenshot directory is configured.
    async fn with_screenshot(
        &self,
        session: &mut Session,
        mut result: RowExecutionResult,
    ) -> RowExecutionResult {
        if result.status != RowStatus::Failed {
            return result;
        }
        let Some(dir) = &self.config.browser.screenshot_dir else {
            return result;
        };

        let bytes = match session.backend().screenshot().await {
            Ok(b) => b,
            Err(e) => {
                warn!("Screenshot for row {} failed: {}", result.row_index, e);
                return result;
            }
        };

        let path = dir.join(format!("row-{}.png", result.row_index));
        let written = async {
            tokio::fs::create_dir_all(dir).await?;
            tokio::fs::write(&path, &bytes).await
        }
        .await;
        match written {
            Ok(()) => result
                .warnings
                .push(format!("Failure screenshot saved to {}", path.display())),
            Err(e) => warn!("Could not write screenshot {}: {}", path.display(), e),
        }
        result
    }
}
