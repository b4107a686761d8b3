//! Page-state predicates: page-ready, success and failure indicators.

use crate::backend::{Backend, BackendError};
use crate::error::EngineError;
use autoplan_common::plan::{Indicator, IndicatorKind};
use std::time::Duration;
use tracing::debug;

pub struct IndicatorEvaluator {
    check_timeout: Duration,
}

impl IndicatorEvaluator {
    pub fn new(check_timeout: Duration) -> Self {
        Self { check_timeout }
    }

    /// Single look bounded by the check timeout. Any error counts as "not satisfied".
    pub async fn check(&self, backend: &mut dyn Backend, indicator: &Indicator) -> bool {
        let result = match indicator.kind {
            IndicatorKind::Selector => {
                backend
                    .wait_for_selector(&indicator.value, self.check_timeout)
                    .await
            }
            IndicatorKind::Text => backend.wait_for_text(&indicator.value, self.check_timeout).await,
            IndicatorKind::Url => backend.wait_for_url(&indicator.value, self.check_timeout).await,
        };
        match result {
            Ok(()) => true,
            Err(e) => {
                debug!("Indicator {} not satisfied: {}", indicator, e);
                false
            }
        }
    }

    /// Block until the indicator holds or `timeout` elapses.
    ///
    /// `what` names the indicator in the resulting `IndicatorTimeout` error,
    /// e.g. `"page-ready indicator"`.
    pub async fn wait(
        &self,
        backend: &mut dyn Backend,
        indicator: &Indicator,
        what: &str,
        timeout: Duration,
    ) -> Result<(), EngineError> {
        let result = match indicator.kind {
            IndicatorKind::Selector => backend.wait_for_selector(&indicator.value, timeout).await,
            IndicatorKind::Text => backend.wait_for_text(&indicator.value, timeout).await,
            IndicatorKind::Url => backend.wait_for_url(&indicator.value, timeout).await,
        };
        match result {
            Ok(()) => Ok(()),
            Err(BackendError::Timeout { .. }) => Err(EngineError::IndicatorTimeout {
                what: format!("{} '{}'", what, indicator.value),
                timeout_ms: timeout.as_millis() as u64,
            }),
            Err(e) => Err(e.into()),
        }
    }
}
