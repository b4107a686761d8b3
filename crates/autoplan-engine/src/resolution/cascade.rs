use super::result::{Resolved, ResolutionError};
use super::strategy::{CLICK_CASCADE, FIELD_PREPASS, Strategy};
use super::validate::{Purpose, pick_candidate};
use crate::backend::Backend;
use crate::config::EngineConfig;
use crate::config::schema::ResolverConfig;
use autoplan_common::plan::FieldMapping;
use std::time::Duration;
use tracing::{debug, info};

/// One cascade step: a strategy applied to a label.
pub type Step = (Strategy, String);

/// Resolves abstract labels into live elements by running an ordered list of
/// strategies, first validated candidate wins.
pub struct ElementResolver<'a> {
    config: &'a ResolverConfig,
    strategy_timeout: Duration,
}

impl<'a> ElementResolver<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        Self {
            config: &config.resolver,
            strategy_timeout: config.timeouts.strategy(),
        }
    }

    /// Steps for a click target.
    pub fn click_steps(target: &str) -> Vec<Step> {
        let target = target.trim();
        if target.is_empty() {
            return Vec::new();
        }
        CLICK_CASCADE
            .iter()
            .map(|s| (*s, target.to_string()))
            .collect()
    }

    /// Steps for a field mapping: each primary label gets the form-field
    /// pre-pass and the click cascade, then fallback labels get the click cascade.
    pub fn field_steps(mapping: &FieldMapping) -> Vec<Step> {
        let mut steps = Vec::new();
        for label in mapping.labels.iter().map(|l| l.trim()).filter(|l| !l.is_empty()) {
            for s in FIELD_PREPASS.iter().chain(CLICK_CASCADE.iter()) {
                steps.push((*s, label.to_string()));
            }
        }
        for label in mapping
            .fallback_labels
            .iter()
            .map(|l| l.trim())
            .filter(|l| !l.is_empty())
        {
            for s in CLICK_CASCADE {
                steps.push((*s, label.to_string()));
            }
        }
        steps
    }

    pub async fn resolve_click(
        &self,
        backend: &mut dyn Backend,
        target: &str,
    ) -> Result<Resolved, ResolutionError> {
        let labels = vec![target.to_string()];
        self.run(backend, target, labels, &Self::click_steps(target), Purpose::Click)
            .await
    }

    pub async fn resolve_field(
        &self,
        backend: &mut dyn Backend,
        mapping: &FieldMapping,
    ) -> Result<Resolved, ResolutionError> {
        let labels = mapping
            .labels
            .iter()
            .chain(mapping.fallback_labels.iter())
            .cloned()
            .collect();
        self.run(
            backend,
            &mapping.name,
            labels,
            &Self::field_steps(mapping),
            Purpose::Field,
        )
        .await
    }

    async fn run(
        &self,
        backend: &mut dyn Backend,
        target: &str,
        labels: Vec<String>,
        steps: &[Step],
        purpose: Purpose,
    ) -> Result<Resolved, ResolutionError> {
        let mut attempted = Vec::with_capacity(steps.len());

        for (strategy, label) in steps {
            attempted.push(format!("{}({})", strategy.name(), label));

            let attempt = tokio::time::timeout(self.strategy_timeout, async {
                let candidates = strategy.locate(backend, label, self.config).await?;
                Ok::<_, crate::backend::BackendError>(
                    pick_candidate(backend, &candidates, purpose).await,
                )
            })
            .await;

            match attempt {
                Ok(Ok(Some(element))) => {
                    info!(
                        "Resolved '{}' via {} on label '{}'",
                        target,
                        strategy.name(),
                        label
                    );
                    return Ok(Resolved {
                        element,
                        strategy: *strategy,
                        label: label.clone(),
                    });
                }
                Ok(Ok(None)) => {
                    debug!("{} found nothing for '{}'", strategy.name(), label);
                }
                Ok(Err(e)) => {
                    debug!("{} failed for '{}': {}", strategy.name(), label, e);
                }
                Err(_) => {
                    debug!(
                        "{} timed out for '{}' after {:?}",
                        strategy.name(),
                        label,
                        self.strategy_timeout
                    );
                }
            }
        }

        let reason = if steps.is_empty() {
            "no labels to search for".to_string()
        } else {
            format!("no element matched after {} strategies", steps.len())
        };
        Err(ResolutionError {
            target: target.to_string(),
            reason,
            attempted,
            labels,
        })
    }
}
