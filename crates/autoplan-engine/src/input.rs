use crate::backend::{Backend, BackendError, ElementHandle};
use crate::config::schema::TypingConfig;
use rand::Rng;
use std::time::Duration;

/// Types values one character at a time with a randomized pause between keystrokes.
pub struct HumanInput {
    enabled: bool,
    min_delay_ms: u64,
    max_delay_ms: u64,
}

impl HumanInput {
    pub fn new(config: &TypingConfig) -> Self {
        let (min, max) = if config.min_delay_ms <= config.max_delay_ms {
            (config.min_delay_ms, config.max_delay_ms)
        } else {
            (config.max_delay_ms, config.min_delay_ms)
        };
        Self {
            enabled: config.enabled,
            min_delay_ms: min,
            max_delay_ms: max,
        }
    }

    /// Clear, focus, then type `value`. The first failing keystroke fails the whole fill.
    pub async fn type_into(
        &self,
        backend: &mut dyn Backend,
        element: ElementHandle,
        value: &str,
    ) -> Result<(), BackendError> {
        if !self.enabled {
            return backend.fill(element, value).await;
        }

        backend.clear(element).await?;
        backend.focus(element).await?;

        let mut chars = value.chars().peekable();
        while let Some(ch) = chars.next() {
            backend.type_char(element, ch).await?;
            if chars.peek().is_some() {
                tokio::time::sleep(self.next_delay()).await;
            }
        }
        Ok(())
    }

    fn next_delay(&self) -> Duration {
        let ms = rand::thread_rng().gen_range(self.min_delay_ms..=self.max_delay_ms);
        Duration::from_millis(ms)
    }
}
