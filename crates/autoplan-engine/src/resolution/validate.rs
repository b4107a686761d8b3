use crate::backend::{Backend, ClickMode, ElementHandle};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Purpose {
    /// Element to type into, check or select.
    Field,
    /// Element to click: must also be enabled and pass a trial click.
    Click,
}

/// Pick the first usable candidate, preferring visible ones.
///
/// A candidate must be attached. Hidden candidates are scrolled into view and
/// re-checked; if none ends up visible the first attached one is returned.
pub async fn pick_candidate(
    backend: &mut dyn Backend,
    candidates: &[ElementHandle],
    purpose: Purpose,
) -> Option<ElementHandle> {
    let mut hidden_fallback = None;

    for &el in candidates {
        if !backend.is_attached(el).await.unwrap_or(false) {
            continue;
        }

        let mut visible = backend.is_visible(el).await.unwrap_or(false);
        if !visible {
            if let Err(e) = backend.scroll_into_view(el).await {
                debug!("scroll_into_view failed for {:?}: {}", el, e);
            }
            visible = backend.is_visible(el).await.unwrap_or(false);
        }

        if purpose == Purpose::Click {
            if !backend.is_enabled(el).await.unwrap_or(false) {
                debug!("Candidate {:?} is disabled", el);
                continue;
            }
            if let Err(e) = backend.click(el, ClickMode::Trial).await {
                debug!("Trial click rejected {:?}: {}", el, e);
                continue;
            }
        }

        if visible {
            return Some(el);
        }
        hidden_fallback.get_or_insert(el);
    }

    hidden_fallback
}
