//! Individual element-location strategies.
//!
//! Each [`Strategy`] turns a label into candidate elements. Candidates are
//! validated afterwards by the cascade runner, so strategies only locate.

use crate::backend::{Backend, BackendError, ElementHandle, Locator, NameMatch};
use crate::config::schema::ResolverConfig;
use tracing::debug;

/// Roles searched by the accessible-role strategies.
pub const SEARCH_ROLES: &[&str] = &[
    "button",
    "link",
    "textbox",
    "checkbox",
    "radio",
    "combobox",
    "spinbutton",
];

const CLICKABLE: &str = "button, [role=\"button\"], a";
const FORM_CONTROLS: &str = "input, textarea, select";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    LabelFor,
    Placeholder,
    NameAttribute,
    CssSelector,
    RoleExact,
    RoleRegex,
    ContentExact,
    RoleContains,
    ContentContains,
    AttributeExact,
    AttributeContains,
    Onclick,
    IconAncestor,
    ButtonScan,
    LinkExact,
    LinkRegex,
    LinkContains,
    TextAncestor,
    XPath,
}

/// Strategies used for click targets and fallback labels, in priority order.
pub const CLICK_CASCADE: &[Strategy] = &[
    Strategy::CssSelector,
    Strategy::RoleExact,
    Strategy::RoleRegex,
    Strategy::ContentExact,
    Strategy::RoleContains,
    Strategy::ContentContains,
    Strategy::AttributeExact,
    Strategy::AttributeContains,
    Strategy::Onclick,
    Strategy::IconAncestor,
    Strategy::ButtonScan,
    Strategy::LinkExact,
    Strategy::LinkRegex,
    Strategy::LinkContains,
    Strategy::TextAncestor,
    Strategy::XPath,
];

/// Form-field strategies tried for each primary label before the click cascade.
pub const FIELD_PREPASS: &[Strategy] = &[
    Strategy::LabelFor,
    Strategy::Placeholder,
    Strategy::NameAttribute,
];

impl Strategy {
    pub fn name(&self) -> &'static str {
        match self {
            Strategy::LabelFor => "label_for",
            Strategy::Placeholder => "placeholder",
            Strategy::NameAttribute => "name_attribute",
            Strategy::CssSelector => "css_selector",
            Strategy::RoleExact => "role_exact",
            Strategy::RoleRegex => "role_regex",
            Strategy::ContentExact => "content_exact",
            Strategy::RoleContains => "role_contains",
            Strategy::ContentContains => "content_contains",
            Strategy::AttributeExact => "attribute_exact",
            Strategy::AttributeContains => "attribute_contains",
            Strategy::Onclick => "onclick",
            Strategy::IconAncestor => "icon_ancestor",
            Strategy::ButtonScan => "button_scan",
            Strategy::LinkExact => "link_exact",
            Strategy::LinkRegex => "link_regex",
            Strategy::LinkContains => "link_contains",
            Strategy::TextAncestor => "text_ancestor",
            Strategy::XPath => "xpath",
        }
    }

    /// Candidate elements for `label`, in document order.
    pub async fn locate(
        &self,
        backend: &mut dyn Backend,
        label: &str,
        config: &ResolverConfig,
    ) -> Result<Vec<ElementHandle>, BackendError> {
        let label = label.trim();
        match self {
            Strategy::LabelFor => label_for(backend, label).await,
            Strategy::Placeholder => {
                let v = css_string(label);
                css(
                    backend,
                    format!("input[placeholder*={v}], textarea[placeholder*={v}]"),
                )
                .await
            }
            Strategy::NameAttribute => {
                let v = css_string(&normalize_name(label));
                css(
                    backend,
                    format!("input[name*={v}], textarea[name*={v}], select[name*={v}]"),
                )
                .await
            }
            Strategy::CssSelector => css(backend, label.to_string()).await,
            Strategy::RoleExact => {
                by_roles(backend, SEARCH_ROLES, NameMatch::Exact(label.to_string())).await
            }
            Strategy::RoleRegex => {
                by_roles(backend, SEARCH_ROLES, NameMatch::Pattern(tolerant_pattern(label))).await
            }
            Strategy::ContentExact => {
                let candidates = css(backend, "button, a".to_string()).await?;
                filter_text(backend, candidates, |text| text.trim() == label).await
            }
            Strategy::RoleContains => {
                let candidates =
                    by_roles(backend, SEARCH_ROLES, NameMatch::Contains(label.to_string())).await?;
                filter_text(backend, candidates, |text| text.trim() == label).await
            }
            Strategy::ContentContains => {
                let candidates = css(backend, "button, a".to_string()).await?;
                filter_text(backend, candidates, |text| collapse_whitespace(text) == label).await
            }
            Strategy::AttributeExact => {
                let v = css_string(label);
                css(backend, format!("[title={v}], [aria-label={v}]")).await
            }
            Strategy::AttributeContains => {
                let v = css_string(label);
                css(backend, format!("[title*={v}], [aria-label*={v}]")).await
            }
            Strategy::Onclick => css(backend, format!("[onclick*={}]", css_string(label))).await,
            Strategy::IconAncestor => icon_ancestor(backend, label, config).await,
            Strategy::ButtonScan => button_scan(backend, label, config.button_scan_limit).await,
            Strategy::LinkExact => {
                by_roles(backend, &["link"], NameMatch::Exact(label.to_string())).await
            }
            Strategy::LinkRegex => {
                by_roles(backend, &["link"], NameMatch::Pattern(tolerant_pattern(label))).await
            }
            Strategy::LinkContains => {
                let candidates =
                    by_roles(backend, &["link"], NameMatch::Contains(label.to_string())).await?;
                let wanted = label.to_lowercase();
                filter_text(backend, candidates, |text| {
                    collapse_whitespace(text).to_lowercase() == wanted
                })
                .await
            }
            Strategy::TextAncestor => text_ancestor(backend, label).await,
            Strategy::XPath => {
                let literal = xpath_literal(label);
                let xpath = format!(
                    "//button[normalize-space(.)={literal}] | //*[@role='button'][normalize-space(.)={literal}]"
                );
                backend.query(&Locator::XPath(xpath)).await
            }
        }
    }
}

async fn css(
    backend: &mut dyn Backend,
    selector: String,
) -> Result<Vec<ElementHandle>, BackendError> {
    backend.query(&Locator::Css(selector)).await
}

async fn by_roles(
    backend: &mut dyn Backend,
    roles: &[&str],
    name: NameMatch,
) -> Result<Vec<ElementHandle>, BackendError> {
    let mut found = Vec::new();
    for role in roles {
        let locator = Locator::Role {
            role: role.to_string(),
            name: name.clone(),
        };
        for el in backend.query(&locator).await? {
            if !found.contains(&el) {
                found.push(el);
            }
        }
    }
    Ok(found)
}

async fn filter_text<F>(
    backend: &mut dyn Backend,
    candidates: Vec<ElementHandle>,
    accept: F,
) -> Result<Vec<ElementHandle>, BackendError>
where
    F: Fn(&str) -> bool + Send,
{
    let mut kept = Vec::new();
    for el in candidates {
        let text = backend.text_content(el).await.unwrap_or_default();
        if accept(&text) {
            kept.push(el);
        }
    }
    Ok(kept)
}

/// `<label>` containing the text: its `for` target, else the first control
/// inside the label or its container.
async fn label_for(
    backend: &mut dyn Backend,
    label: &str,
) -> Result<Vec<ElementHandle>, BackendError> {
    let labels = css(backend, "label".to_string()).await?;
    let wanted = label.to_lowercase();
    let mut found = Vec::new();

    for el in labels {
        let text = backend.text_content(el).await.unwrap_or_default();
        if !text.to_lowercase().contains(&wanted) {
            continue;
        }

        if let Some(id) = backend.attribute(el, "for").await?
            && !id.is_empty()
        {
            let targets = css(backend, format!("[id={}]", css_string(&id))).await?;
            if let Some(target) = targets.first() {
                found.push(*target);
                continue;
            }
        }

        if let Some(control) = backend.query_within(el, FORM_CONTROLS).await?.first() {
            found.push(*control);
            continue;
        }

        if let Some(container) = backend.parent(el).await?
            && let Some(control) = backend.query_within(container, FORM_CONTROLS).await?.first()
        {
            found.push(*control);
        }
    }

    debug!("label_for '{}' produced {} candidate(s)", label, found.len());
    Ok(found)
}

/// Icon elements whose nearest button ancestor carries the label in `title` or `aria-label`.
async fn icon_ancestor(
    backend: &mut dyn Backend,
    label: &str,
    config: &ResolverConfig,
) -> Result<Vec<ElementHandle>, BackendError> {
    if config.icon_selectors.is_empty() {
        return Ok(Vec::new());
    }
    let icons = css(backend, config.icon_selectors.join(", ")).await?;
    let wanted = label.to_lowercase();
    let mut found = Vec::new();

    for icon in icons {
        let Some(button) = backend.closest(icon, "button, [role=\"button\"]").await? else {
            continue;
        };
        if found.contains(&button) {
            continue;
        }
        if attribute_mentions(backend, button, &wanted).await {
            found.push(button);
        }
    }
    Ok(found)
}

/// Linear scan over the first `limit` buttons comparing title, aria-label and text.
async fn button_scan(
    backend: &mut dyn Backend,
    label: &str,
    limit: usize,
) -> Result<Vec<ElementHandle>, BackendError> {
    let buttons = css(backend, "button, [role=\"button\"]".to_string()).await?;
    let wanted = label.to_lowercase();

    for button in buttons.into_iter().take(limit) {
        for attr in ["title", "aria-label"] {
            if let Ok(Some(value)) = backend.attribute(button, attr).await
                && value.trim().to_lowercase() == wanted
            {
                return Ok(vec![button]);
            }
        }
        let text = backend.text_content(button).await.unwrap_or_default();
        if collapse_whitespace(&text).to_lowercase() == wanted {
            return Ok(vec![button]);
        }
    }
    Ok(Vec::new())
}

/// Exact text match, lifted to the nearest clickable ancestor.
async fn text_ancestor(
    backend: &mut dyn Backend,
    label: &str,
) -> Result<Vec<ElementHandle>, BackendError> {
    let nodes = backend
        .query(&Locator::Text(NameMatch::Exact(label.to_string())))
        .await?;
    let mut found = Vec::new();
    for node in nodes {
        if let Some(clickable) = backend.closest(node, CLICKABLE).await?
            && !found.contains(&clickable)
        {
            found.push(clickable);
        }
    }
    Ok(found)
}

async fn attribute_mentions(backend: &mut dyn Backend, el: ElementHandle, wanted: &str) -> bool {
    for attr in ["title", "aria-label"] {
        if let Ok(Some(value)) = backend.attribute(el, attr).await
            && value.to_lowercase().contains(wanted)
        {
            return true;
        }
    }
    false
}

/// Lower-case, whitespace runs replaced by `_`.
pub fn normalize_name(label: &str) -> String {
    label
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .to_lowercase()
}

pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Anchored pattern allowing surrounding whitespace and icon glyphs.
pub fn tolerant_pattern(label: &str) -> String {
    format!(r"^\W*{}\W*$", regex::escape(label))
}

/// Double-quoted CSS string literal.
pub fn css_string(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{}\"", escaped)
}

/// XPath 1.0 string literal; falls back to `concat()` when both quote kinds occur.
pub fn xpath_literal(value: &str) -> String {
    if !value.contains('\'') {
        format!("'{}'", value)
    } else if !value.contains('"') {
        format!("\"{}\"", value)
    } else {
        let parts: Vec<String> = value.split('\'').map(|p| format!("'{}'", p)).collect();
        format!("concat({})", parts.join(", \"'\", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("First  Name"), "first_name");
        assert_eq!(normalize_name(" Email "), "email");
    }

    #[test]
    fn test_tolerant_pattern() {
        let re = Regex::new(&tolerant_pattern("Save (draft)")).unwrap();
        assert!(re.is_match("  Save (draft) "));
        assert!(re.is_match("★ Save (draft)"));
        assert!(!re.is_match("Save (draft) copy"));
    }

    #[test]
    fn test_literals() {
        assert_eq!(css_string(r#"a"b"#), r#""a\"b""#);
        assert_eq!(xpath_literal("Save"), "'Save'");
        assert_eq!(xpath_literal("Don't"), "\"Don't\"");
        assert_eq!(
            xpath_literal(r#"a'b"c"#),
            r#"concat('a', "'", 'b"c')"#
        );
    }

    #[test]
    fn test_cascade_order_is_fixed() {
        let names: Vec<&str> = CLICK_CASCADE.iter().map(Strategy::name).collect();
        assert_eq!(names.first(), Some(&"css_selector"));
        assert_eq!(names.last(), Some(&"xpath"));
        let role = names.iter().position(|n| *n == "role_exact").unwrap();
        let attr = names.iter().position(|n| *n == "attribute_exact").unwrap();
        assert!(role < attr);
    }
}
