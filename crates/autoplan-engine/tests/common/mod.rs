#![allow(dead_code)]

//! Scripted in-memory driver for engine integration tests.

use async_trait::async_trait;
use autoplan_engine::backend::{
    Backend, BackendError, BoundingBox, ClickMode, Driver, ElementHandle, Locator,
    NameMatch, NavigationResult, SessionOptions,
};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone, Default)]
pub struct FakeElement {
    pub tag: String,
    pub attrs: BTreeMap<String, String>,
    /// Own text, excluding children.
    pub text: String,
    pub parent: Option<usize>,
    pub visible: bool,
    pub enabled: bool,
    pub detached: bool,
    pub value: String,
    pub checked: bool,
    /// Element is removed from the page after this many real clicks.
    pub detach_after_clicks: Option<u32>,
    /// Element made visible when this one is clicked.
    pub reveals: Option<usize>,
    /// Element is missing from the page while element `.0` holds value `.1`.
    pub absent_while: Option<(usize, String)>,
    /// Click modes that fail on this element.
    pub rejected_modes: Vec<ClickMode>,
    pub clicks: u32,
}

#[derive(Debug, Default)]
pub struct FakeState {
    pub elements: Vec<FakeElement>,
    pub url: String,
    pub navigations: Vec<String>,
    /// After this many navigations every further one lands on the given URL.
    pub redirect_after: Option<(usize, String)>,
    pub click_log: Vec<(usize, ClickMode)>,
    pub typed: BTreeMap<usize, String>,
    pub dialog_handlers: usize,
    pub permissions: Vec<String>,
    pub launches: usize,
    pub closed: bool,
}

#[derive(Clone, Default)]
pub struct FakePage {
    state: Arc<Mutex<FakeState>>,
}

impl FakePage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    /// Append an element and return its index.
    pub fn add(&self, parent: Option<usize>, tag: &str, attrs: &[(&str, &str)], text: &str) -> usize {
        let mut state = self.state();
        state.elements.push(FakeElement {
            tag: tag.to_string(),
            attrs: attrs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            text: text.to_string(),
            parent,
            visible: true,
            enabled: true,
            ..FakeElement::default()
        });
        state.elements.len() - 1
    }

    pub fn update(&self, index: usize, f: impl FnOnce(&mut FakeElement)) {
        f(&mut self.state().elements[index]);
    }

    pub fn value_of(&self, index: usize) -> String {
        self.state().elements[index].value.clone()
    }

    pub fn is_checked(&self, index: usize) -> bool {
        self.state().elements[index].checked
    }

    /// Real (non-trial) clicks performed on `index`.
    pub fn clicks_on(&self, index: usize) -> Vec<ClickMode> {
        self.state()
            .click_log
            .iter()
            .filter(|(i, m)| *i == index && *m != ClickMode::Trial)
            .map(|(_, m)| *m)
            .collect()
    }

    pub fn real_clicks(&self) -> usize {
        self.state()
            .click_log
            .iter()
            .filter(|(_, m)| *m != ClickMode::Trial)
            .count()
    }

    pub fn driver(&self) -> Arc<FakeDriver> {
        Arc::new(FakeDriver {
            page: self.clone(),
            fail_launch: false,
        })
    }

    pub fn failing_driver(&self) -> Arc<FakeDriver> {
        Arc::new(FakeDriver {
            page: self.clone(),
            fail_launch: true,
        })
    }
}

/// A form page: `form > label[for] + input` per field and a button per entry in `buttons`.
pub fn form_page(fields: &[(&str, &str)], buttons: &[&str]) -> (FakePage, Vec<usize>) {
    let page = FakePage::new();
    let form = page.add(None, "form", &[("id", "main")], "");
    let mut ids = Vec::new();
    for (id, label) in fields {
        page.add(Some(form), "label", &[("for", id)], label);
        ids.push(page.add(Some(form), "input", &[("id", id), ("name", id), ("type", "text")], ""));
    }
    for text in buttons {
        ids.push(page.add(Some(form), "button", &[("type", "button")], text));
    }
    (page, ids)
}

pub struct FakeDriver {
    page: FakePage,
    fail_launch: bool,
}

#[async_trait]
impl Driver for FakeDriver {
    async fn launch_session(
        &self,
        _options: &SessionOptions,
    ) -> Result<Box<dyn Backend>, BackendError> {
        self.page.state().launches += 1;
        if self.fail_launch {
            return Err(BackendError::Launch("no browser in test".into()));
        }
        Ok(Box::new(FakeBackend {
            page: self.page.clone(),
        }))
    }
}

pub struct FakeBackend {
    page: FakePage,
}

impl FakeBackend {
    fn element<'s>(
        state: &'s FakeState,
        handle: ElementHandle,
    ) -> Result<&'s FakeElement, BackendError> {
        state
            .elements
            .get(handle.0 as usize)
            .filter(|_| is_live(state, handle.0 as usize))
            .ok_or(BackendError::ElementStale { id: handle.0 })
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn navigate(&mut self, url: &str) -> Result<NavigationResult, BackendError> {
        let mut state = self.page.state();
        state.navigations.push(url.to_string());
        let landed = match &state.redirect_after {
            Some((after, to)) if state.navigations.len() > *after => to.clone(),
            _ => url.to_string(),
        };
        state.url = landed.clone();
        Ok(NavigationResult {
            url: landed,
            title: "Fake".into(),
            status: 200,
        })
    }

    async fn current_url(&mut self) -> Result<String, BackendError> {
        Ok(self.page.state().url.clone())
    }

    async fn close(&mut self) -> Result<(), BackendError> {
        self.page.state().closed = true;
        Ok(())
    }

    async fn screenshot(&mut self) -> Result<Vec<u8>, BackendError> {
        Ok(b"\x89PNG fake".to_vec())
    }

    async fn query(&mut self, locator: &Locator) -> Result<Vec<ElementHandle>, BackendError> {
        let state = self.page.state();
        let live = live_indices(&state);
        let found = match locator {
            Locator::Css(selector) => {
                let list = parse_selector_list(selector)?;
                live.filter(|&i| list.iter().any(|c| matches_complex(&state, i, c)))
                    .collect::<Vec<_>>()
            }
            Locator::Role { role, name } => live
                .filter(|&i| implicit_role(&state.elements[i]).as_deref() == Some(role.as_str()))
                .filter(|&i| name_matches(name, &accessible_name(&state, i)))
                .collect(),
            Locator::Text(name) => live
                .filter(|&i| {
                    let own = state.elements[i].text.trim();
                    !own.is_empty() && name_matches(name, own)
                })
                .collect(),
            Locator::XPath(_) => Vec::new(),
        };
        Ok(found.into_iter().map(|i| ElementHandle(i as u32)).collect())
    }

    async fn query_within(
        &mut self,
        root: ElementHandle,
        selector: &str,
    ) -> Result<Vec<ElementHandle>, BackendError> {
        let state = self.page.state();
        Self::element(&state, root)?;
        let list = parse_selector_list(selector)?;
        Ok(live_indices(&state)
            .filter(|&i| is_descendant(&state, i, root.0 as usize))
            .filter(|&i| list.iter().any(|c| matches_complex(&state, i, c)))
            .map(|i| ElementHandle(i as u32))
            .collect())
    }

    async fn closest(
        &mut self,
        element: ElementHandle,
        selector: &str,
    ) -> Result<Option<ElementHandle>, BackendError> {
        let state = self.page.state();
        Self::element(&state, element)?;
        let list = parse_selector_list(selector)?;
        let mut current = Some(element.0 as usize);
        while let Some(i) = current {
            if list.iter().any(|c| matches_complex(&state, i, c)) {
                return Ok(Some(ElementHandle(i as u32)));
            }
            current = state.elements[i].parent;
        }
        Ok(None)
    }

    async fn parent(
        &mut self,
        element: ElementHandle,
    ) -> Result<Option<ElementHandle>, BackendError> {
        let state = self.page.state();
        let el = Self::element(&state, element)?;
        Ok(el.parent.map(|p| ElementHandle(p as u32)))
    }

    async fn text_content(&mut self, element: ElementHandle) -> Result<String, BackendError> {
        let state = self.page.state();
        Self::element(&state, element)?;
        Ok(text_content(&state, element.0 as usize))
    }

    async fn attribute(
        &mut self,
        element: ElementHandle,
        name: &str,
    ) -> Result<Option<String>, BackendError> {
        let state = self.page.state();
        Ok(Self::element(&state, element)?.attrs.get(name).cloned())
    }

    async fn is_attached(&mut self, element: ElementHandle) -> Result<bool, BackendError> {
        let state = self.page.state();
        let index = element.0 as usize;
        Ok(index < state.elements.len() && is_live(&state, index))
    }

    async fn is_visible(&mut self, element: ElementHandle) -> Result<bool, BackendError> {
        let state = self.page.state();
        Self::element(&state, element)?;
        Ok(is_rendered(&state, element.0 as usize))
    }

    async fn is_enabled(&mut self, element: ElementHandle) -> Result<bool, BackendError> {
        let state = self.page.state();
        Ok(Self::element(&state, element)?.enabled)
    }

    async fn bounding_box(
        &mut self,
        element: ElementHandle,
    ) -> Result<Option<BoundingBox>, BackendError> {
        let state = self.page.state();
        Self::element(&state, element)?;
        Ok(is_rendered(&state, element.0 as usize).then_some(BoundingBox {
            x: 10.0,
            y: 10.0 + element.0 as f64 * 30.0,
            width: 120.0,
            height: 24.0,
        }))
    }

    async fn scroll_into_view(&mut self, element: ElementHandle) -> Result<(), BackendError> {
        let state = self.page.state();
        Self::element(&state, element)?;
        Ok(())
    }

    async fn click(&mut self, element: ElementHandle, mode: ClickMode) -> Result<(), BackendError> {
        let mut state = self.page.state();
        let index = element.0 as usize;
        let el = Self::element(&state, element)?;
        if !el.enabled && mode != ClickMode::Dispatch {
            return Err(BackendError::NotInteractable {
                id: element.0,
                reason: "disabled".into(),
            });
        }
        if el.rejected_modes.contains(&mode) {
            return Err(BackendError::NotInteractable {
                id: element.0,
                reason: format!("{:?} click intercepted", mode),
            });
        }
        if mode == ClickMode::Trial && !is_rendered(&state, index) {
            return Err(BackendError::NotInteractable {
                id: element.0,
                reason: "not visible".into(),
            });
        }

        state.click_log.push((index, mode));
        if mode == ClickMode::Trial {
            return Ok(());
        }

        let el = &mut state.elements[index];
        el.clicks += 1;
        if el.tag == "input"
            && matches!(
                el.attrs.get("type").map(String::as_str),
                Some("checkbox") | Some("radio")
            )
        {
            el.checked = !el.checked;
        }
        if el.detach_after_clicks.is_some_and(|n| el.clicks >= n) {
            el.detached = true;
        }
        if let Some(target) = el.reveals
            && let Some(revealed) = state.elements.get_mut(target)
        {
            revealed.visible = true;
        }
        Ok(())
    }

    async fn check(&mut self, element: ElementHandle, checked: bool) -> Result<(), BackendError> {
        let mut state = self.page.state();
        Self::element(&state, element)?;
        state.elements[element.0 as usize].checked = checked;
        Ok(())
    }

    async fn select_option(
        &mut self,
        element: ElementHandle,
        value: &str,
    ) -> Result<(), BackendError> {
        let mut state = self.page.state();
        Self::element(&state, element)?;
        let index = element.0 as usize;
        let chosen = state
            .elements
            .iter()
            .enumerate()
            .filter(|(i, e)| e.tag == "option" && e.parent == Some(index) && is_live(&state, *i))
            .find(|(_, e)| {
                e.attrs.get("value").map(String::as_str) == Some(value) || e.text.trim() == value
            })
            .map(|(_, e)| e.attrs.get("value").cloned().unwrap_or_else(|| e.text.clone()))
            .ok_or_else(|| BackendError::OptionNotFound {
                value: value.to_string(),
            })?;
        state.elements[index].value = chosen;
        Ok(())
    }

    async fn clear(&mut self, element: ElementHandle) -> Result<(), BackendError> {
        let mut state = self.page.state();
        Self::element(&state, element)?;
        state.elements[element.0 as usize].value.clear();
        state.typed.remove(&(element.0 as usize));
        Ok(())
    }

    async fn focus(&mut self, element: ElementHandle) -> Result<(), BackendError> {
        let state = self.page.state();
        Self::element(&state, element)?;
        Ok(())
    }

    async fn type_char(&mut self, element: ElementHandle, ch: char) -> Result<(), BackendError> {
        let mut state = self.page.state();
        Self::element(&state, element)?;
        let index = element.0 as usize;
        state.elements[index].value.push(ch);
        state.typed.entry(index).or_default().push(ch);
        Ok(())
    }

    async fn fill(&mut self, element: ElementHandle, value: &str) -> Result<(), BackendError> {
        let mut state = self.page.state();
        Self::element(&state, element)?;
        state.elements[element.0 as usize].value = value.to_string();
        Ok(())
    }

    async fn accept_dialogs(&mut self) -> Result<(), BackendError> {
        self.page.state().dialog_handlers += 1;
        Ok(())
    }

    async fn grant_permissions(&mut self, permissions: &[String]) -> Result<(), BackendError> {
        self.page.state().permissions.extend(permissions.iter().cloned());
        Ok(())
    }
}

fn is_live(state: &FakeState, index: usize) -> bool {
    let el = &state.elements[index];
    !el.detached
        && el
            .absent_while
            .as_ref()
            .is_none_or(|(other, value)| state.elements[*other].value != *value)
}

fn live_indices(state: &FakeState) -> impl Iterator<Item = usize> + '_ {
    (0..state.elements.len()).filter(|&i| is_live(state, i))
}

fn is_rendered(state: &FakeState, index: usize) -> bool {
    let mut current = Some(index);
    while let Some(i) = current {
        let el = &state.elements[i];
        if !is_live(state, i) || !el.visible {
            return false;
        }
        current = el.parent;
    }
    true
}

fn is_descendant(state: &FakeState, index: usize, root: usize) -> bool {
    let mut current = state.elements[index].parent;
    while let Some(i) = current {
        if i == root {
            return true;
        }
        current = state.elements[i].parent;
    }
    false
}

fn text_content(state: &FakeState, index: usize) -> String {
    let mut text = state.elements[index].text.clone();
    for (i, el) in state.elements.iter().enumerate() {
        if el.parent == Some(index) && is_live(state, i) {
            text.push_str(&text_content(state, i));
        }
    }
    text
}

fn implicit_role(el: &FakeElement) -> Option<String> {
    if let Some(role) = el.attrs.get("role") {
        return Some(role.clone());
    }
    let input_type = el.attrs.get("type").map(String::as_str).unwrap_or("text");
    let role = match el.tag.as_str() {
        "button" => "button",
        "a" => "link",
        "textarea" => "textbox",
        "select" => "combobox",
        "input" => match input_type {
            "submit" | "button" | "reset" => "button",
            "checkbox" => "checkbox",
            "radio" => "radio",
            "number" => "spinbutton",
            "hidden" => return None,
            _ => "textbox",
        },
        _ => return None,
    };
    Some(role.to_string())
}

fn accessible_name(state: &FakeState, index: usize) -> String {
    let el = &state.elements[index];
    if let Some(label) = el.attrs.get("aria-label") {
        return label.trim().to_string();
    }
    if let Some(id) = el.attrs.get("id") {
        let labelled = state.elements.iter().enumerate().find(|(i, e)| {
            e.tag == "label" && is_live(state, *i) && e.attrs.get("for") == Some(id)
        });
        if let Some((i, _)) = labelled {
            return text_content(state, i).trim().to_string();
        }
    }
    let text = text_content(state, index);
    if !text.trim().is_empty() {
        return text.split_whitespace().collect::<Vec<_>>().join(" ");
    }
    el.attrs
        .get("title")
        .or_else(|| el.attrs.get("placeholder"))
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}

fn name_matches(name: &NameMatch, candidate: &str) -> bool {
    let candidate = candidate.trim();
    match name {
        NameMatch::Exact(v) => candidate == v,
        NameMatch::Pattern(p) => Regex::new(p).is_ok_and(|re| re.is_match(candidate)),
        NameMatch::Contains(v) => candidate.to_lowercase().contains(&v.to_lowercase()),
    }
}

#[derive(Debug, Clone)]
enum AttrOp {
    Present,
    Equals(String),
    Contains(String),
}

#[derive(Debug, Clone, Default)]
struct Compound {
    tag: Option<String>,
    ids: Vec<String>,
    classes: Vec<String>,
    attrs: Vec<(String, AttrOp)>,
}

/// Descendant chain, outermost first.
type Complex = Vec<Compound>;

fn parse_selector_list(selector: &str) -> Result<Vec<Complex>, BackendError> {
    let invalid = || BackendError::SelectorInvalid {
        selector: selector.to_string(),
    };
    let chars: Vec<char> = selector.chars().collect();
    let mut pos = 0;
    let mut list = Vec::new();
    let mut complex: Complex = Vec::new();
    let mut compound = Compound::default();
    let mut in_compound = false;

    let ident = |chars: &[char], pos: &mut usize| -> String {
        let start = *pos;
        while *pos < chars.len()
            && (chars[*pos].is_alphanumeric() || chars[*pos] == '-' || chars[*pos] == '_')
        {
            *pos += 1;
        }
        chars[start..*pos].iter().collect()
    };

    while pos < chars.len() {
        let c = chars[pos];
        match c {
            ' ' | '\t' | '\n' => {
                if in_compound {
                    complex.push(std::mem::take(&mut compound));
                    in_compound = false;
                }
                pos += 1;
            }
            ',' => {
                if in_compound {
                    complex.push(std::mem::take(&mut compound));
                    in_compound = false;
                }
                if complex.is_empty() {
                    return Err(invalid());
                }
                list.push(std::mem::take(&mut complex));
                pos += 1;
            }
            '*' => {
                in_compound = true;
                pos += 1;
            }
            '#' | '.' => {
                pos += 1;
                let name = ident(&chars, &mut pos);
                if name.is_empty() {
                    return Err(invalid());
                }
                if c == '#' {
                    compound.ids.push(name);
                } else {
                    compound.classes.push(name);
                }
                in_compound = true;
            }
            '[' => {
                pos += 1;
                let name = ident(&chars, &mut pos);
                if name.is_empty() {
                    return Err(invalid());
                }
                let op = match chars.get(pos) {
                    Some(']') => None,
                    Some('=') => {
                        pos += 1;
                        Some(false)
                    }
                    Some('*') if chars.get(pos + 1) == Some(&'=') => {
                        pos += 2;
                        Some(true)
                    }
                    _ => return Err(invalid()),
                };
                let attr = match op {
                    None => AttrOp::Present,
                    Some(contains) => {
                        let value = match chars.get(pos) {
                            Some(&q) if q == '"' || q == '\'' => {
                                pos += 1;
                                let mut value = String::new();
                                loop {
                                    match chars.get(pos) {
                                        Some('\\') => {
                                            value.push(*chars.get(pos + 1).ok_or_else(invalid)?);
                                            pos += 2;
                                        }
                                        Some(&ch) if ch == q => {
                                            pos += 1;
                                            break;
                                        }
                                        Some(&ch) => {
                                            value.push(ch);
                                            pos += 1;
                                        }
                                        None => return Err(invalid()),
                                    }
                                }
                                value
                            }
                            _ => ident(&chars, &mut pos),
                        };
                        if contains {
                            AttrOp::Contains(value)
                        } else {
                            AttrOp::Equals(value)
                        }
                    }
                };
                if chars.get(pos) != Some(&']') {
                    return Err(invalid());
                }
                pos += 1;
                compound.attrs.push((name, attr));
                in_compound = true;
            }
            c if c.is_alphabetic() => {
                if in_compound {
                    return Err(invalid());
                }
                compound.tag = Some(ident(&chars, &mut pos).to_lowercase());
                in_compound = true;
            }
            _ => return Err(invalid()),
        }
    }

    if in_compound {
        complex.push(compound);
    }
    if complex.is_empty() {
        return Err(invalid());
    }
    list.push(complex);
    Ok(list)
}

fn matches_compound(el: &FakeElement, compound: &Compound) -> bool {
    if let Some(tag) = &compound.tag
        && el.tag != *tag
    {
        return false;
    }
    if !compound
        .ids
        .iter()
        .all(|id| el.attrs.get("id") == Some(id))
    {
        return false;
    }
    let classes: Vec<&str> = el
        .attrs
        .get("class")
        .map(|c| c.split_whitespace().collect())
        .unwrap_or_default();
    if !compound.classes.iter().all(|c| classes.contains(&c.as_str())) {
        return false;
    }
    compound.attrs.iter().all(|(name, op)| match (el.attrs.get(name), op) {
        (Some(_), AttrOp::Present) => true,
        (Some(v), AttrOp::Equals(want)) => v == want,
        (Some(v), AttrOp::Contains(want)) => !want.is_empty() && v.contains(want.as_str()),
        (None, _) => false,
    })
}

fn matches_complex(state: &FakeState, index: usize, complex: &[Compound]) -> bool {
    let Some((last, rest)) = complex.split_last() else {
        return false;
    };
    if !matches_compound(&state.elements[index], last) {
        return false;
    }
    if rest.is_empty() {
        return true;
    }
    let mut ancestor = state.elements[index].parent;
    while let Some(i) = ancestor {
        if matches_complex(state, i, rest) {
            return true;
        }
        ancestor = state.elements[i].parent;
    }
    false
}
