//! Plan normalization.
//!
//! Turns the raw JSON document handed over by the plan builder into a canonical
//! [`AutomationPlan`]. Only `target.url` and `target.pageReadyIndicator` are
//! mandatory; everything else is defaulted or coerced.

use crate::error::PlanError;
use crate::plan::AutomationPlan;
use serde_json::{Map, Value, json};

const INDICATOR_KINDS: &[&str] = &["selector", "text", "url"];
const ACTION_KINDS: &[&str] = &["fill", "click", "wait", "handleDialog", "navigate"];
const LOGIN_SELECTORS: &[&str] = &["url", "usernameSelector", "passwordSelector", "submitSelector"];

pub fn normalize(raw: &Value) -> Result<AutomationPlan, PlanError> {
    let obj = raw
        .as_object()
        .ok_or_else(|| PlanError::Invalid("plan must be a JSON object".into()))?;

    let target = obj
        .get("target")
        .and_then(Value::as_object)
        .ok_or_else(|| PlanError::MissingField("target.url".into()))?;

    let url = target
        .get("url")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .ok_or_else(|| PlanError::MissingField("target.url".into()))?;

    let page_ready = target
        .get("pageReadyIndicator")
        .and_then(normalize_indicator)
        .ok_or_else(|| PlanError::MissingField("target.pageReadyIndicator".into()))?;

    let mut canonical = obj.clone();

    let mut target = target.clone();
    target.insert("url".into(), Value::String(url.to_string()));
    target.insert("pageReadyIndicator".into(), page_ready);
    let steps = normalize_actions(target.get("navigationSteps"));
    target.insert("navigationSteps".into(), steps);
    match target.get("login").and_then(normalize_login) {
        Some(login) => {
            target.insert("login".into(), login);
        }
        None => {
            target.remove("login");
        }
    }
    canonical.insert("target".into(), Value::Object(target));

    canonical.insert(
        "dataSource".into(),
        normalize_data_source(obj.get("dataSource")),
    );
    canonical.insert(
        "fieldMappings".into(),
        normalize_field_mappings(obj.get("fieldMappings")),
    );
    canonical.insert("actions".into(), normalize_actions(obj.get("actions")));

    for key in ["successIndicator", "failureIndicator"] {
        match obj.get(key).and_then(normalize_indicator) {
            Some(ind) => {
                canonical.insert(key.into(), ind);
            }
            None => {
                canonical.remove(key);
            }
        }
    }

    canonical.insert(
        "execution".into(),
        normalize_execution(obj.get("execution")),
    );

    serde_json::from_value(Value::Object(canonical)).map_err(|e| PlanError::Invalid(e.to_string()))
}

/// Parses and normalizes a plan from JSON text.
pub fn normalize_str(text: &str) -> Result<AutomationPlan, PlanError> {
    let raw: Value = serde_json::from_str(text)
        .map_err(|e| PlanError::Invalid(format!("plan is not valid JSON: {}", e)))?;
    normalize(&raw)
}

fn normalize_indicator(value: &Value) -> Option<Value> {
    let obj = value.as_object()?;
    let kind = obj.get("type").and_then(Value::as_str)?;
    if !INDICATOR_KINDS.contains(&kind) {
        return None;
    }
    let text = obj.get("value").and_then(Value::as_str)?;
    if text.trim().is_empty() {
        return None;
    }
    Some(json!({ "type": kind, "value": text }))
}

/// Login is kept only when both credentials are strings; optional selectors
/// that are not strings are dropped.
fn normalize_login(value: &Value) -> Option<Value> {
    let obj = value.as_object()?;
    obj.get("username").filter(|v| v.is_string())?;
    obj.get("password").filter(|v| v.is_string())?;
    let mut login = obj.clone();
    for key in LOGIN_SELECTORS {
        if login.get(*key).is_some_and(|v| !v.is_string()) {
            login.remove(*key);
        }
    }
    Some(Value::Object(login))
}

/// Keeps action records with a known string `type`; malformed optional
/// properties are removed rather than rejected.
fn normalize_actions(value: Option<&Value>) -> Value {
    let Some(actions) = value.and_then(Value::as_array) else {
        return json!([]);
    };

    let normalized: Vec<Value> = actions
        .iter()
        .filter_map(Value::as_object)
        .filter(|a| {
            a.get("type")
                .and_then(Value::as_str)
                .is_some_and(|t| ACTION_KINDS.contains(&t))
        })
        .map(|a| {
            let mut a = a.clone();
            if a.get("target").is_some_and(|t| !t.is_string()) {
                a.remove("target");
            }
            match a.get("waitFor").and_then(normalize_indicator) {
                Some(ind) => {
                    a.insert("waitFor".into(), ind);
                }
                None => {
                    a.remove("waitFor");
                }
            }
            if a.get("required").is_some_and(|r| !r.is_boolean()) {
                a.remove("required");
            }
            Value::Object(a)
        })
        .collect();

    Value::Array(normalized)
}

fn normalize_data_source(value: Option<&Value>) -> Value {
    let Some(obj) = value.and_then(Value::as_object) else {
        return default_data_source();
    };

    let mut rows: Vec<Value> = obj
        .get("rows")
        .and_then(Value::as_array)
        .map(|rows| {
            rows.iter()
                .map(|r| match r {
                    Value::Object(_) => r.clone(),
                    _ => Value::Object(Map::new()),
                })
                .collect()
        })
        .unwrap_or_default();
    if rows.is_empty() {
        rows.push(Value::Object(Map::new()));
    }

    let mode = match obj.get("mode").and_then(Value::as_str) {
        Some("batch") => "batch",
        _ => "single",
    };

    let selected = obj
        .get("selectedRowIndex")
        .and_then(Value::as_u64)
        .map(|i| i as usize)
        .filter(|i| *i < rows.len())
        .unwrap_or(0);

    let source_type = obj
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or("manual")
        .to_string();

    json!({
        "type": source_type,
        "rows": rows,
        "mode": mode,
        "selectedRowIndex": selected,
    })
}

fn default_data_source() -> Value {
    json!({
        "type": "manual",
        "rows": [{}],
        "mode": "single",
        "selectedRowIndex": 0,
    })
}

fn normalize_field_mappings(value: Option<&Value>) -> Value {
    let Some(mappings) = value.and_then(Value::as_array) else {
        return json!([]);
    };

    let normalized: Vec<Value> = mappings
        .iter()
        .filter_map(Value::as_object)
        .filter(|m| m.get("name").and_then(Value::as_str).is_some())
        .map(|m| {
            let mut m = m.clone();
            let has_key = m
                .get("dataKey")
                .and_then(Value::as_str)
                .is_some_and(|k| !k.is_empty());
            if !has_key && let Some(name) = m.get("name").cloned() {
                m.insert("dataKey".into(), name);
            }
            for key in ["labels", "fallbackLabels"] {
                let labels: Vec<Value> = m
                    .get(key)
                    .and_then(Value::as_array)
                    .map(|ls| {
                        ls.iter()
                            .filter(|l| l.is_string())
                            .cloned()
                            .collect()
                    })
                    .unwrap_or_default();
                m.insert(key.into(), Value::Array(labels));
            }
            if !m.get("required").is_some_and(Value::is_boolean) {
                m.insert("required".into(), Value::Bool(false));
            }
            if !matches!(
                m.get("type").and_then(Value::as_str),
                Some("text" | "select" | "checkbox" | "radio" | "textarea")
            ) {
                m.insert("type".into(), Value::String("text".into()));
            }
            let conditional_ok = m.get("conditional").is_none_or(|c| {
                matches!(
                    c.get("type").and_then(Value::as_str),
                    Some("dataExists" | "elementExists")
                ) && c.get("value").is_some_and(Value::is_string)
            });
            if !conditional_ok {
                m.remove("conditional");
            }
            Value::Object(m)
        })
        .collect();

    Value::Array(normalized)
}

fn normalize_execution(value: Option<&Value>) -> Value {
    let Some(obj) = value.and_then(Value::as_object) else {
        return json!({ "mode": "once" });
    };

    let mode = match obj.get("mode").and_then(Value::as_str) {
        Some("loop") => "loop",
        _ => "once",
    };

    let mut out = Map::new();
    out.insert("mode".into(), Value::String(mode.into()));

    if let Some(l) = obj.get("loop").and_then(Value::as_object) {
        let mut l = l.clone();
        match l.get("indicator").and_then(normalize_indicator) {
            Some(ind) => {
                l.insert("indicator".into(), ind);
            }
            None => {
                l.remove("indicator");
            }
        }
        if !matches!(
            l.get("stopWhen").and_then(Value::as_str),
            Some("visible") | Some("notVisible")
        ) {
            l.insert("stopWhen".into(), Value::String("visible".into()));
        }
        match l.get("maxIterations").and_then(Value::as_u64) {
            Some(max) => {
                let clamped = u32::try_from(max).unwrap_or(u32::MAX);
                l.insert("maxIterations".into(), json!(clamped));
            }
            None => {
                l.remove("maxIterations");
            }
        }
        if !l.get("delaySeconds").is_some_and(Value::is_number) {
            l.remove("delaySeconds");
        }
        out.insert("loop".into(), Value::Object(l));
    }

    Value::Object(out)
}
