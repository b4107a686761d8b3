//! Automation Plan document model.
//!
//! The JSON shape is produced by the plan builder and consumed verbatim after
//! [`crate::normalizer::normalize`] has filled in defaults. Field names follow
//! the builder's camelCase convention.

use crate::error::PlanError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// One data row: column name to cell value.
pub type DataRow = serde_json::Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomationPlan {
    pub target: TargetConfig,
    pub data_source: DataSource,
    #[serde(default)]
    pub field_mappings: Vec<FieldMapping>,
    #[serde(default)]
    pub actions: Vec<Action>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success_indicator: Option<Indicator>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_indicator: Option<Indicator>,
    #[serde(default)]
    pub execution: ExecutionConfig,
}

impl AutomationPlan {
    pub fn field_mapping(&self, name: &str) -> Option<&FieldMapping> {
        self.field_mappings.iter().find(|m| m.name == name)
    }

    pub fn row(&self, index: usize) -> Option<&DataRow> {
        self.data_source.rows.get(index)
    }

    /// Whether any action or navigation step asks for dialog handling.
    pub fn has_dialog_actions(&self) -> bool {
        self.actions
            .iter()
            .chain(self.target.navigation_steps.iter())
            .any(|a| matches!(a.kind, ActionKind::HandleDialog { .. }))
    }

    /// Fill targets whose mapping has no label text to search for.
    pub fn unlocatable_fields(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .actions
            .iter()
            .chain(self.target.navigation_steps.iter())
            .filter_map(|a| match &a.kind {
                ActionKind::Fill { field, .. } => self.field_mapping(field),
                _ => None,
            })
            .filter(|m| !m.is_resolvable())
            .map(|m| m.name.as_str())
            .collect();
        names.dedup();
        names
    }

    pub fn is_loop(&self) -> bool {
        self.data_source.mode == RowMode::Single && self.execution.mode == ExecutionMode::Loop
    }

    /// Checks the invariants a normalized plan must hold before a session is opened.
    pub fn validate(&self) -> Result<(), PlanError> {
        if self.target.url.trim().is_empty() {
            return Err(PlanError::MissingField("target.url".into()));
        }
        if self.target.page_ready_indicator.value.trim().is_empty() {
            return Err(PlanError::MissingField(
                "target.pageReadyIndicator.value".into(),
            ));
        }
        if self.data_source.rows.is_empty() {
            return Err(PlanError::Invalid("dataSource.rows must not be empty".into()));
        }
        if self.is_loop() {
            let has_indicator = self
                .execution
                .loop_config
                .as_ref()
                .and_then(|l| l.indicator.as_ref())
                .is_some();
            if !has_indicator {
                return Err(PlanError::MissingField("execution.loop.indicator".into()));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetConfig {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub login: Option<LoginConfig>,
    /// Steps replayed after login and before the target page is opened.
    #[serde(default)]
    pub navigation_steps: Vec<Action>,
    pub page_ready_indicator: Indicator,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginConfig {
    /// Login page; the target URL is used when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub username: String,
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username_selector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_selector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submit_selector: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowMode {
    #[default]
    Single,
    Batch,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSource {
    #[serde(rename = "type", default = "default_source_type")]
    pub source_type: String,
    pub rows: Vec<DataRow>,
    #[serde(default)]
    pub mode: RowMode,
    #[serde(default)]
    pub selected_row_index: usize,
}

impl Default for DataSource {
    fn default() -> Self {
        Self {
            source_type: default_source_type(),
            rows: vec![DataRow::new()],
            mode: RowMode::Single,
            selected_row_index: 0,
        }
    }
}

fn default_source_type() -> String {
    "manual".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    #[default]
    Text,
    Select,
    Checkbox,
    Radio,
    Textarea,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldMapping {
    pub name: String,
    #[serde(rename = "type", default)]
    pub field_type: FieldType,
    #[serde(default)]
    pub data_key: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub fallback_labels: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditional: Option<Conditional>,
}

impl FieldMapping {
    /// A mapping with no label text at all can never be located on the page.
    pub fn is_resolvable(&self) -> bool {
        self.labels
            .iter()
            .chain(self.fallback_labels.iter())
            .any(|l| !l.trim().is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConditionKind {
    DataExists,
    ElementExists,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conditional {
    #[serde(rename = "type")]
    pub kind: ConditionKind,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndicatorKind {
    Selector,
    Text,
    Url,
}

/// A predicate over page state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Indicator {
    #[serde(rename = "type")]
    pub kind: IndicatorKind,
    pub value: String,
}

impl Indicator {
    pub fn selector(value: impl Into<String>) -> Self {
        Self {
            kind: IndicatorKind::Selector,
            value: value.into(),
        }
    }

    pub fn text(value: impl Into<String>) -> Self {
        Self {
            kind: IndicatorKind::Text,
            value: value.into(),
        }
    }

    pub fn url(value: impl Into<String>) -> Self {
        Self {
            kind: IndicatorKind::Url,
            value: value.into(),
        }
    }
}

impl fmt::Display for Indicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            IndicatorKind::Selector => "selector",
            IndicatorKind::Text => "text",
            IndicatorKind::Url => "url",
        };
        write!(f, "{} '{}'", kind, self.value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    #[default]
    Once,
    Loop,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionConfig {
    #[serde(default)]
    pub mode: ExecutionMode,
    #[serde(rename = "loop", default, skip_serializing_if = "Option::is_none")]
    pub loop_config: Option<LoopConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StopWhen {
    #[default]
    Visible,
    NotVisible,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoopConfig {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    #[serde(default = "default_delay_seconds")]
    pub delay_seconds: f64,
    #[serde(default)]
    pub stop_when: StopWhen,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indicator: Option<Indicator>,
}

fn default_max_iterations() -> u32 {
    10
}

fn default_delay_seconds() -> f64 {
    1.0
}

/// A single step of the action flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawAction", into = "RawAction")]
pub struct Action {
    pub kind: ActionKind,
    /// Indicator awaited after the action succeeds.
    pub wait_for: Option<Indicator>,
    /// A failed required action aborts the row.
    pub required: bool,
}

impl Action {
    pub fn new(kind: ActionKind) -> Self {
        Self {
            kind,
            wait_for: None,
            required: true,
        }
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn with_wait_for(mut self, indicator: Indicator) -> Self {
        self.wait_for = Some(indicator);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ActionKind {
    /// Fill the field mapping named `field`. `value` overrides the row value.
    Fill { field: String, value: Option<String> },
    Click { target: String },
    Wait { seconds: f64 },
    HandleDialog { target: Option<String> },
    /// Go to `url`, or back to the plan's target URL when `None`.
    Navigate { url: Option<String> },
}

impl ActionKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            ActionKind::Fill { .. } => "fill",
            ActionKind::Click { .. } => "click",
            ActionKind::Wait { .. } => "wait",
            ActionKind::HandleDialog { .. } => "handleDialog",
            ActionKind::Navigate { .. } => "navigate",
        }
    }

    pub fn target(&self) -> Option<&str> {
        match self {
            ActionKind::Fill { field, .. } => Some(field),
            ActionKind::Click { target } => Some(target),
            ActionKind::Wait { .. } => None,
            ActionKind::HandleDialog { target } => target.as_deref(),
            ActionKind::Navigate { url } => url.as_deref(),
        }
    }
}

/// Wire form of [`Action`]: the builder's flat `{type, target, value, ...}` record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAction {
    #[serde(rename = "type")]
    action_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    wait_for: Option<Indicator>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    required: Option<bool>,
}

impl TryFrom<RawAction> for Action {
    type Error = PlanError;

    fn try_from(raw: RawAction) -> Result<Self, Self::Error> {
        let target = raw.target.filter(|t| !t.trim().is_empty());
        let value = raw.value.as_ref().and_then(cell_to_string);

        let kind = match raw.action_type.as_str() {
            "fill" => ActionKind::Fill {
                field: target.unwrap_or_default(),
                value,
            },
            "click" => ActionKind::Click {
                target: target.unwrap_or_default(),
            },
            "wait" => ActionKind::Wait {
                seconds: value
                    .as_deref()
                    .and_then(|v| v.trim().parse::<f64>().ok())
                    .filter(|s| s.is_finite())
                    .map(|s| s.max(0.0))
                    .unwrap_or(1.0),
            },
            "handleDialog" => ActionKind::HandleDialog { target },
            "navigate" => ActionKind::Navigate { url: target },
            other => return Err(PlanError::UnknownAction(other.to_string())),
        };

        Ok(Action {
            kind,
            wait_for: raw.wait_for,
            required: raw.required.unwrap_or(true),
        })
    }
}

impl From<Action> for RawAction {
    fn from(action: Action) -> Self {
        let action_type = action.kind.type_name().to_string();
        let (target, value) = match action.kind {
            ActionKind::Fill { field, value } => (Some(field), value.map(Value::String)),
            ActionKind::Click { target } => (Some(target), None),
            ActionKind::Wait { seconds } => {
                let value = serde_json::Number::from_f64(seconds).map(Value::Number);
                (None, value)
            }
            ActionKind::HandleDialog { target } => (target, None),
            ActionKind::Navigate { url } => (url, None),
        };
        RawAction {
            action_type,
            target,
            value,
            wait_for: action.wait_for,
            required: (!action.required).then_some(false),
        }
    }
}

/// Renders a data cell as the text typed into a form. `null` has no text.
pub fn cell_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

/// Truthiness used for checkbox and radio values.
pub fn is_truthy(value: &str) -> bool {
    let normalized = value.trim().to_ascii_lowercase();
    !matches!(
        normalized.as_str(),
        "" | "0" | "false" | "no" | "off" | "n" | "unchecked"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_action_wire_format() {
        let action: Action = serde_json::from_value(json!({
            "type": "fill",
            "target": "Email",
            "waitFor": {"type": "selector", "value": "#ok"}
        }))
        .unwrap();
        assert_eq!(
            action.kind,
            ActionKind::Fill {
                field: "Email".into(),
                value: None
            }
        );
        assert!(action.required);
        assert_eq!(action.wait_for, Some(Indicator::selector("#ok")));

        let back = serde_json::to_value(&action).unwrap();
        assert_eq!(back["type"], "fill");
        assert_eq!(back["target"], "Email");
        assert!(back.get("required").is_none());
    }

    #[test]
    fn test_wait_value_accepts_numbers_and_strings() {
        let a: Action = serde_json::from_value(json!({"type": "wait", "value": 2.5})).unwrap();
        assert_eq!(a.kind, ActionKind::Wait { seconds: 2.5 });

        let b: Action = serde_json::from_value(json!({"type": "wait", "value": "3"})).unwrap();
        assert_eq!(b.kind, ActionKind::Wait { seconds: 3.0 });

        let c: Action = serde_json::from_value(json!({"type": "wait"})).unwrap();
        assert_eq!(c.kind, ActionKind::Wait { seconds: 1.0 });
    }

    #[test]
    fn test_unknown_action_type_is_rejected() {
        let err = serde_json::from_value::<Action>(json!({"type": "hover", "target": "x"}))
            .unwrap_err();
        assert!(err.to_string().contains("hover"));
    }

    #[test]
    fn test_optional_action_round_trips_required_flag() {
        let a: Action = serde_json::from_value(
            json!({"type": "click", "target": "Next", "required": false}),
        )
        .unwrap();
        assert!(!a.required);
        assert_eq!(serde_json::to_value(&a).unwrap()["required"], false);
    }

    #[test]
    fn test_truthiness() {
        assert!(is_truthy("yes"));
        assert!(is_truthy("true"));
        assert!(is_truthy("1"));
        assert!(!is_truthy("false"));
        assert!(!is_truthy(" 0 "));
        assert!(!is_truthy(""));
    }

    #[test]
    fn test_mapping_resolvability() {
        let mut mapping = FieldMapping {
            name: "email".into(),
            field_type: FieldType::Text,
            data_key: "email".into(),
            required: true,
            labels: vec![],
            fallback_labels: vec!["  ".into()],
            conditional: None,
        };
        assert!(!mapping.is_resolvable());
        mapping.fallback_labels.push("E-mail".into());
        assert!(mapping.is_resolvable());
    }
}
