use crate::failure::FailureMetadata;
use crate::plan::{DataRow, cell_to_string};
use crate::report::{ExecutionReport, RowExecutionResult};

/// Default sensitive column names that should be masked in output.
const DEFAULT_SENSITIVE_FIELDS: &[&str] = &[
    "password",
    "secret",
    "token",
    "key",
    "cvv",
    "ssn",
    "card_number",
    "credit_card",
];

/// Human-readable run summary. `sensitive_fields` extends the built-in list
/// of masked columns.
pub fn format_report(report: &ExecutionReport, sensitive_fields: &[String]) -> String {
    let mut output = format!(
        "Execution {:?}: {} row(s) in {}ms{}\n",
        report.status,
        report.summary.total,
        report.duration,
        if report.safe_run { " [safe run]" } else { "" }
    )
    .to_lowercase();

    output.push_str(&format!(
        "  success={} failed={} partial={}\n",
        report.summary.success, report.summary.failed, report.summary.partial
    ));

    if let Some(err) = &report.error {
        output.push_str(&format!("  error: {}\n", err));
    }

    for row in &report.results {
        output.push_str(&format_row(row, sensitive_fields));
    }

    output
}

pub fn format_row(row: &RowExecutionResult, sensitive_fields: &[String]) -> String {
    let executed = row.actions.iter().filter(|a| !a.skipped).count();
    let skipped = row.actions.len() - executed;

    let mut output = format!(
        "[row {}] {:?} ({} action(s), {} skipped, {}ms)",
        row.row_index, row.status, executed, skipped, row.duration
    );

    let data = format_row_data(&row.data, sensitive_fields);
    if !data.is_empty() {
        output.push_str(&format!(" {{{}}}", data));
    }
    output.push('\n');

    for warning in &row.warnings {
        output.push_str(&format!("    warning: {}\n", warning));
    }

    if let Some(err) = &row.error {
        output.push_str(&format!("    error: {}\n", err));
    }

    if let Some(meta) = &row.failure_metadata {
        output.push_str(&format_failure(meta));
    }

    output
}

pub fn format_failure(meta: &FailureMetadata) -> String {
    let mut output = format!(
        "    {} ({}, confidence {:.2}): {}\n",
        meta.classification.category,
        meta.classification.severity,
        meta.classification.confidence,
        meta.classification.reason
    );
    for (i, step) in meta.remediation.steps.iter().enumerate() {
        output.push_str(&format!("      {}. {}\n", i + 1, step));
    }
    output
}

/// Renders a data row as `key=value` pairs with sensitive columns masked.
pub fn format_row_data(row: &DataRow, sensitive_fields: &[String]) -> String {
    row.iter()
        .map(|(k, v)| {
            let value = cell_to_string(v).unwrap_or_default();
            format!("{}={}", k, mask_sensitive(&value, k, sensitive_fields))
        })
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn mask_sensitive(value: &str, field_name: &str, sensitive_fields: &[String]) -> String {
    let lowered = field_name.to_lowercase();
    let is_sensitive = sensitive_fields
        .iter()
        .any(|f| lowered.contains(&f.to_lowercase()))
        || DEFAULT_SENSITIVE_FIELDS.iter().any(|f| lowered.contains(*f));

    if is_sensitive {
        "••••••••".to_string()
    } else {
        value.to_string()
    }
}
