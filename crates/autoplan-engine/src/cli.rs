use crate::failure::{FailurePatterns, analyze_failure_patterns};
use crate::orchestrator::Orchestrator;
use autoplan_common::formatter::format_report;
use autoplan_common::normalizer;
use autoplan_common::plan::AutomationPlan;
use autoplan_common::report::ExecutionReport;
use serde_json::Value;
use std::error::Error;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Clone, Copy)]
pub struct OutputHandlers {
    pub out: fn(&str),
    pub err: fn(&str),
}

pub struct RunOptions<'a> {
    pub safe_run: bool,
    /// Where to write the JSON report, if anywhere.
    pub report_path: Option<&'a Path>,
}

/// Read a plan or report document. `.yaml`/`.yml` files are parsed as YAML,
/// everything else as JSON.
pub async fn load_document(path: &Path) -> Result<Value, Box<dyn Error>> {
    let content = tokio::fs::read_to_string(path).await?;
    let is_yaml = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"));

    let value = if is_yaml {
        serde_yaml::from_str(&content)?
    } else {
        serde_json::from_str(&content)?
    };
    Ok(value)
}

pub async fn load_plan(path: &Path) -> Result<AutomationPlan, Box<dyn Error>> {
    let raw = load_document(path).await?;
    Ok(normalizer::normalize(&raw)?)
}

pub async fn run_plan_file(
    orchestrator: &Orchestrator,
    output: OutputHandlers,
    path: &Path,
    options: RunOptions<'_>,
) -> Result<ExecutionReport, Box<dyn Error>> {
    let plan = match load_plan(path).await {
        Ok(plan) => plan,
        Err(e) => {
            (output.err)(&format!("Error loading plan '{}': {}", path.display(), e));
            return Err(e);
        }
    };

    let report = orchestrator.run(&plan, options.safe_run).await?;
    let sensitive = &orchestrator.config().security.sensitive_fields;
    (output.out)(format_report(&report, sensitive).trim_end());

    if let Some(report_path) = options.report_path {
        write_report(&report, report_path).await?;
        (output.err)(&format!("Report written to {}", report_path.display()));
    }
    Ok(report)
}

pub async fn write_report(report: &ExecutionReport, path: &Path) -> Result<(), Box<dyn Error>> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await?;
    }
    let json = serde_json::to_string_pretty(report)?;
    tokio::fs::write(path, json).await?;
    Ok(())
}

/// Normalize a plan file and print the canonical form.
pub async fn validate_plan_file(
    output: OutputHandlers,
    path: &Path,
) -> Result<AutomationPlan, Box<dyn Error>> {
    match load_plan(path).await {
        Ok(plan) => {
            (output.out)(&serde_json::to_string_pretty(&plan)?);
            Ok(plan)
        }
        Err(e) => {
            (output.err)(&format!("{}: {}", path.display(), e));
            Err(e)
        }
    }
}

/// Aggregate failure metadata across saved reports.
pub async fn analyze_report_files(
    output: OutputHandlers,
    paths: &[PathBuf],
) -> Result<FailurePatterns, Box<dyn Error>> {
    if paths.is_empty() {
        return Err(io::Error::other("no report files given").into());
    }

    let mut reports = Vec::with_capacity(paths.len());
    for path in paths {
        let raw = load_document(path).await?;
        let report: ExecutionReport = serde_json::from_value(raw)
            .map_err(|e| io::Error::other(format!("{}: not a report: {}", path.display(), e)))?;
        reports.push(report);
    }

    let patterns = analyze_failure_patterns(reports.iter().flat_map(|r| r.failures()));
    (output.out)(&format_patterns(&patterns));
    Ok(patterns)
}

pub fn format_patterns(patterns: &FailurePatterns) -> String {
    let mut out = format!("{} failure(s)", patterns.total);
    if let Some(category) = patterns.most_common {
        out.push_str(&format!(", most common: {}", category));
    }
    out.push('\n');
    for (category, count) in &patterns.by_category {
        out.push_str(&format!("  {:<18} {}\n", category.to_string(), count));
    }
    for rec in &patterns.recommendations {
        out.push_str(&format!("- {}\n", rec));
    }
    out.trim_end().to_string()
}
