use super::remediation::remediation_for;
use crate::error::EngineError;
use autoplan_common::failure::{
    Classification, ErrorInfo, FailureCategory, FailureContext, FailureMetadata, Severity,
};

struct Rule {
    keywords: &'static [&'static str],
    classify: fn(&str, &FailureContext) -> (FailureCategory, &'static str),
    severity: Severity,
    confidence: f32,
}

fn locate_failure(_msg: &str, ctx: &FailureContext) -> (FailureCategory, &'static str) {
    if ctx.field_name.is_some() {
        (
            FailureCategory::LabelChange,
            "The field could not be located; its label text has probably changed",
        )
    } else {
        (
            FailureCategory::SelectorChange,
            "The element could not be located; the page structure has probably changed",
        )
    }
}

fn wait_failure(msg: &str, _ctx: &FailureContext) -> (FailureCategory, &'static str) {
    if msg.contains("page") || msg.contains("load") {
        (
            FailureCategory::PageLoading,
            "The page did not finish loading in time",
        )
    } else {
        (
            FailureCategory::TimingIssue,
            "An expected state did not appear in time",
        )
    }
}

fn session_failure(_msg: &str, _ctx: &FailureContext) -> (FailureCategory, &'static str) {
    (
        FailureCategory::SessionExpired,
        "The session is no longer authenticated",
    )
}

fn validation_failure(_msg: &str, _ctx: &FailureContext) -> (FailureCategory, &'static str) {
    (
        FailureCategory::FormValidation,
        "The form rejected the submitted data",
    )
}

fn network_failure(_msg: &str, _ctx: &FailureContext) -> (FailureCategory, &'static str) {
    (FailureCategory::NetworkError, "A network request failed")
}

fn ui_failure(_msg: &str, _ctx: &FailureContext) -> (FailureCategory, &'static str) {
    (
        FailureCategory::UiChange,
        "The element exists but is not in an interactable state",
    )
}

/// Ordered rules over the lower-cased message. First match wins.
const RULES: &[Rule] = &[
    Rule {
        keywords: &["not found", "selector", "locator", "no element"],
        classify: locate_failure,
        severity: Severity::High,
        confidence: 0.85,
    },
    Rule {
        keywords: &["timeout", "timed out", "waiting"],
        classify: wait_failure,
        severity: Severity::Medium,
        confidence: 0.75,
    },
    Rule {
        keywords: &["session", "login", "unauthorized", "401"],
        classify: session_failure,
        severity: Severity::Critical,
        confidence: 0.8,
    },
    Rule {
        keywords: &["validation", "invalid", "required", "format"],
        classify: validation_failure,
        severity: Severity::High,
        confidence: 0.7,
    },
    Rule {
        keywords: &["network", "connection", "fetch", "net::"],
        classify: network_failure,
        severity: Severity::High,
        confidence: 0.8,
    },
    Rule {
        keywords: &["visible", "hidden", "display"],
        classify: ui_failure,
        severity: Severity::Medium,
        confidence: 0.65,
    },
];

/// Classify an error message. Deterministic for a given message and context.
pub fn classify(message: &str, context: &FailureContext) -> Classification {
    let lowered = message.to_lowercase();

    for rule in RULES {
        if rule.keywords.iter().any(|k| lowered.contains(k)) {
            let (category, reason) = (rule.classify)(&lowered, context);
            return Classification {
                category,
                severity: rule.severity,
                reason: reason.to_string(),
                confidence: rule.confidence,
            };
        }
    }

    Classification {
        category: FailureCategory::Unknown,
        severity: Severity::Medium,
        reason: "The failure did not match any known pattern".to_string(),
        confidence: 0.3,
    }
}

/// Build the failure record for an error raised in `context`.
pub fn record(error: &EngineError, context: FailureContext) -> FailureMetadata {
    record_message(&error.to_string(), error.name(), context)
}

pub fn record_message(message: &str, name: &str, context: FailureContext) -> FailureMetadata {
    let classification = classify(message, &context);
    let remediation = remediation_for(classification.category);
    FailureMetadata::new(
        ErrorInfo {
            message: message.to_string(),
            name: name.to_string(),
        },
        classification,
        context,
        remediation,
    )
}
