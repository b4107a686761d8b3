use autoplan_common::failure::{FailureCategory, Remediation, RemediationPriority};

/// Fixed remediation template for a failure category.
pub fn remediation_for(category: FailureCategory) -> Remediation {
    let (priority, steps): (RemediationPriority, &[&str]) = match category {
        FailureCategory::LabelChange => (
            RemediationPriority::High,
            &[
                "Open the target page and check the current label of the field",
                "Add the new label text to the field mapping's labels or fallbackLabels",
                "Re-run in safe-run mode to confirm the field resolves",
            ],
        ),
        FailureCategory::SelectorChange => (
            RemediationPriority::High,
            &[
                "Inspect the page to find the element's current text, title or aria-label",
                "Update the action target to match the new markup",
                "Prefer visible text over CSS selectors where possible",
            ],
        ),
        FailureCategory::PageLoading => (
            RemediationPriority::Normal,
            &[
                "Verify the target URL loads in a regular browser",
                "Check that the page-ready indicator still exists on the page",
                "Increase timeouts.page_ready_ms for slow environments",
            ],
        ),
        FailureCategory::TimingIssue => (
            RemediationPriority::Normal,
            &[
                "Add a wait action before the failing step",
                "Check that the waitFor indicator matches what the page shows after the action",
                "Increase timeouts.action_wait_ms if the application is slow",
            ],
        ),
        FailureCategory::SessionExpired => (
            RemediationPriority::Immediate,
            &[
                "Verify the login credentials in the plan",
                "Check whether the application now requires additional login steps",
                "Re-run the plan once the session can be established",
            ],
        ),
        FailureCategory::FormValidation => (
            RemediationPriority::High,
            &[
                "Check the data row for missing or badly formatted values",
                "Compare the field types in the mapping with the form's inputs",
                "Review the validation message shown on the page",
            ],
        ),
        FailureCategory::NetworkError => (
            RemediationPriority::High,
            &[
                "Check connectivity to the target host",
                "Retry the run once the service is reachable",
            ],
        ),
        FailureCategory::UiChange => (
            RemediationPriority::Normal,
            &[
                "Check whether an overlay, modal or collapsed section hides the element",
                "Add a click or wait step that reveals the element first",
            ],
        ),
        FailureCategory::Unknown => (
            RemediationPriority::Low,
            &[
                "Inspect the error message and the failure screenshot if one was captured",
                "Re-run the failing row with --verbose for a detailed trace",
            ],
        ),
    };

    Remediation {
        priority,
        steps: steps.iter().map(|s| s.to_string()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_expiry_is_immediate() {
        let r = remediation_for(FailureCategory::SessionExpired);
        assert_eq!(r.priority, RemediationPriority::Immediate);
        assert_eq!(r.steps.len(), 3);
    }
}
