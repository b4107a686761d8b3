use autoplan_common::failure::{FailureCategory, FailureMetadata};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailurePatterns {
    pub total: usize,
    pub by_category: BTreeMap<FailureCategory, usize>,
    pub most_common: Option<FailureCategory>,
    pub recommendations: Vec<String>,
}

/// Frequency table, dominant category and cross-cutting recommendations.
pub fn analyze_failure_patterns<'a, I>(failures: I) -> FailurePatterns
where
    I: IntoIterator<Item = &'a FailureMetadata>,
{
    let mut by_category: BTreeMap<FailureCategory, usize> = BTreeMap::new();
    for f in failures {
        *by_category.entry(f.classification.category).or_default() += 1;
    }
    let total: usize = by_category.values().sum();

    // Ties resolve to the category declared first.
    let most_common = by_category
        .iter()
        .fold(None, |best: Option<(FailureCategory, usize)>, (cat, n)| match best {
            Some((_, m)) if m >= *n => best,
            _ => Some((*cat, *n)),
        })
        .map(|(cat, _)| cat);

    let count = |cat: FailureCategory| by_category.get(&cat).copied().unwrap_or(0);
    let mut recommendations = Vec::new();

    if count(FailureCategory::SessionExpired) > 0 {
        recommendations.push(
            "Sessions expired during the run: refresh credentials and consider shorter batches"
                .to_string(),
        );
    }

    let structural = count(FailureCategory::SelectorChange) + count(FailureCategory::LabelChange);
    if structural * 2 >= total && structural > 0 {
        recommendations.push(
            "Most failures come from elements that could not be located: the page has likely \
             changed, review labels and targets in the plan"
                .to_string(),
        );
    }

    let timing = count(FailureCategory::TimingIssue) + count(FailureCategory::PageLoading);
    if timing * 2 >= total && timing > 0 {
        recommendations.push(
            "Timing failures dominate: add explicit waits or raise the configured timeouts"
                .to_string(),
        );
    }

    if count(FailureCategory::NetworkError) > 0 {
        recommendations
            .push("Network errors occurred: check connectivity before re-running".to_string());
    }

    if let Some(cat) = most_common
        && total >= 3
        && recommendations.is_empty()
    {
        recommendations.push(format!(
            "Address '{}' failures first ({} of {})",
            cat,
            count(cat),
            total
        ));
    }

    FailurePatterns {
        total,
        by_category,
        most_common,
        recommendations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::failure::classifier::record_message;
    use autoplan_common::failure::FailureContext;

    fn meta(msg: &str, field: Option<&str>) -> FailureMetadata {
        record_message(
            msg,
            "Test",
            FailureContext {
                field_name: field.map(str::to_string),
                ..FailureContext::default()
            },
        )
    }

    #[test]
    fn test_empty_input() {
        let none: Vec<FailureMetadata> = Vec::new();
        let p = analyze_failure_patterns(&none);
        assert_eq!(p.total, 0);
        assert!(p.most_common.is_none());
        assert!(p.recommendations.is_empty());
    }

    #[test]
    fn test_frequency_and_recommendations() {
        let failures = vec![
            meta("Element not found for 'Email'", Some("email")),
            meta("Element not found for 'Save'", None),
            meta("Element not found for 'Save'", None),
            meta("Session expired", None),
        ];
        let p = analyze_failure_patterns(&failures);
        assert_eq!(p.total, 4);
        assert_eq!(p.by_category[&FailureCategory::SelectorChange], 2);
        assert_eq!(p.by_category[&FailureCategory::LabelChange], 1);
        assert_eq!(p.most_common, Some(FailureCategory::SelectorChange));
        assert_eq!(p.recommendations.len(), 2);
        assert!(p.recommendations[0].contains("expired"));
    }

    #[test]
    fn test_dominant_category_fallback_recommendation() {
        let failures = vec![meta("boom", None), meta("boom", None), meta("boom", None)];
        let p = analyze_failure_patterns(&failures);
        assert_eq!(p.most_common, Some(FailureCategory::Unknown));
        assert_eq!(p.recommendations, vec!["Address 'unknown' failures first (3 of 3)"]);
    }
}
