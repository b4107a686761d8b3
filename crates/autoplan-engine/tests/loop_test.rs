mod common;

use autoplan_engine::Orchestrator;
use autoplan_engine::config::EngineConfig;
use autoplan_engine::report::{ReportStatus, RowStatus};
use common::FakePage;
use serde_json::{Value, json};

fn loop_plan(button: &str, stop_when: &str, indicator: &str, max_iterations: u32) -> Value {
    json!({
        "target": {
            "url": "https://app.test/queue",
            "pageReadyIndicator": {"type": "selector", "value": "main"}
        },
        "actions": [{"type": "click", "target": button}],
        "execution": {
            "mode": "loop",
            "loop": {
                "maxIterations": max_iterations,
                "delaySeconds": 0.5,
                "stopWhen": stop_when,
                "indicator": {"type": "selector", "value": indicator}
            }
        }
    })
}

fn queue_page() -> (FakePage, usize) {
    let page = FakePage::new();
    let main = page.add(None, "main", &[], "");
    let delete = page.add(
        Some(main),
        "button",
        &[("class", "btn btn-delete"), ("type", "button")],
        "Delete",
    );
    (page, delete)
}

async fn run(page: &FakePage, plan: &Value) -> autoplan_engine::report::ExecutionReport {
    Orchestrator::new(page.driver(), EngineConfig::default())
        .run_document(plan, false)
        .await
        .unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_loop_runs_until_element_disappears() {
    let (page, delete) = queue_page();
    page.update(delete, |e| e.detach_after_clicks = Some(3));

    let report = run(&page, &loop_plan("Delete", "notVisible", ".btn-delete", 10)).await;

    assert_eq!(report.results.len(), 3);
    let indexes: Vec<usize> = report.results.iter().map(|r| r.row_index).collect();
    assert_eq!(indexes, vec![0, 1, 2]);
    assert!(report.results.iter().all(|r| r.status == RowStatus::Success));
    assert!(
        report
            .results
            .iter()
            .all(|r| r.warnings.iter().all(|w| !w.contains("maxIterations")))
    );
    assert_eq!(page.clicks_on(delete).len(), 3);
    assert_eq!(report.status, ReportStatus::Success);
}

#[tokio::test(start_paused = true)]
async fn test_loop_stops_at_max_iterations_with_warning() {
    let (page, delete) = queue_page();

    let report = run(&page, &loop_plan("Delete", "visible", ".done", 4)).await;

    assert_eq!(report.results.len(), 4);
    assert_eq!(page.clicks_on(delete).len(), 4);
    let last = report.results.last().unwrap();
    assert!(last.warnings.iter().any(|w| w.contains("maxIterations (4)")));
}

#[tokio::test(start_paused = true)]
async fn test_loop_already_satisfied_yields_single_synthetic_result() {
    let (page, delete) = queue_page();
    page.add(None, "div", &[("class", "done")], "All clear");

    let report = run(&page, &loop_plan("Delete", "visible", ".done", 5)).await;

    assert_eq!(report.results.len(), 1);
    let only = &report.results[0];
    assert_eq!(only.status, RowStatus::Success);
    assert!(only.actions.is_empty());
    assert!(only.warnings[0].contains("already met"));
    assert!(page.clicks_on(delete).is_empty());
    assert_eq!(report.summary.success, 1);
}

#[tokio::test(start_paused = true)]
async fn test_failure_indicator_aborts_loop() {
    let (page, delete) = queue_page();
    let banner = page.add(None, "div", &[("class", "banner")], "Quota exceeded");
    page.update(banner, |e| e.visible = false);
    page.update(delete, |e| e.reveals = Some(banner));

    let mut plan = loop_plan("Delete", "notVisible", ".btn-delete", 10);
    plan["failureIndicator"] = json!({"type": "text", "value": "Quota exceeded"});

    let report = run(&page, &plan).await;

    assert_eq!(report.results.len(), 1);
    let row = &report.results[0];
    assert_eq!(row.status, RowStatus::Failed);
    assert!(row.warnings.iter().any(|w| w.contains("Loop aborted")));
    assert!(row.error.as_deref().unwrap().contains("Quota exceeded"));
    assert_eq!(report.status, ReportStatus::Failed);
}

#[tokio::test(start_paused = true)]
async fn test_zero_max_iterations_runs_nothing() {
    let (page, delete) = queue_page();

    let report = run(&page, &loop_plan("Delete", "visible", ".done", 0)).await;

    assert!(report.results.is_empty());
    assert!(page.clicks_on(delete).is_empty());
    assert_eq!(report.status, ReportStatus::Success);
}
