use autoplan_engine::Orchestrator;
use autoplan_engine::backend::{
    Backend, BackendError, ClickMode, Driver, Locator, NameMatch, SessionOptions,
};
use autoplan_engine::config::EngineConfig;
use autoplan_engine::report::{ReportStatus, RowStatus};
use autoplan_h::ChromiumDriver;
use serde_json::json;
use serial_test::serial;
use std::sync::Arc;

const FORM_HTML: &str = r#"<html><head><title>Signup</title></head><body>
<form class="main" onsubmit="return false">
  <label for="name">Full name</label><input id="name" name="name" type="text">
  <label for="plan">Plan</label>
  <select id="plan"><option value="free">Free</option><option value="pro">Professional</option></select>
  <button type="button" onclick="document.querySelector('.saved').style.display='block'">Save</button>
</form>
<div class="saved" style="display:none">Saved successfully</div>
</body></html>"#;

fn form_url() -> String {
    format!("data:text/html,{}", FORM_HTML)
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::INFO)
        .try_init()
        .ok();
}

fn options() -> SessionOptions {
    let config = EngineConfig::default().with_env_overrides();
    SessionOptions {
        headless: true,
        executable: config.browser.executable,
        user_data_dir: None,
    }
}

#[tokio::test]
#[serial]
async fn test_session_queries_and_interacts() {
    init_tracing();

    let mut session = match ChromiumDriver::new().launch_session(&options()).await {
        Ok(session) => session,
        Err(e) => {
            eprintln!("Failed to launch browser (is Chromium installed?): {}", e);
            return;
        }
    };

    let nav = session.navigate(&form_url()).await.expect("Navigation failed");
    assert_eq!(nav.title, "Signup");

    let buttons = session
        .query(&Locator::Role {
            role: "button".into(),
            name: NameMatch::Exact("Save".into()),
        })
        .await
        .expect("role query failed");
    assert_eq!(buttons.len(), 1);
    let save = buttons[0];

    let inputs = session
        .query(&Locator::Role {
            role: "textbox".into(),
            name: NameMatch::Pattern("^Full name$".into()),
        })
        .await
        .expect("label query failed");
    assert_eq!(inputs.len(), 1);
    session.fill(inputs[0], "Ada Lovelace").await.unwrap();
    let value = session
        .evaluate("document.querySelector('input').value")
        .await
        .unwrap();
    assert_eq!(value, json!("Ada Lovelace"));

    let selects = session.query(&Locator::Css("select".into())).await.unwrap();
    session.select_option(selects[0], "Professional").await.unwrap();
    let err = session.select_option(selects[0], "Enterprise").await.unwrap_err();
    assert!(matches!(err, BackendError::OptionNotFound { .. }));

    assert!(!session.selector_visible(".saved").await.unwrap());
    session.click(save, ClickMode::Trial).await.unwrap();
    session.click(save, ClickMode::Normal).await.unwrap();
    assert!(session.text_visible("Saved successfully").await.unwrap());

    let err = session
        .query(&Locator::Css("[[broken".into()))
        .await
        .unwrap_err();
    assert!(matches!(err, BackendError::SelectorInvalid { .. }));

    session
        .evaluate("document.querySelector('button').remove()")
        .await
        .unwrap();
    assert!(!session.is_attached(save).await.unwrap());
    let err = session.click(save, ClickMode::Dom).await.unwrap_err();
    assert!(matches!(err, BackendError::ElementStale { .. }));

    session.close().await.expect("Close failed");
}

#[tokio::test]
#[serial]
async fn test_handles_do_not_survive_navigation() {
    init_tracing();

    let mut session = match ChromiumDriver::new().launch_session(&options()).await {
        Ok(session) => session,
        Err(e) => {
            eprintln!("Failed to launch browser (is Chromium installed?): {}", e);
            return;
        }
    };

    session.navigate(&form_url()).await.expect("Navigation failed");
    let before = session.query(&Locator::Css("input, select, button".into())).await.unwrap();
    assert_eq!(before.len(), 3);

    session.navigate(&form_url()).await.expect("Navigation failed");
    let after = session.query(&Locator::Css("input, select, button".into())).await.unwrap();
    assert_eq!(after.len(), 3);

    for handle in &before {
        assert!(!after.contains(handle));
        assert!(!session.is_attached(*handle).await.unwrap());
    }
    let err = session.click(before[2], ClickMode::Dom).await.unwrap_err();
    assert!(matches!(err, BackendError::ElementStale { .. }));

    session.close().await.expect("Close failed");
}

#[tokio::test]
#[serial]
async fn test_plan_runs_against_chromium() {
    init_tracing();

    let mut config = EngineConfig::default().with_env_overrides();
    config.browser.permissions.clear();
    config.typing.min_delay_ms = 5;
    config.typing.max_delay_ms = 10;

    let plan = json!({
        "target": {
            "url": form_url(),
            "pageReadyIndicator": {"type": "selector", "value": "form.main"}
        },
        "dataSource": {"rows": [{"name": "Grace Hopper", "plan": "Professional"}]},
        "fieldMappings": [
            {"name": "name", "labels": ["Full name"]},
            {"name": "plan", "type": "select", "labels": ["Plan"]}
        ],
        "actions": [
            {"type": "fill", "target": "name"},
            {"type": "fill", "target": "plan"},
            {"type": "click", "target": "Save"}
        ],
        "successIndicator": {"type": "text", "value": "Saved successfully"}
    });

    let orchestrator = Orchestrator::new(Arc::new(ChromiumDriver::new()), config);
    let report = orchestrator.run_document(&plan, false).await.unwrap();

    if let Some(error) = &report.error
        && error.contains("launch")
    {
        eprintln!("Failed to launch browser (is Chromium installed?): {}", error);
        return;
    }

    assert_eq!(report.status, ReportStatus::Success, "{:?}", report);
    let row = &report.results[0];
    assert_eq!(row.status, RowStatus::Success);
    assert_eq!(row.actions.len(), 3);
    assert!(row.actions.iter().all(|a| a.success));
}
