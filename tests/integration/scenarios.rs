//! End-to-end cycle scenarios driven through `SessionController::tick`.

use chrono::{DateTime, Duration, TimeZone, Utc};

use oddswatch::config::AppConfig;
use oddswatch::engine::controller::{ControllerSettings, SessionController};
use oddswatch::engine::pipeline::AlertPipeline;
use oddswatch::session::SessionPool;
use oddswatch::types::SessionState;

use crate::mock_session::{fragment, with_bookmakers, MockSessionFactory, PageLoad, RecordingNotifier};

const CONFIG: &str = r#"
[monitor]
name = "test"
page_url = "https://odds.example.test/comparateur"
check_interval_minutes = 2
js_load_timeout_ms = 20000
expiration_hours = 12
session_restart_iterations = 3

[alerts]
return_threshold = 98.0
max_return_threshold = 105.0
min_return_increase = 0.1

[bookmakers]
excluded = ["Vbet"]

[bookmakers.names]
"1" = "Betclic"
"3" = "Winamax"
"12" = "Vbet"

[notifier]
webhook_url_env = "ODDSWATCH_TEST_WEBHOOK"
"#;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 15, 8, 0, 0).unwrap()
}

async fn controller(
    factory: &MockSessionFactory,
    notifier: &RecordingNotifier,
) -> SessionController {
    let cfg = AppConfig::from_toml_str(CONFIG).unwrap();
    let pool = SessionPool::new(
        Box::new(factory.clone()),
        cfg.monitor.session_restart_iterations,
    );
    SessionController::start(
        pool,
        AlertPipeline::from_config(&cfg).unwrap(),
        Box::new(notifier.clone()),
        ControllerSettings::from_config(&cfg),
    )
    .await
    .unwrap()
}

#[tokio::test]
async fn test_scenario_a_hysteresis() {
    let factory = MockSessionFactory::new(vec![
        PageLoad::Matches(vec![fragment("Nantes", "Rennes", "98,0 %")]),
        PageLoad::Matches(vec![fragment("Nantes", "Rennes", "98,05 %")]),
        PageLoad::Matches(vec![fragment("Nantes", "Rennes", "98,2 %")]),
    ]);
    let notifier = RecordingNotifier::new();
    let mut c = controller(&factory, &notifier).await;

    let first = c.tick(t0()).await.unwrap();
    assert_eq!(first.alerts, 1);

    let second = c.tick(t0() + Duration::minutes(2)).await.unwrap();
    assert_eq!(second.alerts, 0);
    assert!(second.delivery.is_none());

    let third = c.tick(t0() + Duration::minutes(4)).await.unwrap();
    assert_eq!(third.alerts, 1);

    let sent = notifier.sent();
    assert_eq!(sent.len(), 2);
    assert!(sent[0].contains("**98.0%**") || sent[0].contains("**98%**"));
    assert!(sent[1].contains("98.2"));

    let state = c.pipeline().store().get("Nantes vs Rennes").unwrap();
    assert_eq!(state.last_return_value.to_string(), "98.2");
    assert_eq!(state.last_alert_time, t0() + Duration::minutes(4));
}

#[tokio::test]
async fn test_scenario_b_expiry_then_realert() {
    let factory = MockSessionFactory::new(vec![
        PageLoad::Matches(vec![fragment("Metz", "Brest", "98,0 %")]),
        PageLoad::Matches(vec![]),
        PageLoad::Matches(vec![]),
        PageLoad::Matches(vec![fragment("Metz", "Brest", "98,0 %")]),
    ]);
    let notifier = RecordingNotifier::new();
    let mut c = controller(&factory, &notifier).await;

    c.tick(t0()).await.unwrap();
    assert!(c.pipeline().store().contains("Metz vs Brest"));

    let at_11h = c.tick(t0() + Duration::hours(11)).await.unwrap();
    assert_eq!(at_11h.expired, 0);
    assert!(c.pipeline().store().contains("Metz vs Brest"));

    let at_13h = c.tick(t0() + Duration::hours(13)).await.unwrap();
    assert_eq!(at_13h.expired, 1);
    assert!(!c.pipeline().store().contains("Metz vs Brest"));

    let again = c.tick(t0() + Duration::hours(13) + Duration::minutes(2)).await.unwrap();
    assert_eq!(again.alerts, 1);
    assert_eq!(notifier.sent().len(), 2);
}

#[tokio::test]
async fn test_scenario_c_timeout_recreates_session() {
    let factory = MockSessionFactory::new(vec![
        PageLoad::Matches(vec![]),
        PageLoad::Timeout,
        PageLoad::Matches(vec![]),
    ]);
    let notifier = RecordingNotifier::new();
    let mut c = controller(&factory, &notifier).await;

    c.tick(t0()).await.unwrap();
    assert_eq!(c.iterations(), 1);

    assert!(c.tick(t0() + Duration::minutes(2)).await.is_none());
    assert_eq!(c.iterations(), 0);
    assert_eq!(c.state(), SessionState::Running);
    assert_eq!(factory.opened(), 2);
    assert_eq!(factory.closed(), 1);

    // The loop carries on with the new session.
    assert!(c.tick(t0() + Duration::minutes(4)).await.is_some());
    assert_eq!(c.iterations(), 1);
}

#[tokio::test]
async fn test_scenario_d_excluded_bookmaker_batched_alone() {
    let factory = MockSessionFactory::new(vec![PageLoad::Matches(vec![
        with_bookmakers(fragment("Lens", "Lille", "103,5 %"), "bookmaker-3 bookmaker-12"),
        fragment("Nice", "Lyon", "98,6 %"),
    ])]);
    let notifier = RecordingNotifier::new();
    let mut c = controller(&factory, &notifier).await;

    let report = c.tick(t0()).await.unwrap();
    assert_eq!(report.excluded, 1);
    assert_eq!(report.alerts, 1);

    let sent = notifier.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].contains("Nice vs Lyon"));
    assert!(!sent[0].contains("Lens vs Lille"));
    assert!(sent[0].ends_with("\nVoir sur : https://odds.example.test/comparateur"));
    assert!(!c.pipeline().store().contains("Lens vs Lille"));
}

#[tokio::test]
async fn test_one_batched_message_per_cycle() {
    let factory = MockSessionFactory::new(vec![PageLoad::Matches(vec![
        fragment("Nice", "Lyon", "98,6 %"),
        fragment("Lens", "Lille", "99,1 %"),
        fragment("Metz", "Brest", "97,9 %"),
    ])]);
    let notifier = RecordingNotifier::new();
    let mut c = controller(&factory, &notifier).await;

    let report = c.tick(t0()).await.unwrap();
    assert_eq!(report.fragments_seen, 3);
    assert_eq!(report.alerts, 2);

    let sent = notifier.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].contains("Nice vs Lyon"));
    assert!(sent[0].contains("Lens vs Lille"));
    assert!(!sent[0].contains("Metz vs Brest"));
    assert_eq!(sent[0].matches("Voir sur").count(), 1);
}

#[tokio::test]
async fn test_above_max_threshold_ignored() {
    let factory = MockSessionFactory::new(vec![PageLoad::Matches(vec![fragment(
        "Nice", "Lyon", "112,0 %",
    )])]);
    let notifier = RecordingNotifier::new();
    let mut c = controller(&factory, &notifier).await;

    let report = c.tick(t0()).await.unwrap();
    assert_eq!(report.alerts, 0);
    assert!(notifier.sent().is_empty());
    assert!(c.pipeline().store().is_empty());
}

#[tokio::test]
async fn test_rejected_delivery_not_resent() {
    let page = vec![fragment("Nice", "Lyon", "98,6 %")];
    let factory = MockSessionFactory::new(vec![
        PageLoad::Matches(page.clone()),
        PageLoad::Matches(page),
    ]);
    let notifier = RecordingNotifier::new();
    notifier.set_status(429);
    let mut c = controller(&factory, &notifier).await;

    let first = c.tick(t0()).await.unwrap();
    let delivery = first.delivery.unwrap();
    assert!(!delivery.delivered);
    assert_eq!(delivery.status_code, Some(429));

    let second = c.tick(t0() + Duration::minutes(2)).await.unwrap();
    assert_eq!(second.alerts, 0);
    assert_eq!(notifier.sent().len(), 1);
}

#[tokio::test]
async fn test_proactive_restart_after_iteration_limit() {
    let factory = MockSessionFactory::new(vec![
        PageLoad::Matches(vec![]),
        PageLoad::Matches(vec![]),
        PageLoad::Matches(vec![]),
        PageLoad::Matches(vec![]),
    ]);
    let notifier = RecordingNotifier::new();
    let mut c = controller(&factory, &notifier).await;

    for i in 0..2 {
        let report = c.tick(t0() + Duration::minutes(2 * i)).await.unwrap();
        assert!(!report.session_recycled);
    }
    assert_eq!(c.iterations(), 2);

    let third = c.tick(t0() + Duration::minutes(4)).await.unwrap();
    assert!(third.session_recycled);
    assert_eq!(c.iterations(), 0);
    assert_eq!(factory.opened(), 2);
    assert_eq!(factory.closed(), 1);

    c.tick(t0() + Duration::minutes(6)).await.unwrap();
    assert_eq!(c.iterations(), 1);
}

#[tokio::test]
async fn test_failed_recreation_retried_next_cycle() {
    let factory = MockSessionFactory::new(vec![
        PageLoad::Crash("page crashed".into()),
        PageLoad::Matches(vec![fragment("Nice", "Lyon", "98,6 %")]),
    ]);
    let notifier = RecordingNotifier::new();
    let mut c = controller(&factory, &notifier).await;

    factory.set_error("browser unavailable");
    assert!(c.tick(t0()).await.is_none());
    assert_eq!(c.state(), SessionState::Restarting);
    assert!(!c.pool().is_open());

    factory.clear_error();
    let report = c.tick(t0() + Duration::minutes(2)).await.unwrap();
    assert_eq!(report.alerts, 1);
    assert_eq!(c.state(), SessionState::Running);
    assert_eq!(factory.opened(), 2);
}

#[tokio::test]
async fn test_startup_fails_without_session() {
    let factory = MockSessionFactory::new(vec![]);
    factory.set_error("browser unavailable");

    let cfg = AppConfig::from_toml_str(CONFIG).unwrap();
    let result = SessionController::start(
        SessionPool::new(Box::new(factory.clone()), 3),
        AlertPipeline::from_config(&cfg).unwrap(),
        Box::new(RecordingNotifier::new()),
        ControllerSettings::from_config(&cfg),
    )
    .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_shutdown_releases_session() {
    let factory = MockSessionFactory::new(vec![]);
    let notifier = RecordingNotifier::new();
    let mut c = controller(&factory, &notifier).await;

    c.shutdown().await;
    assert_eq!(c.state(), SessionState::Stopped);
    assert_eq!(factory.closed(), 1);
}
