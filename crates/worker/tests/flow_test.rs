mod common;

use std::sync::Arc;
use std::time::Duration;

use scheduler_core::models::{
    BotTask, CollectorTask, JobOptions, PresenterTask, TaskExecutionMessage, TaskKind,
    TaskRequest, TaskStatus,
};
use serde_json::json;

use common::{
    create_flow, settings, Behavior, MockCoreClient, RecordingReporter, ScriptedHandler,
    TEST_RETRY_DELAY,
};

fn collector(source_id: &str) -> TaskRequest {
    TaskRequest::Collector(CollectorTask {
        source_id: source_id.to_string(),
        manual: false,
    })
}

#[tokio::test]
async fn test_transient_failure_is_attempted_one_plus_max_retries_times() {
    let core = Arc::new(
        MockCoreClient::new()
            .with_config(TaskKind::Collector, "s1", json!({"type": "flaky_collector"}))
            .await,
    );
    let handler = Arc::new(ScriptedHandler::new(
        "flaky_collector",
        TaskKind::Collector,
        Behavior::AlwaysFail,
    ));
    let reporter = Arc::new(RecordingReporter::default());
    let flow = create_flow(core.clone(), vec![handler.clone()], reporter.clone(), settings(3));

    let outcome = flow.execute(collector("s1"), &JobOptions::default()).await;

    assert_eq!(outcome.status, TaskStatus::Failure);
    assert_eq!(outcome.attempts, 4);
    assert!(outcome.result.as_str().unwrap().contains("connection reset"));

    let calls = handler.calls().await;
    assert_eq!(calls.len(), 4);
    for pair in calls.windows(2) {
        assert!(pair[1].duration_since(pair[0]) >= TEST_RETRY_DELAY);
    }

    let reports = reporter.reports().await;
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].task_id, "source_s1");
    assert_eq!(reports[0].status, TaskStatus::Failure);
    assert_eq!(reports[0].task.as_deref(), Some("collector_task"));
    assert_eq!(reports[0].run_id.as_deref(), Some(outcome.run_id.as_str()));

    assert!(core.notifications().await.is_empty());
}

#[tokio::test]
async fn test_missing_config_is_attempted_exactly_once() {
    let core = Arc::new(MockCoreClient::new());
    let handler = Arc::new(ScriptedHandler::new(
        "wordlist_bot",
        TaskKind::Bot,
        Behavior::AlwaysFail,
    ));
    let reporter = Arc::new(RecordingReporter::default());
    let flow = create_flow(core, vec![handler.clone()], reporter.clone(), settings(3));

    let request = TaskRequest::Bot(BotTask {
        bot_id: "missing".to_string(),
        filter: None,
    });
    let outcome = flow.execute(request, &JobOptions::default()).await;

    assert_eq!(outcome.status, TaskStatus::Failure);
    assert_eq!(outcome.attempts, 1);
    assert!(handler.calls().await.is_empty());
    assert_eq!(reporter.reports().await.len(), 1);
}

#[tokio::test]
async fn test_unknown_type_is_not_retried() {
    let core = Arc::new(
        MockCoreClient::new()
            .with_config(TaskKind::Collector, "s1", json!({"type": "ftp_collector"}))
            .await,
    );
    let reporter = Arc::new(RecordingReporter::default());
    let flow = create_flow(core, Vec::new(), reporter.clone(), settings(3));

    let outcome = flow.execute(collector("s1"), &JobOptions::default()).await;

    assert_eq!(outcome.status, TaskStatus::Failure);
    assert_eq!(outcome.attempts, 1);
    assert!(outcome.result.as_str().unwrap().contains("ftp_collector"));
}

#[tokio::test]
async fn test_soft_skip_reports_success_without_notification() {
    let core = Arc::new(
        MockCoreClient::new()
            .with_config(TaskKind::Collector, "s1", json!({"type": "rss_collector"}))
            .await,
    );
    let handler = Arc::new(ScriptedHandler::new(
        "rss_collector",
        TaskKind::Collector,
        Behavior::SoftSkip("源未发生变化".to_string()),
    ));
    let reporter = Arc::new(RecordingReporter::default());
    let flow = create_flow(core.clone(), vec![handler.clone()], reporter.clone(), settings(3));

    let outcome = flow.execute(collector("s1"), &JobOptions::default()).await;

    assert_eq!(outcome.status, TaskStatus::Success);
    assert!(outcome.soft_skipped);
    assert_eq!(outcome.result, json!("源未发生变化"));
    assert_eq!(handler.calls().await.len(), 1);
    assert!(core.notifications().await.is_empty());
}

#[tokio::test]
async fn test_recovers_after_transient_failures_and_notifies() {
    let core = Arc::new(
        MockCoreClient::new()
            .with_config(TaskKind::Collector, "s1", json!({"type": "rss_collector"}))
            .await,
    );
    let handler = Arc::new(ScriptedHandler::new(
        "rss_collector",
        TaskKind::Collector,
        Behavior::FailTimes(2, json!("collected 3 items")),
    ));
    let reporter = Arc::new(RecordingReporter::default());
    let flow = create_flow(core.clone(), vec![handler], reporter.clone(), settings(3));

    let outcome = flow.execute(collector("s1"), &JobOptions::default()).await;

    assert_eq!(outcome.status, TaskStatus::Success);
    assert_eq!(outcome.attempts, 3);
    assert_eq!(core.notifications().await, vec!["collector_completed".to_string()]);
    assert_eq!(reporter.reports().await[0].result, json!("collected 3 items"));
}

#[tokio::test]
async fn test_presenter_success_does_not_notify() {
    let core = Arc::new(
        MockCoreClient::new()
            .with_config(TaskKind::Presenter, "p1", json!({"type": "text_presenter"}))
            .await,
    );
    let handler = Arc::new(ScriptedHandler::new(
        "text_presenter",
        TaskKind::Presenter,
        Behavior::Succeed(json!({"product_id": "p1", "render_result": "eA=="})),
    ));
    let reporter = Arc::new(RecordingReporter::default());
    let flow = create_flow(core.clone(), vec![handler], reporter, settings(3));

    let request = TaskRequest::Presenter(PresenterTask {
        product_id: "p1".to_string(),
        countdown: None,
    });
    let outcome = flow.execute(request, &JobOptions::default()).await;

    assert_eq!(outcome.status, TaskStatus::Success);
    assert!(core.notifications().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_presenter_countdown_delays_first_attempt() {
    let core = Arc::new(
        MockCoreClient::new()
            .with_config(TaskKind::Presenter, "p1", json!({"type": "text_presenter"}))
            .await,
    );
    let handler = Arc::new(ScriptedHandler::new(
        "text_presenter",
        TaskKind::Presenter,
        Behavior::Succeed(json!({"product_id": "p1", "render_result": "eA=="})),
    ));
    let reporter = Arc::new(RecordingReporter::default());
    let flow = Arc::new(create_flow(core, vec![handler.clone()], reporter, settings(3)));

    let request = TaskRequest::Presenter(PresenterTask {
        product_id: "p1".to_string(),
        countdown: Some(30),
    });
    let started = tokio::time::Instant::now();
    let handle = {
        let flow = flow.clone();
        tokio::spawn(async move { flow.execute(request, &JobOptions::default()).await })
    };

    tokio::time::sleep(Duration::from_secs(29)).await;
    assert!(handler.calls().await.is_empty());

    let outcome = handle.await.unwrap();
    assert_eq!(outcome.status, TaskStatus::Success);
    assert_eq!(handler.calls().await.len(), 1);
    assert!(started.elapsed() >= Duration::from_secs(30));
}

#[tokio::test]
async fn test_attempt_timeout_from_job_options() {
    let core = Arc::new(
        MockCoreClient::new()
            .with_config(TaskKind::Collector, "s1", json!({"type": "slow_collector"}))
            .await,
    );
    let handler = Arc::new(ScriptedHandler::new(
        "slow_collector",
        TaskKind::Collector,
        Behavior::Sleep(Duration::from_secs(5)),
    ));
    let reporter = Arc::new(RecordingReporter::default());
    let flow = create_flow(core, vec![handler.clone()], reporter, settings(3));

    let options = JobOptions {
        timeout_seconds: Some(0),
        max_retries: Some(1),
        retry_delay_seconds: Some(0),
    };
    let outcome = flow.execute(collector("s1"), &options).await;

    assert_eq!(outcome.status, TaskStatus::Failure);
    assert_eq!(outcome.attempts, 2);
    assert!(outcome.result.as_str().unwrap().contains("超时"));
    assert_eq!(handler.calls().await.len(), 2);
}

#[tokio::test]
async fn test_queue_message_is_converted_to_request() {
    let core = Arc::new(
        MockCoreClient::new()
            .with_config(TaskKind::Bot, "b7", json!({"type": "wordlist_bot"}))
            .await,
    );
    let handler = Arc::new(ScriptedHandler::new(
        "wordlist_bot",
        TaskKind::Bot,
        Behavior::Succeed(json!({"bot_id": "b7", "tags": {}})),
    ));
    let reporter = Arc::new(RecordingReporter::default());
    let flow = create_flow(core, vec![handler], reporter.clone(), settings(3));

    let message = TaskExecutionMessage::on_demand("bots", "worker.tasks.bot_task", vec![json!("b7")]);
    let outcome = flow.run(&message).await;

    assert_eq!(outcome.task_id, "bot_b7");
    assert_eq!(outcome.status, TaskStatus::Success);
    assert_eq!(reporter.reports().await[0].task.as_deref(), Some("bot_task"));
}

#[tokio::test]
async fn test_invalid_message_reports_failure_without_attempts() {
    let reporter = Arc::new(RecordingReporter::default());
    let flow = create_flow(
        Arc::new(MockCoreClient::new()),
        Vec::new(),
        reporter.clone(),
        settings(3),
    );

    let message = TaskExecutionMessage::on_demand("misc", "cleanup_token_blacklist", Vec::new());
    let outcome = flow.run(&message).await;

    assert_eq!(outcome.status, TaskStatus::Failure);
    assert_eq!(outcome.attempts, 0);
    assert_eq!(outcome.task_id, message.job_id);
    assert_eq!(reporter.reports().await.len(), 1);
}
