use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde_json::json;
use tokio::sync::{broadcast, Mutex};

use scheduler_core::{
    config::DispatcherConfig,
    traits::{JobStore, ReloadChannel},
    SchedulerError, SchedulerResult,
};
use scheduler_dispatcher::{JobRegistry, JobScheduler, ReloadListener, SyncReport};
use scheduler_infrastructure::{
    InMemoryJobStore, InMemoryReloadChannel, InMemoryTaskQueue, MetricsCollector,
};

fn create_scheduler(store: Arc<InMemoryJobStore>) -> Arc<JobScheduler> {
    Arc::new(JobScheduler::new(
        Arc::new(JobRegistry::new(store.clone())),
        store,
        Arc::new(InMemoryTaskQueue::new()),
        DispatcherConfig::default(),
        Arc::new(MetricsCollector::new()),
    ))
}

async fn wait_until<F, Fut>(mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..200 {
        if condition().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

#[tokio::test]
async fn test_signal_replaces_job_map_and_converges_index() {
    let store = Arc::new(InMemoryJobStore::new());
    store
        .put_definition("a", &json!({"queue": "bots", "task": "bot_task", "args": ["1"]}))
        .await
        .unwrap();
    store
        .put_definition("b", &json!({"queue": "bots", "task": "bot_task", "args": ["2"]}))
        .await
        .unwrap();

    let scheduler = create_scheduler(store.clone());
    let listener = ReloadListener::new(
        Arc::new(InMemoryReloadChannel::new()),
        scheduler.clone(),
        Duration::from_millis(10),
    );

    let report = listener.handle_signal("initial").await.unwrap();
    assert_eq!(report.inserted, 2);

    store.delete_definition("a").await.unwrap();
    let report = listener.handle_signal("bot a deleted").await.unwrap();
    assert_eq!(
        report,
        SyncReport {
            inserted: 0,
            removed: 1
        }
    );
    assert!(scheduler.registry().get("a").await.is_none());

    let entries = store.next_run_entries().await.unwrap();
    assert_eq!(entries.len(), 1);
    assert!(entries.contains_key("b"));

    // 重复信号是幂等的
    let report = listener.handle_signal("bot a deleted").await.unwrap();
    assert!(report.is_noop());
}

#[tokio::test]
async fn test_running_listener_reacts_to_published_signal() {
    let store = Arc::new(InMemoryJobStore::new());
    let scheduler = create_scheduler(store.clone());
    let channel = Arc::new(InMemoryReloadChannel::new());
    let listener = ReloadListener::new(channel.clone(), scheduler.clone(), Duration::from_millis(10));

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let handle = tokio::spawn(async move { listener.run(shutdown_rx).await });

    // 等待订阅建立
    tokio::time::sleep(Duration::from_millis(50)).await;

    store
        .put_definition("c", &json!({"queue": "collectors", "task": "collector_task", "args": ["9"]}))
        .await
        .unwrap();
    channel.publish("source 9 created").await.unwrap();

    let registry = scheduler.registry().clone();
    wait_until(|| {
        let registry = registry.clone();
        async move { registry.get("c").await.is_some() }
    })
    .await;
    assert!(store.next_run_entries().await.unwrap().contains_key("c"));

    shutdown_tx.send(()).unwrap();
    handle.await.unwrap().unwrap();
}

/// 前几次订阅失败，之后恢复
struct FlakyChannel {
    failures_left: Mutex<u32>,
    inner: InMemoryReloadChannel,
}

#[async_trait]
impl ReloadChannel for FlakyChannel {
    async fn publish(&self, reason: &str) -> SchedulerResult<()> {
        self.inner.publish(reason).await
    }

    async fn subscribe(&self) -> SchedulerResult<BoxStream<'static, String>> {
        let mut failures_left = self.failures_left.lock().await;
        if *failures_left > 0 {
            *failures_left -= 1;
            return Err(SchedulerError::MessageQueue("channel unreachable".to_string()));
        }
        self.inner.subscribe().await
    }
}

#[tokio::test]
async fn test_listener_retries_unreachable_channel() {
    let store = Arc::new(InMemoryJobStore::new());
    store
        .put_definition("a", &json!({"queue": "bots", "task": "bot_task", "args": ["1"]}))
        .await
        .unwrap();
    let scheduler = create_scheduler(store.clone());
    let channel = Arc::new(FlakyChannel {
        failures_left: Mutex::new(2),
        inner: InMemoryReloadChannel::new(),
    });
    let listener = ReloadListener::new(channel.clone(), scheduler.clone(), Duration::from_millis(10));

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let handle = tokio::spawn(async move { listener.run(shutdown_rx).await });

    // 订阅成功后会立即全量同步一次
    let registry = scheduler.registry().clone();
    wait_until(|| {
        let registry = registry.clone();
        async move { registry.get("a").await.is_some() }
    })
    .await;
    assert_eq!(*channel.failures_left.lock().await, 0);

    shutdown_tx.send(()).unwrap();
    handle.await.unwrap().unwrap();
}
