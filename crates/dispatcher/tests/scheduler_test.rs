use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde_json::{json, Value};
use tokio::sync::broadcast;

use scheduler_core::{
    config::DispatcherConfig,
    models::{from_score, to_score},
    traits::{JobStore, TaskQueue},
    SchedulerError, SchedulerResult,
};
use scheduler_dispatcher::{JobRegistry, JobScheduler, SyncReport, TickOutcome};
use scheduler_infrastructure::{InMemoryJobStore, InMemoryTaskQueue, MetricsCollector};

struct Fixture {
    store: Arc<InMemoryJobStore>,
    queue: Arc<InMemoryTaskQueue>,
    scheduler: JobScheduler,
}

fn create_scheduler(store: Arc<InMemoryJobStore>, queue: Arc<InMemoryTaskQueue>) -> JobScheduler {
    let registry = Arc::new(JobRegistry::new(store.clone()));
    JobScheduler::new(
        registry,
        store,
        queue,
        DispatcherConfig::default(),
        Arc::new(MetricsCollector::new()),
    )
}

async fn setup(definitions: &[(&str, serde_json::Value)]) -> Fixture {
    let store = Arc::new(InMemoryJobStore::new());
    for (id, raw) in definitions {
        store.put_definition(id, raw).await.unwrap();
    }
    let queue = Arc::new(InMemoryTaskQueue::new());
    let scheduler = create_scheduler(store.clone(), queue.clone());
    scheduler.registry().reload().await.unwrap();
    Fixture {
        store,
        queue,
        scheduler,
    }
}

fn job(queue: &str, interval: u64) -> serde_json::Value {
    json!({"queue": queue, "task": "bot_task", "args": ["1"], "interval": interval})
}

#[tokio::test]
async fn test_sync_next_index_converges_and_is_idempotent() {
    let fixture = setup(&[("a", job("bots", 60)), ("b", job("bots", 60))]).await;
    let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    fixture.store.set_next_run("b", to_score(t0)).await.unwrap();
    fixture.store.set_next_run("stale", 1.0).await.unwrap();

    let report = fixture.scheduler.sync_next_index(t0).await.unwrap();
    assert_eq!(
        report,
        SyncReport {
            inserted: 1,
            removed: 1
        }
    );

    let entries = fixture.store.next_run_entries().await.unwrap();
    let mut ids: Vec<&String> = entries.keys().collect();
    ids.sort();
    assert_eq!(ids, vec!["a", "b"]);
    // 已存在的索引项保持原值
    assert_eq!(entries["b"], to_score(t0));
    // 缺失的任务插入 now + 间隔
    assert_eq!(from_score(entries["a"]), t0 + chrono::Duration::seconds(60));

    let second = fixture.scheduler.sync_next_index(t0).await.unwrap();
    assert!(second.is_noop());
}

#[tokio::test]
async fn test_tick_dispatches_earliest_due_and_reschedules_relative_to_now() {
    let fixture = setup(&[("early", job("bots", 300)), ("late", job("collectors", 300))]).await;
    let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    fixture
        .store
        .set_next_run("early", to_score(now) - 120.0)
        .await
        .unwrap();
    fixture
        .store
        .set_next_run("late", to_score(now) - 10.0)
        .await
        .unwrap();

    let outcome = fixture.scheduler.tick_at(now).await.unwrap();
    assert_eq!(outcome, TickOutcome::Dispatched("early".to_string()));

    let message = fixture
        .queue
        .pop("bots", Duration::from_millis(10))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(message.job_id, "early");
    assert_eq!(message.func_path, "bot_task");
    assert_eq!(message.args, vec![json!("1")]);

    let entries = fixture.store.next_run_entries().await.unwrap();
    assert_eq!(
        from_score(entries["early"]),
        now + chrono::Duration::seconds(300)
    );

    assert_eq!(
        fixture.scheduler.tick_at(now).await.unwrap(),
        TickOutcome::Dispatched("late".to_string())
    );
    assert_eq!(fixture.scheduler.tick_at(now).await.unwrap(), TickOutcome::Idle);
}

#[tokio::test]
async fn test_tick_idle_when_nothing_due() {
    let fixture = setup(&[("a", job("bots", 60))]).await;
    let now = Utc::now();
    fixture.scheduler.sync_next_index(now).await.unwrap();

    assert_eq!(fixture.scheduler.tick_at(now).await.unwrap(), TickOutcome::Idle);
    assert_eq!(fixture.queue.len("bots").await.unwrap(), 0);
}

/// 在调度器看到到期项之后、删除之前，模拟另一个实例抢先取走索引项
struct RacingJobStore {
    inner: InMemoryJobStore,
}

#[async_trait]
impl JobStore for RacingJobStore {
    async fn load_definitions(&self) -> SchedulerResult<Vec<(String, Value)>> {
        self.inner.load_definitions().await
    }

    async fn put_definition(&self, id: &str, raw: &Value) -> SchedulerResult<()> {
        self.inner.put_definition(id, raw).await
    }

    async fn delete_definition(&self, id: &str) -> SchedulerResult<bool> {
        self.inner.delete_definition(id).await
    }

    async fn next_run_entries(&self) -> SchedulerResult<HashMap<String, f64>> {
        self.inner.next_run_entries().await
    }

    async fn set_next_run(&self, id: &str, timestamp: f64) -> SchedulerResult<()> {
        self.inner.set_next_run(id, timestamp).await
    }

    async fn remove_next_run(&self, id: &str) -> SchedulerResult<bool> {
        self.inner.remove_next_run(id).await
    }

    async fn claim_next_run(&self, id: &str, timestamp: f64) -> SchedulerResult<bool> {
        self.inner.claim_next_run(id, timestamp).await
    }

    async fn earliest_due(&self, now: f64) -> SchedulerResult<Option<(String, f64)>> {
        let due = self.inner.earliest_due(now).await?;
        if let Some((id, score)) = &due {
            // 竞争者认领并写回下一次的时间
            self.inner.claim_next_run(id, *score).await?;
            self.inner.set_next_run(id, score + 60.0).await?;
        }
        Ok(due)
    }
}

#[tokio::test]
async fn test_second_instance_observes_lost_race() {
    let store = Arc::new(RacingJobStore {
        inner: InMemoryJobStore::new(),
    });
    store.put_definition("a", &job("bots", 60)).await.unwrap();
    let now = Utc::now();
    let due = to_score(now) - 1.0;
    store.set_next_run("a", due).await.unwrap();

    let queue = Arc::new(InMemoryTaskQueue::new());
    let registry = Arc::new(JobRegistry::new(store.clone()));
    registry.reload().await.unwrap();
    let scheduler = JobScheduler::new(
        registry,
        store.clone(),
        queue.clone(),
        DispatcherConfig::default(),
        Arc::new(MetricsCollector::new()),
    );

    assert_eq!(
        scheduler.tick_at(now).await.unwrap(),
        TickOutcome::LostRace("a".to_string())
    );
    assert_eq!(queue.len("bots").await.unwrap(), 0);
    // 竞争者写回的时间没有被覆盖
    let entries = store.next_run_entries().await.unwrap();
    assert_eq!(entries["a"], due + 60.0);
}

#[tokio::test]
async fn test_concurrent_ticks_hand_off_at_most_once() {
    let fixture = setup(&[("a", job("bots", 60))]).await;
    let now = Utc::now();
    fixture
        .store
        .set_next_run("a", to_score(now) - 1.0)
        .await
        .unwrap();

    let schedulers: Vec<Arc<JobScheduler>> = (0..4)
        .map(|_| Arc::new(create_scheduler(fixture.store.clone(), fixture.queue.clone())))
        .collect();
    for scheduler in &schedulers {
        scheduler.registry().reload().await.unwrap();
    }

    let handles: Vec<_> = schedulers
        .iter()
        .cloned()
        .map(|scheduler| tokio::spawn(async move { scheduler.tick_at(now).await.unwrap() }))
        .collect();

    let mut dispatched = 0;
    for handle in handles {
        if let TickOutcome::Dispatched(_) = handle.await.unwrap() {
            dispatched += 1;
        }
    }

    assert_eq!(dispatched, 1);
    assert_eq!(fixture.queue.len("bots").await.unwrap(), 1);
}

#[tokio::test]
async fn test_stale_index_entry_is_purged_on_tick() {
    let fixture = setup(&[]).await;
    let now = Utc::now();
    fixture
        .store
        .set_next_run("ghost", to_score(now) - 5.0)
        .await
        .unwrap();

    assert_eq!(
        fixture.scheduler.tick_at(now).await.unwrap(),
        TickOutcome::Stale("ghost".to_string())
    );
    assert!(fixture.store.next_run_entries().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_tick_until_idle_drains_all_due_jobs() {
    let fixture = setup(&[
        ("a", job("bots", 60)),
        ("b", job("bots", 60)),
        ("c", job("presenters", 60)),
    ])
    .await;
    let now = Utc::now();
    for id in ["a", "b", "c"] {
        fixture
            .store
            .set_next_run(id, to_score(now) - 1.0)
            .await
            .unwrap();
    }

    assert_eq!(fixture.scheduler.tick_until_idle(now).await.unwrap(), 3);
    assert_eq!(fixture.queue.len("bots").await.unwrap(), 2);
    assert_eq!(fixture.queue.len("presenters").await.unwrap(), 1);
}

#[tokio::test]
async fn test_sync_skips_job_without_future_firing() {
    let fixture = setup(&[
        ("a", job("bots", 60)),
        (
            "new_year",
            json!({"queue": "bots", "task": "bot_task", "cron": "0 0 0 1 1 * 2099"}),
        ),
    ])
    .await;
    let now = Utc.with_ymd_and_hms(2100, 6, 1, 0, 0, 0).unwrap();

    let report = fixture.scheduler.sync_next_index(now).await.unwrap();
    assert_eq!(report.inserted, 1);

    let entries = fixture.store.next_run_entries().await.unwrap();
    assert!(entries.contains_key("a"));
    assert!(!entries.contains_key("new_year"));
}

#[tokio::test]
async fn test_last_firing_is_dispatched_and_leaves_index() {
    let fixture = setup(&[(
        "new_year",
        json!({"queue": "bots", "task": "bot_task", "cron": "0 0 0 1 1 * 2099"}),
    )])
    .await;
    let firing = Utc.with_ymd_and_hms(2099, 1, 1, 0, 0, 0).unwrap();
    fixture
        .store
        .set_next_run("new_year", to_score(firing))
        .await
        .unwrap();
    let now = firing + chrono::Duration::seconds(5);

    assert_eq!(
        fixture.scheduler.tick_at(now).await.unwrap(),
        TickOutcome::Dispatched("new_year".to_string())
    );
    assert_eq!(fixture.queue.len("bots").await.unwrap(), 1);
    assert!(fixture.store.next_run_entries().await.unwrap().is_empty());
    assert_eq!(fixture.scheduler.tick_at(now).await.unwrap(), TickOutcome::Idle);
}

#[tokio::test]
async fn test_reload_indexes_valid_jobs_next_to_oversized_interval() {
    let fixture = setup(&[
        ("a", job("bots", 60)),
        ("huge", job("bots", 10_000_000_000_000)),
    ])
    .await;

    fixture.scheduler.reload("test").await.unwrap();

    let entries = fixture.store.next_run_entries().await.unwrap();
    assert_eq!(entries.len(), 1);
    assert!(entries.contains_key("a"));
    assert!(fixture.scheduler.registry().get("huge").await.is_none());
}

/// 前几次查询到期项时存储不可用，之后恢复
struct FlakyJobStore {
    inner: InMemoryJobStore,
    failures_left: AtomicUsize,
    due_calls: AtomicUsize,
}

#[async_trait]
impl JobStore for FlakyJobStore {
    async fn load_definitions(&self) -> SchedulerResult<Vec<(String, Value)>> {
        self.inner.load_definitions().await
    }

    async fn put_definition(&self, id: &str, raw: &Value) -> SchedulerResult<()> {
        self.inner.put_definition(id, raw).await
    }

    async fn delete_definition(&self, id: &str) -> SchedulerResult<bool> {
        self.inner.delete_definition(id).await
    }

    async fn next_run_entries(&self) -> SchedulerResult<HashMap<String, f64>> {
        self.inner.next_run_entries().await
    }

    async fn set_next_run(&self, id: &str, timestamp: f64) -> SchedulerResult<()> {
        self.inner.set_next_run(id, timestamp).await
    }

    async fn remove_next_run(&self, id: &str) -> SchedulerResult<bool> {
        self.inner.remove_next_run(id).await
    }

    async fn claim_next_run(&self, id: &str, timestamp: f64) -> SchedulerResult<bool> {
        self.inner.claim_next_run(id, timestamp).await
    }

    async fn earliest_due(&self, now: f64) -> SchedulerResult<Option<(String, f64)>> {
        self.due_calls.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failing {
            return Err(SchedulerError::MessageQueue("connection reset".to_string()));
        }
        self.inner.earliest_due(now).await
    }
}

#[tokio::test]
async fn test_run_loop_survives_store_outage() {
    let store = Arc::new(FlakyJobStore {
        inner: InMemoryJobStore::new(),
        failures_left: AtomicUsize::new(3),
        due_calls: AtomicUsize::new(0),
    });
    store.put_definition("a", &job("bots", 3600)).await.unwrap();
    store
        .set_next_run("a", to_score(Utc::now()) - 1.0)
        .await
        .unwrap();

    let queue = Arc::new(InMemoryTaskQueue::new());
    let config = DispatcherConfig {
        poll_interval_ms: 10,
        resync_interval_seconds: 0,
        ..DispatcherConfig::default()
    };
    let scheduler = Arc::new(JobScheduler::new(
        Arc::new(JobRegistry::new(store.clone())),
        store.clone(),
        queue.clone(),
        config,
        Arc::new(MetricsCollector::new()),
    ));

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let handle = {
        let scheduler = scheduler.clone();
        tokio::spawn(async move { scheduler.run(shutdown_rx).await })
    };

    let dispatched = tokio::time::timeout(Duration::from_secs(5), async {
        while queue.len("bots").await.unwrap() == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(dispatched.is_ok(), "存储恢复后应投递到期任务");
    assert!(store.due_calls.load(Ordering::SeqCst) > 3);
    assert!(!handle.is_finished());

    // 只投递一次，下次运行在一小时后
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(queue.len("bots").await.unwrap(), 1);

    shutdown_tx.send(()).unwrap();
    let result = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("调度器应在关闭信号后退出")
        .unwrap();
    assert!(result.is_ok());
}
