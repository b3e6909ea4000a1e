#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use scheduler_core::{
    models::{ResultReport, TaskKind, TaskResult},
    traits::{CoreClient, ResultReporter, TaskContext, TaskHandler},
    SchedulerError, SchedulerResult,
};
use scheduler_infrastructure::MetricsCollector;
use scheduler_worker::{FlowSettings, HandlerRegistry, TaskFlow};
use serde_json::{Map, Value};
use tokio::sync::Mutex;

pub const TEST_RETRY_DELAY: Duration = Duration::from_millis(20);

/// 内存中的Core：配置按 (种类, ID) 存放，写操作全部记录下来
#[derive(Default)]
pub struct MockCoreClient {
    configs: Mutex<HashMap<(TaskKind, String), Value>>,
    stories: Mutex<Vec<Value>>,
    product_inputs: Mutex<HashMap<String, Value>>,
    product_renders: Mutex<HashMap<String, Value>>,
    pub submitted: Mutex<Vec<(String, Value)>>,
    pub notifications: Mutex<Vec<String>>,
    pub story_filters: Mutex<Vec<Option<Map<String, Value>>>>,
}

impl MockCoreClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn with_config(self, kind: TaskKind, id: &str, config: Value) -> Self {
        self.configs.lock().await.insert((kind, id.to_string()), config);
        self
    }

    pub async fn with_stories(self, stories: Vec<Value>) -> Self {
        *self.stories.lock().await = stories;
        self
    }

    pub async fn with_product_input(self, product_id: &str, input: Value) -> Self {
        self.product_inputs
            .lock()
            .await
            .insert(product_id.to_string(), input);
        self
    }

    pub async fn with_product_render(self, product_id: &str, render: Value) -> Self {
        self.product_renders
            .lock()
            .await
            .insert(product_id.to_string(), render);
        self
    }

    pub async fn notifications(&self) -> Vec<String> {
        self.notifications.lock().await.clone()
    }
}

#[async_trait]
impl CoreClient for MockCoreClient {
    async fn fetch_config(&self, kind: TaskKind, id: &str) -> SchedulerResult<Option<Value>> {
        Ok(self
            .configs
            .lock()
            .await
            .get(&(kind, id.to_string()))
            .cloned())
    }

    async fn fetch_stories(
        &self,
        filter: Option<&Map<String, Value>>,
    ) -> SchedulerResult<Vec<Value>> {
        self.story_filters.lock().await.push(filter.cloned());
        Ok(self.stories.lock().await.clone())
    }

    async fn submit_collected(&self, source_id: &str, payload: &Value) -> SchedulerResult<()> {
        self.submitted
            .lock()
            .await
            .push((source_id.to_string(), payload.clone()));
        Ok(())
    }

    async fn fetch_product_input(&self, product_id: &str) -> SchedulerResult<Option<Value>> {
        Ok(self.product_inputs.lock().await.get(product_id).cloned())
    }

    async fn fetch_product_render(&self, product_id: &str) -> SchedulerResult<Option<Value>> {
        Ok(self.product_renders.lock().await.get(product_id).cloned())
    }

    async fn notify(&self, event: &str) -> SchedulerResult<()> {
        self.notifications.lock().await.push(event.to_string());
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingReporter {
    reports: Mutex<Vec<ResultReport>>,
}

impl RecordingReporter {
    pub async fn reports(&self) -> Vec<ResultReport> {
        self.reports.lock().await.clone()
    }
}

#[async_trait]
impl ResultReporter for RecordingReporter {
    async fn report(&self, report: &ResultReport) -> SchedulerResult<()> {
        self.reports.lock().await.push(report.clone());
        Ok(())
    }

    async fn query(&self, task_id: &str) -> SchedulerResult<TaskResult> {
        Ok(TaskResult::pending(task_id))
    }
}

#[derive(Debug, Clone)]
pub enum Behavior {
    Succeed(Value),
    /// 前 n 次失败，之后成功
    FailTimes(usize, Value),
    AlwaysFail,
    SoftSkip(String),
    Sleep(Duration),
}

/// 按脚本行为执行并记录每次调用时间的处理器
pub struct ScriptedHandler {
    name: String,
    kind: TaskKind,
    behavior: Behavior,
    calls: Mutex<Vec<Instant>>,
    running: AtomicUsize,
    max_running: AtomicUsize,
}

impl ScriptedHandler {
    pub fn new(name: &str, kind: TaskKind, behavior: Behavior) -> Self {
        Self {
            name: name.to_string(),
            kind,
            behavior,
            calls: Mutex::new(Vec::new()),
            running: AtomicUsize::new(0),
            max_running: AtomicUsize::new(0),
        }
    }

    pub async fn calls(&self) -> Vec<Instant> {
        self.calls.lock().await.clone()
    }

    pub fn max_running(&self) -> usize {
        self.max_running.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TaskHandler for ScriptedHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> TaskKind {
        self.kind
    }

    async fn execute(&self, _context: &TaskContext) -> SchedulerResult<Value> {
        let call_count = {
            let mut calls = self.calls.lock().await;
            calls.push(Instant::now());
            calls.len()
        };

        match &self.behavior {
            Behavior::Succeed(value) => Ok(value.clone()),
            Behavior::FailTimes(times, value) => {
                if call_count <= *times {
                    Err(SchedulerError::Network("connection reset".to_string()))
                } else {
                    Ok(value.clone())
                }
            }
            Behavior::AlwaysFail => Err(SchedulerError::Network("connection reset".to_string())),
            Behavior::SoftSkip(message) => Err(SchedulerError::SoftSkip(message.clone())),
            Behavior::Sleep(duration) => {
                let running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
                self.max_running.fetch_max(running, Ordering::SeqCst);
                tokio::time::sleep(*duration).await;
                self.running.fetch_sub(1, Ordering::SeqCst);
                Ok(Value::String("done".to_string()))
            }
        }
    }
}

pub fn settings(max_retries: u32) -> FlowSettings {
    FlowSettings {
        max_retries,
        retry_delay: TEST_RETRY_DELAY,
    }
}

pub fn create_flow(
    core: Arc<MockCoreClient>,
    handlers: Vec<Arc<ScriptedHandler>>,
    reporter: Arc<RecordingReporter>,
    settings: FlowSettings,
) -> TaskFlow {
    let mut registry = HandlerRegistry::new();
    for handler in handlers {
        registry.register(handler);
    }
    TaskFlow::new(
        core,
        Arc::new(registry),
        reporter,
        settings,
        Arc::new(MetricsCollector::new()),
    )
}
