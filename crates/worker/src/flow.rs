//! 任务执行流程
//!
//! 每种任务都经过相同的三个阶段：
//!
//! 1. 从Core解析配置实体，不存在即永久失败
//! 2. 按配置的 `type` 查找处理器，未注册即永久失败
//! 3. 在单次尝试超时内执行处理器
//!
//! 带 `countdown` 的演示任务先等待指定秒数再开始第一次尝试。
//! 非永久性失败按固定间隔重试，软跳过按成功上报。

use std::sync::Arc;
use std::time::{Duration, Instant};

use scheduler_core::{
    config::WorkerConfig,
    logging::task_span,
    models::{JobOptions, ResultReport, TaskExecutionMessage, TaskKind, TaskRequest, TaskStatus},
    traits::{CoreClient, ResultReporter, TaskContext},
    SchedulerError, SchedulerResult,
};
use scheduler_infrastructure::{MetricsCollector, StructuredLogger};
use serde_json::Value;
use tracing::{debug, info, warn, Instrument};
use uuid::Uuid;

use crate::handlers::HandlerRegistry;

/// Worker级别的重试默认值
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowSettings {
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl From<&WorkerConfig> for FlowSettings {
    fn from(config: &WorkerConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            retry_delay: Duration::from_secs(config.retry_delay_seconds),
        }
    }
}

/// 单次执行生效的重试策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub timeout: Duration,
}

impl RetryPolicy {
    /// 任务定义中的 `job_options` 覆盖Worker默认值和种类默认超时
    pub fn resolve(settings: &FlowSettings, kind: TaskKind, options: &JobOptions) -> Self {
        Self {
            max_retries: options.max_retries.unwrap_or(settings.max_retries),
            retry_delay: options
                .retry_delay_seconds
                .map(Duration::from_secs)
                .unwrap_or(settings.retry_delay),
            timeout: options
                .timeout_seconds
                .map(Duration::from_secs)
                .unwrap_or_else(|| kind.default_timeout()),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

/// 一次执行（含全部重试）的最终结果
#[derive(Debug, Clone, PartialEq)]
pub struct FlowOutcome {
    pub task_id: String,
    pub run_id: String,
    pub status: TaskStatus,
    pub result: Value,
    pub attempts: u32,
    pub soft_skipped: bool,
}

pub struct TaskFlow {
    core: Arc<dyn CoreClient>,
    handlers: Arc<HandlerRegistry>,
    reporter: Arc<dyn ResultReporter>,
    settings: FlowSettings,
    metrics: Arc<MetricsCollector>,
}

impl TaskFlow {
    pub fn new(
        core: Arc<dyn CoreClient>,
        handlers: Arc<HandlerRegistry>,
        reporter: Arc<dyn ResultReporter>,
        settings: FlowSettings,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            core,
            handlers,
            reporter,
            settings,
            metrics,
        }
    }

    /// 执行一条队列消息
    pub async fn run(&self, message: &TaskExecutionMessage) -> FlowOutcome {
        match TaskRequest::from_job(&message.func_path, &message.args, &message.kwargs) {
            Ok(request) => self.execute(request, &message.job_options).await,
            Err(e) => {
                // 消息本身不合法，无法推导task_id，用任务ID代替
                warn!(job_id = %message.job_id, func_path = %message.func_path, "无效的任务消息: {}", e);
                let outcome = FlowOutcome {
                    task_id: message.job_id.clone(),
                    run_id: Uuid::new_v4().to_string(),
                    status: TaskStatus::Failure,
                    result: Value::String(e.to_string()),
                    attempts: 0,
                    soft_skipped: false,
                };
                self.report(&outcome, &message.func_path).await;
                outcome
            }
        }
    }

    /// 执行一个类型化请求，结果总会被上报
    pub async fn execute(&self, request: TaskRequest, options: &JobOptions) -> FlowOutcome {
        let task_id = request.task_id();
        let run_id = Uuid::new_v4().to_string();
        let kind = request.kind();
        let span = task_span(&task_id, &run_id, kind.as_str());

        async move {
            let policy = RetryPolicy::resolve(&self.settings, kind, options);
            if let Some(delay) = request.start_delay() {
                debug!("{}秒后开始执行", delay.as_secs());
                tokio::time::sleep(delay).await;
            }
            let started = Instant::now();
            let outcome = self.execute_with_retry(&request, task_id, run_id, policy).await;
            let elapsed = started.elapsed();

            self.metrics
                .record_task_outcome(kind.as_str(), outcome.status.as_str(), elapsed.as_secs_f64());
            StructuredLogger::log_task_finished(
                &outcome.task_id,
                outcome.status.as_str(),
                outcome.attempts,
                elapsed.as_millis(),
            );

            if outcome.status == TaskStatus::Success
                && !outcome.soft_skipped
                && kind.triggers_notification()
            {
                self.notify(kind, &outcome.task_id).await;
            }

            self.report(&outcome, kind.func_name()).await;
            outcome
        }
        .instrument(span)
        .await
    }

    async fn execute_with_retry(
        &self,
        request: &TaskRequest,
        task_id: String,
        run_id: String,
        policy: RetryPolicy,
    ) -> FlowOutcome {
        let kind = request.kind();
        let max_attempts = policy.max_attempts();
        let mut attempt = 0;

        let (status, result, soft_skipped) = loop {
            attempt += 1;
            self.metrics.record_task_attempt(kind.as_str());

            let error = match self
                .attempt(request, &task_id, &run_id, attempt, policy.timeout)
                .await
            {
                Ok(result) => break (TaskStatus::Success, result, false),
                Err(SchedulerError::SoftSkip(message)) => {
                    info!("任务无需执行: {}", message);
                    break (TaskStatus::Success, Value::String(message), true);
                }
                Err(e) => e,
            };

            if error.is_permanent() {
                warn!(attempt = attempt, "任务前置条件失败，不再重试: {}", error);
                break (TaskStatus::Failure, Value::String(error.to_string()), false);
            }

            StructuredLogger::log_attempt_failed(&task_id, attempt, max_attempts, &error.to_string());
            if attempt >= max_attempts {
                break (TaskStatus::Failure, Value::String(error.to_string()), false);
            }

            debug!("{}秒后重试", policy.retry_delay.as_secs_f64());
            tokio::time::sleep(policy.retry_delay).await;
        };

        FlowOutcome {
            task_id,
            run_id,
            status,
            result,
            attempts: attempt,
            soft_skipped,
        }
    }

    async fn attempt(
        &self,
        request: &TaskRequest,
        task_id: &str,
        run_id: &str,
        attempt: u32,
        timeout: Duration,
    ) -> SchedulerResult<Value> {
        let run = async {
            let kind = request.kind();
            let config_id = request.config_id();
            let config = self
                .core
                .fetch_config(kind, config_id)
                .await?
                .ok_or_else(|| SchedulerError::not_found(kind.as_str(), config_id))?;

            let type_name = config
                .get("type")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let handler = self.handlers.resolve(kind, &type_name)?;
            debug!(handler = %type_name, attempt = attempt, "开始执行任务");

            let context = TaskContext {
                task_id: task_id.to_string(),
                run_id: run_id.to_string(),
                request: request.clone(),
                config,
                attempt,
            };
            handler.execute(&context).await
        };

        match tokio::time::timeout(timeout, run).await {
            Ok(result) => result,
            Err(_) => Err(SchedulerError::ExecutionTimeout {
                seconds: timeout.as_secs(),
            }),
        }
    }

    async fn notify(&self, kind: TaskKind, task_id: &str) {
        let event = format!("{}_completed", kind.as_str());
        if let Err(e) = self.core.notify(&event).await {
            warn!(task_id = %task_id, "推送通知失败: {}", e);
        }
    }

    async fn report(&self, outcome: &FlowOutcome, task_name: &str) {
        let report = ResultReport::new(&outcome.task_id, outcome.status, outcome.result.clone())
            .with_task(task_name)
            .with_run_id(&outcome.run_id);

        if let Err(e) = self.reporter.report(&report).await {
            StructuredLogger::log_report_failed(&outcome.task_id, &e.to_string());
        }
    }
}
