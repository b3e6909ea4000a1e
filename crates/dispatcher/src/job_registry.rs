//! 任务注册表
//!
//! 原始任务定义存放在 [`JobStore`] 中，调度器在内存中持有一份规范化后的
//! 任务表。重载时整表替换，不做增量合并。

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::{debug, info};

use scheduler_core::{
    models::{
        JobOptions, JobSpec, Trigger, DEFAULT_JOB_INTERVAL_SECONDS, MAX_JOB_INTERVAL_SECONDS,
    },
    traits::{JobStore, ReloadChannel},
    SchedulerError, SchedulerResult,
};
use scheduler_infrastructure::StructuredLogger;

/// 规范化一条原始任务定义
///
/// 同时接受规范字段（`queue_name`、`func_path`）和旧字段（`queue`、`task`），
/// 两种写法得到相同的结果。`key` 是记录在注册表中的键，记录本身没有 `id`
/// 时使用它。
pub fn normalize_spec(key: &str, raw: &Value) -> SchedulerResult<JobSpec> {
    let record = raw
        .as_object()
        .ok_or_else(|| invalid(key, "任务定义必须是JSON对象"))?;

    let id = non_empty_str(record, "id").unwrap_or(key).to_string();
    if id.is_empty() {
        return Err(invalid(key, "缺少任务ID"));
    }

    let queue_name = non_empty_str(record, "queue_name")
        .or_else(|| non_empty_str(record, "queue"))
        .ok_or_else(|| invalid(&id, "缺少 queue_name/queue"))?
        .to_string();
    let func_path = non_empty_str(record, "func_path")
        .or_else(|| non_empty_str(record, "task"))
        .ok_or_else(|| invalid(&id, "缺少 func_path/task"))?
        .to_string();

    let args = match record.get("args") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.clone(),
        Some(_) => return Err(invalid(&id, "args 必须是数组")),
    };
    let kwargs = object_field(record, "kwargs").map_err(|m| invalid(&id, m))?;
    let meta = object_field(record, "meta").map_err(|m| invalid(&id, m))?;
    let job_options = match record.get("job_options") {
        None | Some(Value::Null) => JobOptions::default(),
        Some(value) => serde_json::from_value(value.clone())
            .map_err(|e| invalid(&id, &format!("job_options 无效: {e}")))?,
    };
    let trigger = parse_trigger(&id, record)?;

    Ok(JobSpec {
        id,
        queue_name,
        func_path,
        args,
        kwargs,
        job_options,
        meta,
        trigger,
    })
}

fn invalid(id: &str, message: &str) -> SchedulerError {
    SchedulerError::InvalidJobSpec(format!("{id}: {message}"))
}

fn non_empty_str<'a>(record: &'a Map<String, Value>, field: &str) -> Option<&'a str> {
    record
        .get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn object_field(record: &Map<String, Value>, field: &str) -> Result<Map<String, Value>, &'static str> {
    match record.get(field) {
        None | Some(Value::Null) => Ok(Map::new()),
        Some(Value::Object(map)) => Ok(map.clone()),
        Some(_) => Err("kwargs/meta 必须是对象"),
    }
}

/// 触发器可以写在顶层（`interval`、`cron`），也可以嵌套在 `trigger` 中
fn parse_trigger(id: &str, record: &Map<String, Value>) -> SchedulerResult<Trigger> {
    let source = match record.get("trigger") {
        Some(Value::Object(nested)) => nested,
        Some(Value::Null) | None => record,
        Some(_) => return Err(invalid(id, "trigger 必须是对象")),
    };

    if let Some(interval) = source.get("interval") {
        let seconds = match interval {
            Value::Object(inner) => inner.get("seconds").and_then(Value::as_u64),
            other => other.as_u64(),
        }
        .ok_or_else(|| invalid(id, "interval 必须是正整数秒"))?;
        if seconds == 0 {
            return Err(invalid(id, "interval 必须大于0"));
        }
        if seconds > MAX_JOB_INTERVAL_SECONDS {
            return Err(invalid(
                id,
                &format!("interval 不能超过 {MAX_JOB_INTERVAL_SECONDS} 秒"),
            ));
        }
        return Ok(Trigger::interval(seconds));
    }

    if let Some(cron) = source.get("cron") {
        let expression = match cron {
            Value::Object(inner) => inner.get("expression").and_then(Value::as_str),
            other => other.as_str(),
        }
        .ok_or_else(|| invalid(id, "cron 必须是字符串"))?;
        return Trigger::cron(expression);
    }

    Ok(Trigger::interval(DEFAULT_JOB_INTERVAL_SECONDS))
}

/// 规范化后的内存任务表
///
/// 读者拿到的是一份 `Arc` 快照，重载时整体替换，tick 循环和重载监听器之间
/// 只通过这一把锁协作。
pub struct JobRegistry {
    store: Arc<dyn JobStore>,
    jobs: RwLock<Arc<HashMap<String, JobSpec>>>,
}

impl JobRegistry {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self {
            store,
            jobs: RwLock::new(Arc::new(HashMap::new())),
        }
    }

    /// 从存储重新读取全部任务定义并整表替换，返回有效任务数
    pub async fn reload(&self) -> SchedulerResult<usize> {
        let definitions = self.store.load_definitions().await?;
        let mut jobs = HashMap::with_capacity(definitions.len());

        for (key, raw) in definitions {
            match normalize_spec(&key, &raw) {
                Ok(spec) => {
                    debug!(job_id = %spec.id, trigger = %spec.trigger.describe(), "加载任务: {}", spec.display_name());
                    jobs.insert(spec.id.clone(), spec);
                }
                Err(e) => StructuredLogger::log_job_rejected(&key, &e.to_string()),
            }
        }

        let count = jobs.len();
        *self.jobs.write().await = Arc::new(jobs);
        info!("任务表已加载，共 {} 个任务", count);
        Ok(count)
    }

    pub async fn snapshot(&self) -> Arc<HashMap<String, JobSpec>> {
        self.jobs.read().await.clone()
    }

    pub async fn get(&self, id: &str) -> Option<JobSpec> {
        self.jobs.read().await.get(id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }
}

/// 任务定义的生产者接口
///
/// 每次写入之后都会发布重载信号，保证所有调度器实例最终一致。
pub struct JobRegistryWriter {
    store: Arc<dyn JobStore>,
    reload_channel: Arc<dyn ReloadChannel>,
}

impl JobRegistryWriter {
    pub fn new(store: Arc<dyn JobStore>, reload_channel: Arc<dyn ReloadChannel>) -> Self {
        Self {
            store,
            reload_channel,
        }
    }

    /// 注册或替换一个任务定义
    pub async fn register_job(&self, raw: &Value) -> SchedulerResult<JobSpec> {
        let id = raw
            .get("id")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| SchedulerError::InvalidJobSpec("缺少任务ID".to_string()))?;
        let spec = normalize_spec(id, raw)?;

        self.store.put_definition(&spec.id, raw).await?;
        self.reload_channel
            .publish(&format!("job registered: {}", spec.id))
            .await?;

        info!(job_id = %spec.id, queue = %spec.queue_name, "任务定义已注册");
        Ok(spec)
    }

    /// 删除任务定义及其索引项，返回任务是否存在
    pub async fn remove_job(&self, id: &str) -> SchedulerResult<bool> {
        let existed = self.store.delete_definition(id).await?;
        self.store.remove_next_run(id).await?;
        self.reload_channel
            .publish(&format!("job removed: {id}"))
            .await?;

        info!(job_id = %id, existed, "任务定义已删除");
        Ok(existed)
    }
}
