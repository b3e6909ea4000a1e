use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::{JobOptions, JobSpec};

/// 调度器交给Worker的任务执行消息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskExecutionMessage {
    pub message_id: String,
    pub job_id: String,
    pub queue_name: String,
    pub func_path: String,
    #[serde(default)]
    pub args: Vec<Value>,
    #[serde(default)]
    pub kwargs: Map<String, Value>,
    #[serde(default)]
    pub job_options: JobOptions,
    pub enqueued_at: DateTime<Utc>,
}

impl TaskExecutionMessage {
    pub fn from_job(job: &JobSpec) -> Self {
        Self {
            message_id: Uuid::new_v4().to_string(),
            job_id: job.id.clone(),
            queue_name: job.queue_name.clone(),
            func_path: job.func_path.clone(),
            args: job.args.clone(),
            kwargs: job.kwargs.clone(),
            job_options: job.job_options.clone(),
            enqueued_at: Utc::now(),
        }
    }

    /// 不属于任何周期任务的按需执行
    pub fn on_demand(
        queue_name: impl Into<String>,
        func_path: impl Into<String>,
        args: Vec<Value>,
    ) -> Self {
        let message_id = Uuid::new_v4().to_string();
        Self {
            job_id: format!("on-demand-{message_id}"),
            message_id,
            queue_name: queue_name.into(),
            func_path: func_path.into(),
            args,
            kwargs: Map::new(),
            job_options: JobOptions::default(),
            enqueued_at: Utc::now(),
        }
    }

    pub fn to_json(&self) -> crate::SchedulerResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(raw: &str) -> crate::SchedulerResult<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}
