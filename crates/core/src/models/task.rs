use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{SchedulerError, SchedulerResult};

/// 任务种类，决定使用哪类处理器
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Bot,
    Collector,
    Connector,
    Presenter,
    Publisher,
    WordListGather,
}

impl TaskKind {
    pub const ALL: [TaskKind; 6] = [
        TaskKind::Bot,
        TaskKind::Collector,
        TaskKind::Connector,
        TaskKind::Presenter,
        TaskKind::Publisher,
        TaskKind::WordListGather,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Bot => "bot",
            TaskKind::Collector => "collector",
            TaskKind::Connector => "connector",
            TaskKind::Presenter => "presenter",
            TaskKind::Publisher => "publisher",
            TaskKind::WordListGather => "word_list",
        }
    }

    /// 队列消息中 `func_path` 使用的函数名
    pub fn func_name(&self) -> &'static str {
        match self {
            TaskKind::Bot => "bot_task",
            TaskKind::Collector => "collector_task",
            TaskKind::Connector => "connector_task",
            TaskKind::Presenter => "presenter_task",
            TaskKind::Publisher => "publisher_task",
            TaskKind::WordListGather => "gather_word_list",
        }
    }

    /// task_id 前缀，同时用作结果路由的类型判别
    pub fn task_id_prefix(&self) -> &'static str {
        match self {
            TaskKind::Bot => "bot_",
            TaskKind::Collector => "source_",
            TaskKind::Connector => "connector_",
            TaskKind::Presenter => "presenter_",
            TaskKind::Publisher => "publisher_",
            TaskKind::WordListGather => "gather_word_list_",
        }
    }

    /// Core中该类配置实体的资源路径
    pub fn config_resource(&self) -> &'static str {
        match self {
            TaskKind::Bot => "bots",
            TaskKind::Collector => "sources",
            TaskKind::Connector => "connectors",
            TaskKind::Presenter => "products",
            TaskKind::Publisher => "publishers",
            TaskKind::WordListGather => "word-lists",
        }
    }

    /// 单次尝试的默认超时：NLP/采集类以小时计，元数据类以秒计
    pub fn default_timeout(&self) -> Duration {
        match self {
            TaskKind::Bot => Duration::from_secs(2 * 60 * 60),
            TaskKind::Collector => Duration::from_secs(60 * 60),
            TaskKind::Connector => Duration::from_secs(10 * 60),
            TaskKind::Publisher => Duration::from_secs(5 * 60),
            TaskKind::Presenter => Duration::from_secs(60),
            TaskKind::WordListGather => Duration::from_secs(60),
        }
    }

    /// 成功后是否会改变对外可见的数据集合（需要触发推送通知）
    pub fn triggers_notification(&self) -> bool {
        matches!(
            self,
            TaskKind::Collector | TaskKind::Bot | TaskKind::Connector
        )
    }

    /// 从 `func_path` 解析任务种类，忽略点号分隔的模块前缀
    pub fn from_func_path(func_path: &str) -> Option<Self> {
        let name = func_path.rsplit('.').next().unwrap_or(func_path);
        match name {
            "bot_task" | "bot" => Some(TaskKind::Bot),
            "collector_task" | "collect" | "collector" => Some(TaskKind::Collector),
            "connector_task" | "connector" => Some(TaskKind::Connector),
            "presenter_task" | "presenter" => Some(TaskKind::Presenter),
            "publisher_task" | "publisher" => Some(TaskKind::Publisher),
            "gather_word_list" | "word_list" => Some(TaskKind::WordListGather),
            _ => None,
        }
    }

    /// 根据 task_id 前缀判断任务种类
    pub fn from_task_id(task_id: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| task_id.starts_with(kind.task_id_prefix()))
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BotTask {
    pub bot_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectorTask {
    pub source_id: String,
    /// 预览/手动触发
    #[serde(default)]
    pub manual: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectorTask {
    pub connector_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub story_ids: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenterTask {
    pub product_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub countdown: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublisherTask {
    pub product_id: String,
    pub publisher_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordListTask {
    pub word_list_id: String,
}

/// 单个工作单元的类型化请求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskRequest {
    Bot(BotTask),
    Collector(CollectorTask),
    Connector(ConnectorTask),
    Presenter(PresenterTask),
    Publisher(PublisherTask),
    WordListGather(WordListTask),
}

impl TaskRequest {
    pub fn kind(&self) -> TaskKind {
        match self {
            TaskRequest::Bot(_) => TaskKind::Bot,
            TaskRequest::Collector(_) => TaskKind::Collector,
            TaskRequest::Connector(_) => TaskKind::Connector,
            TaskRequest::Presenter(_) => TaskKind::Presenter,
            TaskRequest::Publisher(_) => TaskKind::Publisher,
            TaskRequest::WordListGather(_) => TaskKind::WordListGather,
        }
    }

    /// 需要从Core解析配置的实体ID
    pub fn config_id(&self) -> &str {
        match self {
            TaskRequest::Bot(t) => &t.bot_id,
            TaskRequest::Collector(t) => &t.source_id,
            TaskRequest::Connector(t) => &t.connector_id,
            TaskRequest::Presenter(t) => &t.product_id,
            TaskRequest::Publisher(t) => &t.publisher_id,
            TaskRequest::WordListGather(t) => &t.word_list_id,
        }
    }

    /// 关联请求与结果的task_id，带种类前缀
    pub fn task_id(&self) -> String {
        let prefix = self.kind().task_id_prefix();
        match self {
            TaskRequest::Publisher(t) => {
                format!("{prefix}{}_{}", t.product_id, t.publisher_id)
            }
            _ => format!("{prefix}{}", self.config_id()),
        }
    }

    /// 首次尝试前的等待时间，目前只有演示任务支持 `countdown`
    pub fn start_delay(&self) -> Option<Duration> {
        match self {
            TaskRequest::Presenter(t) => t.countdown.filter(|s| *s > 0).map(Duration::from_secs),
            _ => None,
        }
    }

    /// 根据队列中的任务（func_path + args + kwargs）构建请求
    pub fn from_job(
        func_path: &str,
        args: &[Value],
        kwargs: &Map<String, Value>,
    ) -> SchedulerResult<Self> {
        let kind = TaskKind::from_func_path(func_path).ok_or_else(|| {
            SchedulerError::not_implemented("task", func_path.to_string())
        })?;

        let request = match kind {
            TaskKind::Bot => TaskRequest::Bot(BotTask {
                bot_id: id_arg(args, 0, "bot_id")?,
                filter: kwargs.get("filter").and_then(Value::as_object).cloned(),
            }),
            TaskKind::Collector => TaskRequest::Collector(CollectorTask {
                source_id: id_arg(args, 0, "source_id")?,
                manual: kwargs
                    .get("manual")
                    .or_else(|| kwargs.get("preview"))
                    .and_then(Value::as_bool)
                    .unwrap_or(false),
            }),
            TaskKind::Connector => TaskRequest::Connector(ConnectorTask {
                connector_id: id_arg(args, 0, "connector_id")?,
                story_ids: kwargs.get("story_ids").and_then(Value::as_array).map(|ids| {
                    ids.iter().filter_map(value_to_id).collect::<Vec<_>>()
                }),
            }),
            TaskKind::Presenter => TaskRequest::Presenter(PresenterTask {
                product_id: id_arg(args, 0, "product_id")?,
                countdown: kwargs.get("countdown").and_then(Value::as_u64),
            }),
            TaskKind::Publisher => TaskRequest::Publisher(PublisherTask {
                product_id: id_arg(args, 0, "product_id")?,
                publisher_id: id_arg(args, 1, "publisher_id")?,
            }),
            TaskKind::WordListGather => TaskRequest::WordListGather(WordListTask {
                word_list_id: id_arg(args, 0, "word_list_id")?,
            }),
        };

        Ok(request)
    }
}

fn value_to_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn id_arg(args: &[Value], index: usize, name: &str) -> SchedulerResult<String> {
    args.get(index).and_then(value_to_id).ok_or_else(|| {
        SchedulerError::InvalidTaskParams(format!("缺少参数 {name}（位置 {index}）"))
    })
}

/// 任务状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskStatus {
    #[serde(rename = "SUCCESS")]
    Success,
    #[serde(rename = "FAILURE")]
    Failure,
    #[serde(rename = "PENDING")]
    Pending,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Success => "SUCCESS",
            TaskStatus::Failure => "FAILURE",
            TaskStatus::Pending => "PENDING",
        }
    }

    pub fn parse(value: &str) -> SchedulerResult<Self> {
        match value {
            "SUCCESS" => Ok(TaskStatus::Success),
            "FAILURE" => Ok(TaskStatus::Failure),
            "PENDING" => Ok(TaskStatus::Pending),
            other => Err(SchedulerError::Serialization(format!(
                "无效的任务状态: {other}"
            ))),
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskStatus::Pending)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 结果上报请求体
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultReport {
    #[serde(alias = "id")]
    pub task_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task: Option<String>,
    pub status: TaskStatus,
    #[serde(default)]
    pub result: Value,
    /// 同一次执行的重复上报共享 run_id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
}

impl ResultReport {
    pub fn new(task_id: impl Into<String>, status: TaskStatus, result: Value) -> Self {
        Self {
            task_id: task_id.into(),
            task: None,
            status,
            result,
            run_id: None,
        }
    }

    pub fn with_task(mut self, task: impl Into<String>) -> Self {
        self.task = Some(task.into());
        self
    }

    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }
}

/// 持久化的任务记录，按task_id唯一
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub task_id: String,
    pub task: Option<String>,
    pub status: TaskStatus,
    pub result: Value,
    pub last_change: DateTime<Utc>,
    pub last_success: Option<DateTime<Utc>>,
}

impl TaskResult {
    /// 未知task_id的查询结果
    pub fn pending(task_id: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            task: None,
            status: TaskStatus::Pending,
            result: Value::Null,
            last_change: Utc::now(),
            last_success: None,
        }
    }
}

/// 历史运行统计
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TaskRunStatistics {
    pub successes: u64,
    pub failures: u64,
    pub total: u64,
    pub success_pct: Option<f64>,
}

impl TaskRunStatistics {
    pub fn from_counts(successes: u64, failures: u64) -> Self {
        let total = successes + failures;
        let success_pct = if total > 0 {
            Some(successes as f64 * 100.0 / total as f64)
        } else {
            None
        };
        Self {
            successes,
            failures,
            total,
            success_pct,
        }
    }

    pub fn success_pct_or_derived(&self) -> f64 {
        match self.success_pct {
            Some(pct) => pct,
            None if self.total > 0 => self.successes as f64 * 100.0 / self.total as f64,
            None => 0.0,
        }
    }
}
