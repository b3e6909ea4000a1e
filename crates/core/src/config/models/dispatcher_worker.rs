use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatcherConfig {
    pub enabled: bool,
    /// 没有到期任务时的轮询间隔（毫秒）
    pub poll_interval_ms: u64,
    /// 周期性全量重同步间隔（秒），0表示只依赖重载信号
    pub resync_interval_seconds: u64,
    /// 重载通道订阅失败后的重试间隔（秒）
    pub reload_retry_seconds: u64,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval_ms: 1000,
            resync_interval_seconds: 300,
            reload_retry_seconds: 5,
        }
    }
}

impl DispatcherConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(anyhow::anyhow!("调度轮询间隔必须大于0"));
        }

        if self.reload_retry_seconds == 0 {
            return Err(anyhow::anyhow!("重载重试间隔必须大于0"));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    pub enabled: bool,
    pub worker_id: String,
    /// 消费的队列名
    pub queues: Vec<String>,
    pub max_concurrent_tasks: usize,
    /// 单次阻塞取消息的等待时间（秒）
    pub poll_timeout_seconds: u64,
    pub max_retries: u32,
    pub retry_delay_seconds: u64,
    /// 结果接收端点
    pub result_endpoint: String,
    pub report_retry_attempts: u32,
    pub report_retry_delay_seconds: u64,
}

/// 默认Worker ID取主机名，多实例部署时通过配置覆盖
fn default_worker_id() -> String {
    hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok())
        .map(|name| format!("worker-{name}"))
        .unwrap_or_else(|| "worker-001".to_string())
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            worker_id: default_worker_id(),
            queues: vec![
                "bots".to_string(),
                "collectors".to_string(),
                "connectors".to_string(),
                "presenters".to_string(),
                "publishers".to_string(),
                "misc".to_string(),
            ],
            max_concurrent_tasks: 4,
            poll_timeout_seconds: 5,
            max_retries: 3,
            retry_delay_seconds: 60,
            result_endpoint: "http://localhost:8080/api/tasks".to_string(),
            report_retry_attempts: 3,
            report_retry_delay_seconds: 2,
        }
    }
}

impl WorkerConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.worker_id.is_empty() {
            return Err(anyhow::anyhow!("Worker ID不能为空"));
        }

        if self.queues.is_empty() {
            return Err(anyhow::anyhow!("Worker至少需要消费一个队列"));
        }

        if self.max_concurrent_tasks == 0 {
            return Err(anyhow::anyhow!("最大并发任务数必须大于0"));
        }

        if self.poll_timeout_seconds == 0 {
            return Err(anyhow::anyhow!("队列等待时间必须大于0"));
        }

        if self.report_retry_attempts == 0 {
            return Err(anyhow::anyhow!("结果上报尝试次数必须大于0"));
        }

        Ok(())
    }
}
