//! 通过HTTP把结果上报给结果接收端

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use scheduler_core::{
    config::WorkerConfig,
    models::{ResultReport, TaskResult},
    traits::ResultReporter,
    SchedulerError, SchedulerResult,
};
use serde_json::Value;
use tracing::{debug, warn};

pub struct HttpResultReporter {
    endpoint: String,
    attempts: u32,
    retry_delay: Duration,
    http_client: reqwest::Client,
}

impl HttpResultReporter {
    pub fn new(config: &WorkerConfig) -> SchedulerResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| SchedulerError::Configuration(format!("创建HTTP客户端失败: {e}")))?;

        Ok(Self {
            endpoint: config.result_endpoint.trim_end_matches('/').to_string(),
            attempts: config.report_retry_attempts.max(1),
            retry_delay: Duration::from_secs(config.report_retry_delay_seconds),
            http_client,
        })
    }

    async fn send_once(&self, report: &ResultReport) -> SchedulerResult<StatusCode> {
        let response = self
            .http_client
            .post(&self.endpoint)
            .json(report)
            .send()
            .await
            .map_err(|e| SchedulerError::Network(format!("结果上报失败: {e}")))?;

        let status = response.status();
        if status.is_success() {
            return Ok(status);
        }
        let body = response.text().await.unwrap_or_default();
        Err(SchedulerError::Network(format!(
            "结果上报失败: HTTP {status} - {body}"
        )))
    }
}

#[async_trait]
impl ResultReporter for HttpResultReporter {
    async fn report(&self, report: &ResultReport) -> SchedulerResult<()> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.send_once(report).await {
                Ok(status) => {
                    debug!(task_id = %report.task_id, status = %status, "结果已上报");
                    return Ok(());
                }
                Err(e) if attempt < self.attempts => {
                    warn!(
                        task_id = %report.task_id,
                        attempt = attempt,
                        "结果上报失败，稍后重试: {}",
                        e
                    );
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn query(&self, task_id: &str) -> SchedulerResult<TaskResult> {
        let url = format!("{}/{}", self.endpoint, task_id);
        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| SchedulerError::Network(format!("查询任务状态失败: {e}")))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(TaskResult::pending(task_id));
        }
        if !response.status().is_success() {
            return Err(SchedulerError::Network(format!(
                "查询任务状态失败: HTTP {}",
                response.status()
            )));
        }

        let body: Value = response.json().await?;
        // 未知任务只返回 {"status": "PENDING"}
        Ok(serde_json::from_value(body).unwrap_or_else(|_| TaskResult::pending(task_id)))
    }
}
