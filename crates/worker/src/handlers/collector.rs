//! 基于HTTP的采集器
//!
//! 使用源上次采集时保存的 ETag / Last-Modified 做条件请求；
//! 返回304或内容摘要未变化时按软跳过处理。

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{HeaderName, ETAG, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED};
use reqwest::StatusCode;
use scheduler_core::{
    models::{TaskKind, TaskRequest},
    traits::{CoreClient, TaskContext, TaskHandler},
    SchedulerError, SchedulerResult,
};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use super::{required_setting, unexpected_request};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectorFormat {
    /// RSS/Atom订阅，按条目计数
    Rss,
    /// 普通网页，整页作为一条内容
    Web,
}

/// 源的上次采集状态，由Core随配置一起返回
#[derive(Debug, Default, Clone, PartialEq)]
struct SourceState {
    etag: Option<String>,
    last_modified: Option<String>,
    content_digest: Option<String>,
}

impl SourceState {
    fn from_config(config: &Value) -> Self {
        let field = |key: &str| {
            config
                .get("state")
                .and_then(|state| state.get(key))
                .and_then(Value::as_str)
                .map(str::to_string)
        };
        Self {
            etag: field("etag"),
            last_modified: field("last_modified"),
            content_digest: field("content_digest"),
        }
    }
}

pub struct WebCollector {
    name: &'static str,
    format: CollectorFormat,
    core: Arc<dyn CoreClient>,
    http: reqwest::Client,
}

impl WebCollector {
    pub fn new(
        name: &'static str,
        format: CollectorFormat,
        core: Arc<dyn CoreClient>,
        http: reqwest::Client,
    ) -> Self {
        Self {
            name,
            format,
            core,
            http,
        }
    }

    fn count_items(&self, body: &str) -> usize {
        match self.format {
            CollectorFormat::Rss => body.matches("<item").count() + body.matches("<entry").count(),
            CollectorFormat::Web => usize::from(!body.trim().is_empty()),
        }
    }
}

pub(crate) fn content_digest(body: &str) -> String {
    let digest = Sha256::digest(body.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

fn unchanged(source_id: &str) -> SchedulerError {
    SchedulerError::SoftSkip(format!("源 {source_id} 自上次采集以来未发生变化"))
}

#[async_trait]
impl TaskHandler for WebCollector {
    fn name(&self) -> &str {
        self.name
    }

    fn kind(&self) -> TaskKind {
        TaskKind::Collector
    }

    async fn execute(&self, context: &TaskContext) -> SchedulerResult<Value> {
        let TaskRequest::Collector(task) = &context.request else {
            return Err(unexpected_request(self.name, context));
        };
        let url = required_setting(context, "url")?;
        let state = SourceState::from_config(&context.config);

        // 手动触发忽略上次的采集状态
        let mut request = self.http.get(url);
        if !task.manual {
            if let Some(etag) = &state.etag {
                request = request.header(IF_NONE_MATCH, etag);
            }
            if let Some(last_modified) = &state.last_modified {
                request = request.header(IF_MODIFIED_SINCE, last_modified);
            }
        }

        let response = request
            .send()
            .await
            .map_err(|e| SchedulerError::Network(format!("采集 {url} 失败: {e}")))?;

        if response.status() == StatusCode::NOT_MODIFIED {
            debug!(source_id = %task.source_id, "源返回304");
            return Err(unchanged(&task.source_id));
        }
        if !response.status().is_success() {
            return Err(SchedulerError::TaskExecution(format!(
                "采集 {url} 返回 HTTP {}",
                response.status()
            )));
        }

        let header = |name: HeaderName| {
            response
                .headers()
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
        };
        let etag = header(ETAG);
        let last_modified = header(LAST_MODIFIED);
        let body = response.text().await?;

        let digest = content_digest(&body);
        if !task.manual && state.content_digest.as_deref() == Some(digest.as_str()) {
            debug!(source_id = %task.source_id, "内容摘要未变化");
            return Err(unchanged(&task.source_id));
        }

        let items = self.count_items(&body);
        self.core
            .submit_collected(
                &task.source_id,
                &json!({
                    "content": body,
                    "items": items,
                    "manual": task.manual,
                    "state": {
                        "etag": etag,
                        "last_modified": last_modified,
                        "content_digest": digest,
                    },
                }),
            )
            .await?;

        info!(source_id = %task.source_id, items = items, "采集完成");
        Ok(Value::String(format!(
            "源 {} 采集完成，共 {} 条内容",
            task.source_id, items
        )))
    }
}
