use std::sync::Arc;

use async_trait::async_trait;
use scheduler_core::{
    models::{TaskKind, TaskRequest},
    traits::{CoreClient, TaskContext, TaskHandler},
    SchedulerError, SchedulerResult,
};
use serde_json::{json, Value};
use tracing::info;

use super::{required_setting, send_checked, unexpected_request};

/// 把已渲染的产品推送到Webhook
pub struct WebhookPublisher {
    core: Arc<dyn CoreClient>,
    http: reqwest::Client,
}

impl WebhookPublisher {
    pub fn new(core: Arc<dyn CoreClient>, http: reqwest::Client) -> Self {
        Self { core, http }
    }
}

#[async_trait]
impl TaskHandler for WebhookPublisher {
    fn name(&self) -> &str {
        "webhook_publisher"
    }

    fn kind(&self) -> TaskKind {
        TaskKind::Publisher
    }

    async fn execute(&self, context: &TaskContext) -> SchedulerResult<Value> {
        let TaskRequest::Publisher(task) = &context.request else {
            return Err(unexpected_request(self.name(), context));
        };
        let url = required_setting(context, "url")?;

        // 渲染结果可能尚未生成，按可重试失败处理
        let render = self
            .core
            .fetch_product_render(&task.product_id)
            .await?
            .filter(|render| render.get("render_result").and_then(Value::as_str).is_some())
            .ok_or_else(|| {
                SchedulerError::TaskExecution(format!("产品 {} 尚无渲染结果", task.product_id))
            })?;

        send_checked(
            self.http.post(url).json(&json!({
                "product_id": task.product_id,
                "publisher_id": task.publisher_id,
                "render_result": render.get("render_result"),
                "mime_type": render.get("mime_type"),
            })),
            url,
        )
        .await?;

        info!(
            product_id = %task.product_id,
            publisher_id = %task.publisher_id,
            "产品已发布"
        );
        Ok(Value::String(format!(
            "产品 {} 已通过 {} 发布",
            task.product_id, task.publisher_id
        )))
    }
}
