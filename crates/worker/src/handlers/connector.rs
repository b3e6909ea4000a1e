use std::sync::Arc;

use async_trait::async_trait;
use scheduler_core::{
    models::{TaskKind, TaskRequest},
    traits::{CoreClient, TaskContext, TaskHandler},
    SchedulerError, SchedulerResult,
};
use serde_json::{json, Map, Value};
use tracing::info;

use super::{required_setting, send_checked, story_id, unexpected_request};

/// 把选定条目推送到外部系统的Webhook连接器
pub struct WebhookConnector {
    core: Arc<dyn CoreClient>,
    http: reqwest::Client,
}

impl WebhookConnector {
    pub fn new(core: Arc<dyn CoreClient>, http: reqwest::Client) -> Self {
        Self { core, http }
    }
}

#[async_trait]
impl TaskHandler for WebhookConnector {
    fn name(&self) -> &str {
        "webhook_connector"
    }

    fn kind(&self) -> TaskKind {
        TaskKind::Connector
    }

    async fn execute(&self, context: &TaskContext) -> SchedulerResult<Value> {
        let TaskRequest::Connector(task) = &context.request else {
            return Err(unexpected_request(self.name(), context));
        };
        let url = required_setting(context, "url")?;

        let filter = match &task.story_ids {
            Some(ids) => {
                let mut filter = Map::new();
                filter.insert("ids".to_string(), Value::String(ids.join(",")));
                Some(filter)
            }
            None => context.parameter("filter").and_then(Value::as_object).cloned(),
        };
        let mut stories = self.core.fetch_stories(filter.as_ref()).await?;

        if let Some(ids) = &task.story_ids {
            stories.retain(|story| story_id(story).is_some_and(|id| ids.contains(&id)));
        }
        if stories.is_empty() {
            return Err(SchedulerError::SoftSkip(format!(
                "连接器 {} 没有需要发送的条目",
                task.connector_id
            )));
        }

        send_checked(
            self.http.post(url).json(&json!({
                "connector_id": task.connector_id,
                "stories": stories,
            })),
            url,
        )
        .await?;

        info!(connector_id = %task.connector_id, stories = stories.len(), "条目已推送");
        Ok(Value::String(format!(
            "连接器 {} 已发送 {} 条条目",
            task.connector_id,
            stories.len()
        )))
    }
}
