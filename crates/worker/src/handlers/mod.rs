//! 内置任务处理器与类型注册表
//!
//! 注册表在启动时构建一次，以 `Arc` 注入执行流程。类型名到处理器的映射
//! 是编译期确定的字面量匹配，不做动态加载。

pub mod bot;
pub mod collector;
pub mod connector;
pub mod presenter;
pub mod publisher;
pub mod word_list;

use std::collections::HashMap;
use std::sync::Arc;

use reqwest::{RequestBuilder, Response};
use scheduler_core::{
    models::TaskKind,
    traits::{CoreClient, TaskContext, TaskHandler},
    SchedulerError, SchedulerResult,
};
use serde_json::Value;
use tracing::info;

pub use bot::{BotMode, KeywordBot};
pub use collector::{CollectorFormat, WebCollector};
pub use connector::WebhookConnector;
pub use presenter::{RenderFormat, TemplatePresenter};
pub use publisher::WebhookPublisher;
pub use word_list::WordListGatherer;

/// 内置处理器的类型名
pub const BUILTIN_TYPES: [&str; 10] = [
    "rss_collector",
    "simple_web_collector",
    "wordlist_bot",
    "tagging_bot",
    "webhook_connector",
    "text_presenter",
    "json_presenter",
    "webhook_publisher",
    "word_list",
    "default_word_list",
];

fn builtin_handler(
    type_name: &str,
    core: &Arc<dyn CoreClient>,
    http: &reqwest::Client,
) -> Option<Arc<dyn TaskHandler>> {
    let handler: Arc<dyn TaskHandler> = match type_name {
        "rss_collector" => Arc::new(WebCollector::new(
            "rss_collector",
            CollectorFormat::Rss,
            core.clone(),
            http.clone(),
        )),
        "simple_web_collector" => Arc::new(WebCollector::new(
            "simple_web_collector",
            CollectorFormat::Web,
            core.clone(),
            http.clone(),
        )),
        "wordlist_bot" => Arc::new(KeywordBot::new("wordlist_bot", BotMode::WordList, core.clone())),
        "tagging_bot" => Arc::new(KeywordBot::new("tagging_bot", BotMode::Tagging, core.clone())),
        "webhook_connector" => Arc::new(WebhookConnector::new(core.clone(), http.clone())),
        "text_presenter" => Arc::new(TemplatePresenter::new(
            "text_presenter",
            RenderFormat::Text,
            core.clone(),
        )),
        "json_presenter" => Arc::new(TemplatePresenter::new(
            "json_presenter",
            RenderFormat::Json,
            core.clone(),
        )),
        "webhook_publisher" => Arc::new(WebhookPublisher::new(core.clone(), http.clone())),
        "word_list" => Arc::new(WordListGatherer::new("word_list", http.clone())),
        "default_word_list" => Arc::new(WordListGatherer::new("default_word_list", http.clone())),
        _ => return None,
    };
    Some(handler)
}

/// 类型名 → 处理器映射
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn TaskHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册全部内置处理器
    pub fn builtin(core: Arc<dyn CoreClient>, http: reqwest::Client) -> Self {
        let mut registry = Self::new();
        for type_name in BUILTIN_TYPES {
            if let Some(handler) = builtin_handler(type_name, &core, &http) {
                registry.register(handler);
            }
        }
        info!("已注册 {} 个内置任务处理器", registry.len());
        registry
    }

    pub fn register(&mut self, handler: Arc<dyn TaskHandler>) {
        self.handlers.insert(handler.name().to_string(), handler);
    }

    /// 按配置中的 `type` 查找处理器
    ///
    /// 未注册的类型或种类不匹配都视为未实现，属于永久性失败。
    pub fn resolve(&self, kind: TaskKind, type_name: &str) -> SchedulerResult<Arc<dyn TaskHandler>> {
        match self.handlers.get(type_name) {
            Some(handler) if handler.kind() == kind => Ok(handler.clone()),
            _ => Err(SchedulerError::not_implemented(kind.as_str(), type_name)),
        }
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.handlers.contains_key(type_name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

/// 读取处理器设置：先查 `parameters`，再查配置顶层
pub(crate) fn setting<'a>(context: &'a TaskContext, key: &str) -> Option<&'a str> {
    context
        .parameter(key)
        .and_then(Value::as_str)
        .or_else(|| context.config_str(key))
        .filter(|value| !value.is_empty())
}

pub(crate) fn required_setting<'a>(context: &'a TaskContext, key: &str) -> SchedulerResult<&'a str> {
    setting(context, key).ok_or_else(|| {
        SchedulerError::InvalidTaskParams(format!(
            "{} 配置缺少 {key}",
            context.request.kind()
        ))
    })
}

pub(crate) fn unexpected_request(handler: &str, context: &TaskContext) -> SchedulerError {
    SchedulerError::InvalidTaskParams(format!(
        "处理器 {handler} 不能处理 {} 请求",
        context.request.kind()
    ))
}

/// 条目ID可能是字符串或数字
pub(crate) fn story_id(story: &Value) -> Option<String> {
    match story.get("id")? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub(crate) async fn send_checked(request: RequestBuilder, target: &str) -> SchedulerResult<Response> {
    let response = request
        .send()
        .await
        .map_err(|e| SchedulerError::Network(format!("请求 {target} 失败: {e}")))?;

    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Err(SchedulerError::TaskExecution(format!(
        "{target} 返回 HTTP {status}: {body}"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use scheduler_core::models::{TaskRequest, WordListTask};
    use serde_json::{json, Map};

    struct NoopCore;

    #[async_trait]
    impl CoreClient for NoopCore {
        async fn fetch_config(&self, _: TaskKind, _: &str) -> SchedulerResult<Option<Value>> {
            Ok(None)
        }
        async fn fetch_stories(&self, _: Option<&Map<String, Value>>) -> SchedulerResult<Vec<Value>> {
            Ok(Vec::new())
        }
        async fn submit_collected(&self, _: &str, _: &Value) -> SchedulerResult<()> {
            Ok(())
        }
        async fn fetch_product_input(&self, _: &str) -> SchedulerResult<Option<Value>> {
            Ok(None)
        }
        async fn fetch_product_render(&self, _: &str) -> SchedulerResult<Option<Value>> {
            Ok(None)
        }
        async fn notify(&self, _: &str) -> SchedulerResult<()> {
            Ok(())
        }
    }

    #[test]
    fn test_builtin_registry_covers_every_type() {
        let registry = HandlerRegistry::builtin(Arc::new(NoopCore), reqwest::Client::new());
        assert_eq!(registry.len(), BUILTIN_TYPES.len());
        for type_name in BUILTIN_TYPES {
            assert!(registry.contains(type_name), "{type_name}");
        }
    }

    #[test]
    fn test_resolve_rejects_unknown_and_mismatched_types() {
        let registry = HandlerRegistry::builtin(Arc::new(NoopCore), reqwest::Client::new());

        let handler = registry.resolve(TaskKind::Collector, "rss_collector").unwrap();
        assert_eq!(handler.kind(), TaskKind::Collector);

        let err = registry
            .resolve(TaskKind::Collector, "ftp_collector")
            .err()
            .unwrap();
        assert!(matches!(err, SchedulerError::NotImplemented { .. }));
        assert!(err.is_permanent());

        assert!(registry.resolve(TaskKind::Bot, "rss_collector").is_err());
    }

    #[test]
    fn test_setting_prefers_parameters() {
        let context = TaskContext {
            task_id: "gather_word_list_1".to_string(),
            run_id: "run-1".to_string(),
            request: TaskRequest::WordListGather(WordListTask {
                word_list_id: "1".to_string(),
            }),
            config: json!({
                "link": "http://top-level",
                "parameters": {"link": "http://parameter"}
            }),
            attempt: 1,
        };
        assert_eq!(setting(&context, "link"), Some("http://parameter"));
        assert!(required_setting(&context, "url").unwrap_err().is_permanent());
    }
}
