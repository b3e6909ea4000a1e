//! 结果接收与路由
//!
//! 每条结果先按 `task_id` upsert，成功的结果再按任务种类路由到对应的领域
//! 副作用。路由是全函数：任何无法识别或不完整的载荷都只记录日志。

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};

use scheduler_core::{
    models::{ResultReport, TaskKind, TaskStatus},
    traits::{DomainSink, TaskResultRepository, UpsertOutcome},
    SchedulerResult,
};
use scheduler_infrastructure::MetricsCollector;

/// 路由结果，便于调用方和测试观察
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteAction {
    /// 替换了词表条目
    WordListReplaced { word_list_id: String, entries: usize },
    /// 转发了bot标签并标记了条目
    BotTagsForwarded { bot_id: String, stories: usize },
    /// bot载荷带有error键，只记录日志
    BotErrorLogged,
    /// 持久化了产品渲染结果
    PresenterRenderStored { product_id: String },
    /// presenter载荷缺少字段，只记录日志
    PresenterMissingFields,
    /// 普通字符串或无法识别的载荷，只记录日志
    Logged,
    /// 非成功状态不做路由
    Skipped,
}

pub struct ResultIngestion {
    repository: Arc<dyn TaskResultRepository>,
    sink: Arc<dyn DomainSink>,
    metrics: Arc<MetricsCollector>,
}

impl ResultIngestion {
    pub fn new(
        repository: Arc<dyn TaskResultRepository>,
        sink: Arc<dyn DomainSink>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            repository,
            sink,
            metrics,
        }
    }

    pub fn repository(&self) -> &Arc<dyn TaskResultRepository> {
        &self.repository
    }

    /// 存储并路由一条结果，只有存储失败会返回错误
    pub async fn ingest(&self, report: &ResultReport) -> SchedulerResult<UpsertOutcome> {
        let outcome = self.repository.upsert(report).await?;
        self.metrics.record_report_ingested(
            report.status.as_str(),
            outcome == UpsertOutcome::Created,
        );

        info!(
            task_id = %report.task_id,
            status = %report.status,
            outcome = ?outcome,
            "任务结果已存储"
        );

        let action = self.route(report).await;
        debug!(task_id = %report.task_id, action = ?action, "结果路由完成");
        Ok(outcome)
    }

    /// 按任务种类执行结果副作用，从不返回错误
    pub async fn route(&self, report: &ResultReport) -> RouteAction {
        if report.status != TaskStatus::Success {
            if report.status == TaskStatus::Failure {
                warn!(task_id = %report.task_id, result = %report.result, "任务执行失败");
            }
            return RouteAction::Skipped;
        }

        match TaskKind::from_task_id(&report.task_id) {
            Some(TaskKind::WordListGather) => self.route_word_list(report).await,
            Some(TaskKind::Bot) => self.route_bot(report).await,
            Some(TaskKind::Presenter) => self.route_presenter(report).await,
            _ => {
                info!(task_id = %report.task_id, "任务结果: {}", display_payload(&report.result));
                RouteAction::Logged
            }
        }
    }

    async fn route_word_list(&self, report: &ResultReport) -> RouteAction {
        let Some(payload) = report.result.as_object() else {
            info!(task_id = %report.task_id, "词表结果: {}", display_payload(&report.result));
            return RouteAction::Logged;
        };
        let Some(entries) = payload.get("content").and_then(Value::as_array) else {
            warn!(task_id = %report.task_id, "词表结果缺少content字段");
            return RouteAction::Logged;
        };

        let word_list_id = id_field(payload, "word_list_id")
            .unwrap_or_else(|| suffix(&report.task_id, TaskKind::WordListGather));

        if let Err(e) = self
            .sink
            .replace_word_list_entries(&word_list_id, entries)
            .await
        {
            error!(word_list_id = %word_list_id, "更新词表失败: {}", e);
        }
        RouteAction::WordListReplaced {
            word_list_id,
            entries: entries.len(),
        }
    }

    async fn route_bot(&self, report: &ResultReport) -> RouteAction {
        let Some(payload) = report.result.as_object() else {
            info!(task_id = %report.task_id, "Bot结果: {}", display_payload(&report.result));
            return RouteAction::Logged;
        };

        if let Some(bot_error) = payload.get("error") {
            warn!(task_id = %report.task_id, "Bot执行返回错误: {}", display_payload(bot_error));
            return RouteAction::BotErrorLogged;
        }

        let bot_id =
            id_field(payload, "bot_id").unwrap_or_else(|| suffix(&report.task_id, TaskKind::Bot));
        let tags = payload
            .get("tags")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        let story_ids: Vec<String> = tags.keys().cloned().collect();

        if !tags.is_empty() {
            if let Err(e) = self.sink.forward_tags(&tags).await {
                error!(bot_id = %bot_id, "转发标签失败: {}", e);
            }
        }
        if !story_ids.is_empty() {
            if let Err(e) = self.sink.mark_bot_executed(&bot_id, &story_ids).await {
                error!(bot_id = %bot_id, "标记bot执行状态失败: {}", e);
            }
        }

        RouteAction::BotTagsForwarded {
            bot_id,
            stories: story_ids.len(),
        }
    }

    async fn route_presenter(&self, report: &ResultReport) -> RouteAction {
        let fields = report.result.as_object().and_then(|payload| {
            let product_id = id_field(payload, "product_id")?;
            let render = payload.get("render_result").and_then(Value::as_str)?;
            let mime_type = payload.get("mime_type").and_then(Value::as_str);
            Some((product_id, render, mime_type))
        });

        let Some((product_id, render, mime_type)) = fields else {
            warn!(task_id = %report.task_id, "Presenter结果缺少字段 product_id/render_result");
            return RouteAction::PresenterMissingFields;
        };

        if let Err(e) = self
            .sink
            .store_product_render(&product_id, render, mime_type)
            .await
        {
            error!(product_id = %product_id, "保存产品渲染结果失败: {}", e);
        }
        RouteAction::PresenterRenderStored { product_id }
    }
}

/// ID字段可能是字符串或数字
fn id_field(payload: &Map<String, Value>, field: &str) -> Option<String> {
    match payload.get(field)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn suffix(task_id: &str, kind: TaskKind) -> String {
    task_id
        .strip_prefix(kind.task_id_prefix())
        .unwrap_or(task_id)
        .to_string()
}

fn display_payload(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
