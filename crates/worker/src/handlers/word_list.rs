//! 词表下载
//!
//! 支持JSON数组（字符串或带 `value` 字段的对象）以及逐行文本两种格式。

use std::collections::HashSet;

use async_trait::async_trait;
use scheduler_core::{
    models::{TaskKind, TaskRequest},
    traits::{TaskContext, TaskHandler},
    SchedulerError, SchedulerResult,
};
use serde_json::{json, Value};
use tracing::info;

use super::{send_checked, setting, unexpected_request};

pub struct WordListGatherer {
    name: &'static str,
    http: reqwest::Client,
}

impl WordListGatherer {
    pub fn new(name: &'static str, http: reqwest::Client) -> Self {
        Self { name, http }
    }
}

/// 解析下载内容，去重并保持原有顺序
pub(crate) fn parse_words(body: &str) -> Vec<String> {
    let trimmed = body.trim_start();
    let raw: Vec<String> = match serde_json::from_str::<Vec<Value>>(trimmed) {
        Ok(items) if trimmed.starts_with('[') => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.clone()),
                other => other.get("value").and_then(Value::as_str).map(str::to_string),
            })
            .collect(),
        _ => body
            .lines()
            .filter(|line| !line.trim_start().starts_with('#'))
            .map(str::to_string)
            .collect(),
    };

    let mut seen = HashSet::new();
    raw.into_iter()
        .map(|word| word.trim().to_string())
        .filter(|word| !word.is_empty() && seen.insert(word.clone()))
        .collect()
}

#[async_trait]
impl TaskHandler for WordListGatherer {
    fn name(&self) -> &str {
        self.name
    }

    fn kind(&self) -> TaskKind {
        TaskKind::WordListGather
    }

    async fn execute(&self, context: &TaskContext) -> SchedulerResult<Value> {
        let TaskRequest::WordListGather(task) = &context.request else {
            return Err(unexpected_request(self.name, context));
        };
        let link = setting(context, "link")
            .or_else(|| setting(context, "url"))
            .ok_or_else(|| {
                SchedulerError::InvalidTaskParams(format!(
                    "词表 {} 未配置下载链接",
                    task.word_list_id
                ))
            })?;
        let category = setting(context, "category");

        let body = send_checked(self.http.get(link), link).await?.text().await?;
        let content: Vec<Value> = parse_words(&body)
            .into_iter()
            .map(|word| match category {
                Some(category) => json!({ "value": word, "category": category }),
                None => json!({ "value": word }),
            })
            .collect();

        info!(word_list_id = %task.word_list_id, entries = content.len(), "词表下载完成");
        Ok(json!({ "word_list_id": task.word_list_id, "content": content }))
    }
}
