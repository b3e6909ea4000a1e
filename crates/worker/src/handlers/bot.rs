//! 关键词打标Bot

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use scheduler_core::{
    models::{TaskKind, TaskRequest},
    traits::{CoreClient, TaskContext, TaskHandler},
    SchedulerError, SchedulerResult,
};
use serde_json::{json, Map, Value};
use tracing::info;

use super::{story_id, unexpected_request};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotMode {
    /// `parameters.words`：每个词自身就是标签
    WordList,
    /// `parameters.tags`：标签 → 关键词列表
    Tagging,
}

#[derive(Debug, Clone, PartialEq)]
struct TagRule {
    tag: String,
    keywords: Vec<String>,
}

pub struct KeywordBot {
    name: &'static str,
    mode: BotMode,
    core: Arc<dyn CoreClient>,
}

impl KeywordBot {
    pub fn new(name: &'static str, mode: BotMode, core: Arc<dyn CoreClient>) -> Self {
        Self { name, mode, core }
    }

    fn rules(&self, context: &TaskContext) -> SchedulerResult<Vec<TagRule>> {
        let rules: Vec<TagRule> = match self.mode {
            BotMode::WordList => context
                .parameter("words")
                .and_then(Value::as_array)
                .map(|words| {
                    words
                        .iter()
                        .filter_map(Value::as_str)
                        .filter(|word| !word.trim().is_empty())
                        .map(|word| TagRule {
                            tag: word.trim().to_string(),
                            keywords: vec![word.trim().to_lowercase()],
                        })
                        .collect()
                })
                .unwrap_or_default(),
            BotMode::Tagging => context
                .parameter("tags")
                .and_then(Value::as_object)
                .map(|tags| {
                    tags.iter()
                        .map(|(tag, keywords)| TagRule {
                            tag: tag.clone(),
                            keywords: keyword_list(keywords),
                        })
                        .filter(|rule| !rule.keywords.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
        };

        if rules.is_empty() {
            return Err(SchedulerError::InvalidTaskParams(format!(
                "Bot {} 未配置关键词",
                context.request.config_id()
            )));
        }
        Ok(rules)
    }
}

/// 空关键词会匹配任何文本，因此一律丢弃
fn keyword_list(value: &Value) -> Vec<String> {
    let keywords: Vec<&str> = match value {
        Value::String(s) => vec![s.as_str()],
        Value::Array(items) => items.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    };
    keywords
        .into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// 拼接条目中可供匹配的文本字段
fn story_text(story: &Value) -> String {
    ["title", "description", "summary", "content"]
        .iter()
        .filter_map(|field| story.get(*field).and_then(Value::as_str))
        .collect::<Vec<_>>()
        .join("\n")
        .to_lowercase()
}

fn match_tags(rules: &[TagRule], text: &str) -> Vec<String> {
    let mut seen = BTreeSet::new();
    rules
        .iter()
        .filter(|rule| rule.keywords.iter().any(|keyword| text.contains(keyword.as_str())))
        .filter(|rule| seen.insert(rule.tag.clone()))
        .map(|rule| rule.tag.clone())
        .collect()
}

#[async_trait]
impl TaskHandler for KeywordBot {
    fn name(&self) -> &str {
        self.name
    }

    fn kind(&self) -> TaskKind {
        TaskKind::Bot
    }

    async fn execute(&self, context: &TaskContext) -> SchedulerResult<Value> {
        let TaskRequest::Bot(task) = &context.request else {
            return Err(unexpected_request(self.name, context));
        };
        let rules = self.rules(context)?;

        let filter = task
            .filter
            .clone()
            .or_else(|| context.parameter("filter").and_then(Value::as_object).cloned());
        let stories = self.core.fetch_stories(filter.as_ref()).await?;

        let mut tags = Map::new();
        for story in &stories {
            let Some(id) = story_id(story) else {
                continue;
            };
            let matched = match_tags(&rules, &story_text(story));
            if !matched.is_empty() {
                tags.insert(id, json!(matched));
            }
        }

        info!(
            bot_id = %task.bot_id,
            stories = stories.len(),
            tagged = tags.len(),
            "Bot执行完成"
        );
        Ok(json!({ "bot_id": task.bot_id, "tags": tags }))
    }
}
