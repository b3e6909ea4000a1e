//! 产品渲染
//!
//! 渲染结果以base64编码返回，由结果接收端持久化到产品上。

use std::fmt::Write as _;
use std::sync::Arc;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use scheduler_core::{
    models::{TaskKind, TaskRequest},
    traits::{CoreClient, TaskContext, TaskHandler},
    SchedulerError, SchedulerResult,
};
use serde_json::{json, Value};
use tracing::info;

use super::unexpected_request;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderFormat {
    Text,
    Json,
}

impl RenderFormat {
    pub fn mime_type(&self) -> &'static str {
        match self {
            RenderFormat::Text => "text/plain",
            RenderFormat::Json => "application/json",
        }
    }
}

pub struct TemplatePresenter {
    name: &'static str,
    format: RenderFormat,
    core: Arc<dyn CoreClient>,
}

impl TemplatePresenter {
    pub fn new(name: &'static str, format: RenderFormat, core: Arc<dyn CoreClient>) -> Self {
        Self { name, format, core }
    }
}

fn text_field<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .find_map(|key| value.get(*key).and_then(Value::as_str))
}

/// 纯文本渲染：标题加条目列表
pub(crate) fn render_text(product_id: &str, input: &Value) -> String {
    let title = text_field(input, &["title", "name"]).unwrap_or(product_id);
    let mut output = format!("{title}\n{}\n", "=".repeat(title.chars().count()));

    if let Some(description) = text_field(input, &["description"]) {
        let _ = writeln!(output, "{description}\n");
    }

    let stories = input
        .get("stories")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    for story in stories {
        let headline = text_field(story, &["title", "name"]).unwrap_or("(untitled)");
        let _ = writeln!(output, "- {headline}");
        if let Some(summary) = text_field(story, &["summary", "description"]) {
            let _ = writeln!(output, "  {summary}");
        }
        if let Some(link) = text_field(story, &["link", "url"]) {
            let _ = writeln!(output, "  {link}");
        }
    }
    output
}

#[async_trait]
impl TaskHandler for TemplatePresenter {
    fn name(&self) -> &str {
        self.name
    }

    fn kind(&self) -> TaskKind {
        TaskKind::Presenter
    }

    async fn execute(&self, context: &TaskContext) -> SchedulerResult<Value> {
        let TaskRequest::Presenter(task) = &context.request else {
            return Err(unexpected_request(self.name, context));
        };

        let input = self
            .core
            .fetch_product_input(&task.product_id)
            .await?
            .ok_or_else(|| SchedulerError::not_found("product", task.product_id.clone()))?;

        let rendered = match self.format {
            RenderFormat::Text => render_text(&task.product_id, &input).into_bytes(),
            RenderFormat::Json => serde_json::to_vec_pretty(&input)?,
        };

        info!(
            product_id = %task.product_id,
            bytes = rendered.len(),
            format = self.format.mime_type(),
            "产品渲染完成"
        );
        Ok(json!({
            "product_id": task.product_id,
            "render_result": STANDARD.encode(rendered),
            "mime_type": self.format.mime_type(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_text_lists_stories() {
        let input = json!({
            "title": "Weekly",
            "stories": [
                {"title": "APT28 campaign", "link": "https://example.org/1"},
                {"summary": "no title here"}
            ]
        });
        let text = render_text("7", &input);
        assert!(text.starts_with("Weekly\n======\n"));
        assert!(text.contains("- APT28 campaign\n  https://example.org/1\n"));
        assert!(text.contains("- (untitled)\n  no title here\n"));
    }

    #[test]
    fn test_render_text_falls_back_to_product_id() {
        let text = render_text("42", &json!({}));
        assert_eq!(text, "42\n==\n");
    }
}
