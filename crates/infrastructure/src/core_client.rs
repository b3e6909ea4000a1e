//! Core服务HTTP客户端
//!
//! Worker和结果接收端通过它读取配置、提交采集内容以及执行领域写操作。

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode};
use scheduler_core::{
    config::CoreConfig,
    models::TaskKind,
    traits::{CoreClient, DomainSink},
    SchedulerError, SchedulerResult,
};
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

const API_KEY_HEADER: &str = "X-API-KEY";

pub struct HttpCoreClient {
    base_url: String,
    api_key: Option<String>,
    http_client: reqwest::Client,
}

impl HttpCoreClient {
    pub fn new(config: &CoreConfig) -> SchedulerResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .map_err(|e| SchedulerError::Configuration(format!("创建HTTP客户端失败: {e}")))?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            http_client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/worker/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.header(API_KEY_HEADER, key),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> SchedulerResult<Response> {
        self.authorize(request)
            .send()
            .await
            .map_err(|e| SchedulerError::Network(format!("Core请求失败: {e}")))
    }

    async fn get_optional(&self, path: &str) -> SchedulerResult<Option<Value>> {
        let url = self.url(path);
        let response = self.send(self.http_client.get(&url)).await?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!("Core返回404: {}", url);
            return Ok(None);
        }
        let response = Self::ensure_success(response, &url).await?;
        Ok(Some(response.json::<Value>().await?))
    }

    async fn write(&self, request: RequestBuilder, url: &str) -> SchedulerResult<()> {
        let response = self.send(request).await?;
        Self::ensure_success(response, url).await?;
        Ok(())
    }

    async fn ensure_success(response: Response, url: &str) -> SchedulerResult<Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        warn!("Core请求失败: {} HTTP {} - {}", url, status, body);
        Err(SchedulerError::Network(format!(
            "Core请求失败: HTTP {status} - {body}"
        )))
    }
}

#[async_trait]
impl CoreClient for HttpCoreClient {
    async fn fetch_config(&self, kind: TaskKind, id: &str) -> SchedulerResult<Option<Value>> {
        self.get_optional(&format!("{}/{}", kind.config_resource(), id))
            .await
    }

    async fn fetch_stories(
        &self,
        filter: Option<&Map<String, Value>>,
    ) -> SchedulerResult<Vec<Value>> {
        let url = self.url("stories");
        let mut request = self.http_client.get(&url);
        if let Some(filter) = filter {
            let params: Vec<(String, String)> = filter
                .iter()
                .map(|(key, value)| match value {
                    Value::String(s) => (key.clone(), s.clone()),
                    other => (key.clone(), other.to_string()),
                })
                .collect();
            request = request.query(&params);
        }

        let response = Self::ensure_success(self.send(request).await?, &url).await?;
        let body: Value = response.json().await?;
        match body {
            Value::Array(items) => Ok(items),
            Value::Object(mut map) => match map.remove("items") {
                Some(Value::Array(items)) => Ok(items),
                _ => Ok(Vec::new()),
            },
            _ => Ok(Vec::new()),
        }
    }

    async fn submit_collected(&self, source_id: &str, payload: &Value) -> SchedulerResult<()> {
        let url = self.url(&format!("sources/{source_id}/collected"));
        self.write(self.http_client.put(&url).json(payload), &url)
            .await
    }

    async fn fetch_product_input(&self, product_id: &str) -> SchedulerResult<Option<Value>> {
        self.get_optional(&format!("products/{product_id}/render-input"))
            .await
    }

    async fn fetch_product_render(&self, product_id: &str) -> SchedulerResult<Option<Value>> {
        self.get_optional(&format!("products/{product_id}/render"))
            .await
    }

    async fn notify(&self, event: &str) -> SchedulerResult<()> {
        let url = self.url("notifications");
        self.write(
            self.http_client.post(&url).json(&json!({ "event": event })),
            &url,
        )
        .await
    }
}

#[async_trait]
impl DomainSink for HttpCoreClient {
    async fn replace_word_list_entries(
        &self,
        word_list_id: &str,
        entries: &[Value],
    ) -> SchedulerResult<()> {
        let url = self.url(&format!("word-lists/{word_list_id}/entries"));
        self.write(
            self.http_client
                .put(&url)
                .json(&json!({ "entries": entries })),
            &url,
        )
        .await
    }

    async fn forward_tags(&self, tags: &Map<String, Value>) -> SchedulerResult<()> {
        let url = self.url("tags");
        self.write(self.http_client.post(&url).json(tags), &url)
            .await
    }

    async fn mark_bot_executed(&self, bot_id: &str, story_ids: &[String]) -> SchedulerResult<()> {
        let url = self.url(&format!("bots/{bot_id}/executed"));
        self.write(
            self.http_client
                .post(&url)
                .json(&json!({ "story_ids": story_ids })),
            &url,
        )
        .await
    }

    async fn store_product_render(
        &self,
        product_id: &str,
        render: &str,
        mime_type: Option<&str>,
    ) -> SchedulerResult<()> {
        let url = self.url(&format!("products/{product_id}/render"));
        self.write(
            self.http_client.put(&url).json(&json!({
                "render_result": render,
                "mime_type": mime_type,
            })),
            &url,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_building() {
        let client = HttpCoreClient::new(&CoreConfig {
            base_url: "http://core:8080/api/".to_string(),
            api_key: Some("secret".to_string()),
            request_timeout_seconds: 5,
        })
        .unwrap();

        assert_eq!(
            client.url("sources/abc"),
            "http://core:8080/api/worker/sources/abc"
        );
        assert_eq!(client.url("/tags"), "http://core:8080/api/worker/tags");
    }
}
