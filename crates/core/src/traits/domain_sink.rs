use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::SchedulerResult;

/// 结果接收时的领域副作用
///
/// 领域实体的存储属于Core，本接口只描述结果路由需要执行的写操作。
#[async_trait]
pub trait DomainSink: Send + Sync {
    /// 用采集到的内容替换词表条目
    async fn replace_word_list_entries(
        &self,
        word_list_id: &str,
        entries: &[Value],
    ) -> SchedulerResult<()>;

    /// 把bot找到的新标签转发给打标签服务（story_id -> tags）
    async fn forward_tags(&self, tags: &Map<String, Value>) -> SchedulerResult<()>;

    /// 在受影响条目上记录"bot已执行"标记
    async fn mark_bot_executed(&self, bot_id: &str, story_ids: &[String]) -> SchedulerResult<()>;

    /// 持久化产品渲染结果（base64编码）
    async fn store_product_render(
        &self,
        product_id: &str,
        render: &str,
        mime_type: Option<&str>,
    ) -> SchedulerResult<()>;
}
