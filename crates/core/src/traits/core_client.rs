use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::{models::TaskKind, SchedulerResult};

/// Worker访问Core的接口
///
/// Worker与Core不共享内存，所有配置读取和领域数据写入都经过此接口。
#[async_trait]
pub trait CoreClient: Send + Sync {
    /// 按ID读取某类任务的配置实体，不存在时返回 `None`
    async fn fetch_config(&self, kind: TaskKind, id: &str) -> SchedulerResult<Option<Value>>;

    /// 读取待处理的情报条目，可选过滤条件
    async fn fetch_stories(&self, filter: Option<&Map<String, Value>>)
        -> SchedulerResult<Vec<Value>>;

    /// 提交采集到的内容以及源的最新采集状态
    async fn submit_collected(&self, source_id: &str, payload: &Value) -> SchedulerResult<()>;

    /// 读取产品渲染所需的输入数据
    async fn fetch_product_input(&self, product_id: &str) -> SchedulerResult<Option<Value>>;

    /// 读取已持久化的产品渲染结果
    async fn fetch_product_render(&self, product_id: &str) -> SchedulerResult<Option<Value>>;

    /// 触发推送通知扇出
    async fn notify(&self, event: &str) -> SchedulerResult<()>;
}
