use std::collections::HashMap;

use async_trait::async_trait;
use redis::{AsyncCommands, Script};
use scheduler_core::{traits::JobStore, SchedulerResult};
use serde_json::Value;
use tracing::warn;

use super::RedisConnection;

/// Redis任务注册表和下次运行索引
///
/// * 注册表：hash `<prefix>:jobs`，字段为任务ID，值为原始JSON
/// * 索引：sorted set `<prefix>:next_run`，分值为Unix秒
/// 仅当分值未变时删除索引项，返回删除数量
const CLAIM_SCRIPT: &str = r#"
local score = redis.call('ZSCORE', KEYS[1], ARGV[1])
if score and tonumber(score) == tonumber(ARGV[2]) then
    return redis.call('ZREM', KEYS[1], ARGV[1])
end
return 0
"#;

pub struct RedisJobStore {
    connection: RedisConnection,
    registry_key: String,
    next_run_key: String,
}

impl RedisJobStore {
    pub fn new(connection: RedisConnection) -> Self {
        let registry_key = connection.config().registry_key();
        let next_run_key = connection.config().next_run_key();
        Self {
            connection,
            registry_key,
            next_run_key,
        }
    }
}

#[async_trait]
impl JobStore for RedisJobStore {
    async fn load_definitions(&self) -> SchedulerResult<Vec<(String, Value)>> {
        let mut conn = self.connection.manager();
        let raw: HashMap<String, String> = conn.hgetall(&self.registry_key).await?;

        let mut definitions = Vec::with_capacity(raw.len());
        for (id, payload) in raw {
            match serde_json::from_str::<Value>(&payload) {
                Ok(value) => definitions.push((id, value)),
                // 无法解析的记录交给规范化阶段之前就跳过
                Err(e) => warn!(job_id = %id, "任务定义不是合法JSON: {}", e),
            }
        }
        definitions.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(definitions)
    }

    async fn put_definition(&self, id: &str, raw: &Value) -> SchedulerResult<()> {
        let mut conn = self.connection.manager();
        let payload = serde_json::to_string(raw)?;
        let _: () = conn.hset(&self.registry_key, id, payload).await?;
        Ok(())
    }

    async fn delete_definition(&self, id: &str) -> SchedulerResult<bool> {
        let mut conn = self.connection.manager();
        let removed: i64 = conn.hdel(&self.registry_key, id).await?;
        Ok(removed > 0)
    }

    async fn next_run_entries(&self) -> SchedulerResult<HashMap<String, f64>> {
        let mut conn = self.connection.manager();
        let entries: Vec<(String, f64)> = conn.zrange_withscores(&self.next_run_key, 0, -1).await?;
        Ok(entries.into_iter().collect())
    }

    async fn set_next_run(&self, id: &str, timestamp: f64) -> SchedulerResult<()> {
        let mut conn = self.connection.manager();
        let _: () = conn.zadd(&self.next_run_key, id, timestamp).await?;
        Ok(())
    }

    async fn remove_next_run(&self, id: &str) -> SchedulerResult<bool> {
        let mut conn = self.connection.manager();
        let removed: i64 = conn.zrem(&self.next_run_key, id).await?;
        Ok(removed > 0)
    }

    async fn claim_next_run(&self, id: &str, timestamp: f64) -> SchedulerResult<bool> {
        let mut conn = self.connection.manager();
        // 脚本在Redis中原子执行，只有删除成功的实例拥有本次投递
        let removed: i64 = Script::new(CLAIM_SCRIPT)
            .key(&self.next_run_key)
            .arg(id)
            .arg(timestamp)
            .invoke_async(&mut conn)
            .await?;
        Ok(removed > 0)
    }

    async fn earliest_due(&self, now: f64) -> SchedulerResult<Option<(String, f64)>> {
        let mut conn = self.connection.manager();
        let entries: Vec<(String, f64)> = conn
            .zrangebyscore_limit_withscores(&self.next_run_key, "-inf", now, 0, 1)
            .await?;
        Ok(entries.into_iter().next())
    }
}
