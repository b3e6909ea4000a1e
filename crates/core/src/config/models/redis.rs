use serde::{Deserialize, Serialize};

/// Redis配置
///
/// 任务注册表、下次运行索引、重载通道和任务队列都存放在同一个Redis中，
/// 键名统一带 `key_prefix` 前缀。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    pub url: String,
    pub key_prefix: String,
    pub connection_timeout_seconds: u64,
    pub max_retry_attempts: u32,
    pub retry_delay_seconds: u64,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379/0".to_string(),
            key_prefix: "scheduler".to_string(),
            connection_timeout_seconds: 10,
            max_retry_attempts: 3,
            retry_delay_seconds: 1,
        }
    }
}

impl RedisConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.url.starts_with("redis://") && !self.url.starts_with("rediss://") {
            return Err(anyhow::anyhow!("Redis URL格式无效: {}", self.url));
        }

        if self.key_prefix.is_empty() {
            return Err(anyhow::anyhow!("Redis键前缀不能为空"));
        }

        if self.max_retry_attempts == 0 {
            return Err(anyhow::anyhow!("最大重试次数必须大于0"));
        }

        Ok(())
    }

    /// 任务注册表（hash）
    pub fn registry_key(&self) -> String {
        format!("{}:jobs", self.key_prefix)
    }

    /// 下次运行索引（sorted set）
    pub fn next_run_key(&self) -> String {
        format!("{}:next_run", self.key_prefix)
    }

    /// 重载广播频道
    pub fn reload_channel(&self) -> String {
        format!("{}:reload", self.key_prefix)
    }

    /// 任务队列（list）
    pub fn queue_key(&self, queue: &str) -> String {
        format!("{}:queue:{}", self.key_prefix, queue)
    }
}
