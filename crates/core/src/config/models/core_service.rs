use serde::{Deserialize, Serialize};

/// Core服务连接配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Core API根地址，例如 `http://core:8080/api`
    pub base_url: String,
    pub api_key: Option<String>,
    pub request_timeout_seconds: u64,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000/api".to_string(),
            api_key: None,
            request_timeout_seconds: 30,
        }
    }
}

impl CoreConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(anyhow::anyhow!("Core地址必须是HTTP(S) URL: {}", self.base_url));
        }

        if self.request_timeout_seconds == 0 {
            return Err(anyhow::anyhow!("请求超时时间必须大于0"));
        }

        Ok(())
    }
}
