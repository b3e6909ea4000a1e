//! 日志初始化
//!
//! 所有进程统一使用 `tracing` 输出结构化日志，`RUST_LOG` 优先于配置中的级别。

use anyhow::{Context, Result};
use tracing::Span;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// 初始化日志系统
///
/// `log_format` 支持 `json` 和 `pretty`。重复初始化会返回错误。
pub fn init_logging(log_level: &str, log_format: &str) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let registry = tracing_subscriber::registry().with(env_filter);

    match log_format {
        "json" => {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .try_init()
                .context("初始化JSON日志格式失败")?;
        }
        "pretty" => {
            registry
                .with(tracing_subscriber::fmt::layer().pretty())
                .try_init()
                .context("初始化Pretty日志格式失败")?;
        }
        _ => {
            return Err(anyhow::anyhow!("不支持的日志格式: {log_format}"));
        }
    }

    Ok(())
}

/// 单次任务执行的span，worker在其中记录所有尝试
pub fn task_span(task_id: &str, run_id: &str, kind: &str) -> Span {
    tracing::info_span!("task", task_id = %task_id, run_id = %run_id, kind = %kind)
}

/// 调度循环中单个任务定义的span
pub fn job_span(job_id: &str) -> Span {
    tracing::info_span!("job", job_id = %job_id)
}
