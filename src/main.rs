use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use metrics_exporter_prometheus::PrometheusBuilder;
use scheduler::{
    app::{AppMode, Application},
    shutdown::{wait_for_signal, ShutdownManager},
};
use scheduler_core::{init_logging, AppConfig};
use tracing::{error, info, warn};

/// 关闭时等待组件退出的上限
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    Dispatcher,
    Worker,
    Api,
    All,
}

#[derive(Debug, Parser)]
#[command(name = "scheduler", version, about = "OSINT平台任务调度与执行服务")]
struct Cli {
    /// 配置文件路径，缺省时按默认路径查找
    #[arg(short, long, value_name = "FILE")]
    config: Option<String>,

    /// 运行模式
    #[arg(short, long, value_enum, default_value = "all")]
    mode: ModeArg,

    /// Worker ID，覆盖配置文件
    #[arg(long, value_name = "ID")]
    worker_id: Option<String>,

    /// 日志级别，覆盖配置文件
    #[arg(short, long, value_parser = ["trace", "debug", "info", "warn", "error"])]
    log_level: Option<String>,

    /// 日志格式，覆盖配置文件
    #[arg(long, value_parser = ["json", "pretty"])]
    log_format: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref()).context("加载配置失败")?;
    if let Some(id) = cli.worker_id {
        config.worker.worker_id = id;
    }
    if let Some(level) = cli.log_level {
        config.observability.log_level = level;
    }
    if let Some(format) = cli.log_format {
        config.observability.log_format = format;
    }

    init_logging(
        &config.observability.log_level,
        &config.observability.log_format,
    )?;

    info!("启动OSINT任务调度服务");
    info!("运行模式: {:?}", cli.mode);

    let mode = parse_app_mode(cli.mode, &config)?;

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config
            .observability
            .metrics_bind_address
            .parse()
            .with_context(|| {
                format!(
                    "指标监听地址无效: {}",
                    config.observability.metrics_bind_address
                )
            })?;
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("启动Prometheus指标导出失败")?;
        info!("Prometheus指标导出在 http://{}/metrics", addr);
    }

    let app = Arc::new(Application::new(config, mode).await?);
    let shutdown_manager = ShutdownManager::new();

    let app_handle = {
        let app = Arc::clone(&app);
        let shutdown_rx = shutdown_manager.subscribe();
        tokio::spawn(async move {
            if let Err(e) = app.run(shutdown_rx).await {
                error!("应用运行失败: {e}");
            }
        })
    };

    wait_for_signal().await;
    info!("收到关闭信号，开始优雅关闭...");
    shutdown_manager.shutdown();

    match tokio::time::timeout(SHUTDOWN_TIMEOUT, app_handle).await {
        Ok(Ok(())) => info!("应用已优雅关闭"),
        Ok(Err(e)) => error!("应用关闭时发生错误: {e}"),
        Err(_) => warn!("应用关闭超时，强制退出"),
    }

    info!("OSINT任务调度服务已退出");
    Ok(())
}

/// 解析应用运行模式
fn parse_app_mode(mode: ModeArg, config: &AppConfig) -> Result<AppMode> {
    match mode {
        ModeArg::Dispatcher => {
            if !config.dispatcher.enabled {
                return Err(anyhow::anyhow!("Dispatcher模式被禁用，请检查配置"));
            }
            Ok(AppMode::Dispatcher)
        }
        ModeArg::Worker => {
            if !config.worker.enabled {
                return Err(anyhow::anyhow!("Worker模式被禁用，请检查配置"));
            }
            Ok(AppMode::Worker)
        }
        ModeArg::Api => {
            if !config.api.enabled {
                return Err(anyhow::anyhow!("API模式被禁用，请检查配置"));
            }
            Ok(AppMode::Api)
        }
        ModeArg::All => Ok(AppMode::All),
    }
}
