use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use scheduler_api::create_app;
use scheduler_core::{
    traits::{JobStore, ReloadChannel, TaskQueue, TaskResultRepository},
    AppConfig,
};
use scheduler_dispatcher::{
    JobRegistry, JobRegistryWriter, JobScheduler, ReloadListener, ResultIngestion,
};
use scheduler_infrastructure::{
    HttpCoreClient, MetricsCollector, RedisConnection, RedisJobStore, RedisReloadChannel,
    RedisTaskQueue, SqliteTaskResultRepository,
};
use scheduler_worker::{FlowSettings, HandlerRegistry, HttpResultReporter, TaskFlow, WorkerPool};
use tokio::{net::TcpListener, sync::broadcast};
use tracing::{error, info};

/// 应用运行模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
    /// 仅运行Dispatcher
    Dispatcher,
    /// 仅运行Worker
    Worker,
    /// 仅运行API服务器
    Api,
    /// 运行所有启用的组件
    All,
}

impl AppMode {
    fn runs_dispatcher(self, config: &AppConfig) -> bool {
        match self {
            AppMode::Dispatcher => true,
            AppMode::All => config.dispatcher.enabled,
            _ => false,
        }
    }

    fn runs_worker(self, config: &AppConfig) -> bool {
        match self {
            AppMode::Worker => true,
            AppMode::All => config.worker.enabled,
            _ => false,
        }
    }

    fn runs_api(self, config: &AppConfig) -> bool {
        match self {
            AppMode::Api => true,
            AppMode::All => config.api.enabled,
            _ => false,
        }
    }
}

/// 主应用程序
///
/// 所有组件共享同一个Redis连接和指标收集器。
pub struct Application {
    config: AppConfig,
    mode: AppMode,
    job_store: Arc<dyn JobStore>,
    reload_channel: Arc<dyn ReloadChannel>,
    task_queue: Arc<dyn TaskQueue>,
    core_client: Arc<HttpCoreClient>,
    metrics: Arc<MetricsCollector>,
}

impl Application {
    pub async fn new(config: AppConfig, mode: AppMode) -> Result<Self> {
        info!("初始化应用程序，模式: {:?}", mode);

        info!("连接Redis: {}", mask_url(&config.redis.url));
        let redis = RedisConnection::connect(config.redis.clone())
            .await
            .context("连接Redis失败")?;

        let core_client =
            Arc::new(HttpCoreClient::new(&config.core).context("创建Core客户端失败")?);

        Ok(Self {
            job_store: Arc::new(RedisJobStore::new(redis.clone())),
            reload_channel: Arc::new(RedisReloadChannel::new(redis.clone())),
            task_queue: Arc::new(RedisTaskQueue::new(redis)),
            core_client,
            metrics: Arc::new(MetricsCollector::new()),
            config,
            mode,
        })
    }

    /// 运行到收到关闭信号，所有组件退出后返回
    pub async fn run(&self, shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        info!("启动应用程序，模式: {:?}", self.mode);

        let mut handles = Vec::new();

        if self.mode.runs_api(&self.config) {
            handles.push(self.start_api(shutdown_rx.resubscribe()).await?);
        }

        if self.mode.runs_dispatcher(&self.config) {
            let (scheduler, listener) = self.build_dispatcher();
            let rx = shutdown_rx.resubscribe();
            handles.push(tokio::spawn(async move {
                if let Err(e) = scheduler.run(rx).await {
                    error!("调度器运行失败: {}", e);
                }
            }));
            let rx = shutdown_rx.resubscribe();
            handles.push(tokio::spawn(async move {
                if let Err(e) = listener.run(rx).await {
                    error!("重载监听器运行失败: {}", e);
                }
            }));
        }

        if self.mode.runs_worker(&self.config) {
            let pool = self.build_worker_pool()?;
            let rx = shutdown_rx.resubscribe();
            handles.push(tokio::spawn(async move {
                if let Err(e) = pool.run(rx).await {
                    error!("Worker池运行失败: {}", e);
                }
            }));
        }

        for handle in handles {
            if let Err(e) = handle.await {
                error!("组件异常退出: {}", e);
            }
        }

        info!("所有组件已停止");
        Ok(())
    }

    fn build_dispatcher(&self) -> (Arc<JobScheduler>, ReloadListener) {
        info!("启动Dispatcher服务");

        let registry = Arc::new(JobRegistry::new(Arc::clone(&self.job_store)));
        let scheduler = Arc::new(JobScheduler::new(
            registry,
            Arc::clone(&self.job_store),
            Arc::clone(&self.task_queue),
            self.config.dispatcher.clone(),
            Arc::clone(&self.metrics),
        ));
        let listener = ReloadListener::new(
            Arc::clone(&self.reload_channel),
            Arc::clone(&scheduler),
            Duration::from_secs(self.config.dispatcher.reload_retry_seconds),
        );

        (scheduler, listener)
    }

    fn build_worker_pool(&self) -> Result<Arc<WorkerPool>> {
        let worker = &self.config.worker;
        info!("启动Worker服务: {}", worker.worker_id);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(self.config.core.request_timeout_seconds))
            .build()
            .context("创建HTTP客户端失败")?;
        let handlers = Arc::new(HandlerRegistry::builtin(self.core_client.clone(), http));
        info!("已注册 {} 个任务处理器: {:?}", handlers.len(), handlers.names());

        let reporter = Arc::new(HttpResultReporter::new(worker).context("创建结果上报客户端失败")?);
        let flow = Arc::new(TaskFlow::new(
            self.core_client.clone(),
            handlers,
            reporter,
            FlowSettings::from(worker),
            Arc::clone(&self.metrics),
        ));

        Ok(Arc::new(WorkerPool::new(
            worker,
            Arc::clone(&self.task_queue),
            flow,
            Arc::clone(&self.metrics),
        )))
    }

    async fn start_api(
        &self,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> Result<tokio::task::JoinHandle<()>> {
        let api = &self.config.api;
        info!("启动API服务器: {}", api.bind_address);

        info!("连接数据库: {}", mask_url(&self.config.database.url));
        let repository: Arc<dyn TaskResultRepository> = Arc::new(
            SqliteTaskResultRepository::connect(&self.config.database)
                .await
                .context("连接数据库失败")?,
        );

        let ingestion = Arc::new(ResultIngestion::new(
            repository,
            self.core_client.clone(),
            Arc::clone(&self.metrics),
        ));
        let jobs = Arc::new(JobRegistryWriter::new(
            Arc::clone(&self.job_store),
            Arc::clone(&self.reload_channel),
        ));
        let app = create_app(
            ingestion,
            jobs,
            Duration::from_secs(api.request_timeout_seconds),
        );

        let listener = TcpListener::bind(&api.bind_address)
            .await
            .with_context(|| format!("绑定地址失败: {}", api.bind_address))?;
        info!("API服务器启动在 http://{}", api.bind_address);

        Ok(tokio::spawn(async move {
            let shutdown = async move {
                let _ = shutdown_rx.recv().await;
                info!("API服务器收到关闭信号");
            };
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(shutdown)
                .await
            {
                error!("API服务器运行失败: {}", e);
            }
            info!("API服务器已停止");
        }))
    }
}

/// 屏蔽URL中的密码
fn mask_url(url: &str) -> String {
    let Some(scheme_end) = url.find("://").map(|pos| pos + 3) else {
        return url.to_string();
    };
    let Some(at_pos) = url[scheme_end..].find('@').map(|pos| pos + scheme_end) else {
        return url.to_string();
    };
    match url[scheme_end..at_pos].find(':') {
        Some(colon) => {
            let mut masked = url.to_string();
            masked.replace_range(scheme_end + colon + 1..at_pos, "***");
            masked
        }
        None => url.to_string(),
    }
}
