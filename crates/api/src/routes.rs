use std::sync::Arc;

use axum::{
    routing::{delete, get, post},
    Router,
};
use scheduler_dispatcher::{JobRegistryWriter, ResultIngestion};

use crate::handlers::{
    health::health_check,
    jobs::{register_job, remove_job},
    tasks::{get_task, get_task_health, report_result},
};

#[derive(Clone)]
pub struct AppState {
    pub ingestion: Arc<ResultIngestion>,
    pub jobs: Arc<JobRegistryWriter>,
}

pub fn create_routes(state: AppState) -> Router {
    Router::new()
        // 健康检查
        .route("/health", get(health_check))
        // 结果上报与查询
        .route("/api/tasks", post(report_result))
        .route("/api/tasks/{id}", get(get_task))
        .route("/api/tasks/{id}/health", get(get_task_health))
        // 任务定义管理
        .route("/api/jobs", post(register_job))
        .route("/api/jobs/{id}", delete(remove_job))
        .with_state(state)
}
