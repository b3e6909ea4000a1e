//! # Scheduler API
//!
//! 基于Axum的HTTP接口：
//!
//! - `POST /api/tasks` - 幂等上报任务结果（新建201，更新200）
//! - `GET /api/tasks/{id}` - 查询任务状态，未知任务返回PENDING
//! - `GET /api/tasks/{id}/health` - 历史运行统计与健康分级
//! - `POST /api/jobs` - 注册周期任务定义并广播重载
//! - `DELETE /api/jobs/{id}` - 删除周期任务定义并广播重载
//! - `GET /health` - 存活检查

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod response;
pub mod routes;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use scheduler_dispatcher::{JobRegistryWriter, ResultIngestion};
use tower::ServiceBuilder;
use tower_http::timeout::TimeoutLayer;

use middleware::{request_logging, trace_layer};
use routes::{create_routes, AppState};

pub use error::{ApiError, ApiResult};
pub use response::ApiResponse;

pub fn create_app(
    ingestion: Arc<ResultIngestion>,
    jobs: Arc<JobRegistryWriter>,
    request_timeout: Duration,
) -> Router {
    let state = AppState { ingestion, jobs };

    create_routes(state).layer(
        ServiceBuilder::new()
            .layer(trace_layer())
            .layer(TimeoutLayer::new(request_timeout))
            .layer(axum::middleware::from_fn(request_logging)),
    )
}
