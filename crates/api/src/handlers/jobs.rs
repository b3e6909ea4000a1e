//! 周期任务定义的注册与删除
//!
//! 两个操作都会发布重载信号，各调度实例随后整表重建任务映射。

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use serde_json::{json, Value};
use tracing::info;

use crate::{
    error::{ApiError, ApiResult},
    response::{created, ApiResponse},
    routes::AppState,
};

pub async fn register_job(
    State(state): State<AppState>,
    Json(raw): Json<Value>,
) -> ApiResult<impl IntoResponse> {
    let job = state.jobs.register_job(&raw).await?;
    info!(job_id = %job.id, queue = %job.queue_name, "任务定义已注册");
    Ok(created(job))
}

pub async fn remove_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<ApiResponse<Value>> {
    if !state.jobs.remove_job(&job_id).await? {
        return Err(ApiError::NotFound(format!("任务定义 {job_id}")));
    }
    info!(job_id = %job_id, "任务定义已删除");
    Ok(ApiResponse::success_with_message(
        json!({ "id": job_id }),
        "任务定义已删除".to_string(),
    ))
}
