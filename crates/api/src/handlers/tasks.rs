//! 任务结果上报与查询

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use scheduler_core::{
    classify,
    models::{ResultReport, TaskResult, TaskRunStatistics},
    traits::UpsertOutcome,
    HealthLabel, Severity,
};
use serde::Serialize;
use serde_json::json;

use crate::{error::ApiResult, response::ApiResponse, routes::AppState};

#[derive(Debug, Serialize)]
pub struct ReportAccepted {
    pub task_id: String,
    pub status: String,
    pub created: bool,
}

#[derive(Debug, Serialize)]
pub struct TaskHealthResponse {
    pub task_id: String,
    pub statistics: TaskRunStatistics,
    pub label: &'static str,
    pub code: HealthLabel,
    pub severity: Severity,
}

/// 上报任务结果：新建返回201，更新返回200
pub async fn report_result(
    State(state): State<AppState>,
    Json(report): Json<ResultReport>,
) -> ApiResult<Response> {
    let outcome = state.ingestion.ingest(&report).await?;
    let created = outcome == UpsertOutcome::Created;
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };

    let body = ApiResponse::success(ReportAccepted {
        task_id: report.task_id,
        status: report.status.to_string(),
        created,
    });
    Ok((status, body).into_response())
}

/// 查询任务状态，未知任务返回PENDING
pub async fn get_task(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> ApiResult<Response> {
    match state.ingestion.repository().get(&task_id).await? {
        Some(result) => Ok(Json::<TaskResult>(result).into_response()),
        None => Ok(Json(json!({
            "task_id": task_id,
            "status": "PENDING",
            "result": null,
        }))
        .into_response()),
    }
}

pub async fn get_task_health(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> ApiResult<Json<TaskHealthResponse>> {
    let statistics = state.ingestion.repository().statistics(&task_id).await?;
    let health = classify(&statistics);

    Ok(Json(TaskHealthResponse {
        task_id,
        statistics,
        label: health.label.as_str(),
        code: health.label,
        severity: health.severity,
    }))
}
