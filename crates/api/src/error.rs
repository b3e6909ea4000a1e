use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use scheduler_core::SchedulerError;
use serde_json::json;
use tracing::error;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("调度器错误: {0}")]
    Scheduler(#[from] SchedulerError),

    #[error("未找到资源: {0}")]
    NotFound(String),

    #[error("请求参数错误: {0}")]
    BadRequest(String),

    #[error("内部服务器错误: {0}")]
    Internal(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    fn parts(&self) -> (StatusCode, String, &'static str) {
        match self {
            ApiError::Scheduler(SchedulerError::InvalidJobSpec(msg)) => (
                StatusCode::BAD_REQUEST,
                format!("任务定义无效: {msg}"),
                "INVALID_JOB_SPEC",
            ),
            ApiError::Scheduler(SchedulerError::InvalidCron { expr, message }) => (
                StatusCode::BAD_REQUEST,
                format!("Cron表达式 '{expr}' 无效: {message}"),
                "INVALID_CRON_EXPRESSION",
            ),
            ApiError::Scheduler(
                SchedulerError::InvalidTaskParams(msg) | SchedulerError::Serialization(msg),
            ) => (
                StatusCode::BAD_REQUEST,
                format!("请求数据格式错误: {msg}"),
                "BAD_REQUEST",
            ),
            ApiError::Scheduler(SchedulerError::NotFound { kind, id }) => (
                StatusCode::NOT_FOUND,
                format!("{kind} {id} 不存在"),
                "NOT_FOUND",
            ),
            ApiError::Scheduler(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("系统内部错误: {e}"),
                "INTERNAL_ERROR",
            ),
            ApiError::NotFound(what) => (
                StatusCode::NOT_FOUND,
                format!("{what} 不存在"),
                "NOT_FOUND",
            ),
            ApiError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                format!("请求参数错误: {msg}"),
                "BAD_REQUEST",
            ),
            ApiError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("系统内部错误: {msg}"),
                "INTERNAL_ERROR",
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, error_type) = self.parts();
        if status.is_server_error() {
            error!("请求处理失败: {}", message);
        }

        let body = Json(json!({
            "error": {
                "message": message,
                "type": error_type,
                "code": status.as_u16(),
                "timestamp": chrono::Utc::now().to_rfc3339(),
            }
        }));

        (status, body).into_response()
    }
}
