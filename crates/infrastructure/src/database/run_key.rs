use scheduler_core::models::ResultReport;
use uuid::Uuid;

/// 运行历史的主键
///
/// 有 `run_id` 时直接使用，同一次运行的重复投递落在同一行上；
/// 没有 `run_id` 的每次终态上报都记为一次独立运行。
pub fn run_key(report: &ResultReport) -> String {
    match report.run_id.as_deref().filter(|id| !id.is_empty()) {
        Some(run_id) => run_id.to_string(),
        None => format!("anon-{}", Uuid::new_v4()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scheduler_core::models::TaskStatus;
    use serde_json::json;

    #[test]
    fn test_run_id_wins() {
        let report = ResultReport::new("bot_1", TaskStatus::Success, json!({})).with_run_id("r-1");
        assert_eq!(run_key(&report), "r-1");
    }

    #[test]
    fn test_reports_without_run_id_are_distinct_runs() {
        let first = ResultReport::new("bot_1", TaskStatus::Failure, json!("connection refused"));
        let second = ResultReport::new("bot_1", TaskStatus::Failure, json!("connection refused"));
        let empty = ResultReport::new("bot_1", TaskStatus::Failure, json!({})).with_run_id("");

        assert_ne!(run_key(&first), run_key(&second));
        assert!(run_key(&empty).starts_with("anon-"));
    }
}
