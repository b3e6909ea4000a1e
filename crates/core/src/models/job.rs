use std::str::FromStr;

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{SchedulerError, SchedulerResult};

/// 未声明触发器的任务定义使用的默认间隔（秒）
pub const DEFAULT_JOB_INTERVAL_SECONDS: u64 = 3600;

/// 间隔触发器允许的最大间隔（秒），约十年
pub const MAX_JOB_INTERVAL_SECONDS: u64 = 10 * 365 * 24 * 3600;

/// 任务触发规则
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    /// 固定间隔（秒）
    Interval { seconds: u64 },
    /// 日历规则（CRON表达式）
    Cron { expression: String },
}

impl Trigger {
    pub fn interval(seconds: u64) -> Self {
        Self::Interval { seconds }
    }

    /// 解析CRON表达式，没有后续触发时间的表达式（例如限定在过去年份）同样拒绝
    pub fn cron(expression: impl Into<String>) -> SchedulerResult<Self> {
        let expression = expression.into();
        let schedule =
            cron::Schedule::from_str(&expression).map_err(|e| SchedulerError::InvalidCron {
                expr: expression.clone(),
                message: e.to_string(),
            })?;
        if schedule.upcoming(Utc).next().is_none() {
            return Err(SchedulerError::InvalidCron {
                expr: expression,
                message: "没有后续触发时间".to_string(),
            });
        }
        Ok(Self::Cron { expression })
    }

    /// 计算 `now` 之后的下一次触发时间
    ///
    /// 间隔触发器相对于 `now` 计算，而不是相对于上一次计划时间，
    /// 因此延迟的tick不会累积漂移。
    pub fn next_after(&self, now: DateTime<Utc>) -> SchedulerResult<DateTime<Utc>> {
        match self {
            Trigger::Interval { seconds } => i64::try_from(*seconds)
                .ok()
                .and_then(Duration::try_seconds)
                .and_then(|interval| now.checked_add_signed(interval))
                .ok_or_else(|| {
                    SchedulerError::InvalidJobSpec(format!("间隔 {seconds} 秒超出可表示的时间范围"))
                }),
            Trigger::Cron { expression } => {
                let schedule = cron::Schedule::from_str(expression).map_err(|e| {
                    SchedulerError::InvalidCron {
                        expr: expression.clone(),
                        message: e.to_string(),
                    }
                })?;
                schedule
                    .after(&now)
                    .next()
                    .ok_or_else(|| SchedulerError::InvalidCron {
                        expr: expression.clone(),
                        message: "没有后续触发时间".to_string(),
                    })
            }
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Trigger::Interval { seconds } => format!("每{seconds}秒"),
            Trigger::Cron { expression } => format!("cron({expression})"),
        }
    }
}

/// 任务级别的超时/重试覆盖项
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_delay_seconds: Option<u64>,
}

/// 规范化后的周期任务定义
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSpec {
    pub id: String,
    pub queue_name: String,
    pub func_path: String,
    #[serde(default)]
    pub args: Vec<Value>,
    #[serde(default)]
    pub kwargs: Map<String, Value>,
    #[serde(default)]
    pub job_options: JobOptions,
    #[serde(default)]
    pub meta: Map<String, Value>,
    pub trigger: Trigger,
}

impl JobSpec {
    pub fn next_run_after(&self, now: DateTime<Utc>) -> SchedulerResult<DateTime<Utc>> {
        self.trigger.next_after(now)
    }

    /// 用于日志展示的名称，优先使用 meta.name
    pub fn display_name(&self) -> &str {
        self.meta
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or(&self.id)
    }
}

/// 下次运行索引中使用的时间戳（Unix秒，浮点数）
pub fn to_score(at: DateTime<Utc>) -> f64 {
    at.timestamp_millis() as f64 / 1000.0
}

pub fn from_score(score: f64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt((score * 1000.0).round() as i64)
        .single()
        .unwrap_or_else(Utc::now)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_trigger_is_relative_to_now() {
        let trigger = Trigger::interval(60);
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        assert_eq!(
            trigger.next_after(now).unwrap(),
            Utc.with_ymd_and_hms(2024, 5, 1, 12, 1, 0).unwrap()
        );
    }

    #[test]
    fn test_cron_trigger_next_occurrence() {
        let trigger = Trigger::cron("0 30 * * * *").unwrap();
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        assert_eq!(
            trigger.next_after(now).unwrap(),
            Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap()
        );
    }

    #[test]
    fn test_invalid_cron_rejected() {
        assert!(matches!(
            Trigger::cron("not a cron"),
            Err(SchedulerError::InvalidCron { .. })
        ));
        // 限定在过去年份的表达式没有后续触发时间
        assert!(matches!(
            Trigger::cron("0 0 0 1 1 * 2020"),
            Err(SchedulerError::InvalidCron { .. })
        ));
    }

    #[test]
    fn test_oversized_interval_is_error_not_panic() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        for seconds in [10_000_000_000_000, u64::MAX] {
            assert!(matches!(
                Trigger::interval(seconds).next_after(now),
                Err(SchedulerError::InvalidJobSpec(_))
            ));
        }
        assert!(Trigger::interval(MAX_JOB_INTERVAL_SECONDS).next_after(now).is_ok());
    }

    #[test]
    fn test_score_round_trip_keeps_millis() {
        let at = Utc.timestamp_millis_opt(1_714_564_800_250).unwrap();
        assert_eq!(from_score(to_score(at)), at);
    }
}
