//! 任务健康状态分类
//!
//! 根据历史运行计数推导展示用的标签和严重程度。规则按顺序匹配，
//! 第一条命中的规则生效。

use serde::{Deserialize, Serialize};

use crate::models::TaskRunStatistics;

/// 最小样本量：运行次数低于该值时不按成功率分级
pub const MIN_SAMPLE_SIZE: u64 = 3;

/// 成功率分界线（百分比）
pub const MOSTLY_SUCCESS_PCT: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthLabel {
    NoRuns,
    AllSuccess,
    FirstFailure,
    SomeFailures,
    MostlySuccess,
    ManyFailures,
}

impl HealthLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthLabel::NoRuns => "No Runs",
            HealthLabel::AllSuccess => "All Success",
            HealthLabel::FirstFailure => "First Failure",
            HealthLabel::SomeFailures => "Some Failures",
            HealthLabel::MostlySuccess => "Mostly Success",
            HealthLabel::ManyFailures => "Many Failures",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Neutral,
    Healthy,
    Caution,
    Severe,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskHealth {
    pub label: HealthLabel,
    pub severity: Severity,
}

impl TaskHealth {
    const fn new(label: HealthLabel, severity: Severity) -> Self {
        Self { label, severity }
    }
}

/// 使用默认最小样本量分类
pub fn classify(stats: &TaskRunStatistics) -> TaskHealth {
    classify_with_floor(stats, MIN_SAMPLE_SIZE)
}

pub fn classify_with_floor(stats: &TaskRunStatistics, min_sample_size: u64) -> TaskHealth {
    if stats.total == 0 {
        return TaskHealth::new(HealthLabel::NoRuns, Severity::Neutral);
    }
    if stats.failures == 0 {
        return TaskHealth::new(HealthLabel::AllSuccess, Severity::Healthy);
    }
    if stats.successes == 0 && stats.total == 1 {
        return TaskHealth::new(HealthLabel::FirstFailure, Severity::Caution);
    }
    if stats.total < min_sample_size {
        return TaskHealth::new(HealthLabel::SomeFailures, Severity::Caution);
    }
    if stats.success_pct_or_derived() >= MOSTLY_SUCCESS_PCT {
        TaskHealth::new(HealthLabel::MostlySuccess, Severity::Caution)
    } else {
        TaskHealth::new(HealthLabel::ManyFailures, Severity::Severe)
    }
}
