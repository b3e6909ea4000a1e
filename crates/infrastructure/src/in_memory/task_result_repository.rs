use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use scheduler_core::{
    models::{ResultReport, TaskResult, TaskRunStatistics, TaskStatus},
    traits::{TaskResultRepository, UpsertOutcome},
    SchedulerResult,
};
use tokio::sync::RwLock;

use crate::database::run_key;

#[derive(Debug, Default)]
struct State {
    results: HashMap<String, TaskResult>,
    /// task_id -> {run_key -> status}
    history: HashMap<String, HashMap<String, TaskStatus>>,
}

/// 内存任务结果仓储
#[derive(Debug, Default)]
pub struct InMemoryTaskResultRepository {
    state: RwLock<State>,
}

impl InMemoryTaskResultRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskResultRepository for InMemoryTaskResultRepository {
    async fn upsert(&self, report: &ResultReport) -> SchedulerResult<UpsertOutcome> {
        let now = Utc::now();
        let mut state = self.state.write().await;

        let outcome = match state.results.get_mut(&report.task_id) {
            Some(existing) => {
                if report.task.is_some() {
                    existing.task = report.task.clone();
                }
                existing.status = report.status;
                existing.result = report.result.clone();
                existing.last_change = now;
                if report.status == TaskStatus::Success {
                    existing.last_success = Some(now);
                }
                UpsertOutcome::Updated
            }
            None => {
                state.results.insert(
                    report.task_id.clone(),
                    TaskResult {
                        task_id: report.task_id.clone(),
                        task: report.task.clone(),
                        status: report.status,
                        result: report.result.clone(),
                        last_change: now,
                        last_success: (report.status == TaskStatus::Success).then_some(now),
                    },
                );
                UpsertOutcome::Created
            }
        };

        if report.status.is_terminal() {
            state
                .history
                .entry(report.task_id.clone())
                .or_default()
                .entry(run_key(report))
                .or_insert(report.status);
        }

        Ok(outcome)
    }

    async fn get(&self, task_id: &str) -> SchedulerResult<Option<TaskResult>> {
        Ok(self.state.read().await.results.get(task_id).cloned())
    }

    async fn statistics(&self, task_id: &str) -> SchedulerResult<TaskRunStatistics> {
        let state = self.state.read().await;
        let (successes, failures) = state
            .history
            .get(task_id)
            .map(|runs| {
                runs.values().fold((0, 0), |(ok, failed), status| match status {
                    TaskStatus::Success => (ok + 1, failed),
                    _ => (ok, failed + 1),
                })
            })
            .unwrap_or((0, 0));
        Ok(TaskRunStatistics::from_counts(successes, failures))
    }

    async fn count(&self) -> SchedulerResult<u64> {
        Ok(self.state.read().await.results.len() as u64)
    }
}
