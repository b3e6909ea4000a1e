use std::collections::HashMap;

use async_trait::async_trait;
use scheduler_core::{traits::JobStore, SchedulerResult};
use serde_json::Value;
use tokio::sync::Mutex;

/// 内存任务注册表和索引，用于嵌入式运行和测试
///
/// 索引上的所有操作都在同一把锁内完成，`claim_next_run` 因此是原子的。
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    definitions: Mutex<HashMap<String, Value>>,
    next_run: Mutex<HashMap<String, f64>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn load_definitions(&self) -> SchedulerResult<Vec<(String, Value)>> {
        let definitions = self.definitions.lock().await;
        let mut entries: Vec<(String, Value)> = definitions
            .iter()
            .map(|(id, value)| (id.clone(), value.clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(entries)
    }

    async fn put_definition(&self, id: &str, raw: &Value) -> SchedulerResult<()> {
        self.definitions
            .lock()
            .await
            .insert(id.to_string(), raw.clone());
        Ok(())
    }

    async fn delete_definition(&self, id: &str) -> SchedulerResult<bool> {
        Ok(self.definitions.lock().await.remove(id).is_some())
    }

    async fn next_run_entries(&self) -> SchedulerResult<HashMap<String, f64>> {
        Ok(self.next_run.lock().await.clone())
    }

    async fn set_next_run(&self, id: &str, timestamp: f64) -> SchedulerResult<()> {
        self.next_run.lock().await.insert(id.to_string(), timestamp);
        Ok(())
    }

    async fn remove_next_run(&self, id: &str) -> SchedulerResult<bool> {
        Ok(self.next_run.lock().await.remove(id).is_some())
    }

    async fn claim_next_run(&self, id: &str, timestamp: f64) -> SchedulerResult<bool> {
        let mut next_run = self.next_run.lock().await;
        match next_run.get(id) {
            Some(score) if *score == timestamp => {
                next_run.remove(id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn earliest_due(&self, now: f64) -> SchedulerResult<Option<(String, f64)>> {
        let next_run = self.next_run.lock().await;
        Ok(next_run
            .iter()
            .filter(|(_, score)| **score <= now)
            .min_by(|a, b| a.1.total_cmp(b.1).then_with(|| a.0.cmp(b.0)))
            .map(|(id, score)| (id.clone(), *score)))
    }
}
