use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use scheduler_core::{
    errors::SchedulerError, models::TaskExecutionMessage, traits::TaskQueue, SchedulerResult,
};
use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::debug;

#[derive(Debug)]
struct QueueChannels {
    sender: mpsc::UnboundedSender<TaskExecutionMessage>,
    /// 多个消费者共享接收端
    receiver: Arc<Mutex<mpsc::UnboundedReceiver<TaskExecutionMessage>>>,
    size: Arc<AtomicU64>,
}

impl QueueChannels {
    fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender,
            receiver: Arc::new(Mutex::new(receiver)),
            size: Arc::new(AtomicU64::new(0)),
        }
    }
}

/// 内存任务队列
///
/// 使用 Tokio channels 实现，按队列名懒创建，适用于嵌入式部署和测试。
#[derive(Debug, Default)]
pub struct InMemoryTaskQueue {
    queues: RwLock<HashMap<String, QueueChannels>>,
}

impl InMemoryTaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    async fn channels(
        &self,
        queue: &str,
    ) -> (
        mpsc::UnboundedSender<TaskExecutionMessage>,
        Arc<Mutex<mpsc::UnboundedReceiver<TaskExecutionMessage>>>,
        Arc<AtomicU64>,
    ) {
        {
            let queues = self.queues.read().await;
            if let Some(channels) = queues.get(queue) {
                return (
                    channels.sender.clone(),
                    channels.receiver.clone(),
                    channels.size.clone(),
                );
            }
        }

        let mut queues = self.queues.write().await;
        let channels = queues.entry(queue.to_string()).or_insert_with(|| {
            debug!("创建内存队列: {}", queue);
            QueueChannels::new()
        });
        (
            channels.sender.clone(),
            channels.receiver.clone(),
            channels.size.clone(),
        )
    }
}

#[async_trait]
impl TaskQueue for InMemoryTaskQueue {
    async fn push(&self, queue: &str, message: &TaskExecutionMessage) -> SchedulerResult<()> {
        let (sender, _, size) = self.channels(queue).await;
        sender
            .send(message.clone())
            .map_err(|e| SchedulerError::MessageQueue(format!("内存队列已关闭: {e}")))?;
        size.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn pop(
        &self,
        queue: &str,
        wait: Duration,
    ) -> SchedulerResult<Option<TaskExecutionMessage>> {
        let (_, receiver, size) = self.channels(queue).await;
        let mut receiver = receiver.lock().await;

        match tokio::time::timeout(wait, receiver.recv()).await {
            Ok(Some(message)) => {
                size.fetch_sub(1, Ordering::SeqCst);
                Ok(Some(message))
            }
            Ok(None) | Err(_) => Ok(None),
        }
    }

    async fn len(&self, queue: &str) -> SchedulerResult<u64> {
        let queues = self.queues.read().await;
        Ok(queues
            .get(queue)
            .map(|channels| channels.size.load(Ordering::SeqCst))
            .unwrap_or(0))
    }
}
