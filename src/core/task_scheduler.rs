//! 任务调度：Tool Pool
//!
//! 同一思考步请求的多个工具调用并发执行，使用 Semaphore 限制同时在跑的工具数。

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::core::AgentError;

/// 任务调度器（跨会话共享）
#[derive(Debug, Clone)]
pub struct TaskScheduler {
    /// 工具并发限制（默认 3）
    tool_semaphore: Arc<Semaphore>,
}

impl TaskScheduler {
    pub fn new(max_concurrent_tools: usize) -> Self {
        Self {
            tool_semaphore: Arc::new(Semaphore::new(max_concurrent_tools.max(1))),
        }
    }

    /// 获取工具执行许可
    pub async fn acquire_tool(&self) -> Result<OwnedSemaphorePermit, AgentError> {
        self.tool_semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| AgentError::Cancelled)
    }

    pub fn available_tool_permits(&self) -> usize {
        self.tool_semaphore.available_permits()
    }
}

impl Default for TaskScheduler {
    fn default() -> Self {
        Self::new(3)
    }
}
