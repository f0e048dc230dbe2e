//! 会话监管：生命周期、中断管理
//!
//! 持有根 CancellationToken；每个进行中的会话分到一个子 token，可单独取消，根 token 取消时全部取消。

use std::collections::HashMap;
use std::sync::Mutex;

use tokio_util::sync::CancellationToken;

use crate::memory::ConversationId;

/// 根 token + 每个活跃会话的子 token
#[derive(Debug, Default)]
pub struct SessionSupervisor {
    cancel_token: CancellationToken,
    active: Mutex<HashMap<ConversationId, CancellationToken>>,
}

impl SessionSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_active<R>(&self, f: impl FnOnce(&mut HashMap<ConversationId, CancellationToken>) -> R) -> R {
        let mut guard = self.active.lock().unwrap_or_else(|p| p.into_inner());
        f(&mut guard)
    }

    /// 为一次 run 创建子 token；若 `external` 给出，则它被取消时同样取消本次 run
    pub fn begin(&self, id: &ConversationId, external: Option<&CancellationToken>) -> CancellationToken {
        let token = self.cancel_token.child_token();
        if let Some(ext) = external {
            let ext = ext.clone();
            let linked = token.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = ext.cancelled() => linked.cancel(),
                    _ = linked.cancelled() => {}
                }
            });
        }
        self.with_active(|map| map.insert(id.clone(), token.clone()));
        token
    }

    /// run 结束（无论成功与否）后移除子 token；同时取消它以结束外部 token 的监听任务
    pub fn finish(&self, id: &ConversationId) {
        if let Some(token) = self.with_active(|map| map.remove(id)) {
            token.cancel();
        }
    }

    /// 取消指定会话当前的 run；没有进行中的 run 时返回 false
    pub fn cancel(&self, id: &ConversationId) -> bool {
        match self.with_active(|map| map.get(id).cloned()) {
            Some(token) => {
                tracing::info!(conversation = %id, "cancelling run");
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// 取消全部会话（进程退出时）
    pub fn cancel_all(&self) {
        self.cancel_token.cancel();
    }
}
