//! 对话日志：每个会话一条只追加的消息序列
//!
//! ConversationLog 按 ConversationId 持有 Conversation；同一会话在一次 run 内由 Orchestrator 独占写入，
//! 不同会话互不影响、可完全并发。没有删除或重排操作。

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};

use crate::core::AgentError;
use crate::react::ToolCallRequest;

/// 消息角色（与 LLM API 一致）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
    Tool,
}

/// 单条消息
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// 仅 assistant：待执行的 tool call
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRequest>,
    /// 仅 tool：对应的 tool call id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    fn text(role: Role, content: String) -> Self {
        Self {
            role,
            content: Some(content),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::text(Role::User, content.into())
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::text(Role::Assistant, content.into())
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::text(Role::System, content.into())
    }

    /// 记录待执行调用的 assistant 消息（无文本内容）
    pub fn assistant_tool_calls(calls: Vec<ToolCallRequest>) -> Self {
        Self {
            role: Role::Assistant,
            content: None,
            tool_calls: calls,
            tool_call_id: None,
        }
    }

    pub fn tool(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: Some(call_id.into()),
        }
    }

    pub fn content_str(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }
}

/// 会话标识（不透明字符串，默认 uuid v4）
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(String);

impl ConversationId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConversationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ConversationId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// 单个会话：只追加，顺序即追加顺序
#[derive(Clone, Debug)]
pub struct Conversation {
    id: ConversationId,
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new(id: ConversationId) -> Self {
        Self {
            id,
            messages: Vec::new(),
        }
    }

    pub fn id(&self) -> &ConversationId {
        &self.id
    }

    /// 追加到末尾；tool 消息必须对应此前某条 assistant 消息里的 tool call
    pub fn push(&mut self, msg: Message) -> Result<(), AgentError> {
        if msg.role == Role::Tool {
            let call_id = msg.tool_call_id.as_deref().unwrap_or("");
            if !self.has_tool_call(call_id) {
                return Err(AgentError::OrphanToolResult(call_id.to_string()));
            }
        }
        self.messages.push(msg);
        Ok(())
    }

    fn has_tool_call(&self, call_id: &str) -> bool {
        self.messages
            .iter()
            .filter(|m| m.role == Role::Assistant)
            .flat_map(|m| m.tool_calls.iter())
            .any(|c| c.id == call_id)
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// 所有会话的日志；首次使用时隐式创建会话，运行期间从不删除
#[derive(Default)]
pub struct ConversationLog {
    conversations: RwLock<HashMap<ConversationId, Arc<Mutex<Conversation>>>>,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// 取得会话句柄，不存在时创建。持有其 Mutex 即为该会话的唯一写者。
    pub async fn conversation(&self, id: &ConversationId) -> Arc<Mutex<Conversation>> {
        if let Some(conv) = self.conversations.read().await.get(id) {
            return conv.clone();
        }
        let mut map = self.conversations.write().await;
        map.entry(id.clone())
            .or_insert_with(|| {
                tracing::debug!(conversation = %id, "creating conversation record");
                Arc::new(Mutex::new(Conversation::new(id.clone())))
            })
            .clone()
    }

    pub async fn append(&self, id: &ConversationId, msg: Message) -> Result<(), AgentError> {
        let conv = self.conversation(id).await;
        let mut guard = conv.lock().await;
        guard.push(msg)
    }

    /// 完整有序快照；未知会话返回空
    pub async fn snapshot(&self, id: &ConversationId) -> Vec<Message> {
        let conv = match self.conversations.read().await.get(id) {
            Some(c) => c.clone(),
            None => return Vec::new(),
        };
        let guard = conv.lock().await;
        guard.messages().to_vec()
    }

    pub async fn len(&self) -> usize {
        self.conversations.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.conversations.read().await.is_empty()
    }
}
