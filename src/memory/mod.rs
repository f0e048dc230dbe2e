//! 记忆层：短期（会话消息日志）、长期（跨会话检索）

pub mod conversation;
pub mod long_term;

pub use conversation::{Conversation, ConversationId, ConversationLog, Message, Role};
pub use long_term::{InMemoryStore, MemoryFilter, MemoryRecord, MemoryStore, NoopMemory, ScoredRecord};
