//! Ponder - 先规划、再逐步推理与调用工具的问答智能体
//!
//! 模块划分：
//! - **agent**: 从配置组装 Orchestrator（LLM 后端、内置工具、记忆）
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误类型、主控编排、状态视图、会话监管、工具并发调度
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / DeepSeek / Mock）
//! - **memory**: 会话消息日志与长期记忆接口
//! - **react**: 规划、回复分类、子计划 THINKING ⇄ ACTING 循环
//! - **tools**: 参数 schema、注册表、执行器与内置工具

pub mod agent;
pub mod config;
pub mod core;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod react;
pub mod tools;

pub use crate::core::{AgentError, Answer, Orchestrator, OrchestratorBuilder};
pub use crate::memory::ConversationId;
