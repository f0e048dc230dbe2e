//! Agent 错误类型
//!
//! 规划 / 子计划执行 / 工具调用过程中会中止一次 run 的错误。
//! 工具自身的失败不在此列：它们以 ToolResult 数据的形式回灌给模型。

use thiserror::Error;

use crate::llm::LlmError;

/// 中止当前 run 的错误（格式、未知工具、配置、传输、取消）
#[derive(Error, Debug)]
pub enum AgentError {
    /// 模型输出不含任何可识别的标记
    #[error("Format error: {0}")]
    Format(String),

    /// 模型请求了注册表中不存在的工具
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    /// tool 消息的 correlation id 没有对应的 tool-call 请求
    #[error("Tool result without matching tool call: {0}")]
    OrphanToolResult(String),

    #[error("Cancelled")]
    Cancelled,
}

impl AgentError {
    pub fn format(msg: impl Into<String>) -> Self {
        Self::Format(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
