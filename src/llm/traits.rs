//! LLM 客户端抽象
//!
//! 所有后端（OpenAI 兼容 / DeepSeek / Mock）实现 LlmClient：generate 返回文本或结构化 tool call 列表。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::memory::Message;
use crate::react::ModelResponse;
use crate::tools::ToolSchema;

/// 模型传输层错误
#[derive(Error, Debug, Clone)]
pub enum LlmError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Mock 脚本已耗尽
    #[error("no scripted response left")]
    Exhausted,
}

/// 生成参数；None 表示沿用服务端默认值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub max_tokens: Option<u32>,
    pub presence_penalty: Option<f32>,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: Some(0.8),
            top_p: None,
            max_tokens: None,
            presence_penalty: None,
        }
    }
}

impl GenerationParams {
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// LLM 客户端 trait
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// 对完整消息序列生成一次回复；传入 tools 时模型可返回 tool call
    async fn generate(
        &self,
        messages: &[Message],
        params: &GenerationParams,
        tools: Option<&[ToolSchema]>,
    ) -> Result<ModelResponse, LlmError>;

    /// 获取累计 token 使用统计：(prompt_tokens, completion_tokens, total_tokens)
    /// 默认返回 (0, 0, 0)，具体实现可覆盖
    fn token_usage(&self) -> (u64, u64, u64) {
        (0, 0, 0)
    }
}
