//! Mock LLM 客户端（用于测试与 `mock` provider，无需 API）
//!
//! 按脚本顺序返回预设回复并记录每次请求；脚本耗尽后返回 LlmError::Exhausted。

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::{GenerationParams, LlmClient, LlmError};
use crate::memory::Message;
use crate::react::ModelResponse;
use crate::tools::ToolSchema;

/// 一次被记录的请求
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub messages: Vec<Message>,
    pub params: GenerationParams,
    /// 未传工具时为空
    pub tools: Vec<ToolSchema>,
}

/// Mock 客户端：脚本化回复（FIFO）
#[derive(Debug, Default)]
pub struct MockLlmClient {
    script: Mutex<VecDeque<ModelResponse>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_responses(responses: Vec<ModelResponse>) -> Self {
        Self {
            script: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// 追加一条脚本回复
    pub fn push(&self, response: ModelResponse) {
        self.script
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push_back(response);
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn remaining(&self) -> usize {
        self.script.lock().unwrap_or_else(|p| p.into_inner()).len()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn generate(
        &self,
        messages: &[Message],
        params: &GenerationParams,
        tools: Option<&[ToolSchema]>,
    ) -> Result<ModelResponse, LlmError> {
        self.requests
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(RecordedRequest {
                messages: messages.to_vec(),
                params: params.clone(),
                tools: tools.map(<[ToolSchema]>::to_vec).unwrap_or_default(),
            });
        self.script
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .pop_front()
            .ok_or(LlmError::Exhausted)
    }
}
