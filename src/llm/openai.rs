//! OpenAI 兼容 API 客户端
//!
//! 通过 async_openai 调用任意 OpenAI 兼容端点（可配置 base_url）；支持 DeepSeek、OpenAI、自建代理等。
//! 请求体按线上 JSON 格式组装后反序列化为 CreateChatCompletionRequest，工具以 function 形式提供，
//! 回复中的 tool_calls 映射为 ToolCallRequest（arguments 保持原始字符串）。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_openai::config::OpenAIConfig;
use async_openai::types::chat::CreateChatCompletionRequest;
use async_openai::Client;
use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::llm::{GenerationParams, LlmClient, LlmError};
use crate::memory::{Message, Role};
use crate::react::{ModelResponse, ToolCallRequest};
use crate::tools::ToolSchema;

/// Token 使用统计（累计值）
#[derive(Debug, Clone, Default)]
pub struct TokenUsage {
    pub prompt_tokens: Arc<AtomicU64>,
    pub completion_tokens: Arc<AtomicU64>,
    pub total_tokens: Arc<AtomicU64>,
}

impl TokenUsage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, prompt: u64, completion: u64) {
        self.prompt_tokens.fetch_add(prompt, Ordering::Relaxed);
        self.completion_tokens.fetch_add(completion, Ordering::Relaxed);
        self.total_tokens.fetch_add(prompt + completion, Ordering::Relaxed);
    }

    pub fn get(&self) -> (u64, u64, u64) {
        (
            self.prompt_tokens.load(Ordering::Relaxed),
            self.completion_tokens.load(Ordering::Relaxed),
            self.total_tokens.load(Ordering::Relaxed),
        )
    }
}

/// OpenAI 兼容客户端：持有 Client、model 名与单次请求超时
pub struct OpenAiClient {
    client: Client<OpenAIConfig>,
    model: String,
    request_timeout: Duration,
    /// 累计 token 使用统计
    pub usage: TokenUsage,
}

impl OpenAiClient {
    pub fn new(base_url: Option<&str>, model: &str, api_key: &str, request_timeout: Duration) -> Self {
        let config = match base_url {
            Some(url) => OpenAIConfig::new().with_api_base(url).with_api_key(api_key),
            None => OpenAIConfig::new().with_api_key(api_key),
        };

        Self {
            client: Client::with_config(config),
            model: model.to_string(),
            request_timeout,
            usage: TokenUsage::new(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_request(
        &self,
        messages: &[Message],
        params: &GenerationParams,
        tools: Option<&[ToolSchema]>,
    ) -> Result<CreateChatCompletionRequest, LlmError> {
        let mut body = Map::new();
        body.insert("model".into(), Value::String(self.model.clone()));
        body.insert(
            "messages".into(),
            Value::Array(messages.iter().map(wire_message).collect()),
        );
        if let Some(t) = params.temperature {
            body.insert("temperature".into(), json!(t));
        }
        if let Some(p) = params.top_p {
            body.insert("top_p".into(), json!(p));
        }
        if let Some(m) = params.max_tokens {
            body.insert("max_tokens".into(), json!(m));
        }
        if let Some(p) = params.presence_penalty {
            body.insert("presence_penalty".into(), json!(p));
        }
        if let Some(tools) = tools.filter(|t| !t.is_empty()) {
            let wire: Vec<Value> = tools
                .iter()
                .map(|t| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": t.name,
                            "description": t.description,
                            "parameters": t.parameters,
                        }
                    })
                })
                .collect();
            body.insert("tools".into(), Value::Array(wire));
        }
        serde_json::from_value(Value::Object(body))
            .map_err(|e| LlmError::Request(format!("failed to build chat request: {e}")))
    }
}

/// Message -> OpenAI 线上格式
fn wire_message(m: &Message) -> Value {
    let role = match m.role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    };
    let mut obj = Map::new();
    obj.insert("role".into(), Value::String(role.to_string()));
    if let Some(content) = &m.content {
        obj.insert("content".into(), Value::String(content.clone()));
    }
    if !m.tool_calls.is_empty() {
        let calls: Vec<Value> = m
            .tool_calls
            .iter()
            .map(|c| {
                json!({
                    "id": c.id,
                    "type": "function",
                    "function": {"name": c.name, "arguments": c.arguments},
                })
            })
            .collect();
        obj.insert("tool_calls".into(), Value::Array(calls));
    }
    if let Some(id) = &m.tool_call_id {
        obj.insert("tool_call_id".into(), Value::String(id.clone()));
    }
    Value::Object(obj)
}

/// 从回复消息的线上格式中取出文本与 function 调用
fn parse_response_message(message: &Value) -> Result<ModelResponse, LlmError> {
    let content = message
        .get("content")
        .and_then(Value::as_str)
        .map(String::from)
        .filter(|s| !s.is_empty());

    let mut tool_calls = Vec::new();
    if let Some(calls) = message.get("tool_calls").and_then(Value::as_array) {
        for call in calls {
            let id = call.get("id").and_then(Value::as_str);
            let function = call.get("function");
            let name = function.and_then(|f| f.get("name")).and_then(Value::as_str);
            let arguments = function
                .and_then(|f| f.get("arguments"))
                .and_then(Value::as_str)
                .unwrap_or_default();
            match (id, name) {
                (Some(id), Some(name)) => tool_calls.push(ToolCallRequest::new(id, name, arguments)),
                _ => {
                    return Err(LlmError::InvalidResponse(format!(
                        "tool call without id or function name: {call}"
                    )))
                }
            }
        }
    }
    Ok(ModelResponse { content, tool_calls })
}

#[async_trait]
impl LlmClient for OpenAiClient {
    fn token_usage(&self) -> (u64, u64, u64) {
        self.usage.get()
    }

    async fn generate(
        &self,
        messages: &[Message],
        params: &GenerationParams,
        tools: Option<&[ToolSchema]>,
    ) -> Result<ModelResponse, LlmError> {
        let request = self.build_request(messages, params, tools)?;

        let response = tokio::time::timeout(self.request_timeout, self.client.chat().create(request))
            .await
            .map_err(|_| {
                LlmError::Request(format!(
                    "request timed out after {}s",
                    self.request_timeout.as_secs()
                ))
            })?
            .map_err(|e| LlmError::Request(e.to_string()))?;

        // 提取 token 使用统计
        if let Some(usage) = &response.usage {
            self.usage
                .add(usage.prompt_tokens as u64, usage.completion_tokens as u64);
        }

        let choice = response
            .choices
            .first()
            .ok_or_else(|| LlmError::InvalidResponse("response has no choices".to_string()))?;
        let message = serde_json::to_value(&choice.message)
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;
        parse_response_message(&message)
    }
}
