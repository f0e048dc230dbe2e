//! 模型回复分类：把一次原始回复归为唯一的 Decision
//!
//! 结构化 tool call 优先；否则在自由文本中单遍扫描已知标记，要求恰好命中一个。
//! 标记出现在下标 0 同样算命中；零个或多个标记都是 Format 错误，不会静默落空。

use serde::{Deserialize, Serialize};

use crate::core::AgentError;
use crate::react::events::preview;
use crate::react::prompts::{
    COMPLETED_TAG, DECOMPOSE_END_TAG, DECOMPOSE_TAG, NO_COMPLETED_TAG, OBSCURE_TAG, SOLVED_TAG,
};

/// 模型通过 function calling 发出的一次调用请求；arguments 为未解析的原始字符串
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

impl ToolCallRequest {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }
}

/// 模型一次回复：文本与结构化调用可能同时存在
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelResponse {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCallRequest>,
}

impl ModelResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            tool_calls: Vec::new(),
        }
    }

    pub fn tool_calls(calls: Vec<ToolCallRequest>) -> Self {
        Self {
            content: None,
            tool_calls: calls,
        }
    }

    pub fn content_str(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }
}

/// 分类结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// 调用工具（保持模型给出的顺序）
    ToolCall(Vec<ToolCallRequest>),
    /// 子计划已解决
    Solved(String),
    /// 需要向用户澄清
    Obscure(String),
    /// 拆分为更小的子计划（仅在允许嵌套分解时识别）
    Decompose(Vec<String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Marker {
    Solved,
    Obscure,
    Decompose,
}

impl Marker {
    fn tag(self) -> &'static str {
        match self {
            Marker::Solved => SOLVED_TAG,
            Marker::Obscure => OBSCURE_TAG,
            Marker::Decompose => DECOMPOSE_TAG,
        }
    }
}

/// 回复分类器；默认只识别 solved / obscure 两个标记
#[derive(Debug, Clone, Copy, Default)]
pub struct Classifier {
    allow_decompose: bool,
}

impl Classifier {
    pub fn new(allow_decompose: bool) -> Self {
        Self { allow_decompose }
    }

    pub fn classify(&self, response: &ModelResponse) -> Result<Decision, AgentError> {
        if !response.tool_calls.is_empty() {
            return Ok(Decision::ToolCall(response.tool_calls.clone()));
        }

        let text = response.content_str();
        let mut markers = vec![Marker::Solved, Marker::Obscure];
        if self.allow_decompose {
            markers.push(Marker::Decompose);
        }
        let found: Vec<(Marker, usize)> = markers
            .into_iter()
            .filter_map(|m| text.find(m.tag()).map(|idx| (m, idx)))
            .collect();

        let (marker, idx) = match found.as_slice() {
            [one] => *one,
            [] => {
                return Err(AgentError::format(format!(
                    "response contains no recognized marker: {}",
                    preview(text, 120)
                )))
            }
            many => {
                let tags: Vec<&str> = many.iter().map(|(m, _)| m.tag()).collect();
                return Err(AgentError::format(format!(
                    "response contains more than one marker ({})",
                    tags.join(", ")
                )));
            }
        };

        let rest = &text[idx + marker.tag().len()..];
        match marker {
            Marker::Solved => Ok(Decision::Solved(marker_payload(rest).to_string())),
            Marker::Obscure => Ok(Decision::Obscure(marker_payload(rest).to_string())),
            Marker::Decompose => {
                let body = rest.find(DECOMPOSE_END_TAG).map_or(rest, |end| &rest[..end]);
                let steps = checklist_lines(body);
                if steps.is_empty() {
                    return Err(AgentError::format("decomposition lists no steps"));
                }
                Ok(Decision::Decompose(steps))
            }
        }
    }
}

/// 使用默认（扁平）分类器
pub fn classify(response: &ModelResponse) -> Result<Decision, AgentError> {
    Classifier::default().classify(response)
}

/// 标记后的内容：去掉格式约定中的冒号并 trim
pub(crate) fn marker_payload(rest: &str) -> &str {
    let rest = rest.trim_start();
    rest.strip_prefix(':').unwrap_or(rest).trim()
}

/// 按行切分，去掉 Markdown 清单前缀与空行
pub(crate) fn checklist_lines(body: &str) -> Vec<String> {
    body.lines()
        .map(|line| {
            let line = line.trim();
            let line = line
                .strip_prefix(COMPLETED_TAG)
                .or_else(|| line.strip_prefix(NO_COMPLETED_TAG))
                .or_else(|| line.strip_prefix("- [ ]"))
                .unwrap_or(line);
            line.trim().to_string()
        })
        .filter(|line| !line.is_empty())
        .collect()
}
