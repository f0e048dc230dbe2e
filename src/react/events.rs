//! 过程事件：用于向前端或日志推送规划、思考、工具调用与观察

use serde::Serialize;

/// 单步过程事件（可序列化为 JSON 供前端展示）
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReactEvent {
    /// 正在规划
    Planning,
    /// 规划完成：子计划列表（直接回答时为空）
    PlanReady { subplans: Vec<String> },
    /// 开始执行第 index 个子计划
    SubplanStarted { index: usize, description: String },
    /// 正在调用 LLM 思考（第几轮）
    Thinking { cycle: usize },
    /// 调用工具
    ToolCall { id: String, tool: String, args: String },
    /// 工具返回（预览，避免过长）
    Observation { id: String, tool: String, outcome: String, preview: String },
    /// 子计划结束
    SubplanDone { index: usize, result: String },
    /// 超出循环或工具调用预算
    BudgetExhausted { subplan: String, limit: String },
    /// 错误
    Error { text: String },
}

/// Observation 预览最大字符数
pub const OBSERVATION_PREVIEW_CHARS: usize = 200;

pub(crate) fn send_event(tx: Option<&tokio::sync::mpsc::UnboundedSender<ReactEvent>>, ev: ReactEvent) {
    if let Some(t) = tx {
        let _ = t.send(ev);
    }
}

pub(crate) fn preview(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        format!("{}...", text.chars().take(max).collect::<String>())
    } else {
        text.to_string()
    }
}
