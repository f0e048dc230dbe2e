//! Planner：把用户问题变成直接回答或有序子计划
//!
//! 以会话 + 规划 prompt 调用 LLM，成功后一并追加 prompt（user）与原始回复（assistant），再用 parse_plan 解析。

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::core::AgentError;
use crate::llm::{GenerationParams, LlmClient};
use crate::memory::{Conversation, Message, ScoredRecord};
use crate::react::decision::{checklist_lines, marker_payload, ModelResponse};
use crate::react::plan::Plan;
use crate::react::prompts::{self, EASY_END_TAG, EASY_TAG, PLAN_END_TAG, PLAN_TAG, SOLVED_TAG};

/// 规划结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanOutcome {
    /// 问题足够简单，直接给出答案
    Direct(String),
    Plan(Plan),
}

/// 解析规划回复：EASY + SOLVED 为直接回答；否则必须含 PLAN，其后每个非空行是一个子计划
pub fn parse_plan(output: &str, goal: &str) -> Result<PlanOutcome, AgentError> {
    if let (Some(_), Some(solved)) = (output.find(EASY_TAG), output.find(SOLVED_TAG)) {
        let rest = &output[solved + SOLVED_TAG.len()..];
        let body = rest.find(EASY_END_TAG).map_or(rest, |end| &rest[..end]);
        return Ok(PlanOutcome::Direct(marker_payload(body).to_string()));
    }

    let start = output.find(PLAN_TAG).ok_or_else(|| {
        AgentError::format(format!(
            "plan response has neither {EASY_TAG}/{SOLVED_TAG} nor {PLAN_TAG}"
        ))
    })?;
    let rest = &output[start + PLAN_TAG.len()..];
    let body = rest.find(PLAN_END_TAG).map_or(rest, |end| &rest[..end]);
    let body = body.trim_start();
    let body = body.strip_prefix(':').unwrap_or(body);

    let steps = checklist_lines(body);
    if steps.is_empty() {
        return Err(AgentError::format("plan lists no subplans"));
    }
    Ok(PlanOutcome::Plan(Plan::new(goal, steps)))
}

/// Planner：持有 LLM 与规划用的生成参数
pub struct Planner {
    llm: Arc<dyn LlmClient>,
    params: GenerationParams,
}

impl Planner {
    pub fn new(llm: Arc<dyn LlmClient>, params: GenerationParams) -> Self {
        Self { llm, params }
    }

    pub async fn plan(
        &self,
        conversation: &mut Conversation,
        question: &str,
        memories: &[ScoredRecord],
        cancel: &CancellationToken,
    ) -> Result<PlanOutcome, AgentError> {
        let prompt = Message::user(prompts::plan_prompt(question, memories));
        let mut request = conversation.messages().to_vec();
        request.push(prompt.clone());

        let response: ModelResponse = tokio::select! {
            _ = cancel.cancelled() => return Err(AgentError::Cancelled),
            r = self.llm.generate(&request, &self.params, None) => r?,
        };
        let raw = response.content_str().to_string();
        tracing::debug!(plan = %raw, "planning response");
        conversation.push(prompt)?;
        conversation.push(Message::assistant(raw.clone()))?;

        let outcome = parse_plan(&raw, question)?;
        match &outcome {
            PlanOutcome::Direct(_) => tracing::info!("question answered directly without a plan"),
            PlanOutcome::Plan(plan) => tracing::info!(subplans = plan.len(), "plan created"),
        }
        Ok(outcome)
    }
}
