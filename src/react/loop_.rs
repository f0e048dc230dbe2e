//! 子计划执行：单个 SubPlan 的 THINKING ⇄ ACTING 循环
//!
//! THINKING：带思考 prompt 与工具 schema 调用 LLM，分类回复。
//! ACTING：并发执行本步请求的全部工具调用，按请求顺序追加 tool 消息，回到 THINKING。
//! 一步中途失败（未知工具、取消、格式错误）时不向会话写入该步的任何消息，
//! 会话中每条 tool_calls 都有对应的 tool 结果。
//! DONE：返回结果文本。循环轮数与工具调用总数都有上限，超出即以预算耗尽结束。

use std::sync::Arc;

use futures_util::future::{join_all, BoxFuture};
use futures_util::FutureExt;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

use crate::core::{AgentError, TaskScheduler};
use crate::llm::{GenerationParams, LlmClient};
use crate::memory::{Conversation, Message};
use crate::react::decision::{Classifier, Decision, ToolCallRequest};
use crate::react::events::{preview, send_event, ReactEvent, OBSERVATION_PREVIEW_CHARS};
use crate::react::prompts::{self, COMPLETED_TAG, NO_COMPLETED_TAG};
use crate::tools::{ToolExecutor, ToolResult};

/// 循环预算
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopLimits {
    /// 每个子计划最多的 THINKING 轮数
    pub max_cycles: usize,
    /// 每个子计划最多的工具调用总数
    pub max_tool_calls: usize,
    /// 嵌套分解的最大深度；0 表示不允许分解
    pub max_decompose_depth: usize,
}

impl Default for LoopLimits {
    fn default() -> Self {
        Self {
            max_cycles: 10,
            max_tool_calls: 35,
            max_decompose_depth: 0,
        }
    }
}

/// 子计划如何结束
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubplanOutcome {
    Solved,
    /// 需要用户澄清；调用方应把文本交给用户而不是当作答案
    Obscure,
    BudgetExhausted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubplanResult {
    pub text: String,
    pub outcome: SubplanOutcome,
}

impl SubplanResult {
    fn new(text: impl Into<String>, outcome: SubplanOutcome) -> Self {
        Self {
            text: text.into(),
            outcome,
        }
    }
}

/// 循环状态
#[derive(Debug)]
pub enum LoopState {
    Thinking,
    Acting(Vec<ToolCallRequest>),
    Done(SubplanResult),
}

/// 一次 run 的上下文：取消令牌与可选事件通道
#[derive(Debug, Clone, Default)]
pub struct RunContext {
    pub cancel: CancellationToken,
    pub event_tx: Option<UnboundedSender<ReactEvent>>,
}

impl RunContext {
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            event_tx: None,
        }
    }

    pub fn with_event_tx(mut self, tx: UnboundedSender<ReactEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    pub(crate) fn emit(&self, ev: ReactEvent) {
        send_event(self.event_tx.as_ref(), ev);
    }
}

/// 子计划执行器（跨会话共享，不持有任何会话状态）
pub struct SubplanExecutor {
    llm: Arc<dyn LlmClient>,
    tools: Arc<ToolExecutor>,
    scheduler: TaskScheduler,
    params: GenerationParams,
    limits: LoopLimits,
}

impl SubplanExecutor {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        tools: Arc<ToolExecutor>,
        scheduler: TaskScheduler,
        params: GenerationParams,
        limits: LoopLimits,
    ) -> Self {
        Self {
            llm,
            tools,
            scheduler,
            params,
            limits,
        }
    }

    /// 执行一个子计划直到 DONE
    pub async fn execute(
        &self,
        conversation: &mut Conversation,
        subplan: &str,
        ctx: &RunContext,
    ) -> Result<SubplanResult, AgentError> {
        self.execute_at_depth(conversation, subplan, 0, ctx).await
    }

    fn execute_at_depth<'a>(
        &'a self,
        conversation: &'a mut Conversation,
        subplan: &'a str,
        depth: usize,
        ctx: &'a RunContext,
    ) -> BoxFuture<'a, Result<SubplanResult, AgentError>> {
        async move {
            let classifier = Classifier::new(self.limits.max_decompose_depth > 0);
            let allow_decompose = depth < self.limits.max_decompose_depth;
            let mut cycles = 0usize;
            let mut tool_calls_used = 0usize;
            let mut state = LoopState::Thinking;
            // 当前步尚未写入会话的消息（思考 prompt 与工具调用），ACTING 成功后才提交
            let mut pending: Vec<Message> = Vec::new();

            loop {
                state = match state {
                    LoopState::Thinking => {
                        if cycles >= self.limits.max_cycles {
                            let limit = format!("max_cycles = {}", self.limits.max_cycles);
                            self.exhausted(conversation, subplan, &limit, ctx)?
                        } else {
                            cycles += 1;
                            ctx.emit(ReactEvent::Thinking { cycle: cycles });
                            let prompt = Message::user(prompts::think_prompt(subplan, allow_decompose));
                            let mut request = conversation.messages().to_vec();
                            request.push(prompt.clone());

                            let response = tokio::select! {
                                _ = ctx.cancel.cancelled() => return Err(AgentError::Cancelled),
                                r = self.llm.generate(&request, &self.params, Some(self.tools.schemas())) => r?,
                            };
                            tracing::debug!(subplan, cycle = cycles, content = %response.content_str(), "think response");

                            match classifier.classify(&response)? {
                                Decision::ToolCall(calls) => {
                                    if tool_calls_used + calls.len() > self.limits.max_tool_calls {
                                        conversation.push(prompt)?;
                                        let limit = format!("max_tool_calls = {}", self.limits.max_tool_calls);
                                        self.exhausted(conversation, subplan, &limit, ctx)?
                                    } else {
                                        tool_calls_used += calls.len();
                                        pending = vec![prompt, Message::assistant_tool_calls(calls.clone())];
                                        LoopState::Acting(calls)
                                    }
                                }
                                Decision::Solved(text) => {
                                    conversation.push(prompt)?;
                                    conversation.push(Message::assistant(text.clone()))?;
                                    LoopState::Done(SubplanResult::new(text, SubplanOutcome::Solved))
                                }
                                Decision::Obscure(text) => {
                                    conversation.push(prompt)?;
                                    conversation.push(Message::assistant(text.clone()))?;
                                    LoopState::Done(SubplanResult::new(text, SubplanOutcome::Obscure))
                                }
                                Decision::Decompose(steps) => {
                                    conversation.push(prompt)?;
                                    if !allow_decompose {
                                        let limit = format!(
                                            "max_decompose_depth = {}",
                                            self.limits.max_decompose_depth
                                        );
                                        self.exhausted(conversation, subplan, &limit, ctx)?
                                    } else {
                                        conversation.push(Message::assistant(response.content_str()))?;
                                        self.decompose(conversation, &steps, depth, ctx).await?
                                    }
                                }
                            }
                        }
                    }
                    LoopState::Acting(calls) => {
                        let results = self.act(&calls, ctx).await?;
                        for msg in std::mem::take(&mut pending) {
                            conversation.push(msg)?;
                        }
                        for (call, result) in calls.iter().zip(results) {
                            ctx.emit(ReactEvent::Observation {
                                id: call.id.clone(),
                                tool: call.name.clone(),
                                outcome: result.outcome.to_string(),
                                preview: preview(&result.payload, OBSERVATION_PREVIEW_CHARS),
                            });
                            conversation.push(Message::tool(call.id.clone(), result.observation()))?;
                        }
                        LoopState::Thinking
                    }
                    LoopState::Done(result) => {
                        tracing::info!(subplan, outcome = ?result.outcome, cycles, tool_calls_used, "subplan done");
                        return Ok(result);
                    }
                };
            }
        }
        .boxed()
    }

    /// 并发执行同一步的全部调用；返回值与 calls 一一对应、顺序一致
    async fn act(&self, calls: &[ToolCallRequest], ctx: &RunContext) -> Result<Vec<ToolResult>, AgentError> {
        let invocations = calls.iter().map(|call| async move {
            let _permit = self.scheduler.acquire_tool().await?;
            ctx.emit(ReactEvent::ToolCall {
                id: call.id.clone(),
                tool: call.name.clone(),
                args: call.arguments.clone(),
            });
            self.tools.invoke(&call.name, &call.arguments).await
        });
        let results = tokio::select! {
            _ = ctx.cancel.cancelled() => return Err(AgentError::Cancelled),
            r = join_all(invocations) => r,
        };
        results.into_iter().collect()
    }

    /// 依次执行嵌套子计划（深度 + 1），把结果汇总为一条清单消息后回到 THINKING；
    /// 任一嵌套子计划需要澄清时直接结束父子计划
    async fn decompose(
        &self,
        conversation: &mut Conversation,
        steps: &[String],
        depth: usize,
        ctx: &RunContext,
    ) -> Result<LoopState, AgentError> {
        tracing::info!(depth = depth + 1, steps = steps.len(), "decomposing subplan");
        let mut lines = Vec::with_capacity(steps.len());
        for step in steps {
            let result = self.execute_at_depth(conversation, step, depth + 1, ctx).await?;
            match result.outcome {
                SubplanOutcome::Obscure => {
                    tracing::info!(step = %step, "nested subplan needs clarification");
                    return Ok(LoopState::Done(result));
                }
                SubplanOutcome::Solved => lines.push(format!("{COMPLETED_TAG} {step}: {}", result.text)),
                SubplanOutcome::BudgetExhausted => {
                    lines.push(format!("{NO_COMPLETED_TAG} {step}: {}", result.text))
                }
            }
        }
        let summary = format!("Results of the smaller steps:\n{}", lines.join("\n"));
        conversation.push(Message::assistant(summary))?;
        Ok(LoopState::Thinking)
    }

    fn exhausted(
        &self,
        conversation: &mut Conversation,
        subplan: &str,
        limit: &str,
        ctx: &RunContext,
    ) -> Result<LoopState, AgentError> {
        tracing::warn!(subplan, limit, "subplan budget exhausted");
        ctx.emit(ReactEvent::BudgetExhausted {
            subplan: subplan.to_string(),
            limit: limit.to_string(),
        });
        let text = prompts::budget_exhausted(subplan, limit);
        conversation.push(Message::assistant(text.clone()))?;
        Ok(LoopState::Done(SubplanResult::new(text, SubplanOutcome::BudgetExhausted)))
    }
}
