//! Orchestrator：一次 run 的主控流程
//!
//! 首次使用的会话先写入 system 消息（身份 + 工具列表），然后规划；
//! 直接回答则立即返回，否则按计划顺序逐个执行子计划，最后对整段会话做一次汇总调用。
//! 同一会话在整个 run 期间由会话 Mutex 保证单写者，不同会话可完全并发。

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

use crate::core::status::PlanStatus;
use crate::core::{AgentError, SessionSupervisor, TaskScheduler};
use crate::llm::{GenerationParams, LlmClient};
use crate::memory::{
    Conversation, ConversationId, ConversationLog, MemoryRecord, MemoryStore, Message, NoopMemory,
};
use crate::react::prompts;
use crate::react::{
    LoopLimits, PlanOutcome, Planner, ReactEvent, RunContext, SubplanExecutor, SubplanOutcome,
};
use crate::tools::{ToolExecutor, ToolRegistry, ToolSchema};

/// run 的结果：最终回答，或需要用户补充信息的澄清问题
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    Final(String),
    Clarification(String),
}

impl Answer {
    pub fn text(&self) -> &str {
        match self {
            Answer::Final(t) | Answer::Clarification(t) => t,
        }
    }

    pub fn is_clarification(&self) -> bool {
        matches!(self, Answer::Clarification(_))
    }
}

impl fmt::Display for Answer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text())
    }
}

/// 编排器：显式持有模型、工具、记忆；无进程级全局状态
pub struct Orchestrator {
    name: String,
    llm: Arc<dyn LlmClient>,
    log: Arc<ConversationLog>,
    planner: Planner,
    executor: SubplanExecutor,
    tool_schemas: Vec<ToolSchema>,
    final_params: GenerationParams,
    memory: Arc<dyn MemoryStore>,
    memory_top_k: usize,
    supervisor: SessionSupervisor,
}

impl Orchestrator {
    pub fn builder(llm: Arc<dyn LlmClient>) -> OrchestratorBuilder {
        OrchestratorBuilder::new(llm)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn log(&self) -> &Arc<ConversationLog> {
        &self.log
    }

    pub fn tool_schemas(&self) -> &[ToolSchema] {
        &self.tool_schemas
    }

    /// 回答一个问题
    pub async fn run(&self, id: &ConversationId, question: &str) -> Result<Answer, AgentError> {
        self.run_inner(id, question, None, None).await
    }

    /// 与 run 相同；`cancel` 被取消时本次 run 以 Cancelled 结束
    pub async fn run_with_cancel(
        &self,
        id: &ConversationId,
        question: &str,
        cancel: &CancellationToken,
    ) -> Result<Answer, AgentError> {
        self.run_inner(id, question, Some(cancel), None).await
    }

    /// 与 run 相同，并把过程事件推送到 `event_tx`
    pub async fn run_with_events(
        &self,
        id: &ConversationId,
        question: &str,
        event_tx: UnboundedSender<ReactEvent>,
    ) -> Result<Answer, AgentError> {
        self.run_inner(id, question, None, Some(event_tx)).await
    }

    /// 取消指定会话进行中的 run
    pub fn cancel(&self, id: &ConversationId) -> bool {
        self.supervisor.cancel(id)
    }

    /// 取消全部进行中的 run
    pub fn shutdown(&self) {
        self.supervisor.cancel_all();
    }

    async fn run_inner(
        &self,
        id: &ConversationId,
        question: &str,
        external: Option<&CancellationToken>,
        event_tx: Option<UnboundedSender<ReactEvent>>,
    ) -> Result<Answer, AgentError> {
        let handle = self.log.conversation(id).await;
        let mut conversation = handle.lock().await;

        let mut ctx = RunContext::new(self.supervisor.begin(id, external));
        if let Some(tx) = event_tx {
            ctx = ctx.with_event_tx(tx);
        }
        tracing::info!(conversation = %id, "run started");
        let result = self.drive(&mut conversation, question, &ctx).await;
        self.supervisor.finish(id);

        match &result {
            Ok(answer) => {
                let (prompt_tokens, completion_tokens, total_tokens) = self.llm.token_usage();
                tracing::info!(
                    conversation = %id,
                    clarification = answer.is_clarification(),
                    prompt_tokens,
                    completion_tokens,
                    total_tokens,
                    "run finished"
                )
            }
            Err(e) => {
                tracing::error!(conversation = %id, error = %e, "run aborted");
                ctx.emit(ReactEvent::Error { text: e.to_string() });
            }
        }
        result
    }

    async fn drive(
        &self,
        conversation: &mut Conversation,
        question: &str,
        ctx: &RunContext,
    ) -> Result<Answer, AgentError> {
        if conversation.is_empty() {
            conversation.push(Message::system(prompts::system_prompt(&self.name, &self.tool_schemas)))?;
        }

        let memories = if self.memory.enabled() {
            let found = self.memory.search(question, self.memory_top_k, None).await;
            tracing::debug!(recalled = found.len(), "memory recall");
            found
        } else {
            Vec::new()
        };

        ctx.emit(ReactEvent::Planning);
        let plan = match self.planner.plan(conversation, question, &memories, &ctx.cancel).await? {
            PlanOutcome::Direct(text) => {
                ctx.emit(ReactEvent::PlanReady { subplans: Vec::new() });
                conversation.push(Message::assistant(text.clone()))?;
                self.remember(question, &text).await;
                return Ok(Answer::Final(text));
            }
            PlanOutcome::Plan(plan) => plan,
        };

        let mut plan = plan;
        ctx.emit(ReactEvent::PlanReady {
            subplans: plan.subplans().iter().map(|s| s.description().to_string()).collect(),
        });

        for index in 0..plan.len() {
            let description = plan.subplans()[index].description().to_string();
            ctx.emit(ReactEvent::SubplanStarted {
                index,
                description: description.clone(),
            });
            tracing::info!(index, subplan = %description, "executing subplan");

            let result = self.executor.execute(conversation, &description, ctx).await?;
            conversation.push(Message::assistant(result.text.clone()))?;
            plan.complete(index);
            ctx.emit(ReactEvent::SubplanDone {
                index,
                result: result.text.clone(),
            });

            if result.outcome == SubplanOutcome::Obscure {
                tracing::info!(index, "subplan needs clarification, stopping");
                return Ok(Answer::Clarification(result.text));
            }
        }

        let prompt = Message::user(prompts::final_prompt(&PlanStatus::from(&plan)));
        let mut request = conversation.messages().to_vec();
        request.push(prompt.clone());
        let response = tokio::select! {
            _ = ctx.cancel.cancelled() => return Err(AgentError::Cancelled),
            r = self.llm.generate(&request, &self.final_params, None) => r?,
        };
        let text = response.content_str().trim().to_string();
        conversation.push(prompt)?;
        conversation.push(Message::assistant(text.clone()))?;
        self.remember(question, &text).await;
        Ok(Answer::Final(text))
    }

    async fn remember(&self, question: &str, answer: &str) {
        if self.memory.enabled() {
            self.memory
                .store(MemoryRecord::new(format!("Q: {question}\nA: {answer}")))
                .await;
        }
    }
}

/// Orchestrator 构建器：未设置的部分使用默认值（空工具表、无记忆、默认预算）
pub struct OrchestratorBuilder {
    llm: Arc<dyn LlmClient>,
    name: String,
    registry: ToolRegistry,
    log: Option<Arc<ConversationLog>>,
    memory: Arc<dyn MemoryStore>,
    memory_top_k: usize,
    limits: LoopLimits,
    tool_timeout_secs: u64,
    max_concurrent_tools: usize,
    params: GenerationParams,
    think_params: GenerationParams,
}

impl OrchestratorBuilder {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self {
            llm,
            name: "Ponder".to_string(),
            registry: ToolRegistry::new(),
            log: None,
            memory: Arc::new(NoopMemory),
            memory_top_k: 8,
            limits: LoopLimits::default(),
            tool_timeout_secs: 30,
            max_concurrent_tools: 3,
            params: GenerationParams::default(),
            think_params: GenerationParams::default(),
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn tools(mut self, registry: ToolRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// 共享外部的会话日志（默认新建）
    pub fn log(mut self, log: Arc<ConversationLog>) -> Self {
        self.log = Some(log);
        self
    }

    pub fn memory(mut self, memory: Arc<dyn MemoryStore>, top_k: usize) -> Self {
        self.memory = memory;
        self.memory_top_k = top_k;
        self
    }

    pub fn limits(mut self, limits: LoopLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn tool_timeout_secs(mut self, secs: u64) -> Self {
        self.tool_timeout_secs = secs;
        self
    }

    pub fn max_concurrent_tools(mut self, n: usize) -> Self {
        self.max_concurrent_tools = n;
        self
    }

    /// 规划与最终汇总调用的生成参数
    pub fn params(mut self, params: GenerationParams) -> Self {
        self.params = params;
        self
    }

    /// 思考阶段的生成参数
    pub fn think_params(mut self, params: GenerationParams) -> Self {
        self.think_params = params;
        self
    }

    pub fn build(self) -> Orchestrator {
        let tools = Arc::new(ToolExecutor::new(Arc::new(self.registry), self.tool_timeout_secs));
        let tool_schemas = tools.schemas().to_vec();
        let executor = SubplanExecutor::new(
            self.llm.clone(),
            tools,
            TaskScheduler::new(self.max_concurrent_tools),
            self.think_params,
            self.limits,
        );
        Orchestrator {
            name: self.name,
            planner: Planner::new(self.llm.clone(), self.params.clone()),
            llm: self.llm,
            log: self.log.unwrap_or_default(),
            executor,
            tool_schemas,
            final_params: self.params,
            memory: self.memory,
            memory_top_k: self.memory_top_k,
            supervisor: SessionSupervisor::new(),
        }
    }
}
