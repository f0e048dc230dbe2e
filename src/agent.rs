//! Headless Agent 运行时
//!
//! 从 AppConfig 组装 Orchestrator：create_llm_from_config 选择 LLM 后端，
//! builtin_tools 注册内置工具，create_orchestrator_from_config 把预算、超时、记忆接起来。

use std::sync::Arc;
use std::time::Duration;

use crate::config::AppConfig;
use crate::core::{AgentError, Orchestrator};
use crate::llm::{create_deepseek_client, GenerationParams, LlmClient, MockLlmClient, OpenAiClient};
use crate::memory::{InMemoryStore, MemoryStore, NoopMemory};
use crate::react::LoopLimits;
use crate::tools::{math_tools, EchoTool, ToolRegistry};

/// 长期记忆内存实现的容量上限
const MEMORY_MAX_ENTRIES: usize = 1000;

/// 根据配置选择 LLM 后端（OpenAI 兼容 / DeepSeek / Mock）；缺少 model 或 API key 时返回配置错误
pub fn create_llm_from_config(cfg: &AppConfig) -> Result<Arc<dyn LlmClient>, AgentError> {
    let provider = cfg.llm.provider.to_lowercase();
    if provider == "mock" {
        tracing::warn!("Using Mock LLM (scripted, no API calls)");
        return Ok(Arc::new(MockLlmClient::new()));
    }

    let api_key = cfg
        .llm
        .resolved_api_key()
        .ok_or_else(|| AgentError::config(format!("no API key configured for provider `{provider}`")))?;
    let timeout = Duration::from_secs(cfg.llm.timeouts.request);

    match provider.as_str() {
        "deepseek" => {
            tracing::info!("Using DeepSeek LLM ({})", cfg.llm.model);
            Ok(Arc::new(create_deepseek_client(
                cfg.llm.base_url.as_deref(),
                Some(cfg.llm.model.as_str()),
                &api_key,
                timeout,
            )))
        }
        "openai" => {
            if cfg.llm.model.trim().is_empty() {
                return Err(AgentError::config("llm.model is empty"));
            }
            tracing::info!("Using OpenAI-compatible LLM ({})", cfg.llm.model);
            Ok(Arc::new(OpenAiClient::new(
                cfg.llm.base_url.as_deref(),
                &cfg.llm.model,
                &api_key,
                timeout,
            )))
        }
        other => Err(AgentError::config(format!("unknown llm.provider `{other}`"))),
    }
}

/// 内置工具：echo + 四则运算
pub fn builtin_tools() -> Result<ToolRegistry, AgentError> {
    let mut tools = ToolRegistry::new();
    tools.register(EchoTool)?;
    for tool in math_tools() {
        tools.register(tool)?;
    }
    Ok(tools)
}

/// 用给定 LLM 与配置组装 Orchestrator
pub fn build_orchestrator(
    cfg: &AppConfig,
    llm: Arc<dyn LlmClient>,
    tools: ToolRegistry,
) -> Orchestrator {
    let memory: Arc<dyn MemoryStore> = if cfg.memory.enabled {
        Arc::new(InMemoryStore::new(cfg.memory.score_threshold, MEMORY_MAX_ENTRIES))
    } else {
        Arc::new(NoopMemory)
    };

    let mut params = GenerationParams::default();
    params.temperature = cfg.llm.temperature;
    let think_params = GenerationParams::default().with_temperature(cfg.agent.think_temperature);

    Orchestrator::builder(llm)
        .name(cfg.agent.name.clone())
        .tools(tools)
        .memory(memory, cfg.memory.top_k)
        .limits(LoopLimits {
            max_cycles: cfg.agent.max_cycles,
            max_tool_calls: cfg.agent.max_tool_calls,
            max_decompose_depth: cfg.agent.max_decompose_depth,
        })
        .tool_timeout_secs(cfg.tools.tool_timeout_secs)
        .max_concurrent_tools(cfg.tools.max_concurrent_tools)
        .params(params)
        .think_params(think_params)
        .build()
}

/// 校验配置、创建 LLM 与内置工具，返回可直接 run 的 Orchestrator
pub fn create_orchestrator_from_config(cfg: &AppConfig) -> Result<Orchestrator, AgentError> {
    cfg.validate()?;
    let llm = create_llm_from_config(cfg)?;
    Ok(build_orchestrator(cfg, llm, builtin_tools()?))
}
