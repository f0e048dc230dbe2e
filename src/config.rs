//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `PONDER__*` 覆盖（双下划线表示嵌套，如 `PONDER__LLM__PROVIDER=openai`）。

use std::path::PathBuf;

use serde::Deserialize;

use crate::core::AgentError;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub agent: AgentSection,
    pub llm: LlmSection,
    pub tools: ToolsSection,
    pub memory: MemorySection,
}

/// [agent] 段：名称与推理预算
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentSection {
    /// 写入 system prompt 的助手名
    pub name: String,
    /// 每个子计划的 THINKING ⇄ ACTING 轮数上限
    pub max_cycles: usize,
    /// 每个子计划的工具调用总数上限
    pub max_tool_calls: usize,
    /// 嵌套分解深度上限，0 为扁平计划
    pub max_decompose_depth: usize,
    pub think_temperature: f32,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            name: "Ponder".to_string(),
            max_cycles: 10,
            max_tool_calls: 35,
            max_decompose_depth: 0,
            think_temperature: 0.8,
        }
    }
}

/// [llm] 段：后端选择与超时
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// 后端：openai / deepseek / mock
    pub provider: String,
    pub model: String,
    pub base_url: Option<String>,
    /// 未设置时按 provider 读 OPENAI_API_KEY / DEEPSEEK_API_KEY
    pub api_key: Option<String>,
    pub temperature: Option<f32>,
    pub timeouts: LlmTimeoutsSection,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            base_url: None,
            api_key: None,
            temperature: None,
            timeouts: LlmTimeoutsSection::default(),
        }
    }
}

impl LlmSection {
    /// 配置中的 key 优先，其次 provider 对应的环境变量
    pub fn resolved_api_key(&self) -> Option<String> {
        let from_env = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
        self.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| match self.provider.to_lowercase().as_str() {
                "deepseek" => from_env("DEEPSEEK_API_KEY").or_else(|| from_env("OPENAI_API_KEY")),
                _ => from_env("OPENAI_API_KEY"),
            })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmTimeoutsSection {
    /// 单次请求超时（秒）
    pub request: u64,
}

impl Default for LlmTimeoutsSection {
    fn default() -> Self {
        Self { request: 60 }
    }
}

/// [tools] 段：工具超时与并发
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolsSection {
    /// 单次工具调用超时（秒）
    pub tool_timeout_secs: u64,
    /// 同一步内并发执行的工具数上限
    pub max_concurrent_tools: usize,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            tool_timeout_secs: 30,
            max_concurrent_tools: 3,
        }
    }
}

/// [memory] 段：长期记忆检索
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MemorySection {
    pub enabled: bool,
    pub top_k: usize,
    pub score_threshold: f32,
}

impl Default for MemorySection {
    fn default() -> Self {
        Self {
            enabled: false,
            top_k: 8,
            score_threshold: 0.6,
        }
    }
}

const PROVIDERS: [&str; 3] = ["openai", "deepseek", "mock"];

impl AppConfig {
    /// 启动前校验；任何会话开始之前失败
    pub fn validate(&self) -> Result<(), AgentError> {
        let provider = self.llm.provider.to_lowercase();
        if !PROVIDERS.contains(&provider.as_str()) {
            return Err(AgentError::config(format!(
                "unknown llm.provider `{}` (expected one of {})",
                self.llm.provider,
                PROVIDERS.join(", ")
            )));
        }
        if provider != "mock" {
            if self.llm.model.trim().is_empty() {
                return Err(AgentError::config("llm.model is empty"));
            }
            if self.llm.resolved_api_key().is_none() {
                return Err(AgentError::config(format!(
                    "no API key for provider `{provider}`: set llm.api_key or the provider's API key environment variable"
                )));
            }
        }
        if self.agent.max_cycles == 0 {
            return Err(AgentError::config("agent.max_cycles must be at least 1"));
        }
        if self.agent.max_tool_calls == 0 {
            return Err(AgentError::config("agent.max_tool_calls must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.memory.score_threshold) {
            return Err(AgentError::config("memory.score_threshold must be within 0..=1"));
        }
        Ok(())
    }
}

/// 从 config 目录加载配置，环境变量 PONDER__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path，则追加该文件（可覆盖前面的键）；文件不存在时返回 NotFound
/// 3. 最后叠加环境变量 PONDER__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(path) = config_path {
        if !path.exists() {
            return Err(config::ConfigError::NotFound(path.display().to_string()));
        }
        builder = builder.add_source(config::File::from(path).required(true));
    }

    builder = builder.add_source(
        config::Environment::with_prefix("PONDER")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}
