//! 工具注册表
//!
//! 所有工具实现 Tool trait（name / description / params / execute），由 ToolRegistry 按名注册与查找。
//! 注册只发生在启动阶段；之后注册表以 Arc 共享，只读。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::core::AgentError;
use crate::tools::schema::{ParamSpec, ToolSchema};

/// 工具 trait：名称、描述（供 LLM 理解）、参数声明、异步执行（args 为已校验的 JSON 对象）
#[async_trait]
pub trait Tool: Send + Sync {
    /// 工具名称（注册表中唯一）
    fn name(&self) -> &str;

    /// 工具描述（供 LLM 理解功能）
    fn description(&self) -> &str;

    /// 参数声明；默认无参数
    fn params(&self) -> Vec<ParamSpec> {
        Vec::new()
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::new(self.name(), self.description(), &self.params())
    }

    /// 执行工具；Err 中的文本会作为错误观察回灌给模型
    async fn execute(&self, args: Value) -> Result<String, String>;
}

type SyncFn = dyn Fn(&Value) -> Result<Value, String> + Send + Sync;

/// 用同步闭包实现的工具
pub struct FunctionTool {
    name: String,
    description: String,
    params: Vec<ParamSpec>,
    func: Box<SyncFn>,
}

impl FunctionTool {
    pub fn new<F>(
        name: impl Into<String>,
        description: impl Into<String>,
        params: Vec<ParamSpec>,
        func: F,
    ) -> Self
    where
        F: Fn(&Value) -> Result<Value, String> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            params,
            func: Box::new(func),
        }
    }
}

#[async_trait]
impl Tool for FunctionTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn params(&self) -> Vec<ParamSpec> {
        self.params.clone()
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        match (self.func)(&args)? {
            Value::String(s) => Ok(s),
            other => Ok(other.to_string()),
        }
    }
}

/// 工具注册表：保持注册顺序，schema 列表与 system prompt 中的编号一致
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册工具；重名视为配置错误
    pub fn register(&mut self, tool: impl Tool + 'static) -> Result<(), AgentError> {
        self.register_arc(Arc::new(tool))
    }

    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) -> Result<(), AgentError> {
        let name = tool.name().to_string();
        if self.index.contains_key(&name) {
            return Err(AgentError::config(format!("tool `{name}` registered twice")));
        }
        self.index.insert(name, self.tools.len());
        self.tools.push(tool);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.index.get(name).map(|&i| self.tools[i].clone())
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.name().to_string()).collect()
    }

    /// 模型可见的 schema 列表（注册顺序）
    pub fn schemas(&self) -> Vec<ToolSchema> {
        self.tools.iter().map(|t| t.schema()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
