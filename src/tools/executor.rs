//! 工具执行器
//!
//! invoke(tool_name, raw_arguments)：解析参数 → 查找工具 → 按名绑定 → 在超时与 panic 边界内执行。
//! 除未知工具外，所有失败都以 ToolResult 数据返回；每次调用输出结构化审计日志（JSON）。

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::FutureExt;
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::time::timeout;

use crate::core::AgentError;
use crate::react::events::preview;
use crate::tools::schema::{ParamSpec, ToolSchema};
use crate::tools::ToolRegistry;

/// 审计日志中参数预览的最大字符数
const AUDIT_ARGS_PREVIEW_CHARS: usize = 200;

/// 调用结果分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolOutcome {
    Success,
    Error,
    MalformedArguments,
}

impl fmt::Display for ToolOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ToolOutcome::Success => "success",
            ToolOutcome::Error => "error",
            ToolOutcome::MalformedArguments => "malformed_arguments",
        };
        f.write_str(s)
    }
}

/// 一次工具调用的结果：成功值或错误文本
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolResult {
    pub outcome: ToolOutcome,
    pub payload: String,
}

impl ToolResult {
    pub fn success(payload: impl Into<String>) -> Self {
        Self {
            outcome: ToolOutcome::Success,
            payload: payload.into(),
        }
    }

    pub fn error(payload: impl Into<String>) -> Self {
        Self {
            outcome: ToolOutcome::Error,
            payload: payload.into(),
        }
    }

    pub fn malformed(payload: impl Into<String>) -> Self {
        Self {
            outcome: ToolOutcome::MalformedArguments,
            payload: payload.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome == ToolOutcome::Success
    }

    /// 写入 tool 消息的观察文本；失败时带上分类，方便模型自我修正
    pub fn observation(&self) -> String {
        match self.outcome {
            ToolOutcome::Success => self.payload.clone(),
            ToolOutcome::Error => format!("Error: {}", self.payload),
            ToolOutcome::MalformedArguments => format!("Malformed arguments: {}", self.payload),
        }
    }
}

/// 工具执行器：共享只读注册表，对每次调用施加超时
pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
    schemas: Vec<ToolSchema>,
    timeout: Duration,
}

impl ToolExecutor {
    pub fn new(registry: Arc<ToolRegistry>, timeout_secs: u64) -> Self {
        let schemas = registry.schemas();
        Self {
            registry,
            schemas,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    /// 注册顺序的 schema 列表（构造时生成一次）
    pub fn schemas(&self) -> &[ToolSchema] {
        &self.schemas
    }

    /// 执行一次调用；只有未知工具返回 Err
    pub async fn invoke(&self, tool_name: &str, raw_arguments: &str) -> Result<ToolResult, AgentError> {
        let start = Instant::now();
        let result = self.invoke_inner(tool_name, raw_arguments).await;

        let outcome = match &result {
            Ok(r) => r.outcome.to_string(),
            Err(_) => "unknown_tool".to_string(),
        };
        let audit = serde_json::json!({
            "event": "tool_audit",
            "tool": tool_name,
            "ok": matches!(&result, Ok(r) if r.is_success()),
            "outcome": outcome,
            "duration_ms": start.elapsed().as_millis() as u64,
            "args_preview": preview(raw_arguments, AUDIT_ARGS_PREVIEW_CHARS),
        });
        tracing::info!(audit = %audit.to_string(), "tool");
        result
    }

    async fn invoke_inner(&self, tool_name: &str, raw_arguments: &str) -> Result<ToolResult, AgentError> {
        let args = match parse_arguments(raw_arguments) {
            Ok(args) => args,
            Err(diag) => return Ok(ToolResult::malformed(diag)),
        };

        let tool = self
            .registry
            .get(tool_name)
            .ok_or_else(|| AgentError::UnknownTool(tool_name.to_string()))?;

        if let Err(diag) = bind_arguments(&tool.params(), &args) {
            return Ok(ToolResult::malformed(diag));
        }

        let call = AssertUnwindSafe(tool.execute(Value::Object(args))).catch_unwind();
        let result = match timeout(self.timeout, call).await {
            Ok(Ok(Ok(content))) => ToolResult::success(content),
            Ok(Ok(Err(e))) => ToolResult::error(e),
            Ok(Err(panic)) => ToolResult::error(format!("tool panicked: {}", panic_message(panic.as_ref()))),
            Err(_) => ToolResult::error(format!(
                "tool `{tool_name}` timed out after {}s",
                self.timeout.as_secs()
            )),
        };
        if !result.is_success() {
            tracing::warn!(tool = tool_name, error = %result.payload, "tool failed");
        }
        Ok(result)
    }
}

/// 原始参数必须是 JSON 对象；空串视为无参数
fn parse_arguments(raw: &str) -> Result<Map<String, Value>, String> {
    if raw.trim().is_empty() {
        return Ok(Map::new());
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(Value::Null) => Ok(Map::new()),
        Ok(other) => Err(format!("expected a JSON object, got `{other}`")),
        Err(e) => Err(format!("invalid JSON ({e}): `{raw}`")),
    }
}

/// 按名绑定：缺少必填参数、未声明的参数名、类型不符都算参数错误
fn bind_arguments(params: &[ParamSpec], args: &Map<String, Value>) -> Result<(), String> {
    let missing: Vec<&str> = params
        .iter()
        .filter(|p| p.required && !args.contains_key(&p.name))
        .map(|p| p.name.as_str())
        .collect();
    if !missing.is_empty() {
        return Err(format!("missing required parameters: {}", missing.join(", ")));
    }

    let unexpected: Vec<&str> = args
        .keys()
        .filter(|k| !params.iter().any(|p| &p.name == *k))
        .map(String::as_str)
        .collect();
    if !unexpected.is_empty() {
        return Err(format!("unexpected parameters: {}", unexpected.join(", ")));
    }

    for p in params {
        if let Some(value) = args.get(&p.name) {
            let optional_null = !p.required && value.is_null();
            if !optional_null && !p.ty.accepts(value) {
                return Err(format!(
                    "parameter `{}` does not match schema {}: got `{value}`",
                    p.name,
                    p.ty.to_schema()
                ));
            }
        }
    }
    Ok(())
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::math::math_tools;
    use crate::tools::registry::FunctionTool;
    use crate::tools::schema::ParamType;
    use crate::tools::{EchoTool, Tool};
    use async_trait::async_trait;

    struct SlowTool;

    #[async_trait]
    impl Tool for SlowTool {
        fn name(&self) -> &str {
            "slow"
        }

        fn description(&self) -> &str {
            "Sleeps for a long time"
        }

        async fn execute(&self, _args: Value) -> Result<String, String> {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok("done".to_string())
        }
    }

    fn executor() -> ToolExecutor {
        let mut reg = ToolRegistry::new();
        reg.register(EchoTool).unwrap();
        for t in math_tools() {
            reg.register(t).unwrap();
        }
        reg.register(FunctionTool::new(
            "boom",
            "Always panics",
            vec![ParamSpec::optional("x", ParamType::Any, "")],
            |_| panic!("kaboom"),
        ))
        .unwrap();
        reg.register(SlowTool).unwrap();
        ToolExecutor::new(Arc::new(reg), 1)
    }

    #[tokio::test]
    async fn test_success() {
        let r = executor().invoke("add", r#"{"a": 40, "b": 2}"#).await.unwrap();
        assert_eq!(r, ToolResult::success("42"));
    }

    #[tokio::test]
    async fn test_invalid_json_is_malformed_and_includes_input() {
        let r = executor().invoke("add", "{a: 1").await.unwrap();
        assert_eq!(r.outcome, ToolOutcome::MalformedArguments);
        assert!(r.payload.contains("{a: 1"));
    }

    #[tokio::test]
    async fn test_non_object_is_malformed() {
        let r = executor().invoke("echo", "[1, 2]").await.unwrap();
        assert_eq!(r.outcome, ToolOutcome::MalformedArguments);
    }

    #[tokio::test]
    async fn test_unknown_tool_is_error() {
        let err = executor().invoke("nope", "{}").await.unwrap_err();
        assert!(matches!(err, AgentError::UnknownTool(name) if name == "nope"));
    }

    #[tokio::test]
    async fn test_missing_and_unexpected_params_are_malformed() {
        let exec = executor();
        let r = exec.invoke("add", r#"{"a": 1}"#).await.unwrap();
        assert_eq!(r.outcome, ToolOutcome::MalformedArguments);
        assert!(r.payload.contains("b"));
        let r = exec.invoke("add", r#"{"a": 1, "b": 2, "c": 3}"#).await.unwrap();
        assert_eq!(r.outcome, ToolOutcome::MalformedArguments);
        assert!(r.payload.contains("c"));
        let r = exec.invoke("add", r#"{"a": "one", "b": 2}"#).await.unwrap();
        assert_eq!(r.outcome, ToolOutcome::MalformedArguments);
    }

    #[tokio::test]
    async fn test_tool_error_is_data() {
        let r = executor().invoke("div", r#"{"a": 1, "b": 0}"#).await.unwrap();
        assert_eq!(r.outcome, ToolOutcome::Error);
        assert!(r.payload.contains("division by zero"));
        assert!(r.observation().starts_with("Error:"));
    }

    #[tokio::test]
    async fn test_panic_is_caught() {
        let r = executor().invoke("boom", "{}").await.unwrap();
        assert_eq!(r.outcome, ToolOutcome::Error);
        assert!(r.payload.contains("kaboom"));
    }

    #[tokio::test]
    async fn test_timeout_is_error() {
        let r = executor().invoke("slow", "").await.unwrap();
        assert_eq!(r.outcome, ToolOutcome::Error);
        assert!(r.payload.contains("timed out"));
    }
}
