//! Echo 工具（测试用）

use async_trait::async_trait;
use serde_json::Value;

use crate::tools::schema::{ParamSpec, ParamType};
use crate::tools::Tool;

/// Echo 工具：回显文本
pub struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Echo the given text back unchanged."
    }

    fn params(&self) -> Vec<ParamSpec> {
        vec![ParamSpec::required("text", ParamType::String, "text to echo")]
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let text = args
            .get("text")
            .and_then(|v| v.as_str())
            .unwrap_or("(empty)");
        Ok(text.to_string())
    }
}
