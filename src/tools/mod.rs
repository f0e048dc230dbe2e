//! 工具层：参数 schema、注册表、执行器与内置工具

pub mod echo;
pub mod executor;
pub mod math;
pub mod registry;
pub mod schema;

pub use echo::EchoTool;
pub use executor::{ToolExecutor, ToolOutcome, ToolResult};
pub use math::math_tools;
pub use registry::{FunctionTool, Tool, ToolRegistry};
pub use schema::{ParamSpec, ParamType, ToolSchema};
