//! 核心编排层：错误、主控编排、状态视图、会话监管、任务调度

pub mod error;
pub mod orchestrator;
pub mod session_supervisor;
pub mod status;
pub mod task_scheduler;

pub use error::AgentError;
pub use orchestrator::{Answer, Orchestrator, OrchestratorBuilder};
pub use session_supervisor::SessionSupervisor;
pub use status::{PlanStatus, Status, SubplanStatus, TodoStatus};
pub use task_scheduler::TaskScheduler;
