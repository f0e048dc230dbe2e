//! 认知层：规划、回复分类、子计划 THINKING ⇄ ACTING 循环、prompt 模板与过程事件

pub mod decision;
pub mod events;
pub mod loop_;
pub mod plan;
pub mod planner;
pub mod prompts;

pub use decision::{classify, Classifier, Decision, ModelResponse, ToolCallRequest};
pub use events::ReactEvent;
pub use loop_::{LoopLimits, LoopState, RunContext, SubplanExecutor, SubplanOutcome, SubplanResult};
pub use plan::{Plan, SubPlan};
pub use planner::{parse_plan, PlanOutcome, Planner};
