//! 可观察状态：计划、子计划、清单三种视图
//!
//! 封闭的 Status 联合，每种只提供 describe() 文本，供最终汇总 prompt 与日志使用。

use serde::Serialize;

use crate::react::prompts::{COMPLETED_TAG, NO_COMPLETED_TAG};
use crate::react::{Plan, SubPlan};

fn checkbox(completed: bool) -> &'static str {
    if completed {
        COMPLETED_TAG
    } else {
        NO_COMPLETED_TAG
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubplanStatus {
    pub description: String,
    pub completed: bool,
}

impl SubplanStatus {
    pub fn describe(&self) -> String {
        let state = if self.completed { "completed" } else { "no-completed" };
        format!("Subplan: {}\nCompleted: {state}", self.description)
    }
}

impl From<&SubPlan> for SubplanStatus {
    fn from(sub: &SubPlan) -> Self {
        Self {
            description: sub.description().to_string(),
            completed: sub.is_completed(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanStatus {
    pub goal: String,
    pub subplans: Vec<SubplanStatus>,
}

impl PlanStatus {
    /// 目标 + 每个子计划一行清单
    pub fn describe(&self) -> String {
        let steps: Vec<String> = self
            .subplans
            .iter()
            .map(|s| format!("{} {}", checkbox(s.completed), s.description))
            .collect();
        format!("Overall goal: {}\nSteps:\n{}", self.goal, steps.join("\n"))
    }
}

impl From<&Plan> for PlanStatus {
    fn from(plan: &Plan) -> Self {
        Self {
            goal: plan.goal().to_string(),
            subplans: plan.subplans().iter().map(SubplanStatus::from).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TodoStatus {
    pub items: Vec<(String, bool)>,
}

impl TodoStatus {
    pub fn describe(&self) -> String {
        let lines: Vec<String> = self
            .items
            .iter()
            .map(|(item, done)| format!("{} {item}", checkbox(*done)))
            .collect();
        format!("TODO List:\n{}", lines.join("\n"))
    }
}

impl From<&Plan> for TodoStatus {
    fn from(plan: &Plan) -> Self {
        Self {
            items: plan
                .subplans()
                .iter()
                .map(|s| (s.description().to_string(), s.is_completed()))
                .collect(),
        }
    }
}

/// 状态视图的封闭联合
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Status {
    Plan(PlanStatus),
    Subplan(SubplanStatus),
    Todo(TodoStatus),
}

impl Status {
    pub fn describe(&self) -> String {
        match self {
            Status::Plan(s) => s.describe(),
            Status::Subplan(s) => s.describe(),
            Status::Todo(s) => s.describe(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan() -> Plan {
        let mut plan = Plan::new("compute 3 * (1 + 2)", vec!["add 1 and 2".into(), "multiply by 3".into()]);
        plan.complete(0);
        plan
    }

    #[test]
    fn test_plan_status_checklist() {
        let status = Status::Plan(PlanStatus::from(&plan()));
        assert_eq!(
            status.describe(),
            "Overall goal: compute 3 * (1 + 2)\nSteps:\n- [x] add 1 and 2\n- [] multiply by 3"
        );
    }

    #[test]
    fn test_subplan_and_todo_status() {
        let plan = plan();
        let sub = Status::Subplan(SubplanStatus::from(&plan.subplans()[1]));
        assert_eq!(sub.describe(), "Subplan: multiply by 3\nCompleted: no-completed");
        let todo = Status::Todo(TodoStatus::from(&plan));
        assert_eq!(todo.describe(), "TODO List:\n- [x] add 1 and 2\n- [] multiply by 3");
    }
}
