//! Plan / SubPlan：规划阶段的产物
//!
//! SubPlan 的描述不可变；完成标记只能由 false 变为 true，没有任何重置操作。

use std::collections::HashMap;

use serde::Serialize;

/// 计划中的一个工作单元
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubPlan {
    description: String,
    completed: bool,
}

impl SubPlan {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            completed: false,
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// 标记完成；重复调用无额外效果，返回本次是否发生了状态变化
    pub fn mark_complete(&mut self) -> bool {
        let changed = !self.completed;
        if !changed {
            tracing::warn!(subplan = %self.description, "subplan already completed");
        }
        self.completed = true;
        changed
    }
}

/// 整体目标 + 有序子计划
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Plan {
    goal: String,
    subplans: Vec<SubPlan>,
}

impl Plan {
    pub fn new(goal: impl Into<String>, descriptions: Vec<String>) -> Self {
        Self {
            goal: goal.into(),
            subplans: descriptions.into_iter().map(SubPlan::new).collect(),
        }
    }

    pub fn goal(&self) -> &str {
        &self.goal
    }

    pub fn subplans(&self) -> &[SubPlan] {
        &self.subplans
    }

    pub fn len(&self) -> usize {
        self.subplans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subplans.is_empty()
    }

    /// 按下标标记完成（仅 Orchestrator 在子计划执行返回后调用）
    pub fn complete(&mut self, index: usize) -> bool {
        self.subplans
            .get_mut(index)
            .map(SubPlan::mark_complete)
            .unwrap_or(false)
    }

    /// 描述 -> 是否完成
    pub fn completion_map(&self) -> HashMap<String, bool> {
        self.subplans
            .iter()
            .map(|s| (s.description.clone(), s.completed))
            .collect()
    }

    pub fn is_completed(&self) -> bool {
        self.subplans.iter().all(SubPlan::is_completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_plan_is_incomplete() {
        let plan = Plan::new("goal", vec!["a".into(), "b".into()]);
        assert_eq!(plan.len(), 2);
        assert!(plan.subplans().iter().all(|s| !s.is_completed()));
        assert!(!plan.is_completed());
        assert_eq!(plan.completion_map().get("a"), Some(&false));
    }

    #[test]
    fn test_mark_complete_is_idempotent() {
        let mut sub = SubPlan::new("step");
        assert!(sub.mark_complete());
        assert!(!sub.mark_complete());
        assert!(sub.is_completed());
    }

    #[test]
    fn test_complete_by_index() {
        let mut plan = Plan::new("goal", vec!["a".into(), "b".into()]);
        assert!(plan.complete(1));
        assert!(!plan.complete(1));
        assert!(!plan.complete(5));
        assert_eq!(plan.completion_map().get("b"), Some(&true));
        assert!(plan.complete(0));
        assert!(plan.is_completed());
    }
}
