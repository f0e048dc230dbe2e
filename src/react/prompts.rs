//! Prompt 模板与标记
//!
//! 标记是模型自由文本回复中约定的子串，规划阶段与思考阶段据此判断回复含义。

use crate::core::status::PlanStatus;
use crate::memory::ScoredRecord;
use crate::tools::ToolSchema;

pub const PLAN_TAG: &str = "<PLAN>";
pub const PLAN_END_TAG: &str = "<PLAN_END>";
pub const EASY_TAG: &str = "<EASY>";
pub const EASY_END_TAG: &str = "<EASY_END>";
pub const SOLVED_TAG: &str = "<SOLVED>";
pub const OBSCURE_TAG: &str = "<OBSCURE>";
pub const DECOMPOSE_TAG: &str = "<DECOMPOSE>";
pub const DECOMPOSE_END_TAG: &str = "<DECOMPOSE_END>";

/// Markdown 清单前缀
pub const NO_COMPLETED_TAG: &str = "- []";
pub const COMPLETED_TAG: &str = "- [x]";

/// 工具列表：`0. [name]: [description]`
pub fn format_tool_list(tools: &[ToolSchema]) -> String {
    tools
        .iter()
        .enumerate()
        .map(|(i, t)| format!("{i}. [{}]: [{}]", t.name, t.description))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn system_prompt(name: &str, tools: &[ToolSchema]) -> String {
    format!(
        "You are {name}, a helpful everyday assistant backed by a large language model.\n\
         Your own knowledge is limited, and that is fine: you can call tools to look things up and \
         to compute things you cannot do reliably yourself.\n\
         Be patient, explain your reasoning when it helps, and keep a friendly tone.\n\n\
         Tools available to you:\n\
         <available_tools>\n{}\n</available_tools>\n",
        format_tool_list(tools)
    )
}

pub fn plan_prompt(question: &str, memories: &[ScoredRecord]) -> String {
    let mut prompt = format!(
        "You plan how to answer the user question below. Choose exactly one option.\n\
         1. If the question is easy and involves no non-trivial calculation, answer it directly:\n\
         {EASY_TAG}{SOLVED_TAG}your answer here{EASY_END_TAG}\n\
         2. Otherwise write a short plan, one subplan per line:\n\
         {PLAN_TAG}:\n\
         {NO_COMPLETED_TAG} first subplan\n\
         {NO_COMPLETED_TAG} second subplan\n\
         {PLAN_END_TAG}\n\
         Questions with large numbers or several calculation steps always need a plan.\n"
    );
    if !memories.is_empty() {
        prompt.push_str("\nThings you remember that may be relevant:\n<memories>\n");
        for m in memories {
            prompt.push_str(&format!("- {}\n", m.record.text));
        }
        prompt.push_str("</memories>\n");
    }
    prompt.push_str(&format!("\n<user_question>\n{question}\n</user_question>\n"));
    prompt
}

pub fn think_prompt(subplan: &str, allow_decompose: bool) -> String {
    let mut prompt = format!(
        "<subplan>{subplan}</subplan>\n\
         Work on the subplan above using the conversation so far, including tool results. Choose one:\n\
         1. If you can give the result now, reply starting with `{SOLVED_TAG}:` followed by the result.\n\
         2. If you need information or computation, call one or more of the available tools.\n\
         3. If the subplan is too unclear to act on, reply starting with `{OBSCURE_TAG}:` followed by \
         the question you need the user to answer.\n\
         4. If the latest tool result is an error, fix the call (right tool, right arguments) and call it again.\n"
    );
    if allow_decompose {
        prompt.push_str(&format!(
            "5. If the subplan is too large for one step, split it:\n\
             {DECOMPOSE_TAG}\n{NO_COMPLETED_TAG} smaller step\n{NO_COMPLETED_TAG} smaller step\n{DECOMPOSE_END_TAG}\n"
        ));
    }
    prompt
}

pub fn final_prompt(status: &PlanStatus) -> String {
    format!(
        "I made a plan for your question and worked through it. Here is the plan and its status:\n\
         {}\n\
         Based on this, give the user one complete, consolidated answer to the original question. \
         If some step could not be completed, say so plainly.",
        status.describe()
    )
}

pub fn budget_exhausted(subplan: &str, limit: &str) -> String {
    format!("Could not complete `{subplan}` within budget ({limit}).")
}
