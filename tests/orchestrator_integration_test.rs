//! Orchestrator 集成测试：脚本化 LLM 驱动完整的规划 → 子计划 → 汇总流程

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, VecDeque};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::Value;

    use ponder::agent::{build_orchestrator, builtin_tools};
    use ponder::config::AppConfig;
    use ponder::llm::{GenerationParams, LlmClient, LlmError, MockLlmClient};
    use ponder::memory::{Message, Role};
    use ponder::react::{LoopLimits, ModelResponse, ReactEvent, ToolCallRequest};
    use ponder::tools::{ParamSpec, ParamType, Tool, ToolRegistry, ToolSchema};
    use ponder::{AgentError, Answer, ConversationId, Orchestrator};

    fn text(s: &str) -> ModelResponse {
        ModelResponse::text(s)
    }

    fn calls(list: &[(&str, &str, &str)]) -> ModelResponse {
        ModelResponse::tool_calls(
            list.iter()
                .map(|(id, name, args)| ToolCallRequest::new(*id, *name, *args))
                .collect(),
        )
    }

    fn orchestrator(llm: Arc<dyn LlmClient>) -> Orchestrator {
        Orchestrator::builder(llm)
            .tools(builtin_tools().unwrap())
            .build()
    }

    /// 会话中没有对应 tool 结果的调用 id
    fn unanswered_calls(log: &[Message]) -> Vec<String> {
        log.iter()
            .flat_map(|m| m.tool_calls.iter().map(|c| c.id.clone()))
            .filter(|id| {
                !log.iter()
                    .any(|m| m.role == Role::Tool && m.tool_call_id.as_deref() == Some(id.as_str()))
            })
            .collect()
    }

    /// 按问题中的标签把请求分派到各自的脚本
    struct RoutingLlm {
        scripts: Mutex<HashMap<String, VecDeque<ModelResponse>>>,
    }

    impl RoutingLlm {
        fn new(routes: Vec<(&str, Vec<ModelResponse>)>) -> Self {
            Self {
                scripts: Mutex::new(
                    routes
                        .into_iter()
                        .map(|(k, v)| (k.to_string(), v.into()))
                        .collect(),
                ),
            }
        }
    }

    #[async_trait]
    impl LlmClient for RoutingLlm {
        async fn generate(
            &self,
            messages: &[Message],
            _params: &GenerationParams,
            _tools: Option<&[ToolSchema]>,
        ) -> Result<ModelResponse, LlmError> {
            let mut scripts = self.scripts.lock().unwrap();
            let key = scripts
                .keys()
                .find(|k| messages.iter().any(|m| m.content_str().contains(k.as_str())))
                .cloned()
                .ok_or_else(|| LlmError::Request("no route".to_string()))?;
            scripts
                .get_mut(&key)
                .and_then(VecDeque::pop_front)
                .ok_or(LlmError::Exhausted)
        }
    }

    /// 永不返回的 LLM，用于取消测试
    struct PendingLlm;

    #[async_trait]
    impl LlmClient for PendingLlm {
        async fn generate(
            &self,
            _messages: &[Message],
            _params: &GenerationParams,
            _tools: Option<&[ToolSchema]>,
        ) -> Result<ModelResponse, LlmError> {
            std::future::pending().await
        }
    }

    struct SleepTool;

    #[async_trait]
    impl Tool for SleepTool {
        fn name(&self) -> &str {
            "sleep"
        }

        fn description(&self) -> &str {
            "Sleep for ms milliseconds"
        }

        fn params(&self) -> Vec<ParamSpec> {
            vec![ParamSpec::required("ms", ParamType::Integer, "milliseconds")]
        }

        async fn execute(&self, args: Value) -> Result<String, String> {
            let ms = args["ms"].as_u64().unwrap_or(0);
            tokio::time::sleep(Duration::from_millis(ms)).await;
            Ok(format!("slept {ms}ms"))
        }
    }

    #[tokio::test]
    async fn test_plan_with_parallel_tool_calls() {
        let llm = Arc::new(MockLlmClient::with_responses(vec![
            text("<PLAN>:\n- [] compute 12 * 7 and 100 / 4\n- [] add the two results\n<PLAN_END>"),
            calls(&[
                ("call_mul", "mul", r#"{"a": 12, "b": 7}"#),
                ("call_div", "div", r#"{"a": 100, "b": 4}"#),
            ]),
            text("<SOLVED>: 84 and 25"),
            calls(&[("call_add", "add", r#"{"a": 84, "b": 25}"#)]),
            text("<SOLVED>: 109"),
            text("12 * 7 + 100 / 4 = 109"),
        ]));
        let orch = orchestrator(llm.clone());
        let id = ConversationId::from("arith");
        let answer = orch.run(&id, "What is 12 * 7 + 100 / 4?").await.unwrap();
        assert_eq!(answer, Answer::Final("12 * 7 + 100 / 4 = 109".to_string()));
        assert_eq!(llm.remaining(), 0);

        let log = orch.log().snapshot(&id).await;
        let tool_results: Vec<(&str, &str)> = log
            .iter()
            .filter(|m| m.role == Role::Tool)
            .map(|m| (m.tool_call_id.as_deref().unwrap(), m.content_str()))
            .collect();
        assert_eq!(
            tool_results,
            vec![("call_mul", "84.0"), ("call_div", "25.0"), ("call_add", "109")]
        );
        // 每个子计划的结果由 Orchestrator 追加为 assistant 消息
        assert!(log
            .iter()
            .any(|m| m.role == Role::Assistant && m.content_str() == "84 and 25"));
    }

    #[tokio::test]
    async fn test_tool_error_is_fed_back_and_run_continues() {
        let llm = Arc::new(MockLlmClient::with_responses(vec![
            text("<PLAN>:\ndivide 1 by 0\n<PLAN_END>"),
            calls(&[("c1", "div", r#"{"a": 1, "b": 0}"#)]),
            calls(&[("c2", "div", "{not json")]),
            text("<SOLVED>: division by zero is undefined"),
            text("1 / 0 is undefined."),
        ]));
        let orch = orchestrator(llm.clone());
        let id = ConversationId::new();
        let answer = orch.run(&id, "1 / 0?").await.unwrap();
        assert_eq!(answer.text(), "1 / 0 is undefined.");

        let log = orch.log().snapshot(&id).await;
        let observations: Vec<&str> = log
            .iter()
            .filter(|m| m.role == Role::Tool)
            .map(|m| m.content_str())
            .collect();
        assert!(observations[0].starts_with("Error:"));
        assert!(observations[1].starts_with("Malformed arguments:"));
    }

    #[tokio::test]
    async fn test_unknown_tool_aborts_run() {
        let llm = Arc::new(MockLlmClient::with_responses(vec![
            text("<PLAN>:\nlook it up\n<PLAN_END>"),
            calls(&[("c1", "web_search", r#"{"q": "rust"}"#)]),
            text("<EASY><SOLVED>hello again<EASY_END>"),
        ]));
        let orch = orchestrator(llm.clone());
        let id = ConversationId::new();
        let err = orch.run(&id, "search").await.unwrap_err();
        assert!(matches!(err, AgentError::UnknownTool(name) if name == "web_search"));
        assert!(unanswered_calls(&orch.log().snapshot(&id).await).is_empty());

        // 同一会话可以继续使用，发给模型的历史中没有悬空的调用
        let answer = orch.run(&id, "hi").await.unwrap();
        assert_eq!(answer.text(), "hello again");
        assert!(unanswered_calls(&llm.requests().last().unwrap().messages).is_empty());
    }

    #[tokio::test]
    async fn test_cancel_while_tool_runs_keeps_log_consistent() {
        let llm = Arc::new(MockLlmClient::with_responses(vec![
            text("<PLAN>:
wait for the slow tool
<PLAN_END>"),
            calls(&[("c1", "sleep", r#"{"ms": 5000}"#)]),
            text("<EASY><SOLVED>done<EASY_END>"),
        ]));
        let mut tools = ToolRegistry::new();
        tools.register(SleepTool).unwrap();
        let orch = Orchestrator::builder(llm.clone()).tools(tools).build();
        let id = ConversationId::new();
        let token = tokio_util::sync::CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            trigger.cancel();
        });
        let err = orch.run_with_cancel(&id, "be patient", &token).await.unwrap_err();
        assert!(matches!(err, AgentError::Cancelled));

        // 中止的一步（思考 prompt 与调用）没有写入会话
        let log = orch.log().snapshot(&id).await;
        assert!(unanswered_calls(&log).is_empty());
        let roles: Vec<Role> = log.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant]);

        let answer = orch.run(&id, "again").await.unwrap();
        assert_eq!(answer.text(), "done");
    }

    #[tokio::test]
    async fn test_nested_clarification_reaches_user() {
        let llm = Arc::new(MockLlmClient::with_responses(vec![
            text("<PLAN>:
book the trip
<PLAN_END>"),
            text("<DECOMPOSE>\n- [] choose the city\n- [] reserve a hotel\n<DECOMPOSE_END>"),
            text("<OBSCURE>: Which city?"),
        ]));
        let orch = Orchestrator::builder(llm.clone())
            .tools(builtin_tools().unwrap())
            .limits(LoopLimits {
                max_decompose_depth: 1,
                ..LoopLimits::default()
            })
            .build();
        let answer = orch.run(&ConversationId::new(), "Book me a trip").await.unwrap();
        assert_eq!(answer, Answer::Clarification("Which city?".to_string()));
        assert_eq!(llm.remaining(), 0);
    }

    #[tokio::test]
    async fn test_plan_format_error_aborts_run() {
        let llm = Arc::new(MockLlmClient::with_responses(vec![text("Let me think about it.")]));
        let orch = orchestrator(llm);
        let id = ConversationId::new();
        let err = orch.run(&id, "hello").await.unwrap_err();
        assert!(matches!(err, AgentError::Format(_)));
        // 原始回复仍然记录在会话中
        let log = orch.log().snapshot(&id).await;
        assert_eq!(log.last().unwrap().content_str(), "Let me think about it.");
    }

    #[tokio::test]
    async fn test_budget_exhaustion_still_consolidates() {
        let mut cfg = AppConfig::default();
        cfg.agent.max_cycles = 1;
        let llm = Arc::new(MockLlmClient::with_responses(vec![
            text("<PLAN>:\nkeep echoing\n<PLAN_END>"),
            calls(&[("c1", "echo", r#"{"text": "again"}"#)]),
            text("I could not finish within budget."),
        ]));
        let orch = build_orchestrator(&cfg, llm.clone(), builtin_tools().unwrap());
        let answer = orch.run(&ConversationId::new(), "loop").await.unwrap();
        assert_eq!(answer.text(), "I could not finish within budget.");
        let final_request = llm.requests().last().unwrap().clone();
        assert!(final_request
            .messages
            .iter()
            .any(|m| m.content_str().contains("within budget (max_cycles = 1)")));
    }

    #[tokio::test]
    async fn test_conversations_run_concurrently() {
        let llm = Arc::new(RoutingLlm::new(vec![
            (
                "[alpha]",
                vec![
                    text("<PLAN>:\nwait a bit\n<PLAN_END>"),
                    calls(&[("a1", "sleep", r#"{"ms": 200}"#)]),
                    text("<SOLVED> waited"),
                    text("alpha done"),
                ],
            ),
            ("[beta]", vec![text("<EASY><SOLVED>beta done<EASY_END>")]),
        ]));
        let mut tools = ToolRegistry::new();
        tools.register(SleepTool).unwrap();
        let orch = Arc::new(Orchestrator::builder(llm).tools(tools).build());
        let finished = Arc::new(Mutex::new(Vec::new()));

        let spawn = |id: &'static str, question: &'static str| {
            let orch = orch.clone();
            let finished = finished.clone();
            tokio::spawn(async move {
                let answer = orch.run(&ConversationId::from(id), question).await.unwrap();
                finished.lock().unwrap().push(id);
                answer
            })
        };
        let a = spawn("a", "[alpha] slow question");
        tokio::task::yield_now().await;
        let b = spawn("b", "[beta] quick question");

        assert_eq!(a.await.unwrap().text(), "alpha done");
        assert_eq!(b.await.unwrap().text(), "beta done");
        assert_eq!(*finished.lock().unwrap(), vec!["b", "a"]);

        let log_b = orch.log().snapshot(&ConversationId::from("b")).await;
        assert!(log_b.iter().all(|m| !m.content_str().contains("[alpha]")));
    }

    #[tokio::test]
    async fn test_same_conversation_runs_are_serialized() {
        let llm = Arc::new(MockLlmClient::with_responses(vec![
            text("<EASY><SOLVED>first<EASY_END>"),
            text("<EASY><SOLVED>second<EASY_END>"),
        ]));
        let orch = Arc::new(orchestrator(llm));
        let id = ConversationId::from("shared");
        let (r1, r2) = tokio::join!(orch.run(&id, "q1"), orch.run(&id, "q2"));
        r1.unwrap();
        r2.unwrap();

        let log = orch.log().snapshot(&id).await;
        let roles: Vec<Role> = log.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![
                Role::System,
                Role::User,
                Role::Assistant,
                Role::Assistant,
                Role::User,
                Role::Assistant,
                Role::Assistant,
            ]
        );
    }

    #[tokio::test]
    async fn test_cancel_in_flight_run() {
        let orch = Arc::new(orchestrator(Arc::new(PendingLlm)));
        let id = ConversationId::from("stuck");
        let handle = {
            let orch = orch.clone();
            let id = id.clone();
            tokio::spawn(async move { orch.run(&id, "never answered").await })
        };

        let mut cancelled = false;
        for _ in 0..100 {
            if orch.cancel(&id) {
                cancelled = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(cancelled);
        let err = handle.await.unwrap().unwrap_err();
        assert!(matches!(err, AgentError::Cancelled));

        // 被中止的模型调用没有留下 assistant 消息
        let log = orch.log().snapshot(&id).await;
        assert!(log.iter().all(|m| m.role != Role::Assistant));
    }

    #[tokio::test]
    async fn test_event_stream_for_planned_run() {
        let llm = Arc::new(MockLlmClient::with_responses(vec![
            text("<PLAN>:\nsay hi\n<PLAN_END>"),
            text("<SOLVED> hi"),
            text("hi"),
        ]));
        let orch = orchestrator(llm);
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        orch.run_with_events(&ConversationId::new(), "greet", tx).await.unwrap();

        let mut events = Vec::new();
        while let Some(ev) = rx.recv().await {
            events.push(ev);
        }
        assert_eq!(events[0], ReactEvent::Planning);
        let kinds: Vec<String> = events
            .iter()
            .map(|ev| serde_json::to_value(ev).unwrap()["type"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(
            kinds,
            vec!["planning", "plan_ready", "subplan_started", "thinking", "subplan_done"]
        );
    }

    #[tokio::test]
    async fn test_external_token_cancels_run() {
        let orch = orchestrator(Arc::new(PendingLlm));
        let id = ConversationId::new();
        let token = tokio_util::sync::CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });
        let err = orch.run_with_cancel(&id, "wait forever", &token).await.unwrap_err();
        assert!(matches!(err, AgentError::Cancelled));
        // run 结束后会话不再处于活跃状态
        assert!(!orch.cancel(&id));
    }
}
