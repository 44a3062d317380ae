//! The dispatch loop: alternates oracle decisions with tool execution until
//! the oracle stops requesting operations or the turn ceiling is hit.

use std::collections::HashSet;
use tracing::{error, info, warn};

use webpilot_core::config::AgentConfig;
use webpilot_core::{ChatMessage, ContextEvent, OracleResponse, Result, RunOutcome};
use webpilot_oracle::Oracle;

use crate::executor::ToolExecutor;
use crate::prompt::build_system_prompt;
use crate::tools::{tool_schemas, ToolCall};

/// Run one task to completion.
///
/// The session is torn down exactly once on every exit path: terminal
/// answer, turn ceiling, and run-fatal error all pass through the same
/// shutdown before returning.
pub async fn run_task(
    oracle: &dyn Oracle,
    executor: &mut dyn ToolExecutor,
    config: &AgentConfig,
    query: &str,
    context: &[ContextEvent],
) -> Result<RunOutcome> {
    let outcome = drive(oracle, executor, config, query, context).await;
    executor.shutdown().await;
    outcome
}

async fn drive(
    oracle: &dyn Oracle,
    executor: &mut dyn ToolExecutor,
    config: &AgentConfig,
    query: &str,
    context: &[ContextEvent],
) -> Result<RunOutcome> {
    let tools = tool_schemas();
    let context_xpaths: HashSet<&str> = context
        .iter()
        .filter(|e| !e.target.xpath.is_empty())
        .map(|e| e.target.xpath.as_str())
        .collect();

    // Append-only conversation: nothing is ever rewritten or dropped.
    let mut conversation: Vec<ChatMessage> = vec![
        ChatMessage::system(&build_system_prompt(context)),
        ChatMessage::user(query),
    ];

    for turn in 1..=config.max_turns {
        let response = decide_with_retry(oracle, &conversation, &tools, config).await?;

        info!(
            turn,
            content_len = response.content.as_ref().map(|c| c.len()).unwrap_or(0),
            tool_calls = response.tool_calls.len(),
            finish_reason = %response.finish_reason,
            "Oracle decision received"
        );

        let mut assistant = ChatMessage::assistant(response.content.as_deref().unwrap_or(""));
        if !response.tool_calls.is_empty() {
            assistant.tool_calls = Some(response.tool_calls.clone());
        }
        conversation.push(assistant);

        // Zero requested operations is the terminal signal.
        if response.tool_calls.is_empty() {
            let answer = response.content.unwrap_or_default();
            info!(turn, "Task completed");
            return Ok(RunOutcome::Completed { answer, turns: turn });
        }

        for request in &response.tool_calls {
            let call = match ToolCall::parse(&request.name, &request.arguments) {
                Ok(call) => call,
                Err(e) => {
                    warn!(tool = %request.name, error = %e, "Rejected operation request");
                    conversation.push(ChatMessage::tool_result(&request.id, &format!("Error: {}", e)));
                    continue;
                }
            };

            info!(
                turn,
                tool = %request.name,
                strategy = classify(&call, &context_xpaths),
                "Dispatching operation"
            );

            match executor.execute(&call).await {
                Ok(result) => {
                    conversation.push(ChatMessage::tool_result(&request.id, &result));
                }
                Err(e) if e.is_run_fatal() => {
                    error!(tool = %request.name, error = %e, "Run-fatal operation error");
                    return Err(e);
                }
                Err(e) => {
                    // Operation failures are fed back to the oracle, which
                    // decides how to recover.
                    warn!(tool = %request.name, error = %e, "Operation failed");
                    conversation.push(ChatMessage::tool_result(&request.id, &format!("Error: {}", e)));
                }
            }
        }
    }

    warn!(turns = config.max_turns, "Turn ceiling reached, terminating run");
    Ok(RunOutcome::CeilingExceeded {
        turns: config.max_turns,
    })
}

/// Call the oracle, retrying transient failures with exponential backoff.
async fn decide_with_retry(
    oracle: &dyn Oracle,
    conversation: &[ChatMessage],
    tools: &[serde_json::Value],
    config: &AgentConfig,
) -> Result<OracleResponse> {
    let mut attempt = 0;
    loop {
        match oracle.decide(conversation, tools).await {
            Ok(response) => return Ok(response),
            Err(e) if attempt < config.llm_max_retries => {
                let delay = config.llm_retry_delay_ms * 2u64.pow(attempt);
                warn!(attempt, delay_ms = delay, error = %e, "Oracle call failed, retrying");
                tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
                attempt += 1;
            }
            Err(e) => {
                error!(attempts = attempt + 1, error = %e, "Oracle call failed, giving up");
                return Err(e);
            }
        }
    }
}

/// Which locating strategy a call represents, for the run log.
fn classify(call: &ToolCall, context_xpaths: &HashSet<&str>) -> &'static str {
    match call {
        ToolCall::ResolveElement { container: Some(_), .. } => "scoped_scan",
        ToolCall::ResolveElement { .. } => "general_scan",
        _ => match call.locator() {
            Some(loc) if context_xpaths.contains(loc.value.as_str()) => "context_locator",
            Some(_) => "direct_locator",
            None => "control",
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use webpilot_core::{Error, ToolCallRequest};

    struct ScriptedOracle {
        responses: Mutex<VecDeque<Result<OracleResponse>>>,
    }

    impl ScriptedOracle {
        fn new(responses: Vec<Result<OracleResponse>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
            }
        }
    }

    #[async_trait]
    impl Oracle for ScriptedOracle {
        async fn decide(&self, _: &[ChatMessage], _: &[Value]) -> Result<OracleResponse> {
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(Error::Provider("script exhausted".to_string())))
        }
    }

    struct ScriptedExecutor {
        results: VecDeque<Result<String>>,
        executed: Vec<ToolCall>,
        shutdowns: u32,
    }

    impl ScriptedExecutor {
        fn new(results: Vec<Result<String>>) -> Self {
            Self {
                results: results.into(),
                executed: Vec::new(),
                shutdowns: 0,
            }
        }
    }

    #[async_trait]
    impl ToolExecutor for ScriptedExecutor {
        async fn execute(&mut self, call: &ToolCall) -> Result<String> {
            self.executed.push(call.clone());
            self.results.pop_front().unwrap_or(Ok("ok".to_string()))
        }

        async fn shutdown(&mut self) {
            self.shutdowns += 1;
        }
    }

    fn tool_response(name: &str, args: Value) -> Result<OracleResponse> {
        Ok(OracleResponse {
            content: None,
            tool_calls: vec![ToolCallRequest {
                id: "call_1".to_string(),
                name: name.to_string(),
                arguments: args,
            }],
            finish_reason: "tool_calls".to_string(),
            usage: Value::Null,
        })
    }

    fn answer_response(text: &str) -> Result<OracleResponse> {
        Ok(OracleResponse {
            content: Some(text.to_string()),
            tool_calls: vec![],
            finish_reason: "stop".to_string(),
            usage: Value::Null,
        })
    }

    fn test_config() -> AgentConfig {
        AgentConfig {
            max_turns: 5,
            llm_max_retries: 1,
            llm_retry_delay_ms: 1,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_completes_on_terminal_answer() {
        let oracle = ScriptedOracle::new(vec![answer_response("All done.")]);
        let mut executor = ScriptedExecutor::new(vec![]);
        let outcome = run_task(&oracle, &mut executor, &test_config(), "do nothing", &[])
            .await
            .unwrap();
        assert_eq!(
            outcome,
            RunOutcome::Completed {
                answer: "All done.".to_string(),
                turns: 1
            }
        );
        assert_eq!(executor.shutdowns, 1);
        assert!(executor.executed.is_empty());
    }

    #[tokio::test]
    async fn test_operation_failure_continues_loop() {
        let oracle = ScriptedOracle::new(vec![
            tool_response("click_element", json!({"by": "id", "value": "go"})),
            answer_response("Recovered."),
        ]);
        let mut executor = ScriptedExecutor::new(vec![Err(Error::LocateTimeout(
            "element id=go did not appear".to_string(),
        ))]);
        let outcome = run_task(&oracle, &mut executor, &test_config(), "click go", &[])
            .await
            .unwrap();
        assert_eq!(
            outcome,
            RunOutcome::Completed {
                answer: "Recovered.".to_string(),
                turns: 2
            }
        );
        assert_eq!(executor.executed.len(), 1);
        assert_eq!(executor.shutdowns, 1);
    }

    #[tokio::test]
    async fn test_unknown_operation_rejected_but_not_fatal() {
        let oracle = ScriptedOracle::new(vec![
            tool_response("teleport", json!({})),
            answer_response("Gave up on teleporting."),
        ]);
        let mut executor = ScriptedExecutor::new(vec![]);
        let outcome = run_task(&oracle, &mut executor, &test_config(), "teleport", &[])
            .await
            .unwrap();
        assert!(matches!(outcome, RunOutcome::Completed { turns: 2, .. }));
        // The invalid request never reached the executor.
        assert!(executor.executed.is_empty());
    }

    #[tokio::test]
    async fn test_ceiling_exceeded_with_single_teardown() {
        let responses: Vec<_> = (0..5)
            .map(|_| tool_response("scroll_page", json!({"direction": "down"})))
            .collect();
        let oracle = ScriptedOracle::new(responses);
        let mut executor = ScriptedExecutor::new(vec![]);
        let outcome = run_task(&oracle, &mut executor, &test_config(), "scroll forever", &[])
            .await
            .unwrap();
        assert_eq!(outcome, RunOutcome::CeilingExceeded { turns: 5 });
        assert_eq!(executor.executed.len(), 5);
        assert_eq!(executor.shutdowns, 1);
    }

    #[tokio::test]
    async fn test_session_not_started_is_run_fatal() {
        let oracle = ScriptedOracle::new(vec![tool_response(
            "click_element",
            json!({"by": "id", "value": "go"}),
        )]);
        let mut executor = ScriptedExecutor::new(vec![Err(Error::SessionNotStarted)]);
        let err = run_task(&oracle, &mut executor, &test_config(), "click", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SessionNotStarted));
        // Teardown still happens exactly once.
        assert_eq!(executor.shutdowns, 1);
    }

    #[tokio::test]
    async fn test_oracle_retry_then_success() {
        let oracle = ScriptedOracle::new(vec![
            Err(Error::Provider("transient".to_string())),
            answer_response("Done after retry."),
        ]);
        let mut executor = ScriptedExecutor::new(vec![]);
        let outcome = run_task(&oracle, &mut executor, &test_config(), "anything", &[])
            .await
            .unwrap();
        assert!(matches!(outcome, RunOutcome::Completed { turns: 1, .. }));
    }

    #[tokio::test]
    async fn test_oracle_retries_exhausted() {
        let oracle = ScriptedOracle::new(vec![
            Err(Error::Provider("down".to_string())),
            Err(Error::Provider("still down".to_string())),
        ]);
        let mut executor = ScriptedExecutor::new(vec![]);
        let err = run_task(&oracle, &mut executor, &test_config(), "anything", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Provider(_)));
        assert_eq!(executor.shutdowns, 1);
    }

    #[test]
    fn test_classify_strategies() {
        let xpaths: HashSet<&str> = ["//*[@id=\"q\"]"].into_iter().collect();
        let direct = ToolCall::parse("click_element", &json!({"by": "css", "value": ".btn"})).unwrap();
        assert_eq!(classify(&direct, &xpaths), "direct_locator");

        let from_context =
            ToolCall::parse("click_element", &json!({"by": "xpath", "value": "//*[@id=\"q\"]"}))
                .unwrap();
        assert_eq!(classify(&from_context, &xpaths), "context_locator");

        let scoped = ToolCall::parse(
            "find_interactive_element",
            &json!({"query": "x", "container_xpath": "/html/body"}),
        )
        .unwrap();
        assert_eq!(classify(&scoped, &xpaths), "scoped_scan");

        let general =
            ToolCall::parse("find_interactive_element", &json!({"query": "x"})).unwrap();
        assert_eq!(classify(&general, &xpaths), "general_scan");

        let control = ToolCall::parse("scroll_page", &json!({})).unwrap();
        assert_eq!(classify(&control, &xpaths), "control");
    }
}
