//! Agent implementation - drives the model <-> tool loop

use std::fmt;
use std::time::Duration;
use toolsmith_error::Result;
use toolsmith_runtime::{
    discover_env_credential_keys, render_outcome, ChatMessage, CompletionRequest, Conversation,
    LlmProvider, PromptPair, ProviderError, ToolChoice, ToolExecutor, ToolRegistry, UsageTracker,
    MAX_TOOL_OUTPUT_LENGTH, TASK_COMPLETED,
};
use tracing::{error, info, warn};

/// Configuration for the agent loop
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Model identifier sent with every completion request
    pub model: String,
    /// Turn ceiling
    pub max_iterations: usize,
    /// Pause before the next turn after a failed completion
    pub retry_delay: Duration,
    /// Character cap for a single tool result
    pub max_tool_output: usize,
    /// Requesting a call with this name ends the run
    pub completion_tool: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: "claude-sonnet-4-20250514".to_string(),
            max_iterations: 50,
            retry_delay: Duration::from_secs(2),
            max_tool_output: MAX_TOOL_OUTPUT_LENGTH,
            completion_tool: TASK_COMPLETED.to_string(),
        }
    }
}

impl AgentConfig {
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn with_max_tool_output(mut self, max: usize) -> Self {
        self.max_tool_output = max;
        self
    }
}

/// Where the loop is in its state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    AwaitingModel,
    ProcessingToolCalls,
    /// The completion tool was requested
    Completed,
    /// The turn ceiling was reached first
    Exhausted,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Exhausted)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::AwaitingModel => "awaiting_model",
            Self::ProcessingToolCalls => "processing_tool_calls",
            Self::Completed => "completed",
            Self::Exhausted => "exhausted",
        };
        write!(f, "{}", s)
    }
}

/// Result of a finished run
#[derive(Debug)]
pub struct RunOutcome {
    /// Always terminal
    pub state: RunState,
    /// Turns taken, failed ones included
    pub turns: usize,
    pub conversation: Conversation,
    pub usage: UsageTracker,
}

impl RunOutcome {
    pub fn is_completed(&self) -> bool {
        self.state == RunState::Completed
    }
}

/// The agent loop - owns the registry and runs one conversation at a time
pub struct AgentLoop<P: LlmProvider> {
    provider: P,
    registry: ToolRegistry,
    executor: ToolExecutor,
    config: AgentConfig,
    usage: UsageTracker,
    state: RunState,
}

impl<P: LlmProvider> AgentLoop<P> {
    /// Default configuration with the provider's default model
    pub fn new(provider: P) -> Self {
        let config = AgentConfig::default().with_model(provider.default_model());
        Self::with_config(provider, config)
    }

    pub fn with_config(provider: P, config: AgentConfig) -> Self {
        Self::with_executor(provider, config, ToolExecutor::default())
    }

    pub fn with_executor(provider: P, config: AgentConfig, executor: ToolExecutor) -> Self {
        Self {
            provider,
            registry: ToolRegistry::with_builtins(),
            executor,
            config,
            usage: UsageTracker::new(),
            state: RunState::AwaitingModel,
        }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Register host tools before a run
    pub fn registry_mut(&mut self) -> &mut ToolRegistry {
        &mut self.registry
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Run a task, listing credential-like variables of this process in the system prompt
    pub async fn run(&mut self, prompt: PromptPair) -> RunOutcome {
        let keys = discover_env_credential_keys();
        self.run_with_keys(prompt, &keys).await
    }

    /// Run a task with an explicit list of credential names
    pub async fn run_with_keys(&mut self, prompt: PromptPair, keys: &[String]) -> RunOutcome {
        let system = prompt.render_system(keys);
        let mut conversation = Conversation::seed(system, prompt.user);
        self.usage = UsageTracker::new();

        info!(
            provider = self.provider.name(),
            model = %self.config.model,
            tools = self.registry.len(),
            "Starting run"
        );

        let mut turns = 0;
        while turns < self.config.max_iterations {
            turns += 1;
            self.state = RunState::AwaitingModel;
            info!(turn = turns, "Iteration {} running...", turns);

            match self.turn(&mut conversation).await {
                Ok(true) => {
                    self.state = RunState::Completed;
                    info!(turn = turns, "Task completed.");
                    break;
                }
                Ok(false) => {}
                Err(err) => {
                    error!(turn = turns, kind = %err.kind(), "Error in main loop: {}", err);
                    if turns < self.config.max_iterations {
                        tokio::time::sleep(self.config.retry_delay).await;
                    }
                }
            }
        }

        if self.state != RunState::Completed {
            self.state = RunState::Exhausted;
            warn!(turns, "Max iterations reached without completion.");
        }

        RunOutcome {
            state: self.state,
            turns,
            conversation,
            usage: self.usage.clone(),
        }
    }

    /// One round trip. `Ok(true)` when the completion tool was requested.
    ///
    /// A completion failure returns before anything is appended.
    async fn turn(&mut self, conversation: &mut Conversation) -> Result<bool> {
        let request = CompletionRequest::new(conversation.messages().to_vec())
            .with_model(&self.config.model)
            .with_tools(self.registry.definitions())
            .with_tool_choice(ToolChoice::Auto);

        let response = self
            .provider
            .complete(request)
            .await
            .map_err(ProviderError::into_error)?;

        let model = if response.model.is_empty() {
            self.config.model.as_str()
        } else {
            response.model.as_str()
        };
        self.usage.track(model, &response.usage);

        if let Some(text) = response.content.as_deref().filter(|t| !t.trim().is_empty()) {
            info!("LLM Response:\n{}", text);
        }

        let message = ChatMessage::from_response(&response);
        conversation.push_assistant(message)?;

        let calls = response.tool_calls;
        if calls.is_empty() {
            return Ok(false);
        }

        self.state = RunState::ProcessingToolCalls;
        let mut completed = false;
        for call in &calls {
            let outcome = self.executor.invoke_call(&mut self.registry, call).await;
            let content = render_outcome(&outcome, self.config.max_tool_output);
            conversation.push_tool_result(call, content)?;
            completed |= call.name == self.config.completion_tool;
        }

        Ok(completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use toolsmith_runtime::{
        CompletionResponse, FinishReason, InstallerConfig, Parameters, Role, ScriptSandbox,
        ToolCall, ToolHandler, Usage, DEFINE_TOOL, INSTALL_PACKAGE,
    };

    /// Replays canned responses; text-only replies once the script runs out
    #[derive(Default)]
    struct ScriptedProvider {
        responses: Mutex<VecDeque<std::result::Result<CompletionResponse, ProviderError>>>,
        requests: Mutex<Vec<CompletionRequest>>,
    }

    impl ScriptedProvider {
        fn new(
            responses: Vec<std::result::Result<CompletionResponse, ProviderError>>,
        ) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn requests(&self) -> Vec<CompletionRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    impl LlmProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        fn default_model(&self) -> &str {
            "scripted-model"
        }

        async fn complete(
            &self,
            request: CompletionRequest,
        ) -> std::result::Result<CompletionResponse, ProviderError> {
            self.requests.lock().unwrap().push(request);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(reply(Some("Hello!"), vec![])))
        }
    }

    fn reply(content: Option<&str>, tool_calls: Vec<ToolCall>) -> CompletionResponse {
        let finish_reason = if tool_calls.is_empty() {
            FinishReason::Stop
        } else {
            FinishReason::ToolCalls
        };
        CompletionResponse {
            id: "resp".into(),
            model: "scripted-model".into(),
            content: content.map(String::from),
            tool_calls,
            finish_reason,
            usage: Usage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            },
        }
    }

    fn agent(responses: Vec<std::result::Result<CompletionResponse, ProviderError>>) -> AgentLoop<ScriptedProvider> {
        let executor = ToolExecutor::new(
            ScriptSandbox::default(),
            InstallerConfig { command: vec!["true".into()] },
        );
        AgentLoop::with_executor(ScriptedProvider::new(responses), AgentConfig::default(), executor)
    }

    fn prompt(task: &str) -> PromptPair {
        PromptPair::new("You are a test agent.\n{api_keys_info}", task)
    }

    #[tokio::test]
    async fn test_text_only_turns_run_to_exhaustion() {
        let mut agent = agent(vec![]);
        let outcome = agent.run_with_keys(prompt("say hello"), &[]).await;

        assert_eq!(outcome.state, RunState::Exhausted);
        assert_eq!(agent.state(), RunState::Exhausted);
        assert_eq!(outcome.turns, 50);
        assert_eq!(outcome.conversation.assistant_turns().count(), 50);
        assert_eq!(outcome.conversation.tool_results().count(), 0);
        assert_eq!(outcome.conversation.len(), 52);
        assert_eq!(outcome.usage.total_calls, 50);

        let first = &outcome.conversation.messages()[2];
        assert_eq!(first.role, Role::Assistant);
        assert_eq!(first.content.as_deref(), Some("Hello!"));
        assert!(first.tool_calls.is_none());
    }

    #[tokio::test]
    async fn test_completion_waits_for_sibling_calls() {
        let mut agent = agent(vec![Ok(reply(
            None,
            vec![
                ToolCall::new("call_1", INSTALL_PACKAGE, r#"{"package_name": "foo"}"#),
                ToolCall::new("call_2", TASK_COMPLETED, "{}"),
            ],
        ))]);
        let outcome = agent.run_with_keys(prompt("install foo"), &[]).await;

        assert_eq!(outcome.state, RunState::Completed);
        assert!(outcome.is_completed());
        assert_eq!(outcome.turns, 1);

        let results: Vec<_> = outcome.conversation.tool_results().collect();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(results[0].content.as_deref(), Some("Package 'foo' installed successfully."));
        assert_eq!(results[1].tool_call_id.as_deref(), Some("call_2"));
        assert_eq!(results[1].content.as_deref(), Some("Task marked as completed."));
        assert_eq!(agent.provider().requests().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_completion_appends_nothing_and_retries() {
        let mut agent = agent(vec![
            Ok(reply(Some("one"), vec![])),
            Ok(reply(Some("two"), vec![])),
            Err(ProviderError::Network("connection reset".into())),
            Ok(reply(None, vec![ToolCall::new("done", TASK_COMPLETED, "")])),
        ]);

        let started = tokio::time::Instant::now();
        let outcome = agent.run_with_keys(prompt("count"), &[]).await;
        assert!(started.elapsed() >= Duration::from_secs(2));

        assert_eq!(outcome.state, RunState::Completed);
        assert_eq!(outcome.turns, 4);

        let requests = agent.provider().requests();
        assert_eq!(requests.len(), 4);
        assert_eq!(requests[2].messages, requests[3].messages);
        assert_eq!(requests[3].messages.len(), 4);
        assert_eq!(outcome.conversation.assistant_turns().count(), 3);
    }

    #[tokio::test]
    async fn test_every_request_carries_schemas_and_auto_choice() {
        let mut agent = agent(vec![Ok(reply(
            None,
            vec![ToolCall::new("c", TASK_COMPLETED, "{}")],
        ))]);
        agent.run_with_keys(prompt("task"), &["MY_TOKEN".to_string()]).await;

        let request = &agent.provider().requests()[0];
        assert_eq!(request.model.as_deref(), Some("claude-sonnet-4-20250514"));
        assert_eq!(request.tool_choice, Some(ToolChoice::Auto));
        let names: Vec<_> = request.tools.as_ref().unwrap().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec![DEFINE_TOOL, INSTALL_PACKAGE, TASK_COMPLETED]);

        let system = request.messages[0].content.as_deref().unwrap();
        assert!(system.contains("Available API keys:\n- MY_TOKEN"));
        assert_eq!(request.messages[1].content.as_deref(), Some("task"));
    }

    #[tokio::test]
    async fn test_tool_failures_become_results() {
        let mut agent = agent(vec![Ok(reply(
            None,
            vec![
                ToolCall::new("a", "teleport", "{}"),
                ToolCall::new("b", INSTALL_PACKAGE, "{oops"),
                ToolCall::new("c", TASK_COMPLETED, "{}"),
            ],
        ))]);
        let outcome = agent.run_with_keys(prompt("task"), &[]).await;

        assert_eq!(outcome.state, RunState::Completed);
        let contents: Vec<_> = outcome
            .conversation
            .tool_results()
            .map(|m| m.content.clone().unwrap_or_default())
            .collect();
        assert_eq!(contents[0], "Tool 'teleport' not found.");
        assert!(contents[1].starts_with("Error decoding arguments for 'install_package'"));
        assert_eq!(contents[2], "Task marked as completed.");
    }

    #[tokio::test]
    async fn test_panicking_tool_does_not_end_the_run() {
        let mut agent = agent(vec![Ok(reply(
            None,
            vec![
                ToolCall::new("p", "boom", "{}"),
                ToolCall::new("q", TASK_COMPLETED, "{}"),
            ],
        ))]);
        agent.registry_mut().register(
            "boom",
            ToolHandler::from_fn(|_| {
                let empty: Vec<u8> = Vec::new();
                Ok(json!(empty[3]))
            }),
            "Indexes past the end",
            Parameters::new(),
        );

        let outcome = agent.run_with_keys(prompt("task"), &[]).await;
        assert_eq!(outcome.state, RunState::Completed);
        let contents: Vec<_> = outcome
            .conversation
            .tool_results()
            .map(|m| m.content.clone().unwrap_or_default())
            .collect();
        assert_eq!(contents.len(), 2);
        assert!(contents[0].starts_with("Error executing 'boom': tool panicked"));
        assert_eq!(contents[1], "Task marked as completed.");
    }

    #[tokio::test]
    async fn test_model_defines_then_uses_a_tool() {
        let define = json!({
            "name": "double",
            "code": "double() { echo $(( n * 2 )); }",
            "description": "Doubles a number",
            "parameters": { "n": { "type": "integer", "description": "Number to double" } }
        });
        let mut agent = agent(vec![
            Ok(reply(None, vec![ToolCall::new("d1", DEFINE_TOOL, define.to_string())])),
            Ok(reply(None, vec![ToolCall::new("d2", "double", r#"{"n": 21}"#)])),
            Ok(reply(None, vec![ToolCall::new("d3", TASK_COMPLETED, "{}")])),
        ]);
        let outcome = agent.run_with_keys(prompt("double 21"), &[]).await;

        assert_eq!(outcome.state, RunState::Completed);
        let contents: Vec<_> = outcome
            .conversation
            .tool_results()
            .map(|m| m.content.clone().unwrap_or_default())
            .collect();
        assert_eq!(contents[0], "Tool 'double' created/updated successfully.");
        assert_eq!(contents[1], "42");

        let second = &agent.provider().requests()[1];
        assert!(second.tools.as_ref().unwrap().iter().any(|t| t.name == "double"));
        assert!(agent.registry().contains("double"));
    }

    #[tokio::test]
    async fn test_oversized_results_are_truncated() {
        let mut agent = agent(vec![Ok(reply(
            None,
            vec![
                ToolCall::new("big", "dump", "{}"),
                ToolCall::new("done", TASK_COMPLETED, "{}"),
            ],
        ))]);
        agent.registry_mut().register(
            "dump",
            ToolHandler::from_fn(|_| Ok(json!("x".repeat(6000)))),
            "Produces a lot of output",
            Parameters::new(),
        );

        let outcome = agent.run_with_keys(prompt("dump"), &[]).await;
        let result = outcome.conversation.tool_results().next().unwrap();
        let content = result.content.as_deref().unwrap();
        assert!(content.starts_with(&"x".repeat(5000)));
        assert!(!content.starts_with(&"x".repeat(5001)));
        assert!(content.ends_with(
            "(Note: Result was truncated to 5000 characters out of 6000 total characters.)"
        ));
    }

    #[tokio::test]
    async fn test_custom_iteration_ceiling() {
        let provider = ScriptedProvider::default();
        let config = AgentConfig::default().with_max_iterations(3);
        let mut agent = AgentLoop::with_config(provider, config);

        let outcome = agent.run_with_keys(prompt("task"), &[]).await;
        assert_eq!(outcome.state, RunState::Exhausted);
        assert_eq!(outcome.turns, 3);
        assert_eq!(agent.provider().requests().len(), 3);
    }

    #[test]
    fn test_new_uses_provider_default_model() {
        let agent = AgentLoop::new(ScriptedProvider::default());
        assert_eq!(agent.config().model, "scripted-model");
        assert_eq!(agent.config().max_iterations, 50);
        assert_eq!(agent.config().retry_delay, Duration::from_secs(2));
        assert!(!agent.state().is_terminal());
        assert_eq!(agent.registry().len(), 3);
    }
}
