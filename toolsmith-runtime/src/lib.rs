//! # Toolsmith Runtime
//!
//! The pieces an agent run is assembled from.
//!
//! ## Core Concepts
//! - **Provider**: Trait-based completion boundary (OpenAI-compatible, Anthropic)
//! - **Tools**: Registry of built-in, native and model-authored tools, plus the executor that runs them
//! - **Conversation**: Append-only transcript with tool-call correlation
//! - **Prompt**: System template rendering and credential-name discovery

pub mod conversation;
pub mod prompt;
pub mod provider;
pub mod tool;

pub use conversation::Conversation;
pub use prompt::{
    api_keys_info, discover_credential_keys, discover_env_credential_keys, PromptPair,
    API_KEYS_PLACEHOLDER, DEFAULT_SYSTEM_TEMPLATE,
};
pub use provider::{
    AnthropicProvider, ChatMessage, CompletionRequest, CompletionResponse, FinishReason,
    LlmProvider, OpenAIProvider, ProviderConfig, ProviderError, ProviderType, Role, ToolCall,
    ToolChoice, ToolDefinition, Usage, UsageTracker,
};
pub use tool::{
    decode_arguments, render_outcome, Builtin, DefineRequest, FnTool, InstallerConfig, NativeTool,
    ParameterSpec, Parameters, SandboxConfig, ScriptSandbox, ScriptTool, ToolExecutor,
    ToolHandler, ToolOutcome, ToolRegistration, ToolRegistry, ToolSchema, DEFINE_TOOL,
    INSTALL_PACKAGE, MAX_TOOL_OUTPUT_LENGTH, TASK_COMPLETED,
};
pub use toolsmith_error::{Error, ErrorKind, Result};
