//! # Tools
//!
//! Everything between a model-issued tool call and the text that goes back
//! into the conversation:
//!
//! - [`registry`]: name -> schema and implementation
//! - [`executor`]: decode, validate, dispatch
//! - [`definer`]: model-authored tools
//! - [`sandbox`]: child-process runner for those tools
//! - [`serialize`]: result text and truncation

pub mod definer;
pub mod executor;
pub mod install;
pub mod registry;
pub mod sandbox;
pub mod schema;
pub mod serialize;

pub use definer::DefineRequest;
pub use executor::{decode_arguments, ToolExecutor};
pub use install::InstallerConfig;
pub use registry::{
    Builtin, FnTool, NativeTool, ToolHandler, ToolRegistration, ToolRegistry, DEFINE_TOOL,
    INSTALL_PACKAGE, TASK_COMPLETED,
};
pub use sandbox::{SandboxConfig, ScriptSandbox, ScriptTool};
pub use schema::{ArgumentMismatch, ParameterSpec, Parameters, ToolSchema};
pub use serialize::{render_outcome, serialize_value, truncate_output, MAX_TOOL_OUTPUT_LENGTH};

/// Result of one tool invocation; failures carry the text shown to the model
pub type ToolOutcome = Result<serde_json::Value, toolsmith_error::Error>;
