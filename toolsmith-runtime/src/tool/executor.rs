//! Tool executor - resolves a call against the registry and runs it.
//!
//! Every path returns a [`ToolOutcome`]; nothing a tool does can unwind
//! past `invoke`.

use super::definer::{self, DefineRequest};
use super::install::InstallerConfig;
use super::registry::{Builtin, NativeTool, ToolHandler, ToolRegistry};
use super::sandbox::ScriptSandbox;
use super::ToolOutcome;
use crate::provider::ToolCall;
use serde_json::{Map, Value};
use std::any::Any;
use std::sync::Arc;
use toolsmith_error::{Error, Result};
use tracing::{info, warn};

/// Decode a call's argument text into a key-value map.
///
/// An empty payload counts as `{}`; anything other than a JSON object fails.
pub fn decode_arguments(call: &ToolCall) -> Result<Map<String, Value>> {
    let text = call.arguments.trim();
    if text.is_empty() {
        return Ok(Map::new());
    }
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(Error::argument_decode_failed(
            &call.name,
            format!("expected a JSON object, got {}", json_type(&other)),
        )
        .with_context("call_id", &call.id)),
        Err(e) => Err(Error::argument_decode_failed(&call.name, &e)
            .with_context("call_id", &call.id)
            .set_source(e)),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Run a native tool on its own task so a panic surfaces as a failed call.
async fn call_native(name: &str, tool: Arc<dyn NativeTool>, args: Map<String, Value>) -> ToolOutcome {
    match tokio::spawn(async move { tool.call(args).await }).await {
        Ok(result) => result,
        Err(join) if join.is_panic() => Err(Error::tool_execution_failed(
            name,
            format!("tool panicked: {}", panic_message(&*join.into_panic())),
        )
        .with_operation("executor::call_native")),
        Err(join) => Err(Error::tool_execution_failed(name, &join)
            .with_operation("executor::call_native")
            .set_source(join)),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(text) = payload.downcast_ref::<&'static str>() {
        text
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text
    } else {
        "unknown panic"
    }
}

/// Runs tools on behalf of the agent loop
#[derive(Debug, Clone, Default)]
pub struct ToolExecutor {
    sandbox: ScriptSandbox,
    installer: InstallerConfig,
}

impl ToolExecutor {
    pub fn new(sandbox: ScriptSandbox, installer: InstallerConfig) -> Self {
        Self { sandbox, installer }
    }

    pub fn sandbox(&self) -> &ScriptSandbox {
        &self.sandbox
    }

    /// Invoke `name` with decoded arguments
    pub async fn invoke(
        &self,
        registry: &mut ToolRegistry,
        name: &str,
        args: Map<String, Value>,
    ) -> ToolOutcome {
        let Some(handler) = registry.lookup(name) else {
            warn!(tool = name, "Tool not found");
            return Err(Error::tool_not_found(name).with_operation("executor::invoke"));
        };

        if let Some(reg) = registry.get(name) {
            if let Err(mismatch) = reg.schema.check_arguments(&args) {
                warn!(tool = name, %mismatch, "Argument mismatch");
                return Err(Error::invalid_argument(format!(
                    "Error executing '{}': {}",
                    name, mismatch
                ))
                .with_operation("executor::invoke")
                .with_context("tool", name));
            }
        }

        let shown = Value::Object(args.clone());
        info!(tool = name, args = %shown, "Calling tool");
        let outcome = self.dispatch(registry, name, handler, args).await;

        match &outcome {
            Ok(value) => info!(tool = name, result = %value, "Tool result"),
            Err(err) => warn!(tool = name, kind = %err.kind(), "{}", err.message()),
        }
        outcome
    }

    /// Decode and invoke a model-issued call
    pub async fn invoke_call(&self, registry: &mut ToolRegistry, call: &ToolCall) -> ToolOutcome {
        match decode_arguments(call) {
            Ok(args) => self.invoke(registry, &call.name, args).await,
            Err(err) => {
                warn!(tool = %call.name, call_id = %call.id, "{}", err.message());
                Err(err)
            }
        }
    }

    async fn dispatch(
        &self,
        registry: &mut ToolRegistry,
        name: &str,
        handler: ToolHandler,
        args: Map<String, Value>,
    ) -> ToolOutcome {
        let result = match handler {
            ToolHandler::Builtin(Builtin::DefineTool) => match DefineRequest::from_arguments(&args) {
                Ok(request) => definer::define(registry, &self.sandbox, request).await,
                Err(err) => Err(err),
            },
            ToolHandler::Builtin(Builtin::InstallPackage) => {
                let package = args.get("package_name").and_then(Value::as_str).unwrap_or_default();
                self.installer.install(package).await
            }
            ToolHandler::Builtin(Builtin::TaskCompleted) => {
                Ok(Value::String("Task marked as completed.".into()))
            }
            ToolHandler::Native(tool) => call_native(name, tool, args).await,
            ToolHandler::Script(script) => self.sandbox.run(&script, &args).await,
        };

        result.map_err(|err| {
            if err.kind().is_tool_failure() {
                err
            } else {
                Error::tool_execution_failed(name, err.message())
                    .with_operation("executor::dispatch")
                    .set_source(err)
            }
        })
    }
}
