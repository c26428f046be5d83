//! # Dynamic Tool Definer
//!
//! Lets the model add tools mid-run. The supplied source is checked and
//! loaded in a child shell before anything touches the registry, so a
//! failed definition leaves the registry exactly as it was.
//!
//! Redefining an existing tool, built-ins included, is allowed.

use super::registry::{ToolHandler, ToolRegistry};
use super::sandbox::{is_reserved_variable, is_shell_identifier, ScriptSandbox, ScriptTool, INTERNAL_PREFIX};
use super::schema::Parameters;
use serde_json::{Map, Value};
use std::sync::Arc;
use toolsmith_error::{Error, Result};
use tracing::info;

/// Decoded arguments of `create_or_update_tool`
#[derive(Debug, Clone, PartialEq)]
pub struct DefineRequest {
    pub name: String,
    pub code: String,
    pub description: String,
    pub parameters: Parameters,
}

impl DefineRequest {
    /// Build from raw tool-call arguments.
    ///
    /// `parameters` may arrive either as an object or as a JSON string
    /// holding one; models produce both.
    pub fn from_arguments(args: &Map<String, Value>) -> Result<Self> {
        let name = string_field(args, "name", "?")?;
        let code = string_field(args, "code", &name)?;
        let description = string_field(args, "description", &name)?;

        let raw = match args.get("parameters") {
            Some(Value::String(text)) => serde_json::from_str(text)
                .map_err(|e| Error::tool_definition_failed(&name, format!("parameters: {}", e)))?,
            Some(value) => value.clone(),
            None => Value::Object(Map::new()),
        };
        let parameters: Parameters = serde_json::from_value(raw)
            .map_err(|e| Error::tool_definition_failed(&name, format!("parameters: {}", e)))?;

        Ok(Self {
            name,
            code,
            description,
            parameters,
        })
    }
}

fn string_field(args: &Map<String, Value>, key: &str, tool: &str) -> Result<String> {
    match args.get(key) {
        Some(Value::String(s)) => Ok(s.clone()),
        _ => Err(Error::tool_definition_failed(tool, format!("'{}' must be a string", key))),
    }
}

/// Check, load and register a model-authored tool
pub async fn define(
    registry: &mut ToolRegistry,
    sandbox: &ScriptSandbox,
    request: DefineRequest,
) -> Result<Value> {
    let DefineRequest {
        name,
        code,
        description,
        parameters,
    } = request;

    if !is_shell_identifier(&name) {
        return Err(Error::tool_definition_failed(
            &name,
            "tool name must be a valid shell identifier",
        ));
    }
    if name.starts_with(INTERNAL_PREFIX) {
        return Err(Error::tool_definition_failed(
            &name,
            format!("tool names starting with '{}' are reserved", INTERNAL_PREFIX),
        ));
    }
    if let Some(bad) = parameters.keys().find(|p| !is_shell_identifier(p)) {
        return Err(Error::tool_definition_failed(
            &name,
            format!("parameter '{}' must be a valid shell identifier", bad),
        ));
    }
    // Arguments are exported to the child shell under their parameter names.
    if let Some(bad) = parameters.keys().find(|p| is_reserved_variable(p)) {
        return Err(Error::tool_definition_failed(
            &name,
            format!("parameter '{}' is a reserved environment variable", bad),
        ));
    }

    let fail = |e: Error| {
        Error::tool_definition_failed(&name, e.message()).with_operation("definer::define")
    };
    sandbox.check_syntax(&code).await.map_err(fail)?;
    sandbox.load(&name, &code).await.map_err(fail)?;

    let script = ScriptTool {
        name: name.clone(),
        code,
        parameters: parameters.keys().cloned().collect(),
    };
    let replaced = registry.contains(&name);
    registry.register(&name, ToolHandler::Script(Arc::new(script)), description, parameters);
    info!(tool = %name, replaced, "Dynamic tool defined");

    Ok(Value::String(format!("Tool '{}' created/updated successfully.", name)))
}
