//! Tool registry - name -> (schema, implementation)

use super::sandbox::ScriptTool;
use super::schema::{ParameterSpec, Parameters, ToolSchema};
use crate::provider::ToolDefinition;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use toolsmith_error::Result;
use tracing::info;

/// Name of the built-in tool that defines new tools
pub const DEFINE_TOOL: &str = "create_or_update_tool";
/// Name of the built-in installer tool
pub const INSTALL_PACKAGE: &str = "install_package";
/// Name of the parameterless completion-signal tool
pub const TASK_COMPLETED: &str = "task_completed";

/// A tool implemented in Rust by the host application
#[async_trait]
pub trait NativeTool: Send + Sync {
    async fn call(&self, args: Map<String, Value>) -> Result<Value>;
}

/// Adapter turning a plain closure into a [`NativeTool`]
pub struct FnTool<F>(pub F);

#[async_trait]
impl<F> NativeTool for FnTool<F>
where
    F: Fn(Map<String, Value>) -> Result<Value> + Send + Sync,
{
    async fn call(&self, args: Map<String, Value>) -> Result<Value> {
        (self.0)(args)
    }
}

/// The tools that ship with every registry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    DefineTool,
    InstallPackage,
    TaskCompleted,
}

/// Executable side of a registration
#[derive(Clone)]
pub enum ToolHandler {
    Builtin(Builtin),
    Native(Arc<dyn NativeTool>),
    /// Defined by the model at runtime
    Script(Arc<ScriptTool>),
}

impl ToolHandler {
    pub fn native(tool: impl NativeTool + 'static) -> Self {
        Self::Native(Arc::new(tool))
    }

    /// Wrap a synchronous closure
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(Map<String, Value>) -> Result<Value> + Send + Sync + 'static,
    {
        Self::native(FnTool(f))
    }

    pub fn variant(&self) -> &'static str {
        match self {
            Self::Builtin(_) => "builtin",
            Self::Native(_) => "native",
            Self::Script(_) => "script",
        }
    }
}

impl fmt::Debug for ToolHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Builtin(b) => write!(f, "Builtin({:?})", b),
            Self::Native(_) => write!(f, "Native(..)"),
            Self::Script(script) => write!(f, "Script({})", script.name),
        }
    }
}

/// Schema plus implementation
#[derive(Debug, Clone)]
pub struct ToolRegistration {
    pub schema: ToolSchema,
    pub handler: ToolHandler,
}

/// Mapping from tool name to registration.
///
/// Registering an existing name replaces the entry and moves it to the end
/// of the advertised order. Entries are never removed.
#[derive(Debug, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, ToolRegistration>,
    order: Vec<String>,
}

impl ToolRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry seeded with the three built-in tools
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();

        let mut define_params = Parameters::new();
        define_params.insert("name".into(), ParameterSpec::string("The tool name."));
        define_params.insert(
            "code".into(),
            ParameterSpec::string(
                "Bash source that defines a shell function with the same name as the tool.",
            ),
        );
        define_params.insert("description".into(), ParameterSpec::string("A description of the tool."));
        define_params.insert(
            "parameters".into(),
            ParameterSpec::new("object", "A dictionary defining the parameters for the tool.")
                .with_extra(
                    "additionalProperties",
                    serde_json::json!({
                        "type": "object",
                        "properties": {
                            "type": { "type": "string", "description": "Data type of the parameter." },
                            "description": { "type": "string", "description": "Description of the parameter." }
                        },
                        "required": ["type", "description"]
                    }),
                ),
        );
        registry.register(
            DEFINE_TOOL,
            ToolHandler::Builtin(Builtin::DefineTool),
            "Creates or updates a tool with the specified name, code, description, and parameters. \
             The code is a bash script that must define a shell function named after the tool. \
             Each argument is exported as an environment variable named after its parameter, \
             passed positionally in alphabetical parameter order, and the full argument object \
             is written as JSON to stdin. Whatever the function prints to stdout is the result.",
            define_params,
        );

        let mut install_params = Parameters::new();
        install_params.insert(
            "package_name".into(),
            ParameterSpec::string("The name of the package to install."),
        );
        registry.register(
            INSTALL_PACKAGE,
            ToolHandler::Builtin(Builtin::InstallPackage),
            "Installs a package using the configured package installer.",
            install_params,
        );

        registry.register(
            TASK_COMPLETED,
            ToolHandler::Builtin(Builtin::TaskCompleted),
            "Marks the current task as completed.",
            Parameters::new(),
        );

        registry
    }

    /// Insert or overwrite the entry for `name`
    pub fn register(
        &mut self,
        name: impl Into<String>,
        handler: ToolHandler,
        description: impl Into<String>,
        parameters: Parameters,
    ) {
        let name = name.into();
        let schema = ToolSchema::new(&name, description, parameters);

        if self.tools.contains_key(&name) {
            self.order.retain(|n| n != &name);
        }
        self.order.push(name.clone());

        info!(tool = %name, variant = handler.variant(), "Registered tool: {}", name);
        self.tools.insert(name, ToolRegistration { schema, handler });
    }

    /// Implementation bound to `name` right now
    pub fn lookup(&self, name: &str) -> Option<ToolHandler> {
        self.tools.get(name).map(|reg| reg.handler.clone())
    }

    pub fn get(&self, name: &str) -> Option<&ToolRegistration> {
        self.tools.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Registered names in advertised order
    pub fn names(&self) -> &[String] {
        &self.order
    }

    /// Schemas for the completion request, in advertised order
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|reg| reg.schema.to_definition())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn constant(value: &'static str) -> ToolHandler {
        ToolHandler::from_fn(move |_| Ok(json!(value)))
    }

    #[test]
    fn test_builtins() {
        let registry = ToolRegistry::with_builtins();
        assert_eq!(registry.names(), &[DEFINE_TOOL, INSTALL_PACKAGE, TASK_COMPLETED]);

        let defs = registry.definitions();
        assert_eq!(defs[0].parameters["required"], json!(["code", "description", "name", "parameters"]));
        assert_eq!(defs[1].parameters["required"], json!(["package_name"]));
        assert_eq!(defs[2].parameters["required"], json!([]));
        assert!(defs[0].parameters["properties"]["parameters"]["additionalProperties"].is_object());
    }

    #[test]
    fn test_lookup_missing_is_none() {
        let registry = ToolRegistry::new();
        assert!(registry.lookup("nope").is_none());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_register_replaces_last_write_wins() {
        let mut registry = ToolRegistry::with_builtins();
        registry.register("greet", constant("hello"), "v1", Parameters::new());
        registry.register("other", constant("x"), "other", Parameters::new());

        let mut params = Parameters::new();
        params.insert("who".into(), ParameterSpec::string("Who to greet"));
        registry.register("greet", constant("howdy"), "v2", params);

        assert_eq!(registry.len(), 5);
        assert_eq!(registry.names().iter().filter(|n| *n == "greet").count(), 1);
        assert_eq!(registry.names().last().map(String::as_str), Some("greet"));

        let reg = registry.get("greet").unwrap();
        assert_eq!(reg.schema.description, "v2");
        assert_eq!(reg.schema.required(), vec!["who".to_string()]);

        let ToolHandler::Native(tool) = registry.lookup("greet").unwrap() else {
            panic!("expected native handler");
        };
        assert_eq!(tool.call(Map::new()).await.unwrap(), json!("howdy"));
    }

    #[tokio::test]
    async fn test_lookup_binds_at_dispatch_time() {
        let mut registry = ToolRegistry::new();
        registry.register("greet", constant("old"), "v1", Parameters::new());

        let bound = registry.lookup("greet").unwrap();
        registry.register("greet", constant("new"), "v2", Parameters::new());

        let ToolHandler::Native(tool) = bound else {
            panic!("expected native handler");
        };
        assert_eq!(tool.call(Map::new()).await.unwrap(), json!("old"));
    }
}
