//! # Tool Schemas
//!
//! Machine-readable descriptions of tool parameters. Every declared
//! parameter is mandatory; there is no notion of an optional parameter.

use crate::provider::ToolDefinition;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Type and description of a single tool parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub description: String,
    /// Any further JSON-schema keywords (`items`, `enum`, `additionalProperties`, ...)
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ParameterSpec {
    pub fn new(kind: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            description: description.into(),
            extra: serde_json::Map::new(),
        }
    }

    pub fn string(description: impl Into<String>) -> Self {
        Self::new("string", description)
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

/// Parameter name -> spec, kept in a stable order
pub type Parameters = BTreeMap<String, ParameterSpec>;

/// Name, description and parameters of a registered tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: Parameters,
}

/// Keys that did not line up with a tool's declared parameters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArgumentMismatch {
    pub missing: Vec<String>,
    pub unexpected: Vec<String>,
}

impl std::fmt::Display for ArgumentMismatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut parts = Vec::new();
        if !self.missing.is_empty() {
            parts.push(format!("missing required argument(s): {}", self.missing.join(", ")));
        }
        if !self.unexpected.is_empty() {
            parts.push(format!("unexpected argument(s): {}", self.unexpected.join(", ")));
        }
        write!(f, "{}", parts.join("; "))
    }
}

impl ToolSchema {
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: Parameters) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }

    /// All parameters are required
    pub fn required(&self) -> Vec<String> {
        self.parameters.keys().cloned().collect()
    }

    /// Render as the JSON-schema definition sent to the model
    pub fn to_definition(&self) -> ToolDefinition {
        let properties: serde_json::Map<String, serde_json::Value> = self
            .parameters
            .iter()
            .map(|(name, spec)| {
                let value = serde_json::to_value(spec).unwrap_or_else(|_| serde_json::json!({}));
                (name.clone(), value)
            })
            .collect();

        ToolDefinition::new(&self.name, &self.description).with_parameters(serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": self.required(),
        }))
    }

    /// Compare supplied argument keys against the declared parameters
    pub fn check_arguments(
        &self,
        args: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<(), ArgumentMismatch> {
        let missing: Vec<String> = self
            .parameters
            .keys()
            .filter(|name| !args.contains_key(name.as_str()))
            .cloned()
            .collect();
        let mut unexpected: Vec<String> = args
            .keys()
            .filter(|key| !self.parameters.contains_key(key.as_str()))
            .cloned()
            .collect();
        unexpected.sort();

        if missing.is_empty() && unexpected.is_empty() {
            Ok(())
        } else {
            Err(ArgumentMismatch { missing, unexpected })
        }
    }
}
