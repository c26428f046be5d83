//! Prompt assembly: the resolved `{system, user}` pair and credential discovery.
//!
//! Only environment variable *names* ever reach the model.

use serde::{Deserialize, Serialize};

/// Placeholder in a system template replaced by the discovered key list
pub const API_KEYS_PLACEHOLDER: &str = "{api_keys_info}";

/// Case-insensitive substrings marking a variable as credential-like
pub const CREDENTIAL_PATTERNS: &[&str] = &["API_KEY", "ACCESS_TOKEN", "SECRET_KEY", "TOKEN", "APISECRET"];

/// Built-in system template used when no prompt library is supplied
pub const DEFAULT_SYSTEM_TEMPLATE: &str = "\
You are an autonomous agent that completes tasks by calling tools.

You start with three tools:
- create_or_update_tool: define a new tool (or replace one) from bash source that \
declares a shell function named after the tool
- install_package: install a package you need
- task_completed: call this once the task is fully done

Build whatever tools the task requires, use them, inspect their results and \
fix them when they fail. Work step by step and do not stop early.

{api_keys_info}";

/// A resolved prompt: system template plus task text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptPair {
    pub system: String,
    #[serde(default)]
    pub user: String,
}

impl PromptPair {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
        }
    }

    /// The built-in template with the given task
    pub fn with_default_system(user: impl Into<String>) -> Self {
        Self::new(DEFAULT_SYSTEM_TEMPLATE, user)
    }

    /// System prompt with the placeholder substituted
    pub fn render_system(&self, keys: &[String]) -> String {
        self.system.replace(API_KEYS_PLACEHOLDER, &api_keys_info(keys))
    }
}

/// Names of credential-like variables, sorted and deduplicated
pub fn discover_credential_keys<I, K>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = K>,
    K: Into<String>,
{
    let mut keys: Vec<String> = names
        .into_iter()
        .map(Into::into)
        .filter(|name| {
            let upper = name.to_ascii_uppercase();
            CREDENTIAL_PATTERNS.iter().any(|p| upper.contains(p))
        })
        .collect();
    keys.sort();
    keys.dedup();
    keys
}

/// Credential-like names present in this process's environment
pub fn discover_env_credential_keys() -> Vec<String> {
    discover_credential_keys(std::env::vars_os().filter_map(|(k, _)| k.into_string().ok()))
}

/// Informational line listing available keys
pub fn api_keys_info(keys: &[String]) -> String {
    if keys.is_empty() {
        return "No API keys are available.\n\n".to_string();
    }

    let list: Vec<String> = keys.iter().map(|k| format!("- {}", k)).collect();
    format!("Available API keys:\n{}\n\n", list.join("\n"))
}
