//! # Script Sandbox
//!
//! Model-authored tools are bash functions. They never run inside the host
//! process: every definition check and every invocation gets a fresh child
//! shell, so a script can only affect the world through that process.
//!
//! Invocation contract for a tool `name` with parameters `p1..pn`:
//! - each argument is exported as an environment variable named after its parameter
//! - the same values are passed positionally, in parameter-name order
//! - the full argument object is written to stdin as JSON
//! - stdout is the result (parsed as JSON when it is valid JSON)

use serde_json::{Map, Value};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use toolsmith_error::{Error, ErrorKind, Result};
use tracing::debug;

/// Settings for the child shells
#[derive(Debug, Clone)]
pub struct SandboxConfig {
    /// Shell binary used to check and run scripts
    pub shell: String,
    /// Upper bound for a single definition check or invocation
    pub timeout: Duration,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            shell: "bash".to_string(),
            timeout: Duration::from_secs(120),
        }
    }
}

/// A tool whose implementation is model-authored bash
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptTool {
    pub name: String,
    pub code: String,
    /// Declared parameter names, in positional order
    pub parameters: Vec<String>,
}

/// Runs scripts in isolated child processes
#[derive(Debug, Clone, Default)]
pub struct ScriptSandbox {
    config: SandboxConfig,
}

/// Captured result of one child shell
struct ShellOutput {
    success: bool,
    code: Option<i32>,
    stdout: String,
    stderr: String,
}

impl ShellOutput {
    fn failure_reason(&self) -> String {
        let status = match self.code {
            Some(code) => format!("exit code {}", code),
            None => "terminated by signal".to_string(),
        };
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            status
        } else {
            format!("{}: {}", status, stderr)
        }
    }
}

/// Valid bash identifier: `[A-Za-z_][A-Za-z0-9_]*`
pub fn is_shell_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Prefix of the helper names the sandbox wraps around model code
pub const INTERNAL_PREFIX: &str = "__toolsmith";

/// Variables bash or the dynamic loader read from the environment
const RESERVED_VARIABLES: &[&str] = &[
    "PATH", "HOME", "IFS", "ENV", "SHELL", "SHELLOPTS", "BASHOPTS", "CDPATH",
    "GLOBIGNORE", "PS4", "PWD", "OLDPWD", "TMPDIR", "POSIXLY_CORRECT",
];

/// Whether exporting `name` to a child shell would change how the shell
/// itself behaves.
pub fn is_reserved_variable(name: &str) -> bool {
    RESERVED_VARIABLES.contains(&name)
        || name.starts_with("BASH")
        || name.starts_with("LD_")
        || name.starts_with(INTERNAL_PREFIX)
}

/// Text form of an argument as seen by the script
fn argument_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl ScriptSandbox {
    pub fn new(config: SandboxConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    /// Parse without executing (`bash -n`)
    pub async fn check_syntax(&self, code: &str) -> Result<()> {
        let output = self.exec("check_syntax", &["-n", "-c", code], &[], None).await?;
        if output.success {
            Ok(())
        } else {
            Err(Error::new(
                ErrorKind::ToolDefinitionFailed,
                format!("syntax error: {}", output.stderr.trim()),
            )
            .with_operation("sandbox::check_syntax"))
        }
    }

    /// Run the top-level code once and confirm it defines function `name`.
    ///
    /// The check sits in an EXIT trap so an early top-level `exit 0` cannot
    /// skip it.
    pub async fn load(&self, name: &str, code: &str) -> Result<()> {
        let script = format!(
            r#"__toolsmith_loaded() {{
    local status=$?
    [ "$status" -eq 0 ] || exit "$status"
    declare -F {name} >/dev/null || {{ echo "no function named '{name}' is defined" >&2; exit 127; }}
}}
trap __toolsmith_loaded EXIT
set -e
{code}
exit 0"#
        );
        let output = self.exec(name, &["-c", &script, name], &[], None).await?;
        if output.success {
            Ok(())
        } else {
            Err(Error::new(ErrorKind::ToolDefinitionFailed, output.failure_reason())
                .with_operation("sandbox::load"))
        }
    }

    /// Invoke a script tool with already validated arguments
    pub async fn run(&self, tool: &ScriptTool, args: &Map<String, Value>) -> Result<Value> {
        let script = format!(
            r#"__toolsmith_call() {{
    local status=$?
    trap - EXIT
    [ "$status" -eq 0 ] || exit "$status"
    {name} "${{__toolsmith_args[@]}}"
    exit $?
}}
__toolsmith_args=("$@")
trap __toolsmith_call EXIT
{code}
exit 0"#,
            name = tool.name,
            code = tool.code,
        );

        let positional: Vec<String> = tool
            .parameters
            .iter()
            .map(|p| args.get(p).map(argument_text).unwrap_or_default())
            .collect();
        let env: Vec<(String, String)> = args
            .iter()
            .map(|(k, v)| (k.clone(), argument_text(v)))
            .collect();

        let mut argv: Vec<&str> = vec!["-c", &script, &tool.name];
        argv.extend(positional.iter().map(String::as_str));

        let stdin = Value::Object(args.clone()).to_string();
        let output = self
            .exec(&tool.name, &argv, &env, Some(stdin))
            .await
            .map_err(|err| match err.kind() {
                ErrorKind::ToolTimeout => err,
                _ => Error::tool_execution_failed(&tool.name, err.message())
                    .with_operation("sandbox::run")
                    .set_source(err),
            })?;

        if !output.stderr.trim().is_empty() {
            debug!(tool = %tool.name, stderr = %output.stderr.trim(), "script wrote to stderr");
        }

        if !output.success {
            return Err(Error::tool_execution_failed(&tool.name, output.failure_reason())
                .with_operation("sandbox::run"));
        }

        let stdout = output.stdout.trim_end();
        Ok(serde_json::from_str(stdout).unwrap_or_else(|_| Value::String(stdout.to_string())))
    }

    async fn exec(
        &self,
        name: &str,
        argv: &[&str],
        env: &[(String, String)],
        stdin: Option<String>,
    ) -> Result<ShellOutput> {
        let mut cmd = Command::new(&self.config.shell);
        cmd.args(argv)
            .envs(env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let run = async {
            let mut child = cmd.spawn()?;
            if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
                // Scripts are free to ignore stdin.
                match pipe.write_all(input.as_bytes()).await {
                    Err(e) if e.kind() != std::io::ErrorKind::BrokenPipe => return Err(e),
                    _ => {}
                }
            }
            child.wait_with_output().await
        };

        let output = match tokio::time::timeout(self.config.timeout, run).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(Error::new(
                    ErrorKind::IoFailed,
                    format!("failed to start {}: {}", self.config.shell, e),
                )
                .with_operation("sandbox::exec")
                .with_context("tool", name)
                .set_source(e))
            }
            Err(_) => return Err(Error::tool_timeout(name, self.config.timeout.as_secs())),
        };

        Ok(ShellOutput {
            success: output.status.success(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
