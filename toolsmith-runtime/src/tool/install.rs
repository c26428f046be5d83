//! Package installation for the `install_package` built-in

use serde_json::Value;
use std::process::Stdio;
use tokio::process::Command;
use toolsmith_error::{Error, ErrorKind, Result};
use tracing::info;

/// Installer command prefix; the package name is appended as the last argument
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallerConfig {
    pub command: Vec<String>,
}

impl Default for InstallerConfig {
    fn default() -> Self {
        Self {
            command: vec!["uv".into(), "pip".into(), "install".into()],
        }
    }
}

impl InstallerConfig {
    /// Split a whitespace-separated command line, e.g. `"pip install --user"`
    pub fn from_command_line(line: &str) -> Result<Self> {
        let command: Vec<String> = line.split_whitespace().map(String::from).collect();
        if command.is_empty() {
            return Err(Error::config_invalid("installer command is empty")
                .with_operation("installer::from_command_line"));
        }
        Ok(Self { command })
    }

    pub async fn install(&self, package: &str) -> Result<Value> {
        let fail = |reason: String| {
            Error::new(
                ErrorKind::ToolExecutionFailed,
                format!("Error installing package '{}': {}", package, reason),
            )
            .with_operation("installer::install")
            .with_context("package", package)
        };

        if package.trim().is_empty() || package.starts_with('-') {
            return Err(fail("invalid package name".into()));
        }

        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| fail("installer command is empty".into()))?;

        info!(package, installer = %self.command.join(" "), "Installing package");
        let output = Command::new(program)
            .args(args)
            .arg(package)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| fail(format!("failed to run {}: {}", program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(fail(format!("{} {}", output.status, stderr.trim())));
        }

        Ok(Value::String(format!("Package '{}' installed successfully.", package)))
    }
}
