use crate::ErrorKind;
use std::fmt;

/// Error shared by every toolsmith crate.
///
/// For tool failures `message()` is exactly what the model reads in the tool
/// result, so it never carries the kind, operation or context. Those show up
/// in `Display`, which is meant for logs.
///
/// ```rust
/// use toolsmith_error::{Error, ErrorKind};
///
/// let err = Error::tool_not_found("fetch")
///     .with_operation("executor::invoke")
///     .with_context("call_id", "call_7");
///
/// assert_eq!(err.kind(), ErrorKind::ToolNotFound);
/// assert_eq!(err.message(), "Tool 'fetch' not found.");
/// ```
pub struct Error {
    kind: ErrorKind,
    message: String,
    operation: &'static str,
    context: Vec<(&'static str, String)>,
    source: Option<anyhow::Error>,
}

impl Error {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            operation: "",
            context: Vec::new(),
            source: None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Innermost operation last set, empty if none
    pub fn operation(&self) -> &'static str {
        self.operation
    }

    pub fn context(&self) -> &[(&'static str, String)] {
        &self.context
    }

    /// Record where the error surfaced. A previous operation is kept in
    /// context under `called`.
    pub fn with_operation(mut self, operation: &'static str) -> Self {
        if !self.operation.is_empty() {
            let previous = std::mem::replace(&mut self.operation, operation);
            self.context.push(("called", previous.to_string()));
        } else {
            self.operation = operation;
        }
        self
    }

    pub fn with_context(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.context.push((key, value.into()));
        self
    }

    /// Attach the underlying cause. Only one source is kept.
    pub fn set_source(mut self, source: impl Into<anyhow::Error>) -> Self {
        debug_assert!(self.source.is_none(), "source error already set");
        self.source = Some(source.into());
        self
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unexpected, message)
    }

    pub fn config_invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ConfigInvalid, message)
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArgument, message)
    }

    /// `Tool '<name>' not found.`
    pub fn tool_not_found(name: impl Into<String>) -> Self {
        Self::for_tool(ErrorKind::ToolNotFound, name, |n| format!("Tool '{}' not found.", n))
    }

    /// `Error executing '<name>': <reason>`
    pub fn tool_execution_failed(name: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::for_tool(ErrorKind::ToolExecutionFailed, name, |n| {
            format!("Error executing '{}': {}", n, reason)
        })
    }

    /// `Error creating/updating tool '<name>': <reason>`
    pub fn tool_definition_failed(name: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::for_tool(ErrorKind::ToolDefinitionFailed, name, |n| {
            format!("Error creating/updating tool '{}': {}", n, reason)
        })
    }

    /// `Error decoding arguments for '<name>': <reason>`
    pub fn argument_decode_failed(name: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::for_tool(ErrorKind::ArgumentDecodeFailed, name, |n| {
            format!("Error decoding arguments for '{}': {}", n, reason)
        })
    }

    pub fn tool_timeout(name: impl Into<String>, secs: u64) -> Self {
        Self::for_tool(ErrorKind::ToolTimeout, name, |n| {
            format!("Tool '{}' timed out after {} seconds", n, secs)
        })
    }

    fn for_tool(kind: ErrorKind, name: impl Into<String>, text: impl FnOnce(&str) -> String) -> Self {
        let name = name.into();
        Self::new(kind, text(&name)).with_context("tool", name)
    }
}

/// One line: `Kind at op, context { k: v } => message`
impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if !self.operation.is_empty() {
            write!(f, " at {}", self.operation)?;
        }
        if !self.context.is_empty() {
            let pairs: Vec<String> = self.context.iter().map(|(k, v)| format!("{}: {}", k, v)).collect();
            write!(f, ", context {{ {} }}", pairs.join(", "))?;
        }
        if !self.message.is_empty() {
            write!(f, " => {}", self.message)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            return f
                .debug_struct("Error")
                .field("kind", &self.kind)
                .field("message", &self.message)
                .field("operation", &self.operation)
                .field("context", &self.context)
                .field("source", &self.source)
                .finish();
        }

        write!(f, "{}", self)?;
        if let Some(source) = &self.source {
            write!(f, "\n    caused by: {:#}", source)?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        let kind = match err.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::FileNotFound,
            std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied,
            _ => ErrorKind::IoFailed,
        };
        Error::new(kind, err.to_string()).with_operation("io").set_source(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_tool_failure_messages() {
        let err = Error::tool_not_found("fetch");
        assert_eq!(err.kind(), ErrorKind::ToolNotFound);
        assert_eq!(err.message(), "Tool 'fetch' not found.");
        assert_eq!(err.context()[0], ("tool", "fetch".to_string()));

        let err = Error::tool_execution_failed("fetch", "exit code 1");
        assert_eq!(err.message(), "Error executing 'fetch': exit code 1");

        let err = Error::tool_definition_failed("fetch", "syntax error near `}'");
        assert_eq!(err.kind(), ErrorKind::ToolDefinitionFailed);
        assert!(err.message().starts_with("Error creating/updating tool 'fetch'"));

        let err = Error::tool_timeout("slow", 120);
        assert_eq!(err.message(), "Tool 'slow' timed out after 120 seconds");
    }

    #[test]
    fn test_operation_chaining() {
        let err = Error::new(ErrorKind::ToolDefinitionFailed, "syntax error")
            .with_operation("sandbox::check_syntax")
            .with_operation("definer::define");

        assert_eq!(err.operation(), "definer::define");
        assert_eq!(err.context(), [("called", "sandbox::check_syntax".to_string())]);
    }

    #[test]
    fn test_display_is_for_logs() {
        let err = Error::new(ErrorKind::CompletionFailed, "model unavailable")
            .with_operation("provider::complete")
            .with_context("model", "claude-sonnet-4")
            .with_context("turn", "3");

        assert_eq!(
            err.to_string(),
            "CompletionFailed at provider::complete, context { model: claude-sonnet-4, turn: 3 } => model unavailable"
        );
        assert_eq!(Error::unexpected("boom").to_string(), "Unexpected => boom");
    }

    #[test]
    fn test_from_io_error_keeps_source() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: Error = io_err.into();
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);
        assert_eq!(err.operation(), "io");
        assert!(err.source().is_some());
        assert!(format!("{:?}", err).contains("caused by: denied"));
    }
}
