//! Error kinds for toolsmith operations

use std::fmt;

/// What went wrong.
///
/// The tool kinds are recovered inside a turn and shown to the model; the
/// completion kinds abandon the turn; the rest are setup and I/O failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Catch-all
    Unexpected,
    ConfigInvalid,
    /// Bad argument to a function or tool
    InvalidArgument,

    /// Requested name absent from the registry
    ToolNotFound,
    /// The tool implementation failed while running
    ToolExecutionFailed,
    /// Model-supplied source could not be checked, loaded or registered
    ToolDefinitionFailed,
    /// A call's argument text is not a JSON object
    ArgumentDecodeFailed,
    /// A tool ran past its time budget
    ToolTimeout,

    /// The completion call failed or returned an unusable response
    CompletionFailed,
    RateLimited,
    AuthenticationFailed,
    NetworkFailed,

    FileNotFound,
    PermissionDenied,
    IoFailed,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Unexpected => "Unexpected",
            ErrorKind::ConfigInvalid => "ConfigInvalid",
            ErrorKind::InvalidArgument => "InvalidArgument",
            ErrorKind::ToolNotFound => "ToolNotFound",
            ErrorKind::ToolExecutionFailed => "ToolExecutionFailed",
            ErrorKind::ToolDefinitionFailed => "ToolDefinitionFailed",
            ErrorKind::ArgumentDecodeFailed => "ArgumentDecodeFailed",
            ErrorKind::ToolTimeout => "ToolTimeout",
            ErrorKind::CompletionFailed => "CompletionFailed",
            ErrorKind::RateLimited => "RateLimited",
            ErrorKind::AuthenticationFailed => "AuthenticationFailed",
            ErrorKind::NetworkFailed => "NetworkFailed",
            ErrorKind::FileNotFound => "FileNotFound",
            ErrorKind::PermissionDenied => "PermissionDenied",
            ErrorKind::IoFailed => "IoFailed",
        }
    }

    /// Whether this kind is reported back to the model as a tool result
    /// instead of being handled by the loop itself.
    pub fn is_tool_failure(&self) -> bool {
        matches!(
            self,
            ErrorKind::ToolNotFound
                | ErrorKind::ToolExecutionFailed
                | ErrorKind::ToolDefinitionFailed
                | ErrorKind::ArgumentDecodeFailed
                | ErrorKind::ToolTimeout
                | ErrorKind::InvalidArgument
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
