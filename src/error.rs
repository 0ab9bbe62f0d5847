//! Error taxonomy shared by the dispatcher, the parser and the session.

use crate::command::ExitCode;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Status reported when a command cannot be located.
pub const STATUS_NOT_FOUND: ExitCode = 127;
/// Status reported when a located command cannot be started.
pub const STATUS_CANNOT_EXECUTE: ExitCode = 126;

/// Why a single command invocation did not succeed.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// A builtin finished with a non-zero status and no message.
    #[error("{name}: exit status {status}")]
    Status { name: String, status: ExitCode },

    /// A builtin failed with a message.
    #[error("{name}: {message}")]
    Builtin { name: String, message: String },

    #[error("{0}: command not found")]
    NotFound(String),

    /// An external process ran and exited non-zero (or was killed by a signal).
    #[error("{name}: exit status {status}")]
    Exited { name: String, status: ExitCode },

    #[error("{name}: output exceeded the limit of {limit} bytes")]
    OutputLimitExceeded { name: String, limit: usize },

    #[error("{name}: {source}")]
    Spawn {
        name: String,
        #[source]
        source: io::Error,
    },
}

impl DispatchError {
    pub fn status(&self) -> ExitCode {
        match self {
            DispatchError::Status { status, .. } | DispatchError::Exited { status, .. } => *status,
            DispatchError::Builtin { .. } | DispatchError::OutputLimitExceeded { .. } => 1,
            DispatchError::NotFound(_) => STATUS_NOT_FOUND,
            DispatchError::Spawn { .. } => STATUS_CANNOT_EXECUTE,
        }
    }

    /// True when the failing command already wrote its own diagnostics, so
    /// the shell has nothing to add.
    pub fn is_quiet(&self) -> bool {
        matches!(
            self,
            DispatchError::Status { .. } | DispatchError::Exited { .. }
        )
    }
}

/// Failure to turn source text into a program.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The text is a valid prefix of a longer program.
    #[error("unexpected end of input: {0}")]
    Incomplete(String),

    #[error("line {line}: {message}")]
    Invalid { line: usize, message: String },
}

impl ParseError {
    pub fn is_incomplete(&self) -> bool {
        matches!(self, ParseError::Incomplete(_))
    }
}

/// Errors that end a session (or, in interactive mode, a single input).
#[derive(Debug, Error)]
pub enum ShellError {
    /// Explicit termination requested by the program. Not a failure.
    #[error("exit status {0}")]
    Exit(ExitCode),

    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("runtime error: {0}")]
    Runtime(DispatchError),

    #[error("opening script file {}: {source}", .path.display())]
    OpenScript {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("reading input: {0}")]
    Input(#[source] io::Error),

    #[error("line editor: {0}")]
    Editor(#[from] rustyline::error::ReadlineError),

    #[error("config {}: {message}", .path.display())]
    Config { path: PathBuf, message: String },
}

impl ShellError {
    /// True when the runner has already written this error to the session's
    /// error stream, or the failed command reported it itself.
    pub fn already_reported(&self) -> bool {
        matches!(self, ShellError::Runtime(e) if !e.is_quiet())
    }
}
