use crate::env::Environment;
use crate::error::DispatchError;
use std::io::{Read, Write};
use std::process::Stdio;

/// Conventional process exit code type used by this crate.
///
/// A value of 0 indicates success; any non-zero value indicates failure.
/// This mirrors the convention used by POSIX shells and many command-line tools.
pub type ExitCode = i32;

/// Abstraction over the session's readable input stream that can also hand a
/// [`Stdio`] to a spawned child.
///
/// The real standard input is inherited by children; in-memory inputs give
/// them a null stream.
pub trait Stdin: Read {
    /// A [`Stdio`] handle suitable for `std::process::Command`.
    fn stdio(&self) -> Stdio;
}

/// Result of running one command or a whole parsed program.
#[derive(Debug)]
pub enum ExitSignal {
    /// Ordinary success.
    Success,
    /// Ordinary failure. The session keeps going in interactive mode.
    Failure(DispatchError),
    /// The program asked for the whole process to terminate with this status.
    Exit(ExitCode),
}

impl ExitSignal {
    /// Numeric status as seen through `$?`.
    pub fn status(&self) -> ExitCode {
        match self {
            ExitSignal::Success => 0,
            ExitSignal::Failure(e) => e.status(),
            ExitSignal::Exit(code) => *code,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ExitSignal::Success)
    }
}

/// Error value a builtin returns to request termination of the whole session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("exit requested with status {0}")]
pub struct ExitRequest(pub ExitCode);

/// Everything a command may touch while it runs: the shell environment and
/// the session's three standard streams.
pub struct Context<'a> {
    pub env: &'a mut Environment,
    pub stdin: &'a mut dyn Stdin,
    pub stdout: &'a mut dyn Write,
    pub stderr: &'a mut dyn Write,
}
