//! Session frontend: picks the mode from the command line and turns the
//! outcome into a process exit status.

use crate::command::ExitSignal;
use crate::config::ShellConfig;
use crate::error::ShellError;
use crate::input::EditorSource;
use crate::interpreter::{Interpreter, finish};
use crate::registry::BuiltinRegistry;
use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;

/// How one invocation acquires its source text. Fixed at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionMode {
    Interactive,
    PipedScript,
    CommandString(String),
    FileScript { path: PathBuf, args: Vec<String> },
}

impl SessionMode {
    /// No arguments: interactive on a terminal, piped otherwise. Exactly
    /// `-c STRING`: a command string. Anything else: the first argument is a
    /// script path and the rest are its parameters.
    pub fn select(args: &[String], stdin_is_terminal: bool) -> Self {
        match args {
            [] if stdin_is_terminal => SessionMode::Interactive,
            [] => SessionMode::PipedScript,
            [flag, command] if flag == "-c" => SessionMode::CommandString(command.clone()),
            [path, rest @ ..] => SessionMode::FileScript {
                path: PathBuf::from(path),
                args: rest.to_vec(),
            },
        }
    }
}

/// Run a shell session for the arguments that follow `shell`.
pub fn run(registry: &BuiltinRegistry, args: &[String]) -> ExitCode {
    let config = match ShellConfig::load() {
        Ok(config) => config,
        Err(e) => return ExitCode::from(exit_status(&Err(e), &mut io::stderr())),
    };
    let mode = SessionMode::select(args, io::stdin().is_terminal());
    debug!(?mode, "session mode selected");

    let mut interpreter = Interpreter::new(registry, config);
    let result = run_mode(&mut interpreter, mode);
    ExitCode::from(exit_status(&result, &mut io::stderr()))
}

pub fn run_mode(interpreter: &mut Interpreter<'_>, mode: SessionMode) -> Result<(), ShellError> {
    match mode {
        SessionMode::Interactive => {
            let config = interpreter.config();
            let history = if config.history {
                config.history_path()
            } else {
                None
            };
            // Dropping the editor writes the history, before the process exits.
            let mut editor = EditorSource::new(history)?;
            interpreter.run_interactive(&mut editor)
        }
        SessionMode::PipedScript => interpreter.run_piped(&mut io::stdin().lock()),
        SessionMode::CommandString(command) => interpreter.run_command(&command),
        SessionMode::FileScript { path, args } => interpreter.run_script(&path, &args),
    }
}

/// Run one registry entry directly, as `dimutils NAME ARGS...`.
pub fn run_tool(registry: &BuiltinRegistry, name: &str, args: &[String]) -> ExitCode {
    let mut interpreter = Interpreter::new(registry, ShellConfig::default());
    let mut argv = vec![name.to_string()];
    argv.extend_from_slice(args);
    let status = match interpreter.dispatch(&argv) {
        // The tool's own status, as a shell would report it in `$?`.
        ExitSignal::Failure(e) if e.is_quiet() => (e.status() & 0xff) as u8,
        signal => exit_status(&finish(signal), &mut io::stderr()),
    };
    ExitCode::from(status)
}

/// Process exit status for a session outcome.
///
/// An explicit exit keeps its status (modulo 256). Any other error prints
/// `Error: ...` unless it was already reported, and yields 1.
pub fn exit_status(result: &Result<(), ShellError>, stderr: &mut dyn Write) -> u8 {
    match result {
        Ok(()) => 0,
        Err(ShellError::Exit(code)) => (*code & 0xff) as u8,
        Err(e) => {
            if !e.already_reported() {
                let _ = writeln!(stderr, "Error: {e}");
            }
            1
        }
    }
}
