use crate::command::ExitSignal;
use crate::config::ShellConfig;
use crate::dispatch::Dispatcher;
use crate::env::Environment;
use crate::error::ShellError;
use crate::input::{Line, LineSource};
use crate::io_adapters::Streams;
use crate::parser::{self, Program};
use crate::registry::BuiltinRegistry;
use crate::runner::Runner;
use std::fs;
use std::io::{Read, Write};
use std::path::Path;
use tracing::{debug, info};

/// Drives a session: acquires source text, parses it and runs it through
/// the [`Dispatcher`].
///
/// Every mode funnels parsed programs into [`Interpreter::run`]. The modes
/// differ only in where text comes from and in how parse failures are
/// treated: interactive input keeps an incomplete program and asks for more,
/// everything else treats any parse failure as fatal.
///
/// Example
/// ```
/// use dimutils::{BuiltinRegistry, Interpreter, ShellConfig};
/// let registry = BuiltinRegistry::standard();
/// let mut sh = Interpreter::new(&registry, ShellConfig::default());
/// sh.run_command("true && echo hello").unwrap();
/// ```
pub struct Interpreter<'r> {
    dispatcher: Dispatcher<'r>,
    env: Environment,
    streams: Streams,
    config: ShellConfig,
}

impl<'r> Interpreter<'r> {
    /// An interpreter on the process's own streams and environment that
    /// runs external commands as real processes.
    pub fn new(registry: &'r BuiltinRegistry, config: ShellConfig) -> Self {
        let dispatcher = Dispatcher::with_process_executor(registry, config.output_limit);
        Self::with_parts(dispatcher, Environment::new(), Streams::inherit(), config)
    }

    pub fn with_parts(
        dispatcher: Dispatcher<'r>,
        env: Environment,
        streams: Streams,
        config: ShellConfig,
    ) -> Self {
        Self {
            dispatcher,
            env,
            streams,
            config,
        }
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    pub fn config(&self) -> &ShellConfig {
        &self.config
    }

    /// Run a parsed program.
    pub fn run(&mut self, program: &Program) -> ExitSignal {
        self.runner().run_program(program)
    }

    /// Run one argument vector, bypassing the parser.
    pub fn dispatch(&mut self, argv: &[String]) -> ExitSignal {
        self.runner().run_argv(argv)
    }

    fn runner(&mut self) -> Runner<'_, 'r> {
        Runner {
            dispatcher: &self.dispatcher,
            env: &mut self.env,
            streams: &mut self.streams,
        }
    }

    /// Parse and run `source` as one complete program.
    pub fn run_source(&mut self, source: &str) -> Result<(), ShellError> {
        let program = parser::parse(source)?;
        finish(self.run(&program))
    }

    /// `-c STRING`
    pub fn run_command(&mut self, command: &str) -> Result<(), ShellError> {
        debug!("running command string");
        self.run_source(command)
    }

    /// Read all of `input` and run it. Empty input does nothing.
    pub fn run_piped(&mut self, input: &mut dyn Read) -> Result<(), ShellError> {
        let mut source = String::new();
        input.read_to_string(&mut source).map_err(ShellError::Input)?;
        debug!(bytes = source.len(), "running piped script");
        if source.trim().is_empty() {
            return Ok(());
        }
        self.run_source(&source)
    }

    /// Run the script at `path` with `args` as `$1..`.
    pub fn run_script(&mut self, path: &Path, args: &[String]) -> Result<(), ShellError> {
        let source = fs::read_to_string(path).map_err(|source| ShellError::OpenScript {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "running script file");
        self.env.script_name = path.display().to_string();
        self.env.positional = args.to_vec();
        self.run_source(&source)
    }

    /// Read lines until end of input, running each program as soon as it is
    /// complete.
    ///
    /// Ordinary failures are reported and do not end the loop. An explicit
    /// exit does, as
    /// `Err(ShellError::Exit(code))`.
    pub fn run_interactive(&mut self, source: &mut dyn LineSource) -> Result<(), ShellError> {
        info!("interactive session started");
        let mut pending = String::new();
        loop {
            let prompt = if pending.is_empty() {
                &self.config.prompt
            } else {
                &self.config.continuation_prompt
            };
            let line = match source.read_line(prompt)? {
                Line::Text(line) => line,
                Line::Interrupted => {
                    pending.clear();
                    continue;
                }
                Line::Eof => {
                    if !pending.is_empty() {
                        if let Err(e) = parser::parse(&pending) {
                            self.report(ShellError::Parse(e));
                        }
                    }
                    return Ok(());
                }
            };

            pending.push_str(&line);
            pending.push('\n');

            match parser::parse(&pending) {
                Ok(program) => {
                    pending.clear();
                    match self.run(&program) {
                        ExitSignal::Exit(code) => return Err(ShellError::Exit(code)),
                        // Loud failures were printed by the runner already.
                        ExitSignal::Failure(e) if e.is_quiet() => self.report(ShellError::Runtime(e)),
                        _ => {}
                    }
                }
                Err(e) if e.is_incomplete() => {
                    if pending.len() > self.config.max_pending_input {
                        let discarded = pending.len();
                        pending.clear();
                        self.report(format!(
                            "input discarded: incomplete program longer than {} bytes ({discarded} bytes)",
                            self.config.max_pending_input
                        ));
                    }
                }
                Err(e) => {
                    pending.clear();
                    self.report(ShellError::Parse(e));
                }
            }
        }
    }

    fn report(&mut self, message: impl std::fmt::Display) {
        let _ = writeln!(self.streams.stderr, "{message}");
        self.streams.flush();
    }
}

/// Map the signal of a whole non-interactive run to its outcome.
pub fn finish(signal: ExitSignal) -> Result<(), ShellError> {
    match signal {
        ExitSignal::Success => Ok(()),
        ExitSignal::Failure(e) => Err(ShellError::Runtime(e)),
        ExitSignal::Exit(code) => Err(ShellError::Exit(code)),
    }
}
