//! An embeddable command interpreter.
//!
//! Source text comes from a terminal, a pipe, a `-c` string or a script
//! file, is parsed into a [`Program`](parser::Program) and evaluated one
//! simple command at a time. Every command goes through the
//! [`Dispatcher`]: names found in the [`BuiltinRegistry`] run in-process,
//! anything else is handed to an [`Executor`], by default a
//! [`ProcessExecutor`] that spawns an operating-system process with a cap on
//! how much output it may produce.
//!
//! The public modules [`command`] and [`env`] expose the types a builtin
//! works with.

mod builtin;
pub mod command;
mod config;
mod dispatch;
pub mod env;
mod error;
mod external;
mod input;
mod interpreter;
mod io_adapters;
mod lexer;
pub mod parser;
mod registry;
mod runner;
pub mod session;
#[cfg(test)]
mod testing;

pub use builtin::BuiltinCommand;
pub use command::{Context, ExitCode, ExitRequest, ExitSignal, Stdin};
pub use config::ShellConfig;
pub use dispatch::{Dispatcher, Target};
pub use error::{DispatchError, ParseError, STATUS_CANNOT_EXECUTE, STATUS_NOT_FOUND, ShellError};
pub use external::{DEFAULT_OUTPUT_LIMIT, Executor, ProcessExecutor, find_command_path};
pub use input::{EditorSource, Line, LineSource, ReaderSource};
pub use interpreter::Interpreter;
pub use io_adapters::{InheritedStdin, MemReader, MemWriter, Streams};
pub use lexer::WordPart;
pub use registry::{BuiltinHandler, BuiltinRegistry, RegistryBuilder};
