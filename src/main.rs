//! dimutils entry point.
//!
//! Usage:
//!   dimutils shell                 # Interactive, or run piped stdin
//!   dimutils shell -c <command>    # Execute a command string
//!   dimutils shell <script> [ARG]  # Run a script file
//!   dimutils <builtin> [ARG]       # Run one builtin directly

use dimutils::{BuiltinRegistry, session};
use std::env;
use std::process::ExitCode;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn main() -> ExitCode {
    // Initialize tracing (respects RUST_LOG env var). Logs go to stderr so
    // they never mix with command output.
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    let registry = BuiltinRegistry::standard();

    match args.first().map(|s| s.as_str()) {
        None | Some("help" | "--help" | "-h") => {
            print_help(&registry);
            ExitCode::SUCCESS
        }
        Some("--version" | "-V") => {
            println!("dimutils {}", env!("CARGO_PKG_VERSION"));
            ExitCode::SUCCESS
        }
        Some("shell") => session::run(&registry, &args[1..]),
        Some(name) if registry.contains(name) => session::run_tool(&registry, name, &args[1..]),
        Some(unknown) => {
            eprintln!("Unknown command: {unknown}");
            eprintln!("Run 'dimutils --help' for usage.");
            ExitCode::FAILURE
        }
    }
}

fn print_help(registry: &BuiltinRegistry) {
    let builtins: Vec<&str> = registry.names().collect();
    println!(
        r#"dimutils v{}

Usage:
  dimutils shell                   Interactive shell (runs stdin when it is not a terminal)
  dimutils shell -c <command>      Execute a command string and exit
  dimutils shell <script> [ARGS]   Run a script file
  dimutils <builtin> [ARGS]        Run one builtin directly

Builtins:
  {}

Options:
  -h, --help                       Show this help
  -V, --version                    Show version

Environment:
  DIMUTILS_CONFIG                  Path of the shell config file
  RUST_LOG                         Log filter, e.g. RUST_LOG=dimutils=debug"#,
        env!("CARGO_PKG_VERSION"),
        builtins.join(" ")
    );
}
