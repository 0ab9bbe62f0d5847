use crate::command::ExitCode;
use std::collections::HashMap;
use std::env as stdenv;
use std::path::PathBuf;

/// Mutable, user-level view of the process environment used by the interpreter.
///
/// The environment contains:
/// - `vars`: variables visible to expansions and passed to executed commands.
/// - `current_dir`: the working directory for command execution.
/// - `last_status`: the status of the most recent command (`$?`).
/// - `positional` and `script_name`: `$1..` and `$0`.
#[derive(Debug, Clone)]
pub struct Environment {
    /// Key-value store of environment variables (e.g., PATH, HOME).
    pub vars: HashMap<String, String>,
    /// The current working directory for command execution.
    pub current_dir: PathBuf,
    /// Status of the last command that ran.
    pub last_status: ExitCode,
    /// Positional parameters, `$1` is `positional[0]`.
    pub positional: Vec<String>,
    /// Value of `$0`.
    pub script_name: String,
}

impl Environment {
    /// Capture the current process state into a new `Environment` instance.
    ///
    /// This copies variables from `std::env::vars()` and initializes `current_dir`
    /// from `std::env::current_dir()`.
    pub fn new() -> Self {
        let mut vars = HashMap::new();
        for (k, v) in stdenv::vars() {
            vars.insert(k, v);
        }
        let current_dir = stdenv::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self {
            vars,
            current_dir,
            last_status: 0,
            positional: Vec::new(),
            script_name: env!("CARGO_PKG_NAME").to_string(),
        }
    }

    /// Get the value of an environment variable.
    ///
    /// Looks up the key in `self.vars` first, falling back to `std::env::var`.
    pub fn get_var(&self, key: &str) -> Option<String> {
        self.vars
            .get(key)
            .cloned()
            .or_else(|| stdenv::var(key).ok())
    }

    /// Set or override an environment variable in `self.vars`.
    pub fn set_var(&mut self, key: impl Into<String>, val: impl Into<String>) {
        self.vars.insert(key.into(), val.into());
    }

    /// Resolve a parameter name as written after `$`.
    ///
    /// Special parameters (`?`, `#`, `@`, `*`, `0`..`9`) are answered from
    /// the session state; anything else is a variable lookup.
    pub fn param(&self, name: &str) -> Option<String> {
        match name {
            "?" => Some(self.last_status.to_string()),
            "#" => Some(self.positional.len().to_string()),
            "@" | "*" => Some(self.positional.join(" ")),
            _ => match name.parse::<usize>() {
                Ok(0) => Some(self.script_name.clone()),
                Ok(index) => self.positional.get(index - 1).cloned(),
                Err(_) => self.get_var(name),
            },
        }
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}
