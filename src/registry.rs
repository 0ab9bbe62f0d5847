use crate::builtin::{self, BuiltinCommand};
use crate::command::{Context, ExitCode};
use std::collections::BTreeMap;

/// A builtin implementation: runs in-process with the session context and
/// the arguments that follow the command name.
///
/// `Ok(0)` is success, `Ok(n)` a plain failure status, `Err` a failure with a
/// message. An [`ExitRequest`](crate::command::ExitRequest) error asks the
/// session to terminate.
pub type BuiltinHandler = fn(&mut Context<'_>, &[String]) -> anyhow::Result<ExitCode>;

/// Immutable mapping from command name to builtin handler.
///
/// Built once at startup through [`RegistryBuilder`] and shared by reference
/// for the rest of the process lifetime.
#[derive(Clone)]
pub struct BuiltinRegistry {
    handlers: BTreeMap<&'static str, BuiltinHandler>,
}

impl BuiltinRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder {
            handlers: BTreeMap::new(),
        }
    }

    /// The builtins every session gets.
    pub fn standard() -> Self {
        use crate::builtin::*;
        Self::builder()
            .with_command::<Pwd>()
            .with_command::<Cd>()
            .with_command::<Echo>()
            .with_command::<Exit>()
            .with_command::<True>()
            .with_command::<False>()
            .with_command::<Cat>()
            .with_command::<Wc>()
            .with_command::<Grep>()
            .with("test", builtin::run_test)
            .with("[", builtin::run_bracket)
            .build()
    }

    pub fn lookup(&self, name: &str) -> Option<BuiltinHandler> {
        self.handlers.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.handlers.keys().copied()
    }
}

impl Default for BuiltinRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

pub struct RegistryBuilder {
    handlers: BTreeMap<&'static str, BuiltinHandler>,
}

impl RegistryBuilder {
    /// Register `handler` under `name`.
    ///
    /// # Panics
    ///
    /// When `name` is already registered.
    pub fn with(mut self, name: &'static str, handler: BuiltinHandler) -> Self {
        if self.handlers.insert(name, handler).is_some() {
            panic!("builtin `{name}` registered twice");
        }
        self
    }

    /// Register an argh-parsed [`BuiltinCommand`] under its own name.
    pub fn with_command<T: BuiltinCommand>(self) -> Self {
        self.with(T::name(), builtin::run_command::<T>)
    }

    pub fn build(self) -> BuiltinRegistry {
        BuiltinRegistry {
            handlers: self.handlers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_ctx: &mut Context<'_>, _args: &[String]) -> anyhow::Result<ExitCode> {
        Ok(0)
    }

    #[test]
    fn standard_registry_knows_the_shell_builtins() {
        let registry = BuiltinRegistry::standard();
        for name in ["cd", "echo", "exit", "false", "grep", "pwd", "test", "true", "["] {
            assert!(registry.contains(name), "missing builtin {name}");
        }
        assert!(registry.lookup("ls").is_none());
    }

    #[test]
    fn names_are_sorted() {
        let registry = BuiltinRegistry::builder()
            .with("zeta", noop)
            .with("alpha", noop)
            .build();
        assert_eq!(registry.names().collect::<Vec<_>>(), ["alpha", "zeta"]);
    }

    #[test]
    fn empty_registry_finds_nothing() {
        let registry = BuiltinRegistry::builder().build();
        assert!(registry.lookup("echo").is_none());
    }

    #[test]
    #[should_panic(expected = "registered twice")]
    fn duplicate_registration_panics() {
        BuiltinRegistry::builder()
            .with("echo", noop)
            .with_command::<crate::builtin::Echo>();
    }
}
