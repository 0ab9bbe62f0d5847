use crate::command::{Context, ExitRequest, ExitSignal};
use crate::error::DispatchError;
use crate::external::{Executor, ProcessExecutor};
use crate::registry::{BuiltinHandler, BuiltinRegistry};
use tracing::debug;

/// Where a command name resolves to.
#[derive(Clone, Copy)]
pub enum Target {
    Builtin(BuiltinHandler),
    External,
}

/// Routes one argument vector either to a builtin or to the executor.
///
/// Builtins always win: a name present in the registry never reaches the
/// executor, even when a program of the same name exists on `PATH`.
pub struct Dispatcher<'r> {
    registry: &'r BuiltinRegistry,
    executor: Box<dyn Executor>,
}

impl<'r> Dispatcher<'r> {
    pub fn new(registry: &'r BuiltinRegistry, executor: Box<dyn Executor>) -> Self {
        Self { registry, executor }
    }

    /// A dispatcher that runs external commands as real processes.
    pub fn with_process_executor(registry: &'r BuiltinRegistry, output_limit: usize) -> Self {
        Self::new(registry, Box::new(ProcessExecutor::new(output_limit)))
    }

    pub fn resolve(&self, name: &str) -> Target {
        match self.registry.lookup(name) {
            Some(handler) => Target::Builtin(handler),
            None => Target::External,
        }
    }

    /// Run `argv`. An empty vector is a successful no-op.
    pub fn dispatch(&self, ctx: &mut Context<'_>, argv: &[String]) -> ExitSignal {
        let Some(name) = argv.first() else {
            return ExitSignal::Success;
        };
        match self.resolve(name) {
            Target::Builtin(handler) => {
                debug!(command = %name, "builtin");
                run_builtin(handler, ctx, name, &argv[1..])
            }
            Target::External => {
                debug!(command = %name, "external");
                self.executor.execute(ctx, argv)
            }
        }
    }
}

fn run_builtin(handler: BuiltinHandler, ctx: &mut Context<'_>, name: &str, args: &[String]) -> ExitSignal {
    match handler(ctx, args) {
        Ok(0) => ExitSignal::Success,
        Ok(status) => ExitSignal::Failure(DispatchError::Status {
            name: name.to_string(),
            status,
        }),
        Err(e) => match e.downcast_ref::<ExitRequest>() {
            Some(ExitRequest(code)) => ExitSignal::Exit(*code),
            None => ExitSignal::Failure(DispatchError::Builtin {
                name: name.to_string(),
                message: format!("{e:#}"),
            }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::ExitCode;
    use crate::testing::{Harness, args};
    use anyhow::anyhow;
    use std::cell::RefCell;
    use std::io::Write;
    use std::rc::Rc;

    /// Executor that records what reached it and answers with a fixed status.
    struct RecordingExecutor {
        calls: Rc<RefCell<Vec<Vec<String>>>>,
        status: ExitCode,
    }

    impl Executor for RecordingExecutor {
        fn execute(&self, _ctx: &mut Context<'_>, argv: &[String]) -> ExitSignal {
            self.calls.borrow_mut().push(argv.to_vec());
            match self.status {
                0 => ExitSignal::Success,
                status => ExitSignal::Failure(DispatchError::Exited {
                    name: argv[0].clone(),
                    status,
                }),
            }
        }
    }

    fn recording(status: ExitCode) -> (Box<dyn Executor>, Rc<RefCell<Vec<Vec<String>>>>) {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let executor = RecordingExecutor {
            calls: calls.clone(),
            status,
        };
        (Box::new(executor), calls)
    }

    fn fake_ls(ctx: &mut Context<'_>, _args: &[String]) -> anyhow::Result<ExitCode> {
        writeln!(ctx.stdout, "builtin ls")?;
        Ok(0)
    }

    fn three(_ctx: &mut Context<'_>, _args: &[String]) -> anyhow::Result<ExitCode> {
        Ok(3)
    }

    fn broken(_ctx: &mut Context<'_>, _args: &[String]) -> anyhow::Result<ExitCode> {
        Err(anyhow!("disk on fire"))
    }

    fn leave(_ctx: &mut Context<'_>, _args: &[String]) -> anyhow::Result<ExitCode> {
        Err(ExitRequest(7).into())
    }

    #[test]
    fn empty_argv_is_a_successful_no_op() {
        let registry = BuiltinRegistry::builder().build();
        let (executor, calls) = recording(1);
        let dispatcher = Dispatcher::new(&registry, executor);
        let mut h = Harness::new();

        let signal = dispatcher.dispatch(&mut h.ctx(), &[]);
        assert!(signal.is_success());
        assert!(calls.borrow().is_empty());
    }

    #[test]
    fn builtin_shadows_external_program() {
        let registry = BuiltinRegistry::builder().with("ls", fake_ls).build();
        let (executor, calls) = recording(0);
        let dispatcher = Dispatcher::new(&registry, executor);
        let mut h = Harness::new();

        let signal = dispatcher.dispatch(&mut h.ctx(), &args(&["ls", "-la"]));
        assert!(signal.is_success());
        assert_eq!(h.stdout(), "builtin ls\n");
        assert!(calls.borrow().is_empty());
    }

    #[test]
    fn unknown_name_goes_to_the_executor_with_full_argv() {
        let registry = BuiltinRegistry::standard();
        let (executor, calls) = recording(4);
        let dispatcher = Dispatcher::new(&registry, executor);
        let mut h = Harness::new();

        let signal = dispatcher.dispatch(&mut h.ctx(), &args(&["frob", "a", "b c"]));
        assert_eq!(signal.status(), 4);
        assert!(matches!(
            signal,
            ExitSignal::Failure(DispatchError::Exited { ref name, status: 4 }) if name == "frob"
        ));
        assert_eq!(*calls.borrow(), vec![args(&["frob", "a", "b c"])]);
    }

    #[test]
    fn builtin_results_become_signals() {
        let registry = BuiltinRegistry::builder()
            .with("three", three)
            .with("broken", broken)
            .with("leave", leave)
            .build();
        let (executor, _calls) = recording(0);
        let dispatcher = Dispatcher::new(&registry, executor);
        let mut h = Harness::new();

        match dispatcher.dispatch(&mut h.ctx(), &args(&["three"])) {
            ExitSignal::Failure(DispatchError::Status { name, status }) => {
                assert_eq!(name, "three");
                assert_eq!(status, 3);
            }
            other => panic!("unexpected {other:?}"),
        }
        match dispatcher.dispatch(&mut h.ctx(), &args(&["broken"])) {
            ExitSignal::Failure(e @ DispatchError::Builtin { .. }) => {
                assert_eq!(e.to_string(), "broken: disk on fire");
                assert_eq!(e.status(), 1);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            dispatcher.dispatch(&mut h.ctx(), &args(&["leave"])),
            ExitSignal::Exit(7)
        ));
    }

    #[test]
    fn standard_exit_builtin_requests_termination() {
        let registry = BuiltinRegistry::standard();
        let (executor, _calls) = recording(0);
        let dispatcher = Dispatcher::new(&registry, executor);
        let mut h = Harness::new();

        assert!(matches!(
            dispatcher.dispatch(&mut h.ctx(), &args(&["exit", "42"])),
            ExitSignal::Exit(42)
        ));
    }

    #[test]
    fn resolve_reports_the_target() {
        let registry = BuiltinRegistry::standard();
        let (executor, _calls) = recording(0);
        let dispatcher = Dispatcher::new(&registry, executor);

        assert!(matches!(dispatcher.resolve("echo"), Target::Builtin(_)));
        assert!(matches!(dispatcher.resolve("ls"), Target::External));
    }
}
