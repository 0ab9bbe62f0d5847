//! Evaluation of parsed programs.

use crate::command::{Context, ExitSignal};
use crate::dispatch::Dispatcher;
use crate::env::Environment;
use crate::error::DispatchError;
use crate::io_adapters::Streams;
use crate::lexer::WordPart;
use crate::parser::{AndOr, Assignment, Command, Connector, LoopKind, Program, SimpleCommand, Statement, Word};
use std::io::Write;
use tracing::trace;

/// Walks a [`Program`], sending every simple command through the dispatcher.
///
/// `$?` is updated after each command. Failures that the command did not
/// report itself are written to the session's stderr as they happen. An
/// explicit exit stops evaluation at once.
pub(crate) struct Runner<'a, 'r> {
    pub dispatcher: &'a Dispatcher<'r>,
    pub env: &'a mut Environment,
    pub streams: &'a mut Streams,
}

impl Runner<'_, '_> {
    pub fn run_program(&mut self, program: &Program) -> ExitSignal {
        self.run_list(&program.body)
    }

    fn run_list(&mut self, list: &[AndOr]) -> ExitSignal {
        let mut last = ExitSignal::Success;
        for item in list {
            last = self.run_and_or(item);
            if let ExitSignal::Exit(_) = last {
                break;
            }
        }
        last
    }

    fn run_and_or(&mut self, and_or: &AndOr) -> ExitSignal {
        let mut signal = self.run_statement(&and_or.first);
        for (connector, statement) in &and_or.rest {
            if let ExitSignal::Exit(_) = signal {
                return signal;
            }
            let proceed = match connector {
                Connector::And => signal.is_success(),
                Connector::Or => !signal.is_success(),
            };
            if proceed {
                signal = self.run_statement(statement);
            }
        }
        signal
    }

    fn run_statement(&mut self, statement: &Statement) -> ExitSignal {
        let signal = self.run_command(&statement.command);
        if !statement.negated {
            return signal;
        }
        let signal = match signal {
            ExitSignal::Success => ExitSignal::Failure(DispatchError::Status {
                name: "!".to_string(),
                status: 1,
            }),
            ExitSignal::Failure(_) => ExitSignal::Success,
            exit => exit,
        };
        self.env.last_status = signal.status();
        signal
    }

    fn run_command(&mut self, command: &Command) -> ExitSignal {
        match command {
            Command::Simple(simple) => self.run_simple(simple),
            Command::If { branches, otherwise } => {
                for (condition, body) in branches {
                    match self.run_list(condition) {
                        ExitSignal::Exit(code) => return ExitSignal::Exit(code),
                        ExitSignal::Success => return self.run_list(body),
                        ExitSignal::Failure(_) => {}
                    }
                }
                match otherwise {
                    Some(body) => self.run_list(body),
                    None => self.succeed(),
                }
            }
            Command::Loop {
                kind,
                condition,
                body,
            } => {
                let mut last = ExitSignal::Success;
                loop {
                    let proceed = match (self.run_list(condition), kind) {
                        (ExitSignal::Exit(code), _) => return ExitSignal::Exit(code),
                        (signal, LoopKind::While) => signal.is_success(),
                        (signal, LoopKind::Until) => !signal.is_success(),
                    };
                    if !proceed {
                        break;
                    }
                    last = self.run_list(body);
                    if let ExitSignal::Exit(_) = last {
                        return last;
                    }
                }
                if last.is_success() {
                    self.succeed()
                } else {
                    last
                }
            }
            Command::For {
                variable,
                items,
                body,
            } => {
                let values = match items {
                    Some(words) => words.iter().flat_map(|w| self.expand(w)).collect(),
                    None => self.env.positional.clone(),
                };
                let mut last = ExitSignal::Success;
                for value in values {
                    self.env.set_var(variable.clone(), value);
                    last = self.run_list(body);
                    if let ExitSignal::Exit(_) = last {
                        return last;
                    }
                }
                if last.is_success() {
                    self.succeed()
                } else {
                    last
                }
            }
        }
    }

    fn succeed(&mut self) -> ExitSignal {
        self.env.last_status = 0;
        ExitSignal::Success
    }

    fn run_simple(&mut self, simple: &SimpleCommand) -> ExitSignal {
        let argv: Vec<String> = simple.words.iter().flat_map(|w| self.expand(w)).collect();

        if argv.is_empty() {
            for Assignment { name, value } in &simple.assignments {
                let value = self.expand_to_string(value);
                self.env.set_var(name.clone(), value);
            }
            return self.succeed();
        }

        // Prefix assignments only apply to this command.
        let mut saved = Vec::new();
        for Assignment { name, value } in &simple.assignments {
            let value = self.expand_to_string(value);
            saved.push((name.clone(), self.env.vars.insert(name.clone(), value)));
        }

        let signal = self.run_argv(&argv);

        for (name, previous) in saved.into_iter().rev() {
            match previous {
                Some(value) => self.env.vars.insert(name, value),
                None => self.env.vars.remove(&name),
            };
        }
        signal
    }

    /// Dispatch one expanded command, report a failure it did not report
    /// itself and record its status in `$?`.
    pub fn run_argv(&mut self, argv: &[String]) -> ExitSignal {
        trace!(argv = ?argv, "dispatching");
        let signal = {
            let mut ctx = Context {
                env: &mut *self.env,
                stdin: &mut *self.streams.stdin,
                stdout: &mut *self.streams.stdout,
                stderr: &mut *self.streams.stderr,
            };
            self.dispatcher.dispatch(&mut ctx, argv)
        };

        if let ExitSignal::Failure(e) = &signal {
            if !e.is_quiet() {
                let _ = writeln!(self.streams.stderr, "{e}");
            }
        }
        self.streams.flush();
        self.env.last_status = signal.status();
        signal
    }

    /// Expand a word into fields. Only `$@` (alone, quoted or not) yields
    /// more or fewer than one field.
    fn expand(&self, word: &Word) -> Vec<String> {
        let mut significant = word
            .0
            .iter()
            .filter(|p| !matches!(p, WordPart::Quoted(s) if s.is_empty()));
        if let (Some(WordPart::Param(name)), None) = (significant.next(), significant.next()) {
            if name == "@" {
                return self.env.positional.clone();
            }
        }
        vec![self.expand_to_string(word)]
    }

    fn expand_to_string(&self, word: &Word) -> String {
        let mut out = String::new();
        for part in &word.0 {
            match part {
                WordPart::Literal(s) | WordPart::Quoted(s) => out.push_str(s),
                WordPart::Param(name) => out.push_str(&self.env.param(name).unwrap_or_default()),
                // Rejected by the parser.
                WordPart::CmdSubst(_) => {}
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::Executor;
    use crate::parser::parse;
    use crate::registry::BuiltinRegistry;
    use crate::testing::{mem_streams, text};

    /// Executor that fails every command as not found.
    struct Nothing;

    impl Executor for Nothing {
        fn execute(&self, _ctx: &mut Context<'_>, argv: &[String]) -> ExitSignal {
            ExitSignal::Failure(DispatchError::NotFound(argv[0].clone()))
        }
    }

    struct Outcome {
        signal: ExitSignal,
        env: Environment,
        out: String,
        err: String,
    }

    fn run_with(source: &str, positional: &[&str]) -> Outcome {
        let registry = BuiltinRegistry::standard();
        let dispatcher = Dispatcher::new(&registry, Box::new(Nothing));
        let (mut streams, out, err) = mem_streams(b"");
        let mut env = Environment::new();
        env.positional = positional.iter().map(|s| s.to_string()).collect();
        let program = parse(source).unwrap();
        let signal = Runner {
            dispatcher: &dispatcher,
            env: &mut env,
            streams: &mut streams,
        }
        .run_program(&program);
        Outcome {
            signal,
            env,
            out: text(&out),
            err: text(&err),
        }
    }

    fn run(source: &str) -> Outcome {
        run_with(source, &[])
    }

    #[test]
    fn sequential_commands() {
        let o = run("echo a; echo b\necho c");
        assert!(o.signal.is_success());
        assert_eq!(o.out, "a\nb\nc\n");
    }

    #[test]
    fn and_or_short_circuits() {
        let o = run("false && echo no; true || echo no; false || echo yes; true && echo also");
        assert_eq!(o.out, "yes\nalso\n");
    }

    #[test]
    fn negation_flips_the_status() {
        let o = run("! false && echo negated; ! true");
        assert_eq!(o.out, "negated\n");
        assert_eq!(o.signal.status(), 1);
        assert_eq!(o.env.last_status, 1);
    }

    #[test]
    fn status_parameter_tracks_the_last_command() {
        let o = run("false; echo $?; true; echo $?");
        assert_eq!(o.out, "1\n0\n");
    }

    #[test]
    fn if_picks_the_first_true_branch() {
        let o = run(
            "if false; then echo 1; elif true; then echo 2; else echo 3; fi\n\
             if false; then echo 4; else echo 5; fi\n\
             if false; then echo 6; fi",
        );
        assert_eq!(o.out, "2\n5\n");
        assert!(o.signal.is_success());
    }

    #[test]
    fn while_and_until_loops() {
        let o = run(
            "X=a; while test $X != aaa; do X=${X}a; done; echo $X\n\
             Y=b; until [ $Y = bb ]; do Y=${Y}b; done; echo $Y",
        );
        assert_eq!(o.out, "aaa\nbb\n");
    }

    #[test]
    fn for_over_words_and_positional_parameters() {
        let o = run_with(
            "for x in 1 2; do echo $x; done; for y; do echo \"[$y]\"; done",
            &["a b", "c"],
        );
        assert_eq!(o.out, "1\n2\n[a b]\n[c]\n");
    }

    #[test]
    fn quoted_at_keeps_one_field_per_parameter() {
        let o = run_with("for x in \"$@\" $@; do echo \"<$x>\"; done; echo $#", &["a b", "c"]);
        assert_eq!(o.out, "<a b>\n<c>\n<a b>\n<c>\n2\n");
    }

    #[test]
    fn assignments_persist_but_prefixes_do_not() {
        let o = run("A=1; DIMUTILS_PREFIX_ONLY=2 true; echo \"[$A][$DIMUTILS_PREFIX_ONLY]\"");
        assert_eq!(o.out, "[1][]\n");
    }

    #[test]
    fn unknown_command_is_reported_inline() {
        let o = run("frobnicate; echo after");
        assert!(o.signal.is_success());
        assert_eq!(o.err, "frobnicate: command not found\n");
        assert_eq!(o.out, "after\n");
    }

    #[test]
    fn plain_failure_status_is_not_reported() {
        let o = run("false");
        assert_eq!(o.signal.status(), 1);
        assert!(matches!(
            o.signal,
            ExitSignal::Failure(DispatchError::Status { .. })
        ));
        assert_eq!(o.err, "");
    }

    #[test]
    fn builtin_errors_are_reported_inline() {
        let o = run("exit nope");
        assert_eq!(o.signal.status(), 1);
        assert_eq!(o.err, "exit: nope: numeric argument required\n");
    }

    #[test]
    fn exit_stops_everything() {
        let o = run("for i in 1 2 3; do echo $i; exit 4; done; echo after");
        assert!(matches!(o.signal, ExitSignal::Exit(4)));
        assert_eq!(o.out, "1\n");
    }

    #[test]
    fn exit_inside_and_or_and_conditions() {
        assert!(matches!(run("exit 2 || echo no").signal, ExitSignal::Exit(2)));
        assert!(matches!(
            run("if exit 3; then echo no; fi").signal,
            ExitSignal::Exit(3)
        ));
        assert!(matches!(
            run("while exit 5; do echo no; done").signal,
            ExitSignal::Exit(5)
        ));
    }

    #[test]
    fn empty_expansion_runs_nothing() {
        let o = run("$@");
        assert!(o.signal.is_success());
        assert_eq!(o.out, "");
    }
}
