use crate::command::{Context, ExitCode, ExitSignal};
use crate::error::DispatchError;
use std::ffi::OsStr;
use std::io::{self, Read, Write};
use std::path::{Component, Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Sender};
use std::thread;
use tracing::{debug, warn};

/// Default ceiling on the bytes an external command may write.
pub const DEFAULT_OUTPUT_LIMIT: usize = 2 * 1024 * 1024;

/// Runs commands that are not builtins.
pub trait Executor {
    /// Run `argv[0]` with `argv[1..]`. `argv` is never empty.
    fn execute(&self, ctx: &mut Context<'_>, argv: &[String]) -> ExitSignal;
}

/// [`Executor`] backed by operating-system processes.
///
/// The child reads the session's stdin directly; its stdout and stderr are
/// forwarded to the session's writers while the combined size is counted.
/// Crossing `output_limit` kills the child and fails the command.
#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    output_limit: usize,
}

impl ProcessExecutor {
    pub fn new(output_limit: usize) -> Self {
        Self { output_limit }
    }

    fn spawn(&self, ctx: &mut Context<'_>, program: &Path, args: &[String]) -> io::Result<Child> {
        Command::new(program)
            .args(args)
            .stdin(ctx.stdin.stdio())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .envs(ctx.env.vars.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .current_dir(&ctx.env.current_dir)
            .spawn()
    }

    /// Copy the child's output into the session until both pipes close.
    ///
    /// Returns `false` when the limit was crossed; the child has been killed
    /// by then. The pump threads are not joined on that path: a grandchild
    /// may still hold the pipes open, and it must not keep the session
    /// waiting.
    fn forward_output(&self, child: &mut Child, ctx: &mut Context<'_>) -> io::Result<bool> {
        let (tx, rx) = mpsc::channel();
        if let Some(out) = child.stdout.take() {
            let tx = tx.clone();
            thread::spawn(move || pump(out, Channel::Out, tx));
        }
        if let Some(err) = child.stderr.take() {
            let tx = tx.clone();
            thread::spawn(move || pump(err, Channel::Err, tx));
        }
        drop(tx);

        let mut total = 0usize;
        for (channel, chunk) in rx {
            total += chunk.len();
            if total > self.output_limit {
                // The pumps stop at their next send once the receiver is gone.
                let _ = child.kill();
                return Ok(false);
            }
            match channel {
                Channel::Out => ctx.stdout.write_all(&chunk)?,
                Channel::Err => ctx.stderr.write_all(&chunk)?,
            }
        }
        Ok(true)
    }
}

impl Default for ProcessExecutor {
    fn default() -> Self {
        Self::new(DEFAULT_OUTPUT_LIMIT)
    }
}

impl Executor for ProcessExecutor {
    fn execute(&self, ctx: &mut Context<'_>, argv: &[String]) -> ExitSignal {
        let name = &argv[0];
        let search_paths = ctx.env.get_var("PATH").unwrap_or_default();
        let found = find_command_path(OsStr::new(&search_paths), &ctx.env.current_dir, Path::new(name));
        let Some(program) = found else {
            debug!(command = %name, "not found");
            return ExitSignal::Failure(DispatchError::NotFound(name.clone()));
        };
        debug!(command = %name, path = %program.display(), "spawning");

        let spawn_error = |source| {
            ExitSignal::Failure(DispatchError::Spawn {
                name: name.clone(),
                source,
            })
        };
        let mut child = match self.spawn(ctx, &program, &argv[1..]) {
            Ok(child) => child,
            Err(e) => return spawn_error(e),
        };

        let within_limit = match self.forward_output(&mut child, ctx) {
            Ok(within_limit) => within_limit,
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return spawn_error(e);
            }
        };
        let status = match child.wait() {
            Ok(status) => status,
            Err(e) => return spawn_error(e),
        };

        if !within_limit {
            warn!(command = %name, limit = self.output_limit, "output limit exceeded, child killed");
            return ExitSignal::Failure(DispatchError::OutputLimitExceeded {
                name: name.clone(),
                limit: self.output_limit,
            });
        }

        match exit_code(status) {
            0 => ExitSignal::Success,
            status => ExitSignal::Failure(DispatchError::Exited {
                name: name.clone(),
                status,
            }),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Channel {
    Out,
    Err,
}

fn pump(mut reader: impl Read, channel: Channel, tx: Sender<(Channel, Vec<u8>)>) {
    let mut buf = [0u8; 8192];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                if tx.send((channel, buf[..n].to_vec())).is_err() {
                    break;
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                debug!(error = %e, "reading child output failed");
                break;
            }
        }
    }
}

fn exit_code(status: ExitStatus) -> ExitCode {
    match status.code() {
        Some(x) => x,
        None => terminated_by_signal(status),
    }
}

#[cfg(unix)]
fn terminated_by_signal(exit_status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    if let Some(signal) = ExitStatusExt::signal(&exit_status) {
        128 + signal
    } else if ExitStatusExt::core_dumped(&exit_status) {
        255
    } else {
        -1
    }
}

#[cfg(not(unix))]
fn terminated_by_signal(_exit_status: ExitStatus) -> i32 {
    -1
}

/// Locate the program file for a command name.
///
/// A name containing a separator (`/bin/ls`, `bin/tool`, `./tool`) names a
/// file directly; relative ones are taken from `cwd`. A bare name is looked
/// up in each non-empty entry of `search_paths` in order.
pub fn find_command_path(search_paths: &OsStr, cwd: &Path, name: &Path) -> Option<PathBuf> {
    let mut components = name.components();
    match (components.next(), components.next()) {
        (None, _) => None,
        (Some(Component::Normal(bare)), None) => std::env::split_paths(search_paths)
            .filter(|dir| !dir.as_os_str().is_empty())
            .map(|dir| dir.join(bare))
            .find(|candidate| candidate.is_file()),
        _ => {
            let candidate = cwd.join(name);
            candidate.is_file().then_some(candidate)
        }
    }
}
