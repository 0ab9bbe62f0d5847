use crate::command::{Context, ExitCode, ExitRequest};
use crate::env::Environment;
use anyhow::{Context as _, Result, anyhow, bail};
use argh::{EarlyExit, FromArgs};
use regex::RegexBuilder;
use std::env;
use std::fs;
use std::io::{BufRead, BufReader, Read, Write};
use std::path::PathBuf;

/// Built-in commands known to the shell at compile time.
///
/// Builtins are parsed using the [`argh`] crate (`FromArgs`) and executed directly
/// in-process without spawning a child process.
pub trait BuiltinCommand: Sized + FromArgs {
    /// Canonical name of the command, e.g. "echo" or "cd".
    fn name() -> &'static str;

    /// Executes the command against the session context.
    ///
    /// Return value should follow shell conventions: 0 for success, non-zero for error.
    fn execute(self, ctx: &mut Context<'_>) -> Result<ExitCode>;
}

/// Parse `args` into `T` and run it.
///
/// `--help` output goes to stdout and succeeds; a usage error becomes an
/// ordinary failure carrying argh's message.
pub(crate) fn run_command<T: BuiltinCommand>(ctx: &mut Context<'_>, args: &[String]) -> Result<ExitCode> {
    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    match T::from_args(&[T::name()], &args) {
        Ok(cmd) => cmd.execute(ctx),
        Err(EarlyExit { output, status }) => match status {
            Ok(()) => {
                ctx.stdout.write_all(output.as_bytes())?;
                Ok(0)
            }
            Err(()) => Err(anyhow!(output.trim_end().to_string())),
        },
    }
}

#[derive(FromArgs)]
/// Print the current working directory to standard output.
pub struct Pwd {}

impl BuiltinCommand for Pwd {
    fn name() -> &'static str {
        "pwd"
    }

    fn execute(self, ctx: &mut Context<'_>) -> Result<ExitCode> {
        writeln!(ctx.stdout, "{}", ctx.env.current_dir.to_string_lossy())?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Change the current working directory.
/// If no target is provided, changes to the directory specified by the HOME environment variable.
pub struct Cd {
    #[argh(positional)]
    /// directory to switch to; absolute or relative to the current directory. Defaults to $HOME when omitted.
    pub target: Option<String>,
}

impl BuiltinCommand for Cd {
    fn name() -> &'static str {
        "cd"
    }

    fn execute(self, ctx: &mut Context<'_>) -> Result<ExitCode> {
        let target = match &self.target {
            Some(t) if !t.is_empty() => PathBuf::from(t),
            _ => match ctx.env.get_var("HOME") {
                Some(home) => PathBuf::from(home),
                None => bail!("no target and HOME not set"),
            },
        };

        let new_dir = ctx.env.current_dir.join(target);

        let canonical = fs::canonicalize(&new_dir)
            .with_context(|| format!("can't canonicalize {}", new_dir.display()))?;

        env::set_current_dir(&canonical)
            .with_context(|| format!("can't chdir to {}", canonical.display()))?;
        ctx.env.set_var("PWD", canonical.to_string_lossy());
        ctx.env.current_dir = canonical;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Exit the shell with the given status, or with the status of the last command.
pub struct Exit {
    #[argh(positional)]
    /// status to exit with, 0-255.
    pub status: Option<String>,
}

impl BuiltinCommand for Exit {
    fn name() -> &'static str {
        "exit"
    }

    fn execute(self, ctx: &mut Context<'_>) -> Result<ExitCode> {
        let code = match self.status.as_deref() {
            None => ctx.env.last_status,
            Some(raw) => raw
                .parse::<ExitCode>()
                .map_err(|_| anyhow!("{raw}: numeric argument required"))?,
        };
        Err(ExitRequest(code).into())
    }
}

#[derive(FromArgs)]
/// Do nothing, successfully.
pub struct True {
    #[argh(positional, greedy)]
    /// ignored.
    pub _args: Vec<String>,
}

impl BuiltinCommand for True {
    fn name() -> &'static str {
        "true"
    }

    fn execute(self, _ctx: &mut Context<'_>) -> Result<ExitCode> {
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Do nothing, unsuccessfully.
pub struct False {
    #[argh(positional, greedy)]
    /// ignored.
    pub _args: Vec<String>,
}

impl BuiltinCommand for False {
    fn name() -> &'static str {
        "false"
    }

    fn execute(self, _ctx: &mut Context<'_>) -> Result<ExitCode> {
        Ok(1)
    }
}

#[derive(FromArgs)]
/// write the arguments to standard output, separated by spaces.
/// by default, a trailing newline is printed.
pub struct Echo {
    #[argh(switch, short = 'n')]
    /// do not output the trailing newline.
    pub no_newline: bool,

    #[argh(positional, greedy)]
    /// values to print as-is, separated by spaces.
    pub args: Vec<String>,
}

impl BuiltinCommand for Echo {
    fn name() -> &'static str {
        "echo"
    }

    fn execute(self, ctx: &mut Context<'_>) -> Result<ExitCode> {
        let s = self.args.join(" ");
        if self.no_newline {
            write!(ctx.stdout, "{}", s)?;
        } else {
            writeln!(ctx.stdout, "{}", s)?;
        }
        Ok(0)
    }
}

#[derive(FromArgs)]
/// count lines, words and bytes
pub struct Wc {
    #[argh(positional, greedy)]
    /// files to count. If none provided, reads from stdin.
    pub files: Vec<String>,
}

impl BuiltinCommand for Wc {
    fn name() -> &'static str {
        "wc"
    }

    fn execute(self, ctx: &mut Context<'_>) -> Result<ExitCode> {
        if self.files.is_empty() {
            let mut buf = String::new();
            ctx.stdin.read_to_string(&mut buf)?;
            let (lines, words, bytes) = counts(&buf);
            writeln!(ctx.stdout, "{} {} {}", lines, words, bytes)?;
            return Ok(0);
        }
        for fname in self.files {
            let path = ctx.env.current_dir.join(&fname);
            let s = fs::read_to_string(&path).with_context(|| fname.clone())?;
            let (lines, words, bytes) = counts(&s);
            writeln!(ctx.stdout, "{} {} {} {}", lines, words, bytes, fname)?;
        }
        Ok(0)
    }
}

fn counts(s: &str) -> (usize, usize, usize) {
    (s.lines().count(), s.split_whitespace().count(), s.len())
}

#[derive(FromArgs)]
/// print file(s) to stdout
pub struct Cat {
    #[argh(positional, greedy)]
    /// files to print. If none provided, copies stdin.
    pub files: Vec<String>,
}

impl BuiltinCommand for Cat {
    fn name() -> &'static str {
        "cat"
    }

    fn execute(self, ctx: &mut Context<'_>) -> Result<ExitCode> {
        if self.files.is_empty() {
            std::io::copy(&mut *ctx.stdin, &mut *ctx.stdout)?;
            return Ok(0);
        }
        for fname in self.files {
            let path = ctx.env.current_dir.join(&fname);
            let mut f = fs::File::open(&path).with_context(|| fname.clone())?;
            std::io::copy(&mut f, &mut *ctx.stdout)?;
        }
        Ok(0)
    }
}

#[derive(FromArgs)]
/// print lines matching a pattern
pub struct Grep {
    #[argh(positional)]
    /// the pattern to search for (a regular expression)
    pub pattern: String,

    #[argh(positional, greedy)]
    /// files to search. If none provided, reads from stdin.
    pub files: Vec<String>,

    #[argh(switch, short = 'w')]
    /// match only whole words (using non-word characters as boundaries)
    pub word_regexp: bool,

    #[argh(switch, short = 'i')]
    /// ignore case distinctions
    pub ignore_case: bool,

    #[argh(option, short = 'A', default = "0")]
    /// print NUM lines of trailing context after matching lines
    pub after_context: usize,
}

impl Grep {
    /// Print the matching lines of one source. Returns whether anything matched.
    fn process_source<R: Read + ?Sized>(
        &self,
        reader: &mut R,
        stdout: &mut dyn Write,
        file_name: Option<&str>,
        re: &regex::Regex,
    ) -> Result<bool> {
        let reader = BufReader::new(reader);

        let mut lines = Vec::new();
        let mut match_indices = Vec::new();
        for (line_num, line) in reader.lines().enumerate() {
            let line = line.context("read error")?;
            if re.is_match(&line) {
                match_indices.push(line_num);
            }
            lines.push(line);
        }

        let total_lines = lines.len();
        let mut to_print = vec![false; total_lines];
        for &match_line in &match_indices {
            let end_print = match_line
                .saturating_add(self.after_context)
                .saturating_add(1)
                .min(total_lines);
            for flag in &mut to_print[match_line..end_print] {
                *flag = true;
            }
        }

        let prefix = file_name
            .map(|name| format!("{}:", name))
            .unwrap_or_default();
        let mut last_printed: Option<usize> = None;

        for (i, line) in lines.iter().enumerate() {
            if !to_print[i] {
                continue;
            }
            if self.after_context > 0 && last_printed.is_some_and(|last| i > last + 1) {
                stdout.write_all(b"--\n")?;
            }
            writeln!(stdout, "{}{}", prefix, line)?;
            last_printed = Some(i);
        }

        Ok(!match_indices.is_empty())
    }
}

impl BuiltinCommand for Grep {
    fn name() -> &'static str {
        "grep"
    }

    fn execute(self, ctx: &mut Context<'_>) -> Result<ExitCode> {
        let pattern = if self.word_regexp {
            format!(r"\b({})\b", self.pattern)
        } else {
            self.pattern.clone()
        };

        let re = RegexBuilder::new(&pattern)
            .case_insensitive(self.ignore_case)
            .build()
            .with_context(|| format!("invalid regex pattern: {}", pattern))?;

        if self.files.is_empty() {
            let matched = self.process_source(&mut *ctx.stdin, &mut *ctx.stdout, None, &re)?;
            return Ok(if matched { 0 } else { 1 });
        }

        let mut matched_any = false;
        let mut failed = false;
        for file_name in &self.files {
            let path = ctx.env.current_dir.join(file_name);
            let outcome = fs::File::open(&path)
                .map_err(anyhow::Error::from)
                .and_then(|mut f| self.process_source(&mut f, &mut *ctx.stdout, Some(file_name), &re));
            match outcome {
                Ok(matched) => matched_any |= matched,
                Err(e) => {
                    writeln!(ctx.stderr, "grep: {}: {:#}", file_name, e)?;
                    failed = true;
                }
            }
        }
        Ok(if failed {
            2
        } else if matched_any {
            0
        } else {
            1
        })
    }
}

/// `test EXPR`: evaluate a conditional expression.
pub(crate) fn run_test(ctx: &mut Context<'_>, args: &[String]) -> Result<ExitCode> {
    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    Ok(if evaluate(&args, ctx.env)? { 0 } else { 1 })
}

/// `[ EXPR ]`: same as `test`, with a mandatory closing bracket.
pub(crate) fn run_bracket(ctx: &mut Context<'_>, args: &[String]) -> Result<ExitCode> {
    match args.split_last() {
        Some((last, rest)) if last == "]" => run_test(ctx, rest),
        _ => bail!("missing `]`"),
    }
}

fn evaluate(args: &[&str], env: &Environment) -> Result<bool> {
    Ok(match args {
        [] => false,
        ["!", rest @ ..] => !evaluate(rest, env)?,
        [s] => !s.is_empty(),
        ["-n", s] => !s.is_empty(),
        ["-z", s] => s.is_empty(),
        ["-e", p] => env.current_dir.join(p).exists(),
        ["-f", p] => env.current_dir.join(p).is_file(),
        ["-d", p] => env.current_dir.join(p).is_dir(),
        [a, "=" | "==", b] => a == b,
        [a, "!=", b] => a != b,
        [a, op @ ("-eq" | "-ne" | "-lt" | "-le" | "-gt" | "-ge"), b] => {
            let (a, b) = (integer(a)?, integer(b)?);
            match *op {
                "-eq" => a == b,
                "-ne" => a != b,
                "-lt" => a < b,
                "-le" => a <= b,
                "-gt" => a > b,
                _ => a >= b,
            }
        }
        _ => bail!("unsupported expression: {}", args.join(" ")),
    })
}

fn integer(s: &str) -> Result<i64> {
    s.trim()
        .parse()
        .map_err(|_| anyhow!("{s}: integer expression expected"))
}
