//! Line sources for the interactive loop.

use crate::error::ShellError;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tracing::warn;

/// One read from a [`LineSource`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    /// A line of text without its terminator.
    Text(String),
    /// The user pressed Ctrl-C.
    Interrupted,
    Eof,
}

/// Something that hands the interactive loop one line at a time.
pub trait LineSource {
    fn read_line(&mut self, prompt: &str) -> Result<Line, ShellError>;
}

/// Terminal input through rustyline, with persistent history.
pub struct EditorSource {
    editor: DefaultEditor,
    history_path: Option<PathBuf>,
}

impl EditorSource {
    /// Create an editor. History is loaded from `history_path` when given
    /// and written back when the source is dropped.
    pub fn new(history_path: Option<PathBuf>) -> Result<Self, ShellError> {
        let mut editor = DefaultEditor::new()?;
        if let Some(path) = &history_path {
            if let Err(e) = editor.load_history(path) {
                // Nothing to load on first run
                let is_not_found = matches!(&e, ReadlineError::Io(io_err) if io_err.kind() == io::ErrorKind::NotFound);
                if !is_not_found {
                    warn!("Failed to load history: {}", e);
                }
            }
        }
        Ok(Self {
            editor,
            history_path,
        })
    }

    fn save_history(&mut self) {
        let Some(path) = &self.history_path else {
            return;
        };
        if let Some(parent) = path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                warn!("Failed to create history directory: {}", e);
            }
        }
        if let Err(e) = self.editor.save_history(path) {
            warn!("Failed to save history: {}", e);
        }
    }
}

impl LineSource for EditorSource {
    fn read_line(&mut self, prompt: &str) -> Result<Line, ShellError> {
        match self.editor.readline(prompt) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    if let Err(e) = self.editor.add_history_entry(line.as_str()) {
                        warn!("Failed to add history entry: {}", e);
                    }
                }
                Ok(Line::Text(line))
            }
            Err(ReadlineError::Interrupted) => Ok(Line::Interrupted),
            Err(ReadlineError::Eof) => Ok(Line::Eof),
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for EditorSource {
    fn drop(&mut self) {
        self.save_history();
    }
}

/// Plain buffered input, printing prompts to `prompt_out`.
pub struct ReaderSource<R, W> {
    reader: R,
    prompt_out: W,
}

impl<R: BufRead, W: Write> ReaderSource<R, W> {
    pub fn new(reader: R, prompt_out: W) -> Self {
        Self { reader, prompt_out }
    }
}

impl<R: BufRead, W: Write> LineSource for ReaderSource<R, W> {
    fn read_line(&mut self, prompt: &str) -> Result<Line, ShellError> {
        write!(self.prompt_out, "{prompt}").map_err(ShellError::Input)?;
        self.prompt_out.flush().map_err(ShellError::Input)?;

        let mut line = String::new();
        if self.reader.read_line(&mut line).map_err(ShellError::Input)? == 0 {
            return Ok(Line::Eof);
        }
        if line.ends_with('\n') {
            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }
        }
        Ok(Line::Text(line))
    }
}
