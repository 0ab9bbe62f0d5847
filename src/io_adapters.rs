use crate::command::Stdin;
use std::cell::RefCell;
use std::io::{self, Cursor, Read, Result as IoResult, Write};
use std::process::Stdio;
use std::rc::Rc;

/// The three standard streams of one shell session.
///
/// They are wired once when the session starts; builtins and external
/// commands all write through the same handles.
pub struct Streams {
    pub stdin: Box<dyn Stdin>,
    pub stdout: Box<dyn Write>,
    pub stderr: Box<dyn Write>,
}

impl Streams {
    pub fn new(stdin: Box<dyn Stdin>, stdout: Box<dyn Write>, stderr: Box<dyn Write>) -> Self {
        Self {
            stdin,
            stdout,
            stderr,
        }
    }

    /// The process's own stdin, stdout and stderr.
    pub fn inherit() -> Self {
        Self::new(
            Box::new(InheritedStdin(io::stdin())),
            Box::new(io::stdout()),
            Box::new(io::stderr()),
        )
    }

    /// Flush both output streams. Errors are ignored: a closed terminal must
    /// not turn a successful command into a failure.
    pub fn flush(&mut self) {
        let _ = self.stdout.flush();
        let _ = self.stderr.flush();
    }
}

/// The process's standard input. Children spawned from the session inherit it.
pub struct InheritedStdin(pub io::Stdin);

impl Read for InheritedStdin {
    fn read(&mut self, buf: &mut [u8]) -> IoResult<usize> {
        self.0.read(buf)
    }
}

impl Stdin for InheritedStdin {
    fn stdio(&self) -> Stdio {
        Stdio::inherit()
    }
}

/// Memory-backed reader for builtins.
///
/// Public so it can be constructed from other modules.
pub struct MemReader {
    cursor: Cursor<Vec<u8>>,
}

impl MemReader {
    /// Create a MemReader that will read from the provided buffer.
    pub fn new(buf: Vec<u8>) -> Self {
        Self {
            cursor: Cursor::new(buf),
        }
    }
}

impl Read for MemReader {
    fn read(&mut self, out: &mut [u8]) -> IoResult<usize> {
        self.cursor.read(out)
    }
}

impl Stdin for MemReader {
    /// Children cannot read from process memory, so they get a null stream.
    fn stdio(&self) -> Stdio {
        Stdio::null()
    }
}

/// Memory-backed writer for capturing session output.
#[derive(Default)]
pub struct MemWriter {
    buf: Rc<RefCell<Vec<u8>>>,
}

impl MemWriter {
    /// Public constructor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return inner Rc so caller can read collected bytes after command execution.
    pub fn into_inner(self) -> Rc<RefCell<Vec<u8>>> {
        self.buf
    }

    /// Convenience: create writer and return (writer, rc_handle).
    pub fn with_handle() -> (Self, Rc<RefCell<Vec<u8>>>) {
        let mw = MemWriter::new();
        let rc = mw.buf.clone();
        (mw, rc)
    }
}

impl Write for MemWriter {
    fn write(&mut self, data: &[u8]) -> IoResult<usize> {
        self.buf.borrow_mut().extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> IoResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mem_writer_handle_sees_writes() {
        let (mut writer, handle) = MemWriter::with_handle();
        write!(writer, "hello").unwrap();
        assert_eq!(handle.borrow().as_slice(), b"hello");
    }

    #[test]
    fn mem_reader_yields_its_buffer() {
        let mut reader = MemReader::new(b"line\n".to_vec());
        let mut s = String::new();
        reader.read_to_string(&mut s).unwrap();
        assert_eq!(s, "line\n");
    }
}
