//! Helpers shared by the unit tests of this crate.

use crate::command::Context;
use crate::env::Environment;
use crate::io_adapters::{MemReader, MemWriter, Streams};
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::{Mutex, MutexGuard, OnceLock};

/// Serializes tests that read or change the process working directory.
pub(crate) fn lock_current_dir() -> MutexGuard<'static, ()> {
    static MUTEX: OnceLock<Mutex<()>> = OnceLock::new();
    MUTEX
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub(crate) fn args(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

pub(crate) fn text(buf: &Rc<RefCell<Vec<u8>>>) -> String {
    String::from_utf8(buf.borrow().clone()).unwrap()
}

/// Session streams backed by memory, with handles to what was written.
pub(crate) fn mem_streams(
    input: &[u8],
) -> (Streams, Rc<RefCell<Vec<u8>>>, Rc<RefCell<Vec<u8>>>) {
    let (out, out_handle) = MemWriter::with_handle();
    let (err, err_handle) = MemWriter::with_handle();
    let streams = Streams::new(
        Box::new(MemReader::new(input.to_vec())),
        Box::new(out),
        Box::new(err),
    );
    (streams, out_handle, err_handle)
}

/// An environment plus in-memory streams that can lend out a [`Context`].
pub(crate) struct Harness {
    pub env: Environment,
    streams: Streams,
    out: Rc<RefCell<Vec<u8>>>,
    err: Rc<RefCell<Vec<u8>>>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_stdin(b"")
    }

    pub fn with_stdin(input: &[u8]) -> Self {
        let (streams, out, err) = mem_streams(input);
        Self {
            env: Environment::new(),
            streams,
            out,
            err,
        }
    }

    pub fn ctx(&mut self) -> Context<'_> {
        Context {
            env: &mut self.env,
            stdin: &mut *self.streams.stdin,
            stdout: &mut *self.streams.stdout,
            stderr: &mut *self.streams.stderr,
        }
    }

    pub fn stdout(&self) -> String {
        text(&self.out)
    }

    pub fn stderr(&self) -> String {
        text(&self.err)
    }
}
