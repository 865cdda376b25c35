// src/exec/output.rs

//! Forwarding of child output to our own stdout/stderr, keeping the last few
//! lines around for failure reports.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::task::JoinHandle;
use tracing::debug;

/// Where forwarded lines are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

/// Bounded buffer of the most recent output lines of a child process.
///
/// Cloning shares the buffer, so both the stdout and the stderr forwarder
/// append to the same tail.
#[derive(Debug, Clone)]
pub struct OutputTail {
    lines: Arc<Mutex<VecDeque<String>>>,
    capacity: usize,
}

impl OutputTail {
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    pub fn push(&self, line: String) {
        if self.capacity == 0 {
            return;
        }
        let mut lines = match self.lines.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if lines.len() == self.capacity {
            lines.pop_front();
        }
        lines.push_back(line);
    }

    /// Copy of the retained lines, oldest first.
    pub fn snapshot(&self) -> Vec<String> {
        match self.lines.lock() {
            Ok(guard) => guard.iter().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().iter().cloned().collect(),
        }
    }
}

/// Copy `reader` line by line to `stream`, recording each line in `tail`.
///
/// Bytes are forwarded unchanged; the tail keeps a lossy UTF-8 copy, so
/// non-UTF-8 compiler output never stops the forwarder. The task ends when
/// the child closes its end of the pipe.
pub fn forward<R>(reader: R, stream: Stream, tail: OutputTail) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    if !buf.ends_with(b"\n") {
                        buf.push(b'\n');
                    }
                    write_raw(stream, &buf).await;
                    tail.push(display_line(&buf));
                }
                Err(err) => {
                    debug!(?stream, error = %err, "stopped forwarding child output");
                    break;
                }
            }
        }
    })
}

fn display_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}

async fn write_raw(stream: Stream, buf: &[u8]) {
    // A closed terminal is not worth failing a build over.
    let _ = match stream {
        Stream::Stdout => tokio::io::stdout().write_all(buf).await,
        Stream::Stderr => tokio::io::stderr().write_all(buf).await,
    };
}
