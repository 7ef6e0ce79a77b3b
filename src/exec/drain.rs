// src/exec/drain.rs

//! Concurrent draining of a child's stdout and stderr into a record.
//!
//! Both transports (local pipes and remote channels) hand us two
//! `AsyncRead`s. We race reads on both with `tokio::select!`, so a chatty
//! stderr never starves stdout and vice versa. Every chunk goes through the
//! stream's [`LineAssembler`] and the completed lines land on the record as
//! soon as they exist, which is what live pollers see.

use std::io;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::trace;

use crate::output::{LineAssembler, OutputStream};
use crate::record::RecordHandle;

const READ_CHUNK: usize = 8 * 1024;

/// How draining stopped.
#[derive(Debug)]
pub(crate) enum DrainEnd {
    /// Both streams reached EOF.
    Closed,
    /// No read completed within the read timeout.
    TimedOut,
    /// A read failed.
    Failed(io::Error),
}

struct StreamPump<R> {
    stream: OutputStream,
    reader: Option<R>,
    buf: Vec<u8>,
    assembler: LineAssembler,
}

impl<R: AsyncRead + Unpin> StreamPump<R> {
    fn new(stream: OutputStream, reader: Option<R>, end_in_newlines: bool) -> Self {
        Self {
            stream,
            reader,
            buf: vec![0u8; READ_CHUNK],
            assembler: LineAssembler::new(end_in_newlines),
        }
    }

    fn is_open(&self) -> bool {
        self.reader.is_some()
    }

    async fn read(&mut self) -> io::Result<usize> {
        match self.reader.as_mut() {
            Some(reader) => reader.read(&mut self.buf).await,
            None => Ok(0),
        }
    }

    fn absorb(&mut self, read: io::Result<usize>, record: &RecordHandle) -> io::Result<()> {
        match read? {
            0 => {
                trace!(stream = ?self.stream, "stream closed");
                self.reader = None;
                self.flush(record);
            }
            n => {
                let lines = self.assembler.push(&self.buf[..n]);
                record.append(self.stream, lines);
            }
        }
        Ok(())
    }

    fn flush(&mut self, record: &RecordHandle) {
        if let Some(line) = self.assembler.finish() {
            record.append(self.stream, vec![line]);
        }
    }
}

/// Drain both streams into `record` until they close, a read fails, or (if
/// `read_timeout` is set) no read completes in time.
///
/// Partial lines buffered in the assemblers are flushed onto the record in
/// every case, so output produced before a timeout or failure is kept.
pub(crate) async fn drain_output<O, E>(
    stdout: Option<O>,
    stderr: Option<E>,
    record: &RecordHandle,
    end_in_newlines: bool,
    read_timeout: Option<Duration>,
) -> DrainEnd
where
    O: AsyncRead + Unpin,
    E: AsyncRead + Unpin,
{
    let mut out = StreamPump::new(OutputStream::Stdout, stdout, end_in_newlines);
    let mut err = StreamPump::new(OutputStream::Stderr, stderr, end_in_newlines);

    let end = loop {
        if !out.is_open() && !err.is_open() {
            break DrainEnd::Closed;
        }

        let next = async {
            tokio::select! {
                read = out.read(), if out.is_open() => (OutputStream::Stdout, read),
                read = err.read(), if err.is_open() => (OutputStream::Stderr, read),
            }
        };

        let (stream, read) = match read_timeout {
            Some(limit) => match tokio::time::timeout(limit, next).await {
                Ok(ready) => ready,
                Err(_) => break DrainEnd::TimedOut,
            },
            None => next.await,
        };

        let absorbed = match stream {
            OutputStream::Stdout => out.absorb(read, record),
            OutputStream::Stderr => err.absorb(read, record),
        };
        if let Err(e) = absorbed {
            break DrainEnd::Failed(e);
        }
    };

    out.flush(record);
    err.flush(record);
    end
}

#[cfg(test)]
#[path = "drain_tests.rs"]
mod tests;
