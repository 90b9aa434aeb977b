//! Dedicated output-writer thread.
//!
//! Cleaned records are serialized by the driver and sent over a bounded
//! channel to a single writer thread, which appends NDJSON lines in
//! arrival order. The bound applies back-pressure so the driver can never
//! buffer the whole input. Stdout mode keeps record output on stdout and
//! everything else on stderr.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::thread::JoinHandle;

use crossbeam_channel::{bounded, Sender};
use entropyguard_core::errors::ProcessingError;

const CHANNEL_BOUND: usize = 1024;

/// Where cleaned records go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkTarget {
    File(PathBuf),
    Stdout,
}

impl SinkTarget {
    pub fn parse(raw: &str) -> Self {
        if raw == "-" {
            Self::Stdout
        } else {
            Self::File(raw.into())
        }
    }
}

enum Message {
    Line(String),
}

/// Handle to the writer thread. `finish()` joins and reports the rows
/// written; dropping without `finish()` detaches and loses the count.
pub struct NdjsonWriter {
    tx: Option<Sender<Message>>,
    handle: Option<JoinHandle<Result<u64, String>>>,
}

impl NdjsonWriter {
    /// Spawn the writer thread for `target`.
    pub fn spawn(target: SinkTarget) -> Result<Self, ProcessingError> {
        let sink: Box<dyn Write + Send> = match &target {
            SinkTarget::File(path) => {
                if let Some(parent) = path.parent() {
                    if !parent.as_os_str().is_empty() {
                        std::fs::create_dir_all(parent).map_err(|e| {
                            ProcessingError::OutputWrite {
                                message: format!("{}: {e}", path.display()),
                            }
                        })?;
                    }
                }
                let file = File::create(path).map_err(|e| ProcessingError::OutputWrite {
                    message: format!("{}: {e}", path.display()),
                })?;
                Box::new(file)
            }
            SinkTarget::Stdout => Box::new(std::io::stdout()),
        };

        let (tx, rx) = bounded::<Message>(CHANNEL_BOUND);
        let handle = std::thread::Builder::new()
            .name("eg-output-writer".into())
            .spawn(move || {
                let mut out = BufWriter::new(sink);
                let mut written = 0u64;
                for Message::Line(line) in rx.iter() {
                    if let Err(e) = out.write_all(line.as_bytes()).and_then(|()| out.write_all(b"\n")) {
                        return Err(e.to_string());
                    }
                    written += 1;
                }
                out.flush().map_err(|e| e.to_string())?;
                Ok(written)
            })
            .map_err(|e| ProcessingError::OutputWrite {
                message: format!("failed to spawn writer thread: {e}"),
            })?;

        Ok(Self {
            tx: Some(tx),
            handle: Some(handle),
        })
    }

    /// Queue one serialized record. Blocks when the channel is full
    /// (back-pressure); errors if the writer thread already died.
    pub fn write_line(&self, line: String) -> Result<(), ProcessingError> {
        let tx = self.tx.as_ref().ok_or_else(|| ProcessingError::OutputWrite {
            message: "writer already finished".into(),
        })?;
        tx.send(Message::Line(line))
            .map_err(|_| ProcessingError::OutputWrite {
                message: "writer thread terminated early".into(),
            })
    }

    /// Close the channel, join the thread, and return the rows written.
    pub fn finish(mut self) -> Result<u64, ProcessingError> {
        drop(self.tx.take());
        let Some(handle) = self.handle.take() else {
            return Err(ProcessingError::OutputWrite {
                message: "writer already finished".into(),
            });
        };
        match handle.join() {
            Ok(Ok(written)) => Ok(written),
            Ok(Err(message)) => Err(ProcessingError::OutputWrite { message }),
            Err(_) => Err(ProcessingError::OutputWrite {
                message: "writer thread panicked".into(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_lines_in_order() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("out.ndjson");
        let writer = NdjsonWriter::spawn(SinkTarget::File(path.clone())).unwrap();
        for i in 0..100 {
            writer.write_line(format!("{{\"i\":{i}}}")).unwrap();
        }
        let written = writer.finish().unwrap();
        assert_eq!(written, 100);

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 100);
        assert_eq!(lines[0], "{\"i\":0}");
        assert_eq!(lines[99], "{\"i\":99}");
    }

    #[test]
    fn finish_on_empty_stream_reports_zero() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("empty.ndjson");
        let writer = NdjsonWriter::spawn(SinkTarget::File(path.clone())).unwrap();
        assert_eq!(writer.finish().unwrap(), 0);
        assert!(path.exists());
    }

    #[test]
    fn create_fails_cleanly_on_bad_path() {
        let err = NdjsonWriter::spawn(SinkTarget::File("/proc/definitely/not/writable".into()));
        assert!(err.is_err());
    }
}
