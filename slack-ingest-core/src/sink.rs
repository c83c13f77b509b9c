//! Output stream for accepted events.

use slack_ingest_sdk::objects::OutputEvent;
use std::io::{self, Write};

/// Destination for accepted events.
///
/// A successful `emit` means the event is fully written and flushed.
pub trait EventSink: Send {
    fn emit(&mut self, event: &OutputEvent) -> io::Result<()>;
}

/// Writes one JSON object per line and flushes after each.
pub struct NdjsonSink<W> {
    writer: W,
}

impl<W: Write + Send> NdjsonSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl NdjsonSink<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> EventSink for NdjsonSink<W> {
    fn emit(&mut self, event: &OutputEvent) -> io::Result<()> {
        let mut line = serde_json::to_vec(event).map_err(io::Error::other)?;
        line.push(b'\n');
        self.writer.write_all(&line)?;
        self.writer.flush()
    }
}
