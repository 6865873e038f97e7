//! Output writing and the `ob_*` buffer stack.
//!
//! `OutputSink` plays the role of the teacher's `PrintWriter`
//! (`examples/parcadei-ouros/crates/ouros/src/io.rs`): a small trait so the
//! embedder decides where `echo`/`print`/inline HTML text actually goes,
//! with `StdOutput`/`CollectOutput`/`NullOutput` implementations mirroring
//! `StdPrint`/`CollectStringPrint`/`NoPrint`. Layered on top of the sink is
//! the output-buffering stack (`ob_start`/`ob_get_clean`/...), which this
//! language exposes as ordinary user-facing functions.

use std::io::{self, Write as _};

pub trait OutputSink {
    fn write(&mut self, bytes: &[u8]);
}

#[derive(Debug, Default)]
pub struct StdOutput;

impl OutputSink for StdOutput {
    fn write(&mut self, bytes: &[u8]) {
        let _ = io::stdout().write_all(bytes);
    }
}

#[derive(Debug, Default)]
pub struct CollectOutput(Vec<u8>);

impl CollectOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl OutputSink for CollectOutput {
    fn write(&mut self, bytes: &[u8]) {
        self.0.extend_from_slice(bytes);
    }
}

#[derive(Debug, Default)]
pub struct NullOutput;

impl OutputSink for NullOutput {
    fn write(&mut self, _bytes: &[u8]) {}
}

/// One level of the output-buffering stack. Buffers nest: writing while a
/// buffer is active appends to the innermost one instead of reaching the
/// underlying sink.
#[derive(Debug, Default)]
struct ObLevel {
    buf: Vec<u8>,
}

/// Sits in front of an `OutputSink`, intercepting writes into a stack of
/// buffers the way `ob_start()`/`ob_get_clean()`/`ob_end_flush()` expect.
pub struct OutputBuffer<S: OutputSink> {
    sink: S,
    stack: Vec<ObLevel>,
}

impl<S: OutputSink> OutputBuffer<S> {
    pub fn new(sink: S) -> Self {
        Self { sink, stack: Vec::new() }
    }

    pub fn write(&mut self, bytes: &[u8]) {
        if let Some(level) = self.stack.last_mut() {
            level.buf.extend_from_slice(bytes);
        } else {
            self.sink.write(bytes);
        }
    }

    pub fn start(&mut self) {
        self.stack.push(ObLevel::default());
    }

    pub fn level(&self) -> usize {
        self.stack.len()
    }

    pub fn get_contents(&self) -> Option<Vec<u8>> {
        self.stack.last().map(|l| l.buf.clone())
    }

    /// `ob_get_clean()` — pop the top buffer, returning its contents without
    /// forwarding them anywhere.
    pub fn get_clean(&mut self) -> Option<Vec<u8>> {
        self.stack.pop().map(|l| l.buf)
    }

    /// `ob_end_clean()` — like `get_clean` but discards the contents.
    pub fn end_clean(&mut self) -> bool {
        self.stack.pop().is_some()
    }

    /// `ob_end_flush()` — pop the top buffer and forward its contents to
    /// whatever is beneath it (another buffer, or the sink).
    pub fn end_flush(&mut self) -> bool {
        let Some(level) = self.stack.pop() else { return false };
        self.write(&level.buf);
        true
    }

    /// `ob_flush()` — forward the top buffer's contents downward but keep
    /// the buffer open and empty.
    pub fn flush(&mut self) -> bool {
        let Some(level) = self.stack.last_mut() else { return false };
        let contents = std::mem::take(&mut level.buf);
        self.stack.pop();
        self.write(&contents);
        self.stack.push(ObLevel::default());
        true
    }

    /// `ob_clean()` — discard the top buffer's contents but keep it open.
    pub fn clean(&mut self) -> bool {
        match self.stack.last_mut() {
            Some(level) => {
                level.buf.clear();
                true
            }
            None => false,
        }
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_buffers_isolate_writes() {
        let mut ob = OutputBuffer::new(CollectOutput::new());
        ob.write(b"top-level");
        ob.start();
        ob.write(b"buffered");
        assert_eq!(ob.get_contents().unwrap(), b"buffered");
        ob.end_flush();
        assert_eq!(ob.into_sink().into_bytes(), b"top-levelbuffered");
    }

    #[test]
    fn get_clean_discards_from_the_stack_without_forwarding() {
        let mut ob = OutputBuffer::new(CollectOutput::new());
        ob.start();
        ob.write(b"hidden");
        let contents = ob.get_clean().unwrap();
        assert_eq!(contents, b"hidden");
        assert_eq!(ob.into_sink().into_bytes(), Vec::<u8>::new());
    }
}
