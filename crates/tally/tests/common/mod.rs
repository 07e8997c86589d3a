//! Shared helpers for tally integration tests

#![allow(dead_code)]

use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use tally::{Harness, HarnessConfig};

/// Cloneable in-memory sink so tests can read back what the reporter wrote
#[derive(Clone, Default)]
pub struct Output(Arc<Mutex<Vec<u8>>>);

impl Output {
    pub fn text(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }

    /// Everything written before the summary: the progress markers
    pub fn markers(&self) -> String {
        let text = self.text();
        match text.find("\n\n") {
            Some(end) => text[..end].to_string(),
            None => text,
        }
    }
}

impl Write for Output {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Uncoloured marker-mode harness writing into a fresh buffer
pub fn harness() -> (Harness, Output) {
    let output = Output::default();
    let harness = Harness::new(HarnessConfig::plain())
        .unwrap()
        .with_output(output.clone());
    (harness, output)
}
