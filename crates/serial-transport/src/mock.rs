use crate::{LinkHalves, Result};
use std::io::{Cursor, Write};
use std::sync::{Arc, Mutex};

/// An in-process link. Reads replay a scripted byte stream; writes are
/// captured so tests can inspect what the gateway sent.
pub struct MockLink {
    name: String,
    input: Vec<u8>,
    output: MockWriter,
}

impl MockLink {
    pub fn open(name: &str) -> Result<Self> {
        Ok(Self {
            name: name.to_string(),
            input: Vec::new(),
            output: MockWriter::default(),
        })
    }

    /// Append raw bytes the reader half will produce.
    pub fn feed(&mut self, bytes: &[u8]) -> &mut Self {
        self.input.extend_from_slice(bytes);
        self
    }

    /// Handle onto everything written to the link.
    pub fn output(&self) -> MockWriter {
        self.output.clone()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn split(self) -> Result<LinkHalves> {
        Ok(LinkHalves {
            reader: Box::new(Cursor::new(self.input)),
            writer: Box::new(self.output),
        })
    }
}

/// Cloneable capture buffer; every clone sees the same bytes.
#[derive(Clone, Default)]
pub struct MockWriter {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl MockWriter {
    pub fn contents(&self) -> Vec<u8> {
        match self.buf.lock() {
            Ok(b) => b.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn contents_string(&self) -> String {
        String::from_utf8_lossy(&self.contents()).into_owned()
    }
}

impl Write for MockWriter {
    fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
        let mut buf = self
            .buf
            .lock()
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::Other, "mock writer poisoned"))?;
        buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
