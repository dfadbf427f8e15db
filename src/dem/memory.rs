//! In-memory DEM sources
//!
//! Byte-slice sources used by tests and embedded fixtures; behave like
//! memory-mapped files, including O(1) skipping.

use std::io;
use std::sync::Arc;

use crate::dem::{DemEntry, DemFile, DemFolder, DemStream};
use crate::error::Result;

/// A DEM file backed by a shared byte buffer
pub struct MemoryDemFile {
    name: String,
    bytes: Arc<Vec<u8>>,
    fast_skip: bool,
}

impl MemoryDemFile {
    /// Wraps raw HGT bytes under the given name
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes: Arc::new(bytes),
            fast_skip: true,
        }
    }

    /// Builds the byte payload from big-endian samples
    pub fn from_samples(name: impl Into<String>, samples: &[i16]) -> Self {
        let mut bytes = Vec::with_capacity(samples.len() * 2);
        for s in samples {
            bytes.extend_from_slice(&s.to_be_bytes());
        }
        Self::new(name, bytes)
    }

    /// Marks the source as slow-skipping, forcing single-reader mode
    pub fn with_slow_skip(mut self) -> Self {
        self.fast_skip = false;
        self
    }
}

impl DemFile for MemoryDemFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn size_bytes(&self) -> u64 {
        self.bytes.len() as u64
    }

    fn open_stream(&self) -> Result<Box<dyn DemStream>> {
        Ok(Box::new(MemoryStream {
            bytes: Arc::clone(&self.bytes),
            pos: 0,
        }))
    }

    fn fast_skip(&self) -> bool {
        self.fast_skip
    }
}

struct MemoryStream {
    bytes: Arc<Vec<u8>>,
    pos: usize,
}

impl DemStream for MemoryStream {
    fn next_sample(&mut self) -> io::Result<Option<i16>> {
        if self.pos + 2 > self.bytes.len() {
            self.pos = self.bytes.len();
            return Ok(None);
        }
        let sample = i16::from_be_bytes([self.bytes[self.pos], self.bytes[self.pos + 1]]);
        self.pos += 2;
        Ok(Some(sample))
    }

    fn skip_bytes(&mut self, n: u64) -> io::Result<()> {
        self.pos = (self.pos as u64).saturating_add(n).min(self.bytes.len() as u64) as usize;
        Ok(())
    }
}

/// A flat in-memory folder of DEM files
#[derive(Default)]
pub struct MemoryDemFolder {
    files: Vec<Arc<dyn DemFile>>,
}

impl MemoryDemFolder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, file: impl DemFile + 'static) -> Self {
        self.files.push(Arc::new(file));
        self
    }
}

impl DemFolder for MemoryDemFolder {
    fn entries(&self) -> Result<Vec<DemEntry>> {
        Ok(self
            .files
            .iter()
            .map(|f| DemEntry::File(Arc::clone(f)))
            .collect())
    }
}
