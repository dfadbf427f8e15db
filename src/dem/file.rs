//! Filesystem-backed DEM sources
//!
//! HGT files are memory-mapped; the mapping makes `skip_bytes` a pointer
//! bump, which is what lets several reader tasks fan out over one file.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use memmap2::Mmap;

use crate::dem::{zip::ZipDemFile, DemEntry, DemFile, DemFolder, DemStream};
use crate::error::Result;

/// An on-disk `.hgt` file exposed as a DEM source
pub struct FsDemFile {
    path: PathBuf,
    name: String,
    size: u64,
}

impl FsDemFile {
    /// Wraps an existing file; the size is taken from file metadata
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let size = path.metadata()?.len();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(Self { path, name, size })
    }
}

impl DemFile for FsDemFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn size_bytes(&self) -> u64 {
        self.size
    }

    fn open_stream(&self) -> Result<Box<dyn DemStream>> {
        let file = File::open(&self.path)?;
        let mmap = unsafe { Mmap::map(&file)? };

        #[cfg(unix)]
        unsafe {
            libc::madvise(
                mmap.as_ptr() as *mut libc::c_void,
                mmap.len(),
                libc::MADV_SEQUENTIAL | libc::MADV_WILLNEED,
            );
        }

        Ok(Box::new(MmapStream {
            mmap: Arc::new(mmap),
            pos: 0,
        }))
    }
}

/// Sample stream over a memory-mapped file
struct MmapStream {
    mmap: Arc<Mmap>,
    pos: usize,
}

impl DemStream for MmapStream {
    fn next_sample(&mut self) -> io::Result<Option<i16>> {
        if self.pos + 2 > self.mmap.len() {
            self.pos = self.mmap.len();
            return Ok(None);
        }

        let sample = i16::from_be_bytes([self.mmap[self.pos], self.mmap[self.pos + 1]]);
        self.pos += 2;
        Ok(Some(sample))
    }

    fn skip_bytes(&mut self, n: u64) -> io::Result<()> {
        self.pos = (self.pos as u64).saturating_add(n).min(self.mmap.len() as u64) as usize;
        Ok(())
    }
}

/// A directory tree of DEM files
pub struct FsDemFolder {
    path: PathBuf,
}

impl FsDemFolder {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Root directory of this folder
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DemFolder for FsDemFolder {
    fn entries(&self) -> Result<Vec<DemEntry>> {
        let mut entries = Vec::new();

        for dir_entry in std::fs::read_dir(&self.path)? {
            let dir_entry = dir_entry?;
            let path = dir_entry.path();

            if path.is_dir() {
                entries.push(DemEntry::Folder(Arc::new(FsDemFolder::new(path))));
                continue;
            }

            let lower = path
                .file_name()
                .map(|n| n.to_string_lossy().to_lowercase())
                .unwrap_or_default();

            if lower.ends_with(".hgt") {
                entries.push(DemEntry::File(Arc::new(FsDemFile::open(path)?)));
            } else if lower.ends_with(".zip") {
                match ZipDemFile::open(&path) {
                    Ok(file) => entries.push(DemEntry::File(Arc::new(file))),
                    Err(e) => log::warn!("skipping archive {}: {}", path.display(), e),
                }
            }
        }

        Ok(entries)
    }
}
