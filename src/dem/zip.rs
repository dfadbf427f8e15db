//! ZIP-contained DEM sources
//!
//! A `.zip` archive holding a single `.hgt` entry, either stored or
//! deflated. The payload is streamed through the decoder, so skipping is
//! read-and-discard; such sources report `fast_skip() == false` and the
//! pipeline degrades to a single reader.

use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use flate2::read::DeflateDecoder;

use crate::dem::{DemFile, DemStream};
use crate::error::{Error, Result};

const LOCAL_HEADER_MAGIC: u32 = 0x0403_4b50;
const METHOD_STORED: u16 = 0;
const METHOD_DEFLATED: u16 = 8;
/// General-purpose flag bit 3: sizes deferred to a data descriptor
const FLAG_STREAMED_SIZES: u16 = 1 << 3;

/// A `.hgt` entry inside a ZIP archive
pub struct ZipDemFile {
    path: PathBuf,
    name: String,
    method: u16,
    compressed_size: u64,
    uncompressed_size: u64,
    payload_offset: u64,
}

impl ZipDemFile {
    /// Opens an archive and locates its `.hgt` entry.
    ///
    /// Only the first local entry is considered; the archive must carry
    /// its sizes in the local header (no streaming data descriptors).
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut reader = BufReader::new(File::open(&path)?);

        let magic = read_u32(&mut reader)?;
        if magic != LOCAL_HEADER_MAGIC {
            return Err(Error::InvalidDem(format!(
                "{}: not a ZIP archive (magic 0x{:08X})",
                name, magic
            )));
        }

        let _version = read_u16(&mut reader)?;
        let flags = read_u16(&mut reader)?;
        let method = read_u16(&mut reader)?;
        let _mod_time = read_u16(&mut reader)?;
        let _mod_date = read_u16(&mut reader)?;
        let _crc32 = read_u32(&mut reader)?;
        let compressed_size = read_u32(&mut reader)? as u64;
        let uncompressed_size = read_u32(&mut reader)? as u64;
        let name_len = read_u16(&mut reader)? as usize;
        let extra_len = read_u16(&mut reader)? as usize;

        if flags & FLAG_STREAMED_SIZES != 0 {
            return Err(Error::Unsupported(format!(
                "{}: ZIP entry sizes deferred to a data descriptor",
                name
            )));
        }
        if method != METHOD_STORED && method != METHOD_DEFLATED {
            return Err(Error::Unsupported(format!(
                "{}: ZIP compression method {}",
                name, method
            )));
        }

        let mut entry_name = vec![0u8; name_len];
        reader.read_exact(&mut entry_name)?;
        let entry_name = String::from_utf8_lossy(&entry_name).into_owned();
        if !entry_name.to_lowercase().ends_with(".hgt") {
            return Err(Error::InvalidDem(format!(
                "{}: ZIP entry '{}' is not an HGT grid",
                name, entry_name
            )));
        }

        let payload_offset = 30 + name_len as u64 + extra_len as u64;

        Ok(Self {
            path,
            name,
            method,
            compressed_size,
            uncompressed_size,
            payload_offset,
        })
    }
}

impl DemFile for ZipDemFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn size_bytes(&self) -> u64 {
        self.uncompressed_size
    }

    fn open_stream(&self) -> Result<Box<dyn DemStream>> {
        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(self.payload_offset))?;
        let payload = BufReader::new(file).take(self.compressed_size);

        let reader: Box<dyn Read + Send> = match self.method {
            METHOD_DEFLATED => Box::new(DeflateDecoder::new(payload)),
            _ => Box::new(payload),
        };

        Ok(Box::new(ZipStream { reader }))
    }

    fn fast_skip(&self) -> bool {
        false
    }
}

struct ZipStream {
    reader: Box<dyn Read + Send>,
}

impl DemStream for ZipStream {
    fn next_sample(&mut self) -> io::Result<Option<i16>> {
        let mut buf = [0u8; 2];
        let mut filled = 0;
        while filled < 2 {
            let n = self.reader.read(&mut buf[filled..])?;
            if n == 0 {
                return Ok(None);
            }
            filled += n;
        }
        Ok(Some(i16::from_be_bytes(buf)))
    }

    fn skip_bytes(&mut self, n: u64) -> io::Result<()> {
        io::copy(&mut self.reader.by_ref().take(n), &mut io::sink())?;
        Ok(())
    }
}

fn read_u16<R: Read>(reader: &mut R) -> io::Result<u16> {
    let mut buf = [0u8; 2];
    reader.read_exact(&mut buf)?;
    Ok(u16::from_le_bytes(buf))
}

fn read_u32<R: Read>(reader: &mut R) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::DeflateEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn make_zip(dir: &Path, archive: &str, entry: &str, samples: &[i16], deflate: bool) -> PathBuf {
        let mut payload = Vec::new();
        for s in samples {
            payload.extend_from_slice(&s.to_be_bytes());
        }

        let (method, data) = if deflate {
            let mut enc = DeflateEncoder::new(Vec::new(), Compression::default());
            enc.write_all(&payload).unwrap();
            (METHOD_DEFLATED, enc.finish().unwrap())
        } else {
            (METHOD_STORED, payload.clone())
        };

        let mut bytes = Vec::new();
        bytes.extend_from_slice(&LOCAL_HEADER_MAGIC.to_le_bytes());
        bytes.extend_from_slice(&20u16.to_le_bytes()); // version
        bytes.extend_from_slice(&0u16.to_le_bytes()); // flags
        bytes.extend_from_slice(&method.to_le_bytes());
        bytes.extend_from_slice(&0u16.to_le_bytes()); // time
        bytes.extend_from_slice(&0u16.to_le_bytes()); // date
        bytes.extend_from_slice(&0u32.to_le_bytes()); // crc
        bytes.extend_from_slice(&(data.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&(entry.len() as u16).to_le_bytes());
        bytes.extend_from_slice(&0u16.to_le_bytes()); // extra
        bytes.extend_from_slice(entry.as_bytes());
        bytes.extend_from_slice(&data);

        let path = dir.join(archive);
        std::fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn test_deflated_entry_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = make_zip(dir.path(), "N10E020.zip", "N10E020.hgt", &[5, -6, 7], true);

        let dem = ZipDemFile::open(&path).unwrap();
        assert_eq!(dem.name(), "N10E020.zip");
        assert_eq!(dem.size_bytes(), 6);
        assert!(!dem.fast_skip());

        let mut stream = dem.open_stream().unwrap();
        assert_eq!(stream.next_sample().unwrap(), Some(5));
        assert_eq!(stream.next_sample().unwrap(), Some(-6));
        assert_eq!(stream.next_sample().unwrap(), Some(7));
        assert_eq!(stream.next_sample().unwrap(), None);
    }

    #[test]
    fn test_stored_entry_and_skip() {
        let dir = tempfile::tempdir().unwrap();
        let path = make_zip(dir.path(), "s05w123.zip", "s05w123.hgt", &[1, 2, 3, 4], false);

        let dem = ZipDemFile::open(&path).unwrap();
        assert_eq!(dem.size_bytes(), 8);

        let mut stream = dem.open_stream().unwrap();
        stream.skip_bytes(4).unwrap();
        assert_eq!(stream.next_sample().unwrap(), Some(3));
    }

    #[test]
    fn test_rejects_non_zip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bogus.zip");
        std::fs::write(&path, b"not an archive").unwrap();
        assert!(ZipDemFile::open(&path).is_err());
    }

    #[test]
    fn test_rejects_non_hgt_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = make_zip(dir.path(), "N10E020.zip", "readme.txt", &[1], false);
        assert!(ZipDemFile::open(&path).is_err());
    }
}
