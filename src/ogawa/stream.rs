//! Byte-level access to the container file.
//!
//! [`IStreams`] serves random-access reads, preferably over a shared memory
//! map so that concurrent readers never contend; [`OStream`] is the
//! buffered, position-tracking writer used by the sink.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;

use byteorder::{LittleEndian, WriteBytesExt};
use memmap2::Mmap;
use parking_lot::Mutex;

use super::format::*;
use crate::util::{Error, Result};

/// Random-access input over an archive file.
///
/// With the `mmap` feature (default) the file is memory-mapped once and all
/// reads are plain slice copies, which is what makes lock-free concurrent
/// sample resolution possible. The buffered fallback serializes reads
/// through a mutex-guarded file handle.
pub struct IStreams {
    inner: StreamsInner,
    version: (u8, u8),
    frozen: bool,
    size: u64,
}

enum StreamsInner {
    Mmap(Mmap),
    File(Mutex<File>),
}

impl IStreams {
    /// Open a file for reading, validating the container header.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_opts(path, cfg!(feature = "mmap"))
    }

    /// Open with an explicit I/O mode.
    pub fn open_opts(path: impl AsRef<Path>, use_mmap: bool) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            Error::InvalidArchive(format!("cannot open {}: {e}", path.display()))
        })?;

        let size = file.metadata().map(|m| m.len())?;
        if size < HEADER_SIZE as u64 {
            return Err(Error::invalid(format!(
                "file too small for a container header ({size} bytes)"
            )));
        }

        let inner = if use_mmap {
            // The file stays open for the mapping's lifetime; writers only
            // ever produce sealed files, so the view is stable.
            let mmap = unsafe { Mmap::map(&file) }
                .map_err(|e| Error::io(format!("memory mapping failed: {e}")))?;
            StreamsInner::Mmap(mmap)
        } else {
            StreamsInner::File(Mutex::new(file))
        };

        let mut header = [0u8; HEADER_SIZE];
        match &inner {
            StreamsInner::Mmap(mmap) => header.copy_from_slice(&mmap[..HEADER_SIZE]),
            StreamsInner::File(file) => {
                let mut f = file.lock();
                f.seek(SeekFrom::Start(0))?;
                f.read_exact(&mut header)?;
            }
        }
        let (version, frozen) = parse_header(&header)?;

        Ok(Self {
            inner,
            version,
            frozen,
            size,
        })
    }

    /// The archive is sealed; unsealed files are partial writes.
    #[inline]
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// (major, minor) container version.
    #[inline]
    pub fn version(&self) -> (u8, u8) {
        self.version
    }

    #[inline]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Root group position from the header.
    pub fn root_pos(&self) -> Result<u64> {
        self.read_u64(ROOT_POS_OFFSET as u64)
    }

    /// Read `len` bytes at `pos`.
    pub fn read_bytes(&self, pos: u64, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.read_into(pos, &mut buf)?;
        Ok(buf)
    }

    /// Read into an existing buffer.
    pub fn read_into(&self, pos: u64, buf: &mut [u8]) -> Result<()> {
        let end = pos + buf.len() as u64;
        if end > self.size {
            return Err(Error::io(format!(
                "truncated read at {pos}..{end} (file size {})",
                self.size
            )));
        }
        match &self.inner {
            StreamsInner::Mmap(mmap) => {
                buf.copy_from_slice(&mmap[pos as usize..pos as usize + buf.len()]);
                Ok(())
            }
            StreamsInner::File(file) => {
                let mut f = file.lock();
                f.seek(SeekFrom::Start(pos))?;
                f.read_exact(buf)?;
                Ok(())
            }
        }
    }

    pub fn read_u64(&self, pos: u64) -> Result<u64> {
        let mut buf = [0u8; 8];
        self.read_into(pos, &mut buf)?;
        Ok(u64::from_le_bytes(buf))
    }

    pub fn read_u32(&self, pos: u64) -> Result<u32> {
        let mut buf = [0u8; 4];
        self.read_into(pos, &mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }
}

/// Parse and validate the 16-byte container header.
fn parse_header(data: &[u8]) -> Result<((u8, u8), bool)> {
    if &data[0..5] != MAGIC {
        return Err(Error::invalid("missing container magic bytes"));
    }
    let frozen = data[FROZEN_OFFSET] == FROZEN_FLAG;
    let major = data[VERSION_OFFSET];
    let minor = data[VERSION_OFFSET + 1];
    if major > MAX_MAJOR_VERSION {
        return Err(Error::invalid(format!(
            "unsupported container version {major}.{minor}"
        )));
    }
    Ok(((major, minor), frozen))
}

/// Buffered little-endian output stream with position tracking.
pub struct OStream {
    writer: BufWriter<File>,
    pos: u64,
}

impl OStream {
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        Ok(Self {
            writer: BufWriter::with_capacity(2 * 1024 * 1024, file),
            pos: 0,
        })
    }

    /// Current write position.
    #[inline]
    pub fn pos(&self) -> u64 {
        self.pos
    }

    pub fn write_bytes(&mut self, data: &[u8]) -> Result<()> {
        self.writer.write_all(data)?;
        self.pos += data.len() as u64;
        Ok(())
    }

    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        self.writer.write_u8(value)?;
        self.pos += 1;
        Ok(())
    }

    pub fn write_u32(&mut self, value: u32) -> Result<()> {
        self.writer.write_u32::<LittleEndian>(value)?;
        self.pos += 4;
        Ok(())
    }

    pub fn write_i32(&mut self, value: i32) -> Result<()> {
        self.writer.write_i32::<LittleEndian>(value)?;
        self.pos += 4;
        Ok(())
    }

    pub fn write_u64(&mut self, value: u64) -> Result<()> {
        self.writer.write_u64::<LittleEndian>(value)?;
        self.pos += 8;
        Ok(())
    }

    pub fn write_f64(&mut self, value: f64) -> Result<()> {
        self.writer.write_f64::<LittleEndian>(value)?;
        self.pos += 8;
        Ok(())
    }

    /// Flush and reposition (used for the final header fix-up).
    pub fn seek(&mut self, pos: u64) -> Result<()> {
        self.writer.flush()?;
        self.pos = self.writer.seek(SeekFrom::Start(pos))?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_parsing() {
        let mut header = [0u8; HEADER_SIZE];
        header[0..5].copy_from_slice(MAGIC);
        header[FROZEN_OFFSET] = FROZEN_FLAG;
        header[VERSION_OFFSET] = 0;
        header[VERSION_OFFSET + 1] = 1;

        let ((major, minor), frozen) = parse_header(&header).unwrap();
        assert_eq!((major, minor), (0, 1));
        assert!(frozen);
    }

    #[test]
    fn bad_magic_rejected() {
        let header = [0u8; HEADER_SIZE];
        assert!(matches!(
            parse_header(&header),
            Err(Error::InvalidArchive(_))
        ));
    }

    #[test]
    fn newer_major_rejected() {
        let mut header = [0u8; HEADER_SIZE];
        header[0..5].copy_from_slice(MAGIC);
        header[VERSION_OFFSET] = 9;
        assert!(matches!(
            parse_header(&header),
            Err(Error::InvalidArchive(_))
        ));
    }
}
