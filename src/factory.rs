//! Container detection and open-by-path.
//!
//! Every container announces itself in its first bytes: HDF5 files carry the
//! 8-byte format signature, Ogawa files the `Ogawa` token. Opening goes
//! through here so callers never name a backend unless they want to.

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::core::ArchiveReader;
use crate::ogawa::OgawaArchiveReader;
use crate::util::{Error, Result};

pub use crate::core::ArchiveKind;

/// HDF5 format signature.
pub const HDF5_MAGIC: [u8; 8] = [0x89, b'H', b'D', b'F', b'\r', b'\n', 0x1a, b'\n'];

/// Sniff the container kind from the file's magic bytes.
pub fn detect(path: impl AsRef<Path>) -> Result<ArchiveKind> {
    let path = path.as_ref();
    let mut file = File::open(path)
        .map_err(|e| Error::InvalidArchive(format!("cannot open {}: {e}", path.display())))?;

    let mut magic = [0u8; 8];
    let n = file.read(&mut magic)?;

    if n >= 8 && magic == HDF5_MAGIC {
        return Ok(ArchiveKind::Hdf5);
    }
    if n >= 5 && &magic[..5] == crate::ogawa::format::MAGIC {
        return Ok(ArchiveKind::Ogawa);
    }
    Err(Error::invalid(format!(
        "{} is not a recognized archive container",
        path.display()
    )))
}

/// Open an archive with auto-detected container.
pub fn open(path: impl AsRef<Path>) -> Result<Arc<dyn ArchiveReader>> {
    let path = path.as_ref();
    let kind = detect(path)?;
    debug!(path = %path.display(), kind = kind.name(), "detected archive container");
    open_kind(path, kind)
}

/// Open an archive with an explicit container kind.
pub fn open_kind(path: impl AsRef<Path>, kind: ArchiveKind) -> Result<Arc<dyn ArchiveReader>> {
    match kind {
        ArchiveKind::Ogawa => Ok(OgawaArchiveReader::open(path)?),
        #[cfg(feature = "hdf5")]
        ArchiveKind::Hdf5 => Ok(crate::hdf5::Hdf5ArchiveReader::open(path)?),
        #[cfg(not(feature = "hdf5"))]
        ArchiveKind::Hdf5 => Err(Error::invalid(
            "HDF5 archive, but this build has no HDF5 support (enable the `hdf5` feature)",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn detects_ogawa_magic() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"Ogawa\x00\x00\x01garbage").unwrap();
        assert_eq!(detect(tmp.path()).unwrap(), ArchiveKind::Ogawa);
    }

    #[test]
    fn detects_hdf5_magic() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(&HDF5_MAGIC).unwrap();
        tmp.write_all(b"rest").unwrap();
        assert_eq!(detect(tmp.path()).unwrap(), ArchiveKind::Hdf5);
    }

    #[test]
    fn rejects_unknown_magic() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"not an archive at all").unwrap();
        assert!(matches!(
            detect(tmp.path()),
            Err(Error::InvalidArchive(_))
        ));
    }

    #[test]
    fn rejects_missing_file() {
        assert!(matches!(
            detect("/no/such/file.abc"),
            Err(Error::InvalidArchive(_))
        ));
    }
}
