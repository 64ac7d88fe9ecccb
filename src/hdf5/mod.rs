//! HDF5 container mapping (behind the `hdf5` cargo feature).
//!
//! Objects and compound properties map to HDF5 groups, samples to byte
//! datasets, metadata and catalogue ordering to attributes. The mapping
//! favors clarity over density; it exists for interchange with HDF5
//! tooling, not for raw speed.
//!
//! libhdf5 serializes access internally, so reads are thread-safe but do
//! not scale across cores the way the Ogawa mapping does. This container
//! also stores no per-sampling max-sample summary; archive time-range
//! queries take the tree-walk fallback.

mod reader;
mod writer;

pub use reader::Hdf5ArchiveReader;
pub use writer::Hdf5Sink;

use crate::util::Error;

/// Group holding the time sampling table.
pub(crate) const SAMPLINGS_GROUP: &str = ".samplings";
/// Group holding an object's property compound.
pub(crate) const PROPERTIES_GROUP: &str = ".props";
/// Root object group name.
pub(crate) const ROOT_GROUP: &str = "ABC";

/// Attribute names.
pub(crate) mod attr {
    pub const FILE_VERSION: &str = "abcio_file_version";
    pub const LIBRARY_VERSION: &str = "abcio_library_version";
    pub const ARCHIVE_META: &str = "abcio_metadata";
    pub const META: &str = "meta";
    pub const ORDER: &str = "order";
    pub const PTYPE: &str = "ptype";
    pub const POD: &str = "pod";
    pub const EXTENT: &str = "extent";
    pub const TSIDX: &str = "tsidx";
    pub const NUM_SAMPLES: &str = "nsamples";
    pub const FIRST_CHANGED: &str = "first";
    pub const LAST_CHANGED: &str = "last";
    pub const DIMS: &str = "dims";
    pub const KEY: &str = "key";
    pub const TIME_PER_CYCLE: &str = "tpc";
}

/// Property type discriminants stored in [`attr::PTYPE`].
pub(crate) const PTYPE_SCALAR: u8 = 1;
pub(crate) const PTYPE_ARRAY: u8 = 2;
pub(crate) const PTYPE_COMPOUND: u8 = 0;

impl From<hdf5::Error> for Error {
    fn from(e: hdf5::Error) -> Self {
        Error::ArchiveIo(format!("hdf5: {e}"))
    }
}
