//! Backend traits.
//!
//! The seam between the abstract model and the storage containers. Reader
//! traits are implemented per backend and consumed by the `abc` handles;
//! the single [`ArchiveSink`] trait receives the finished staging tree on
//! close. Nothing above this module knows container internals.

use std::sync::Arc;

use super::{
    ArchiveStaging, MetaData, ObjectHeader, PropertyHeader, SampleDigest, TimeSampling,
};
use crate::util::Result;

/// The concrete container of an archive. Chosen per archive at creation and
/// never mixed within one file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ArchiveKind {
    /// Chunked binary layout, memory-mapped lock-free reads.
    Ogawa,
    /// HDF5 group/dataset mapping (requires the `hdf5` feature).
    Hdf5,
}

impl ArchiveKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ogawa => "Ogawa",
            Self::Hdf5 => "HDF5",
        }
    }
}

/// Read access to an opened archive.
///
/// Implementations are immutable after open (apart from internal caches) and
/// safe to share across threads.
pub trait ArchiveReader: Send + Sync {
    /// Path the archive was opened from.
    fn name(&self) -> &str;

    fn kind(&self) -> ArchiveKind;

    fn num_time_samplings(&self) -> usize;

    fn time_sampling(&self, index: usize) -> Option<Arc<TimeSampling>>;

    /// Highest sample count appended against the given time sampling, when
    /// the container recorded that summary.
    fn max_num_samples(&self, ts_index: usize) -> Option<usize>;

    /// Application name, write date, description and similar stamps.
    fn archive_metadata(&self) -> &MetaData;

    /// The top object.
    fn root(self: Arc<Self>) -> Arc<dyn ObjectReader>;
}

/// Read access to one object node.
pub trait ObjectReader: Send + Sync {
    fn header(&self) -> &ObjectHeader;

    /// The owning object, `None` for the root. Readers hold a reference
    /// chain toward the root, so this is navigation, not ownership.
    fn parent(&self) -> Option<Arc<dyn ObjectReader>>;

    fn num_children(&self) -> usize;

    /// Header of the child at `index` without materializing a reader.
    fn child_header(&self, index: usize) -> Result<&ObjectHeader>;

    /// Position of the named child, if present.
    fn child_index(&self, name: &str) -> Option<usize>;

    fn child(self: Arc<Self>, index: usize) -> Result<Arc<dyn ObjectReader>>;

    /// The object's top compound property.
    fn properties(self: Arc<Self>) -> Result<Arc<dyn CompoundPropertyReader>>;
}

/// Read access common to all property variants.
pub trait PropertyReader: Send + Sync {
    fn header(&self) -> &PropertyHeader;

    /// The compound that owns this property; `None` for an object's top
    /// compound. Navigation only - parents never own their readers.
    fn parent(&self) -> Option<Arc<dyn CompoundPropertyReader>>;

    /// The object whose property tree holds this property.
    fn object(&self) -> Arc<dyn ObjectReader>;

    /// The sampling this property's samples are indexed against.
    fn time_sampling(&self) -> Arc<TimeSampling>;

    fn into_scalar(self: Arc<Self>) -> Option<Arc<dyn ScalarPropertyReader>> {
        None
    }

    fn into_array(self: Arc<Self>) -> Option<Arc<dyn ArrayPropertyReader>> {
        None
    }

    fn into_compound(self: Arc<Self>) -> Option<Arc<dyn CompoundPropertyReader>> {
        None
    }
}

/// Read access to a scalar property.
pub trait ScalarPropertyReader: PropertyReader {
    fn num_samples(&self) -> usize;

    /// True iff a single distinct value stands in for every logical sample.
    fn is_constant(&self) -> bool;

    /// Payload of the sample at `index`; `IndexOutOfRange` past the count.
    fn sample_bytes(&self, index: usize) -> Result<Vec<u8>>;
}

/// Read access to an array property.
pub trait ArrayPropertyReader: PropertyReader {
    fn num_samples(&self) -> usize;

    fn is_constant(&self) -> bool;

    /// Element count of the sample at `index`.
    fn sample_len(&self, index: usize) -> Result<usize>;

    fn sample_bytes(&self, index: usize) -> Result<Vec<u8>>;

    /// The stored 16-byte content digest of the sample.
    fn sample_key(&self, index: usize) -> Result<SampleDigest>;

    /// Stored dimensions; `[len]` for ordinary one-dimensional samples.
    fn sample_dimensions(&self, index: usize) -> Result<Vec<u64>>;
}

/// Read access to a compound property.
pub trait CompoundPropertyReader: PropertyReader {
    fn num_properties(&self) -> usize;

    /// Child header at `index`, in creation order.
    fn property_header(&self, index: usize) -> Result<&PropertyHeader>;

    /// Position of the named child, if present.
    fn property_index(&self, name: &str) -> Option<usize>;

    fn property(self: Arc<Self>, index: usize) -> Result<Arc<dyn PropertyReader>>;
}

/// Write access to a container: receives the complete staged tree exactly
/// once, on archive close.
pub trait ArchiveSink: Send {
    /// Serialize the staged archive and seal the file. After a failure the
    /// file must be considered unusable; the sink will not be called again.
    fn commit(&mut self, staging: &ArchiveStaging) -> Result<()>;

    fn kind(&self) -> ArchiveKind;
}
