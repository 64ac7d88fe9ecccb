//! Core layer - the abstract archive model.
//!
//! Everything above the storage backends lives here:
//! - [`TimeSampling`] - sample-index-to-time mapping
//! - [`MetaData`] - key/value schema tags and hints
//! - [`ObjectHeader`] / [`PropertyHeader`] - self-describing entity headers
//! - [`SampleSelector`] - sample selection by index or time
//! - [`ArchiveStaging`] - the write-side staging tree
//! - reader/sink traits implemented by the concrete backends

mod time_sampling;
mod metadata;
mod header;
mod sample;
mod digest;
mod staging;
mod traits;

pub use time_sampling::{TimeSampling, TimeSamplingKind};
pub use metadata::MetaData;
pub use header::{ObjectHeader, PropertyHeader, PropertyType};
pub use sample::{SampleSelector, GeometryScope};
pub use digest::{SampleDigest, compute_digest, ReadSampleCache, SampleKey};
pub use staging::{
    ArchiveStaging, StagedObject, StagedProperty, StagedPropertyData,
    ScalarSamples, ArraySamples, StagedArraySample, ObjId, PropId, ROOT_OBJECT,
};
pub use traits::{
    ArchiveKind, ArchiveReader, ObjectReader, PropertyReader,
    ScalarPropertyReader, ArrayPropertyReader, CompoundPropertyReader,
    ArchiveSink,
};
