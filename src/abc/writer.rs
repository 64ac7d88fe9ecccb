//! Writer archive and staging handles.
//!
//! One archive owns one staging tree behind a mutex; handles are slab
//! indices into it. Every mutation validates under the lock and either
//! fully applies or leaves the staging untouched. Writing is meant to be
//! driven by a single producer - the lock provides soundness, not parallel
//! speed-up.

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::error;

use crate::core::{
    ArchiveKind, ArchiveSink, ArchiveStaging, MetaData, ObjId, PropId, PropertyHeader,
    PropertyType, TimeSampling, ROOT_OBJECT,
};
use crate::ogawa::OgawaSink;
use crate::util::{DataType, Error, PodValue, Result};

use super::{APPLICATION_KEY, DATE_WRITTEN_KEY, DESCRIPTION_KEY, LIBRARY_VERSION_KEY};

/// Optional stamps recorded in the archive metadata at creation.
#[derive(Clone, Debug, Default)]
pub struct WriteOptions {
    pub app_name: Option<String>,
    pub user_description: Option<String>,
}

struct WriterInner {
    name: String,
    /// `None` once the archive is closed; every handle checks.
    staging: Mutex<Option<ArchiveStaging>>,
    sink: Mutex<Option<Box<dyn ArchiveSink>>>,
}

impl WriterInner {
    fn with<R>(&self, f: impl FnOnce(&mut ArchiveStaging) -> Result<R>) -> Result<R> {
        let mut guard = self.staging.lock();
        let staging = guard
            .as_mut()
            .ok_or_else(|| Error::state("archive is closed"))?;
        f(staging)
    }

    fn commit(&self) -> Result<()> {
        let staging = self
            .staging
            .lock()
            .take()
            .ok_or_else(|| Error::state("archive is closed"))?;
        let mut sink = self
            .sink
            .lock()
            .take()
            .ok_or_else(|| Error::state("archive sink already consumed"))?;
        sink.commit(&staging)
    }
}

impl Drop for WriterInner {
    fn drop(&mut self) {
        // A writer that was never closed still commits, releasing the file
        // handle either way; the error can only be reported by log here.
        if self.staging.get_mut().is_some() {
            if let Err(e) = self.commit() {
                error!(archive = %self.name, "commit on drop failed: {e}");
            }
        }
    }
}

/// An archive opened for writing.
///
/// Grows monotonically - objects, properties and samples are only ever
/// appended - until [`close`](Self::close) commits the staged tree through
/// the backend sink and seals the file. Handles of a closed archive fail
/// with `InvalidState`.
#[derive(Clone)]
pub struct OArchive {
    inner: Arc<WriterInner>,
}

impl OArchive {
    /// Create an Ogawa archive at `path`.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        Self::create_kind(path, ArchiveKind::Ogawa, WriteOptions::default())
    }

    /// Create an archive with an explicit container kind.
    pub fn create_kind(
        path: impl AsRef<Path>,
        kind: ArchiveKind,
        options: WriteOptions,
    ) -> Result<Self> {
        let sink: Box<dyn ArchiveSink> = match kind {
            ArchiveKind::Ogawa => Box::new(OgawaSink::new(&path)?),
            #[cfg(feature = "hdf5")]
            ArchiveKind::Hdf5 => Box::new(crate::hdf5::Hdf5Sink::new(&path)?),
            #[cfg(not(feature = "hdf5"))]
            ArchiveKind::Hdf5 => {
                return Err(Error::invalid(
                    "this build has no HDF5 support (enable the `hdf5` feature)",
                ))
            }
        };

        let mut staging = ArchiveStaging::new();
        if let Some(app) = &options.app_name {
            staging.archive_metadata.set(APPLICATION_KEY, app);
        }
        if let Some(desc) = &options.user_description {
            staging.archive_metadata.set(DESCRIPTION_KEY, desc);
        }
        staging
            .archive_metadata
            .set(DATE_WRITTEN_KEY, chrono::Utc::now().to_rfc2822());
        staging.archive_metadata.set(
            LIBRARY_VERSION_KEY,
            concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION")),
        );

        Ok(Self {
            inner: Arc::new(WriterInner {
                name: path.as_ref().to_string_lossy().into_owned(),
                staging: Mutex::new(Some(staging)),
                sink: Mutex::new(Some(sink)),
            }),
        })
    }

    /// Path the archive is being written to.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Register a time sampling for use by properties, deduplicating
    /// against equivalent entries. Index 0 is always the identity sampling.
    pub fn add_time_sampling(&self, ts: TimeSampling) -> Result<u32> {
        self.inner.with(|staging| Ok(staging.add_time_sampling(ts)))
    }

    pub fn num_time_samplings(&self) -> Result<usize> {
        self.inner.with(|staging| Ok(staging.time_samplings.len()))
    }

    pub fn time_sampling(&self, index: u32) -> Result<Arc<TimeSampling>> {
        self.inner.with(|staging| {
            staging
                .time_samplings
                .get(index as usize)
                .cloned()
                .ok_or(Error::IndexOutOfRange {
                    index: index as usize,
                    count: staging.time_samplings.len(),
                })
        })
    }

    /// The implicit top object.
    pub fn top(&self) -> OObject {
        OObject {
            inner: self.inner.clone(),
            id: ROOT_OBJECT,
        }
    }

    /// Commit the staged tree and seal the file.
    ///
    /// After a failed close the archive must be considered unusable; no
    /// further writes are possible either way.
    pub fn close(self) -> Result<()> {
        self.inner.commit()
    }
}

/// An object handle on a writer archive.
#[derive(Clone)]
pub struct OObject {
    inner: Arc<WriterInner>,
    id: ObjId,
}

impl std::fmt::Debug for OObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OObject").field("id", &self.id).finish()
    }
}

impl OObject {
    pub fn name(&self) -> Result<String> {
        self.inner
            .with(|staging| Ok(staging.object(self.id).header.name.clone()))
    }

    pub fn full_name(&self) -> Result<String> {
        self.inner
            .with(|staging| Ok(staging.object(self.id).header.full_name.clone()))
    }

    /// Append a child object.
    pub fn create_child(&self, name: &str) -> Result<OObject> {
        self.create_child_with(name, MetaData::new())
    }

    /// Append a child object carrying metadata (schema tags and hints).
    pub fn create_child_with(&self, name: &str, meta: MetaData) -> Result<OObject> {
        let id = self
            .inner
            .with(|staging| staging.create_child(self.id, name, meta))?;
        Ok(OObject {
            inner: self.inner.clone(),
            id,
        })
    }

    pub fn num_children(&self) -> Result<usize> {
        self.inner
            .with(|staging| Ok(staging.object(self.id).children.len()))
    }

    /// Handle to an already created child, if present.
    pub fn child_by_name(&self, name: &str) -> Option<OObject> {
        let id = self
            .inner
            .with(|staging| {
                Ok(staging
                    .object(self.id)
                    .children
                    .iter()
                    .copied()
                    .find(|&c| staging.object(c).header.name == name))
            })
            .ok()
            .flatten()?;
        Some(OObject {
            inner: self.inner.clone(),
            id,
        })
    }

    /// The object's top compound property.
    pub fn properties(&self) -> OCompoundProperty {
        // the compound is created with the object, so the id is stable
        let id = self
            .inner
            .with(|staging| Ok(staging.object(self.id).properties))
            .unwrap_or(0);
        OCompoundProperty {
            inner: self.inner.clone(),
            id,
        }
    }
}

/// A compound property handle on a writer archive.
#[derive(Clone)]
pub struct OCompoundProperty {
    inner: Arc<WriterInner>,
    id: PropId,
}

impl OCompoundProperty {
    /// Append a scalar child property.
    pub fn create_scalar(&self, name: &str, data_type: DataType) -> Result<OScalarProperty> {
        self.create_scalar_with(PropertyHeader::scalar(name, data_type))
    }

    /// Append a scalar child property from a full header (time sampling,
    /// metadata).
    pub fn create_scalar_with(&self, header: PropertyHeader) -> Result<OScalarProperty> {
        if !header.is_scalar() {
            return Err(Error::type_mismatch("scalar header", "other"));
        }
        let id = self
            .inner
            .with(|staging| staging.create_property(self.id, header))?;
        Ok(OScalarProperty {
            inner: self.inner.clone(),
            id,
        })
    }

    /// Append an array child property.
    pub fn create_array(&self, name: &str, data_type: DataType) -> Result<OArrayProperty> {
        self.create_array_with(PropertyHeader::array(name, data_type))
    }

    /// Append an array child property from a full header.
    pub fn create_array_with(&self, header: PropertyHeader) -> Result<OArrayProperty> {
        if !header.is_array() {
            return Err(Error::type_mismatch("array header", "other"));
        }
        let id = self
            .inner
            .with(|staging| staging.create_property(self.id, header))?;
        Ok(OArrayProperty {
            inner: self.inner.clone(),
            id,
        })
    }

    /// Append a compound child property.
    pub fn create_compound(&self, name: &str) -> Result<OCompoundProperty> {
        self.create_compound_with(PropertyHeader::compound(name))
    }

    /// Append a compound child property from a full header.
    pub fn create_compound_with(&self, header: PropertyHeader) -> Result<OCompoundProperty> {
        if !header.is_compound() {
            return Err(Error::type_mismatch("compound header", "other"));
        }
        let id = self
            .inner
            .with(|staging| staging.create_property(self.id, header))?;
        Ok(OCompoundProperty {
            inner: self.inner.clone(),
            id,
        })
    }

    pub fn num_properties(&self) -> Result<usize> {
        self.inner.with(|staging| {
            match &staging.property(self.id).data {
                crate::core::StagedPropertyData::Compound { children, .. } => Ok(children.len()),
                _ => Ok(0),
            }
        })
    }

    pub fn has_property(&self, name: &str) -> bool {
        self.child_id(name).is_some()
    }

    /// Handle to an already created scalar child, if present and scalar.
    pub fn find_scalar(&self, name: &str) -> Option<OScalarProperty> {
        let id = self.child_id(name)?;
        self.is_kind(id, PropertyType::Scalar).then(|| OScalarProperty {
            inner: self.inner.clone(),
            id,
        })
    }

    /// Handle to an already created array child, if present and an array.
    pub fn find_array(&self, name: &str) -> Option<OArrayProperty> {
        let id = self.child_id(name)?;
        self.is_kind(id, PropertyType::Array).then(|| OArrayProperty {
            inner: self.inner.clone(),
            id,
        })
    }

    /// Handle to an already created compound child, if present and compound.
    pub fn find_compound(&self, name: &str) -> Option<OCompoundProperty> {
        let id = self.child_id(name)?;
        self.is_kind(id, PropertyType::Compound)
            .then(|| OCompoundProperty {
                inner: self.inner.clone(),
                id,
            })
    }

    fn child_id(&self, name: &str) -> Option<PropId> {
        self.inner
            .with(|staging| {
                Ok(match &staging.property(self.id).data {
                    crate::core::StagedPropertyData::Compound { by_name, .. } => {
                        by_name.get(name).copied()
                    }
                    _ => None,
                })
            })
            .ok()
            .flatten()
    }

    fn is_kind(&self, id: PropId, kind: PropertyType) -> bool {
        self.inner
            .with(|staging| Ok(staging.property(id).header.property_type == kind))
            .unwrap_or(false)
    }
}

/// A scalar property handle on a writer archive.
#[derive(Clone)]
pub struct OScalarProperty {
    inner: Arc<WriterInner>,
    id: PropId,
}

impl OScalarProperty {
    pub fn data_type(&self) -> Result<DataType> {
        self.inner
            .with(|staging| Ok(staging.property(self.id).header.data_type))
    }

    /// Append one sample from raw bytes; the length must match the
    /// property's data type.
    pub fn add_sample(&self, bytes: &[u8]) -> Result<usize> {
        self.inner
            .with(|staging| staging.add_scalar_sample(self.id, bytes))
    }

    /// Append one sample from a typed value. The value's byte length must
    /// match the property's data type; for single-element properties the
    /// POD kind is checked as well.
    pub fn add_typed<T: bytemuck::NoUninit>(&self, value: &T) -> Result<usize> {
        self.add_sample(bytemuck::bytes_of(value))
    }

    /// Append one sample from a single POD element, kind-checked.
    pub fn add_pod<T: PodValue>(&self, value: &T) -> Result<usize> {
        let dt = self.data_type()?;
        if dt.pod != T::KIND || dt.extent != 1 {
            return Err(Error::type_mismatch(dt, T::KIND.name()));
        }
        self.add_typed(value)
    }

    /// Append one string sample (string kinds only).
    pub fn add_string(&self, value: &str) -> Result<usize> {
        let dt = self.data_type()?;
        if !dt.pod.is_string() {
            return Err(Error::type_mismatch(dt, "string"));
        }
        let mut bytes = value.as_bytes().to_vec();
        bytes.push(0);
        self.add_sample(&bytes)
    }

    pub fn num_samples(&self) -> Result<usize> {
        self.inner
            .with(|staging| Ok(staging.property(self.id).num_samples()))
    }
}

/// An array property handle on a writer archive.
#[derive(Clone)]
pub struct OArrayProperty {
    inner: Arc<WriterInner>,
    id: PropId,
}

impl std::fmt::Debug for OArrayProperty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OArrayProperty")
            .field("id", &self.id)
            .finish()
    }
}

impl OArrayProperty {
    pub fn data_type(&self) -> Result<DataType> {
        self.inner
            .with(|staging| Ok(staging.property(self.id).header.data_type))
    }

    /// Append one sample from raw bytes with optional explicit dimensions;
    /// rank-1 dimensions are inferred when omitted.
    pub fn add_sample(&self, bytes: &[u8], dims: Option<&[u64]>) -> Result<usize> {
        self.inner
            .with(|staging| staging.add_array_sample(self.id, bytes, dims))
    }

    /// Append one sample from a typed slice, kind-checked. The element
    /// count must be a multiple of the data type's extent.
    pub fn add_typed<T: PodValue>(&self, values: &[T]) -> Result<usize> {
        let dt = self.data_type()?;
        if dt.pod != T::KIND {
            return Err(Error::type_mismatch(dt, T::KIND.name()));
        }
        if dt.extent == 0 || values.len() % dt.extent as usize != 0 {
            return Err(Error::type_mismatch(
                format!("multiple of {} elements", dt.extent),
                values.len().to_string(),
            ));
        }
        let elements = (values.len() / dt.extent as usize) as u64;
        self.add_sample(bytemuck::cast_slice(values), Some(&[elements]))
    }

    /// Append one sample of NUL-terminated strings (string kinds only).
    pub fn add_strings(&self, values: &[String]) -> Result<usize> {
        let dt = self.data_type()?;
        if !dt.pod.is_string() {
            return Err(Error::type_mismatch(dt, "string array"));
        }
        let mut bytes = Vec::new();
        for v in values {
            bytes.extend_from_slice(v.as_bytes());
            bytes.push(0);
        }
        self.add_sample(&bytes, Some(&[values.len() as u64]))
    }

    pub fn num_samples(&self) -> Result<usize> {
        self.inner
            .with(|staging| Ok(staging.property(self.id).num_samples()))
    }
}
