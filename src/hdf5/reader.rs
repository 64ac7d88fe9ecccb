//! Concrete reader stack for the HDF5 container.

use std::path::Path;
use std::sync::Arc;

use hdf5::types::VarLenUnicode;
use hdf5::Group;
use tracing::debug;

use super::{attr, PROPERTIES_GROUP, PTYPE_ARRAY, PTYPE_COMPOUND, PTYPE_SCALAR, ROOT_GROUP,
    SAMPLINGS_GROUP};
use crate::core::{
    ArchiveKind, ArchiveReader, ArrayPropertyReader, CompoundPropertyReader, MetaData,
    ObjectHeader, ObjectReader, PropertyHeader, PropertyReader, PropertyType, SampleDigest,
    ScalarPropertyReader, TimeSampling,
};
use crate::ogawa::layout::ACYCLIC_TIME_PER_CYCLE;
use crate::util::{Error, Result};

/// Immutable state shared by every reader of one archive.
struct ArchiveCore {
    time_samplings: Vec<Arc<TimeSampling>>,
}

impl ArchiveCore {
    fn sampling(&self, index: u32) -> Arc<TimeSampling> {
        self.time_samplings
            .get(index as usize)
            .cloned()
            .unwrap_or_else(|| Arc::new(TimeSampling::identity()))
    }
}

/// Archive reader for the HDF5 container.
pub struct Hdf5ArchiveReader {
    name: String,
    #[allow(dead_code)]
    file: hdf5::File,
    core: Arc<ArchiveCore>,
    archive_metadata: MetaData,
    root: Arc<Hdf5ObjectReader>,
}

impl Hdf5ArchiveReader {
    /// Open and validate an archive.
    pub fn open(path: impl AsRef<Path>) -> Result<Arc<Self>> {
        let path = path.as_ref();
        let name = path.to_string_lossy().into_owned();
        let file = hdf5::File::open(path)
            .map_err(|e| Error::invalid(format!("cannot open {}: {e}", path.display())))?;

        let file_version = read_i32_attr(&file, attr::FILE_VERSION)
            .ok_or_else(|| Error::invalid("not an archive: missing file version attribute"))?;
        if file_version > crate::ogawa::layout::FILE_VERSION {
            return Err(Error::invalid(format!(
                "unsupported file version {file_version}"
            )));
        }

        let archive_metadata = MetaData::parse(&read_str_attr(&file, attr::ARCHIVE_META));

        let samplings_group = file
            .group(SAMPLINGS_GROUP)
            .map_err(|_| Error::invalid("not an archive: missing sampling table"))?;
        let time_samplings = read_samplings(&samplings_group)?;

        debug!(archive = %name, samplings = time_samplings.len(), "opened hdf5 archive");

        let core = Arc::new(ArchiveCore { time_samplings });

        let root_group = file
            .group(ROOT_GROUP)
            .map_err(|_| Error::invalid("not an archive: missing root object"))?;
        let root = Arc::new(Hdf5ObjectReader::load(
            core.clone(),
            root_group,
            ObjectHeader::new("ABC", "/"),
            None,
        )?);

        Ok(Arc::new(Self {
            name,
            file,
            core,
            archive_metadata,
            root,
        }))
    }
}

impl ArchiveReader for Hdf5ArchiveReader {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ArchiveKind {
        ArchiveKind::Hdf5
    }

    fn num_time_samplings(&self) -> usize {
        self.core.time_samplings.len()
    }

    fn time_sampling(&self, index: usize) -> Option<Arc<TimeSampling>> {
        self.core.time_samplings.get(index).cloned()
    }

    fn max_num_samples(&self, _ts_index: usize) -> Option<usize> {
        // this container stores no max-sample summary
        None
    }

    fn archive_metadata(&self) -> &MetaData {
        &self.archive_metadata
    }

    fn root(self: Arc<Self>) -> Arc<dyn ObjectReader> {
        self.root.clone()
    }
}

fn read_samplings(group: &Group) -> Result<Vec<Arc<TimeSampling>>> {
    let mut samplings = Vec::new();
    for i in 0.. {
        let Ok(ds) = group.dataset(&format!("times{i}")) else {
            break;
        };
        let times = ds.read_raw::<f64>()?;
        let tpc = ds
            .attr(attr::TIME_PER_CYCLE)
            .and_then(|a| a.read_scalar::<f64>())
            .map_err(|e| Error::io(format!("sampling {i} has no cycle duration: {e}")))?;

        let ts = if tpc == ACYCLIC_TIME_PER_CYCLE {
            TimeSampling::acyclic(times)
        } else if times.len() == 1 {
            TimeSampling::uniform(tpc, times[0])
        } else {
            TimeSampling::cyclic(tpc, times)
        };
        samplings.push(Arc::new(ts));
    }
    if samplings.is_empty() {
        return Err(Error::invalid("empty time sampling table"));
    }
    Ok(samplings)
}

// ---------------------------------------------------------------------------
// Objects
// ---------------------------------------------------------------------------

struct Hdf5ObjectReader {
    core: Arc<ArchiveCore>,
    header: ObjectHeader,
    parent: Option<Arc<dyn ObjectReader>>,
    group: Group,
    child_names: Vec<String>,
    child_headers: Vec<ObjectHeader>,
}

impl Hdf5ObjectReader {
    fn load(
        core: Arc<ArchiveCore>,
        group: Group,
        header: ObjectHeader,
        parent: Option<Arc<dyn ObjectReader>>,
    ) -> Result<Self> {
        let child_names: Vec<String> =
            serde_json::from_str(&read_str_attr(&group, attr::ORDER)).unwrap_or_default();

        let child_headers = child_names
            .iter()
            .map(|name| {
                let full = if header.full_name == "/" {
                    format!("/{name}")
                } else {
                    format!("{}/{name}", header.full_name)
                };
                let meta = group
                    .group(name)
                    .map(|g| MetaData::parse(&read_str_attr(&g, attr::META)))
                    .unwrap_or_default();
                ObjectHeader::new(name.clone(), full).with_meta_data(meta)
            })
            .collect();

        Ok(Self {
            core,
            header,
            parent,
            group,
            child_names,
            child_headers,
        })
    }
}

impl ObjectReader for Hdf5ObjectReader {
    fn header(&self) -> &ObjectHeader {
        &self.header
    }

    fn parent(&self) -> Option<Arc<dyn ObjectReader>> {
        self.parent.clone()
    }

    fn num_children(&self) -> usize {
        self.child_names.len()
    }

    fn child_header(&self, index: usize) -> Result<&ObjectHeader> {
        self.child_headers.get(index).ok_or(Error::IndexOutOfRange {
            index,
            count: self.child_headers.len(),
        })
    }

    fn child_index(&self, name: &str) -> Option<usize> {
        self.child_names.iter().position(|n| n == name)
    }

    fn child(self: Arc<Self>, index: usize) -> Result<Arc<dyn ObjectReader>> {
        let header = self.child_header(index)?.clone();
        let child_group = self.group.group(&header.name)?;
        let core = self.core.clone();
        let parent: Arc<dyn ObjectReader> = self;
        Ok(Arc::new(Hdf5ObjectReader::load(
            core,
            child_group,
            header,
            Some(parent),
        )?))
    }

    fn properties(self: Arc<Self>) -> Result<Arc<dyn CompoundPropertyReader>> {
        let props_group = self.group.group(PROPERTIES_GROUP).map_err(|e| {
            Error::io(format!(
                "object {} has no properties compound: {e}",
                self.header.full_name
            ))
        })?;
        let core = self.core.clone();
        let object: Arc<dyn ObjectReader> = self;
        Ok(Arc::new(Hdf5CompoundReader::load(
            core,
            props_group,
            PropertyHeader::compound(""),
            object,
            None,
        )?))
    }
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

struct Hdf5CompoundReader {
    core: Arc<ArchiveCore>,
    header: PropertyHeader,
    group: Group,
    child_names: Vec<String>,
    child_headers: Vec<PropertyHeader>,
    object: Arc<dyn ObjectReader>,
    parent: Option<Arc<dyn CompoundPropertyReader>>,
}

impl Hdf5CompoundReader {
    fn load(
        core: Arc<ArchiveCore>,
        group: Group,
        header: PropertyHeader,
        object: Arc<dyn ObjectReader>,
        parent: Option<Arc<dyn CompoundPropertyReader>>,
    ) -> Result<Self> {
        let child_names: Vec<String> =
            serde_json::from_str(&read_str_attr(&group, attr::ORDER)).unwrap_or_default();

        let mut child_headers = Vec::with_capacity(child_names.len());
        for name in &child_names {
            let child = group.group(name)?;
            let meta = MetaData::parse(&read_str_attr(&child, attr::META));
            let ptype = read_u8_attr(&child, attr::PTYPE).unwrap_or(PTYPE_COMPOUND);
            let header = match ptype {
                PTYPE_SCALAR | PTYPE_ARRAY => {
                    let pod = crate::util::PodKind::from_u8(
                        read_u8_attr(&child, attr::POD).unwrap_or(127),
                    );
                    let extent = read_u8_attr(&child, attr::EXTENT).unwrap_or(0);
                    let tsidx = read_u32_attr(&child, attr::TSIDX).unwrap_or(0);
                    PropertyHeader {
                        name: name.clone(),
                        property_type: if ptype == PTYPE_SCALAR {
                            PropertyType::Scalar
                        } else {
                            PropertyType::Array
                        },
                        data_type: crate::util::DataType::new(pod, extent),
                        time_sampling_index: tsidx,
                        meta_data: meta,
                    }
                }
                _ => PropertyHeader::compound(name.clone()).with_meta_data(meta),
            };
            child_headers.push(header);
        }

        Ok(Self {
            core,
            header,
            group,
            child_names,
            child_headers,
            object,
            parent,
        })
    }
}

impl PropertyReader for Hdf5CompoundReader {
    fn header(&self) -> &PropertyHeader {
        &self.header
    }

    fn parent(&self) -> Option<Arc<dyn CompoundPropertyReader>> {
        self.parent.clone()
    }

    fn object(&self) -> Arc<dyn ObjectReader> {
        self.object.clone()
    }

    fn time_sampling(&self) -> Arc<TimeSampling> {
        self.core.sampling(0)
    }

    fn into_compound(self: Arc<Self>) -> Option<Arc<dyn CompoundPropertyReader>> {
        Some(self)
    }
}

impl CompoundPropertyReader for Hdf5CompoundReader {
    fn num_properties(&self) -> usize {
        self.child_names.len()
    }

    fn property_header(&self, index: usize) -> Result<&PropertyHeader> {
        self.child_headers.get(index).ok_or(Error::IndexOutOfRange {
            index,
            count: self.child_headers.len(),
        })
    }

    fn property_index(&self, name: &str) -> Option<usize> {
        self.child_names.iter().position(|n| n == name)
    }

    fn property(self: Arc<Self>, index: usize) -> Result<Arc<dyn PropertyReader>> {
        let header = self.property_header(index)?.clone();
        let child_group = self.group.group(&header.name)?;
        let object = self.object.clone();
        let parent: Arc<dyn CompoundPropertyReader> = self.clone();

        Ok(match header.property_type {
            PropertyType::Compound => Arc::new(Hdf5CompoundReader::load(
                self.core.clone(),
                child_group,
                header,
                object,
                Some(parent),
            )?),
            PropertyType::Scalar | PropertyType::Array => {
                let num_samples = read_u32_attr(&child_group, attr::NUM_SAMPLES).unwrap_or(0);
                let first = read_u32_attr(&child_group, attr::FIRST_CHANGED).unwrap_or(0);
                let last = read_u32_attr(&child_group, attr::LAST_CHANGED).unwrap_or(0);
                Arc::new(Hdf5SampleReader {
                    core: self.core.clone(),
                    header,
                    group: child_group,
                    num_samples,
                    first_changed: first,
                    last_changed: last,
                    object,
                    parent,
                })
            }
        })
    }
}

struct Hdf5SampleReader {
    core: Arc<ArchiveCore>,
    header: PropertyHeader,
    group: Group,
    num_samples: u32,
    first_changed: u32,
    last_changed: u32,
    object: Arc<dyn ObjectReader>,
    parent: Arc<dyn CompoundPropertyReader>,
}

impl Hdf5SampleReader {
    fn constant(&self) -> bool {
        self.first_changed == 0 && self.last_changed == 0
    }

    fn check_index(&self, index: usize) -> Result<usize> {
        let count = self.num_samples as usize;
        if index >= count {
            return Err(Error::IndexOutOfRange { index, count });
        }
        Ok(if self.constant() { 0 } else { index })
    }

    fn sample_dataset(&self, slot: usize) -> Result<hdf5::Dataset> {
        self.group
            .dataset(&format!("s{slot}"))
            .map_err(|e| Error::io(format!("missing sample dataset s{slot}: {e}")))
    }
}

impl PropertyReader for Hdf5SampleReader {
    fn header(&self) -> &PropertyHeader {
        &self.header
    }

    fn parent(&self) -> Option<Arc<dyn CompoundPropertyReader>> {
        Some(self.parent.clone())
    }

    fn object(&self) -> Arc<dyn ObjectReader> {
        self.object.clone()
    }

    fn time_sampling(&self) -> Arc<TimeSampling> {
        self.core.sampling(self.header.time_sampling_index)
    }

    fn into_scalar(self: Arc<Self>) -> Option<Arc<dyn ScalarPropertyReader>> {
        (self.header.property_type == PropertyType::Scalar).then_some(self)
    }

    fn into_array(self: Arc<Self>) -> Option<Arc<dyn ArrayPropertyReader>> {
        (self.header.property_type == PropertyType::Array).then_some(self)
    }
}

impl ScalarPropertyReader for Hdf5SampleReader {
    fn num_samples(&self) -> usize {
        self.num_samples as usize
    }

    fn is_constant(&self) -> bool {
        self.constant()
    }

    fn sample_bytes(&self, index: usize) -> Result<Vec<u8>> {
        let slot = self.check_index(index)?;
        Ok(self.sample_dataset(slot)?.read_raw::<u8>()?)
    }
}

impl ArrayPropertyReader for Hdf5SampleReader {
    fn num_samples(&self) -> usize {
        self.num_samples as usize
    }

    fn is_constant(&self) -> bool {
        self.constant()
    }

    fn sample_len(&self, index: usize) -> Result<usize> {
        Ok(self.sample_dimensions(index)?.iter().product::<u64>() as usize)
    }

    fn sample_bytes(&self, index: usize) -> Result<Vec<u8>> {
        let slot = self.check_index(index)?;
        Ok(self.sample_dataset(slot)?.read_raw::<u8>()?)
    }

    fn sample_key(&self, index: usize) -> Result<SampleDigest> {
        let slot = self.check_index(index)?;
        let raw = self
            .sample_dataset(slot)?
            .attr(attr::KEY)
            .and_then(|a| a.read_raw::<u8>())
            .map_err(|e| Error::io(format!("sample s{slot} has no key: {e}")))?;
        let mut key = [0u8; 16];
        if raw.len() == 16 {
            key.copy_from_slice(&raw);
        }
        Ok(key)
    }

    fn sample_dimensions(&self, index: usize) -> Result<Vec<u64>> {
        let slot = self.check_index(index)?;
        let ds = self.sample_dataset(slot)?;
        match ds.attr(attr::DIMS).and_then(|a| a.read_raw::<u64>()) {
            Ok(dims) if !dims.is_empty() => Ok(dims),
            _ => {
                let elem = self.header.data_type.num_bytes().max(1);
                Ok(vec![(ds.size() / elem) as u64])
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Attribute plumbing
// ---------------------------------------------------------------------------

fn read_str_attr(loc: &hdf5::Location, name: &str) -> String {
    loc.attr(name)
        .and_then(|a| a.read_scalar::<VarLenUnicode>())
        .map(|v| v.as_str().to_string())
        .unwrap_or_default()
}

fn read_u8_attr(loc: &hdf5::Location, name: &str) -> Option<u8> {
    loc.attr(name).and_then(|a| a.read_scalar::<u8>()).ok()
}

fn read_u32_attr(loc: &hdf5::Location, name: &str) -> Option<u32> {
    loc.attr(name).and_then(|a| a.read_scalar::<u32>()).ok()
}

fn read_i32_attr(loc: &hdf5::Location, name: &str) -> Option<i32> {
    loc.attr(name).and_then(|a| a.read_scalar::<i32>()).ok()
}
