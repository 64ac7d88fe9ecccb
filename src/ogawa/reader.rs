//! Concrete reader stack for the Ogawa container.
//!
//! All readers share one [`ArchiveCore`]: the mapped stream, the decoded
//! time sampling table, the indexed metadata table and the sample cache.
//! Child readers keep an `Arc` to their parent, so upward navigation works
//! without the parent ever owning its children.

use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use super::layout::{self, ObjectEntry, PropertyEntry, DATA_KEY_SIZE};
use super::node::{IData, IGroup};
use super::stream::IStreams;
use crate::core::{
    ArchiveKind, ArchiveReader, ArrayPropertyReader, CompoundPropertyReader, MetaData,
    ObjectHeader, ObjectReader, PropertyHeader, PropertyReader, PropertyType, ReadSampleCache,
    SampleDigest, SampleKey, ScalarPropertyReader, TimeSampling,
};
use crate::util::{Error, Result};

/// Immutable state shared by every reader of one archive.
struct ArchiveCore {
    time_samplings: Vec<Arc<TimeSampling>>,
    indexed_metadata: Vec<MetaData>,
    cache: Arc<ReadSampleCache>,
}

impl ArchiveCore {
    fn sampling(&self, index: u32) -> Arc<TimeSampling> {
        self.time_samplings
            .get(index as usize)
            .cloned()
            .unwrap_or_else(|| Arc::new(TimeSampling::identity()))
    }
}

/// Archive reader for the Ogawa container.
pub struct OgawaArchiveReader {
    name: String,
    #[allow(dead_code)]
    streams: Arc<IStreams>,
    core: Arc<ArchiveCore>,
    max_samples: Vec<u32>,
    archive_metadata: MetaData,
    library_version: i32,
    root: Arc<OgawaObjectReader>,
}

impl OgawaArchiveReader {
    /// Open and validate an archive.
    pub fn open(path: impl AsRef<Path>) -> Result<Arc<Self>> {
        let path = path.as_ref();
        let name = path.to_string_lossy().into_owned();
        let streams = Arc::new(IStreams::open(path)?);

        if !streams.is_frozen() {
            return Err(Error::invalid("archive was never sealed (partial write)"));
        }

        let root_pos = streams.root_pos()?;
        let top = IGroup::load(streams.clone(), root_pos)
            .map_err(|e| Error::invalid(format!("unreadable root group: {e}")))?;

        // Fixed top-level shape: file version, library version, root object,
        // archive metadata, time samplings, indexed metadata.
        if top.num_children() < 6
            || !top.is_child_data(0)?
            || !top.is_child_data(1)?
            || !top.is_child_group(2)?
            || !top.is_child_data(3)?
            || !top.is_child_data(4)?
            || !top.is_child_data(5)?
        {
            return Err(Error::invalid("malformed archive root group"));
        }

        let file_version = read_i32_block(&top.data(0)?)
            .map_err(|_| Error::invalid("unreadable file version"))?;
        if !(0..=layout::FILE_VERSION).contains(&file_version) {
            return Err(Error::invalid(format!(
                "unsupported file version {file_version}"
            )));
        }
        let library_version = read_i32_block(&top.data(1)?)
            .map_err(|_| Error::invalid("unreadable library version"))?;

        let archive_metadata = MetaData::parse(&top.data(3)?.read_string()?);

        let (time_samplings, max_samples) = layout::read_time_samplings(&top.data(4)?)?;
        let indexed_metadata = layout::read_indexed_metadata(&top.data(5)?)?;

        debug!(
            archive = %name,
            file_version,
            library_version,
            samplings = time_samplings.len(),
            "opened ogawa archive"
        );

        let core = Arc::new(ArchiveCore {
            time_samplings,
            indexed_metadata,
            cache: Arc::new(ReadSampleCache::default()),
        });

        let root_group = top.group(2)?;
        let root = Arc::new(OgawaObjectReader::load(
            core.clone(),
            root_group,
            ObjectHeader::new("ABC", "/"),
            None,
        )?);

        Ok(Arc::new(Self {
            name,
            streams,
            core,
            max_samples,
            archive_metadata,
            library_version,
            root,
        }))
    }

    /// Library version recorded by the writing application.
    pub fn library_version(&self) -> i32 {
        self.library_version
    }
}

impl ArchiveReader for OgawaArchiveReader {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ArchiveKind {
        ArchiveKind::Ogawa
    }

    fn num_time_samplings(&self) -> usize {
        self.core.time_samplings.len()
    }

    fn time_sampling(&self, index: usize) -> Option<Arc<TimeSampling>> {
        self.core.time_samplings.get(index).cloned()
    }

    fn max_num_samples(&self, ts_index: usize) -> Option<usize> {
        self.max_samples.get(ts_index).map(|&v| v as usize)
    }

    fn archive_metadata(&self) -> &MetaData {
        &self.archive_metadata
    }

    fn root(self: Arc<Self>) -> Arc<dyn ObjectReader> {
        self.root.clone()
    }
}

/// Reads one i32 stored as a standalone data block.
fn read_i32_block(data: &IData) -> Result<i32> {
    let bytes = data.read_all()?;
    if bytes.len() != 4 {
        return Err(Error::io("expected a 4-byte block"));
    }
    Ok(i32::from_le_bytes(bytes.try_into().unwrap()))
}

// ---------------------------------------------------------------------------
// Objects
// ---------------------------------------------------------------------------

/// One object node.
///
/// The object group holds: the properties compound at child 0, one group per
/// child object from child 1 on, and the child catalogue as the final data
/// block.
pub struct OgawaObjectReader {
    core: Arc<ArchiveCore>,
    header: ObjectHeader,
    parent: Option<Arc<dyn ObjectReader>>,
    group: IGroup,
    children: Vec<ObjectEntry>,
    child_headers: Vec<ObjectHeader>,
}

impl OgawaObjectReader {
    fn load(
        core: Arc<ArchiveCore>,
        group: IGroup,
        header: ObjectHeader,
        parent: Option<Arc<dyn ObjectReader>>,
    ) -> Result<Self> {
        let n = group.num_children();
        let children = if n > 0 && group.is_child_data(n - 1)? {
            layout::read_object_entries(&group.data(n - 1)?, &core.indexed_metadata)?
        } else {
            Vec::new()
        };

        let child_headers = children
            .iter()
            .map(|entry| {
                let full = if header.full_name == "/" {
                    format!("/{}", entry.name)
                } else {
                    format!("{}/{}", header.full_name, entry.name)
                };
                ObjectHeader::new(entry.name.clone(), full)
                    .with_meta_data(entry.meta_data.clone())
            })
            .collect();

        Ok(Self {
            core,
            header,
            parent,
            group,
            children,
            child_headers,
        })
    }
}

impl ObjectReader for OgawaObjectReader {
    fn header(&self) -> &ObjectHeader {
        &self.header
    }

    fn parent(&self) -> Option<Arc<dyn ObjectReader>> {
        self.parent.clone()
    }

    fn num_children(&self) -> usize {
        self.children.len()
    }

    fn child_header(&self, index: usize) -> Result<&ObjectHeader> {
        self.child_headers.get(index).ok_or(Error::IndexOutOfRange {
            index,
            count: self.child_headers.len(),
        })
    }

    fn child_index(&self, name: &str) -> Option<usize> {
        self.children.iter().position(|e| e.name == name)
    }

    fn child(self: Arc<Self>, index: usize) -> Result<Arc<dyn ObjectReader>> {
        let header = self.child_header(index)?.clone();
        // object groups start at child 1; child 0 is the properties compound
        let child_group = self.group.group(index + 1)?;
        let core = self.core.clone();
        let parent: Arc<dyn ObjectReader> = self;
        Ok(Arc::new(OgawaObjectReader::load(
            core,
            child_group,
            header,
            Some(parent),
        )?))
    }

    fn properties(self: Arc<Self>) -> Result<Arc<dyn CompoundPropertyReader>> {
        // child 0 is always the properties compound (offset 0 when empty)
        let props_group = self.group.group(0).map_err(|e| {
            Error::io(format!(
                "object {} has no properties compound: {e}",
                self.header.full_name
            ))
        })?;
        let core = self.core.clone();
        let object: Arc<dyn ObjectReader> = self;
        Ok(Arc::new(OgawaCompoundReader::load(
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

/// Compound property reader.
///
/// The compound group holds one group per child property, in catalogue
/// order, with the property catalogue as the final data block.
pub struct OgawaCompoundReader {
    core: Arc<ArchiveCore>,
    header: PropertyHeader,
    group: IGroup,
    entries: Vec<PropertyEntry>,
    headers: Vec<PropertyHeader>,
    object: Arc<dyn ObjectReader>,
    parent: Option<Arc<dyn CompoundPropertyReader>>,
}

impl OgawaCompoundReader {
    fn load(
        core: Arc<ArchiveCore>,
        group: IGroup,
        header: PropertyHeader,
        object: Arc<dyn ObjectReader>,
        parent: Option<Arc<dyn CompoundPropertyReader>>,
    ) -> Result<Self> {
        let n = group.num_children();
        let entries = if n > 0 && group.is_child_data(n - 1)? {
            layout::read_property_entries(&group.data(n - 1)?, &core.indexed_metadata)?
        } else {
            Vec::new()
        };

        let headers = entries
            .iter()
            .map(|e| PropertyHeader {
                name: e.name.clone(),
                property_type: e.property_type,
                data_type: e.data_type,
                time_sampling_index: e.time_sampling_index,
                meta_data: e.meta_data.clone(),
            })
            .collect();

        Ok(Self {
            core,
            header,
            group,
            entries,
            headers,
            object,
            parent,
        })
    }
}

impl PropertyReader for OgawaCompoundReader {
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

impl CompoundPropertyReader for OgawaCompoundReader {
    fn num_properties(&self) -> usize {
        self.entries.len()
    }

    fn property_header(&self, index: usize) -> Result<&PropertyHeader> {
        self.headers.get(index).ok_or(Error::IndexOutOfRange {
            index,
            count: self.headers.len(),
        })
    }

    fn property_index(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.name == name)
    }

    fn property(self: Arc<Self>, index: usize) -> Result<Arc<dyn PropertyReader>> {
        let entry = self
            .entries
            .get(index)
            .ok_or(Error::IndexOutOfRange {
                index,
                count: self.entries.len(),
            })?
            .clone();
        let header = self.headers[index].clone();
        let prop_group = self.group.group(index)?;
        let object = self.object.clone();
        let parent: Arc<dyn CompoundPropertyReader> = self.clone();

        Ok(match entry.property_type {
            PropertyType::Compound => Arc::new(OgawaCompoundReader::load(
                self.core.clone(),
                prop_group,
                header,
                object,
                Some(parent),
            )?),
            PropertyType::Scalar | PropertyType::Array => Arc::new(OgawaSampleReader {
                core: self.core.clone(),
                header,
                group: prop_group,
                entry,
                object,
                parent,
            }),
        })
    }
}

/// Scalar/array property reader.
///
/// Scalar sample `i` is the keyed data block at child `i`; array sample `i`
/// is the keyed data block at child `2i` with its dimensions at `2i + 1`.
/// Constant properties store a single slot that stands in for every index.
pub struct OgawaSampleReader {
    core: Arc<ArchiveCore>,
    header: PropertyHeader,
    group: IGroup,
    entry: PropertyEntry,
    object: Arc<dyn ObjectReader>,
    parent: Arc<dyn CompoundPropertyReader>,
}

impl OgawaSampleReader {
    fn check_index(&self, index: usize) -> Result<usize> {
        let count = self.entry.num_samples as usize;
        if index >= count {
            return Err(Error::IndexOutOfRange { index, count });
        }
        Ok(if self.entry.is_constant() { 0 } else { index })
    }

    /// Payload of the keyed block at group child `child`, cache-backed.
    fn keyed_payload(&self, child: usize, slot: usize) -> Result<Vec<u8>> {
        let data = self.group.data(child)?;
        if data.size() < DATA_KEY_SIZE as u64 {
            return Ok(Vec::new());
        }

        let key = SampleKey::new(data.pos(), slot);
        if let Some(hit) = self.core.cache.get(&key) {
            return Ok((*hit).clone());
        }

        let payload = data.read_range(DATA_KEY_SIZE as u64, (data.size() as usize) - DATA_KEY_SIZE)?;
        self.core.cache.insert(key, payload.clone());
        Ok(payload)
    }

    fn keyed_digest(&self, child: usize) -> Result<SampleDigest> {
        let data = self.group.data(child)?;
        if data.size() < DATA_KEY_SIZE as u64 {
            return Ok([0u8; 16]);
        }
        let bytes = data.read_range(0, DATA_KEY_SIZE)?;
        let mut digest = [0u8; 16];
        digest.copy_from_slice(&bytes);
        Ok(digest)
    }

    fn dims_for(&self, slot: usize) -> Result<Vec<u64>> {
        let dims_data = self.group.data(slot * 2 + 1)?;
        let bytes = dims_data.read_all()?;
        if bytes.is_empty() {
            // rank-1 dimensions are inferable from the payload size
            let elem = self.header.data_type.num_bytes().max(1);
            let payload = self.keyed_payload(slot * 2, slot)?;
            return Ok(vec![(payload.len() / elem) as u64]);
        }
        if bytes.len() % 8 != 0 {
            return Err(Error::io("malformed dimensions block"));
        }
        Ok(bytes
            .chunks_exact(8)
            .map(|c| u64::from_le_bytes(c.try_into().unwrap()))
            .collect())
    }
}

impl PropertyReader for OgawaSampleReader {
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
        (self.entry.property_type == PropertyType::Scalar).then_some(self)
    }

    fn into_array(self: Arc<Self>) -> Option<Arc<dyn ArrayPropertyReader>> {
        (self.entry.property_type == PropertyType::Array).then_some(self)
    }
}

impl ScalarPropertyReader for OgawaSampleReader {
    fn num_samples(&self) -> usize {
        self.entry.num_samples as usize
    }

    fn is_constant(&self) -> bool {
        self.entry.is_constant()
    }

    fn sample_bytes(&self, index: usize) -> Result<Vec<u8>> {
        let slot = self.check_index(index)?;
        self.keyed_payload(slot, slot)
    }
}

impl ArrayPropertyReader for OgawaSampleReader {
    fn num_samples(&self) -> usize {
        self.entry.num_samples as usize
    }

    fn is_constant(&self) -> bool {
        self.entry.is_constant()
    }

    fn sample_len(&self, index: usize) -> Result<usize> {
        let slot = self.check_index(index)?;
        Ok(self.dims_for(slot)?.iter().product::<u64>() as usize)
    }

    fn sample_bytes(&self, index: usize) -> Result<Vec<u8>> {
        let slot = self.check_index(index)?;
        self.keyed_payload(slot * 2, slot)
    }

    fn sample_key(&self, index: usize) -> Result<SampleDigest> {
        let slot = self.check_index(index)?;
        self.keyed_digest(slot * 2)
    }

    fn sample_dimensions(&self, index: usize) -> Result<Vec<u64>> {
        let slot = self.check_index(index)?;
        self.dims_for(slot)
    }
}
