//! Archive catalogue encoding.
//!
//! Object headers, property headers, the time sampling table and the indexed
//! metadata table all live in ordinary data blocks; this module defines
//! their byte layout. Parsers work over plain buffers so encode and decode
//! can be exercised against each other without a file.

use std::collections::HashMap;
use std::sync::Arc;

use super::node::IData;
use crate::core::{MetaData, PropertyType, TimeSampling, TimeSamplingKind};
use crate::util::{DataType, Error, PodKind, Result};

/// File format version stored in the archive root group.
pub const FILE_VERSION: i32 = 0;

/// Library version stored alongside it (major * 10000 + minor * 100 + patch).
pub const LIBRARY_VERSION: i32 = 10000;

/// Time-per-cycle sentinel marking acyclic sampling.
pub const ACYCLIC_TIME_PER_CYCLE: f64 = f64::MAX / 32.0;

/// Keyed data blocks carry a 16-byte digest before the payload.
pub const DATA_KEY_SIZE: usize = 16;

/// Object header blocks end with two 16-byte digests.
pub const OBJECT_HASH_TRAILER: usize = 32;

/// Header byte meaning "metadata is stored inline after the name".
pub const INLINE_METADATA: u8 = 0xff;

// ---------------------------------------------------------------------------
// Time sampling table
// ---------------------------------------------------------------------------

/// Decode the time sampling table block.
pub fn read_time_samplings(data: &IData) -> Result<(Vec<Arc<TimeSampling>>, Vec<u32>)> {
    parse_time_samplings(&data.read_all()?)
}

/// Decode the time sampling table: per entry a u32 max-sample count, the
/// cycle duration, and the stored times of one cycle.
pub fn parse_time_samplings(buf: &[u8]) -> Result<(Vec<Arc<TimeSampling>>, Vec<u32>)> {
    let mut samplings = Vec::new();
    let mut max_samples = Vec::new();
    let mut pos = 0usize;

    while pos < buf.len() {
        if pos + 16 > buf.len() {
            return Err(Error::io("truncated time sampling entry"));
        }
        let max_sample = read_u32(buf, &mut pos);
        let tpc = read_f64(buf, &mut pos);
        let count = read_u32(buf, &mut pos) as usize;

        if count == 0 || pos + 8 * count > buf.len() {
            return Err(Error::io("truncated time sampling times"));
        }
        let mut times = Vec::with_capacity(count);
        for _ in 0..count {
            times.push(read_f64(buf, &mut pos));
        }

        let ts = if tpc == ACYCLIC_TIME_PER_CYCLE {
            TimeSampling::acyclic(times)
        } else if count == 1 {
            TimeSampling::uniform(tpc, times[0])
        } else {
            TimeSampling::cyclic(tpc, times)
        };
        samplings.push(Arc::new(ts));
        max_samples.push(max_sample);
    }

    Ok((samplings, max_samples))
}

/// Encode the time sampling table.
pub fn write_time_samplings(samplings: &[Arc<TimeSampling>], max_samples: &[u32]) -> Vec<u8> {
    let mut buf = Vec::new();
    for (i, ts) in samplings.iter().enumerate() {
        let max = max_samples.get(i).copied().unwrap_or(0);
        buf.extend_from_slice(&max.to_le_bytes());

        let (tpc, times) = match ts.kind() {
            TimeSamplingKind::Uniform {
                time_per_cycle,
                start_time,
            } => (*time_per_cycle, vec![*start_time]),
            TimeSamplingKind::Cyclic {
                time_per_cycle,
                times,
            } => (*time_per_cycle, times.clone()),
            TimeSamplingKind::Acyclic { times } => (ACYCLIC_TIME_PER_CYCLE, times.clone()),
        };

        buf.extend_from_slice(&tpc.to_le_bytes());
        buf.extend_from_slice(&(times.len() as u32).to_le_bytes());
        for t in times {
            buf.extend_from_slice(&t.to_le_bytes());
        }
    }
    buf
}

// ---------------------------------------------------------------------------
// Indexed metadata table
// ---------------------------------------------------------------------------

/// Decode the indexed metadata table block. Index 0 is always the empty
/// metadata and is not stored.
pub fn read_indexed_metadata(data: &IData) -> Result<Vec<MetaData>> {
    // 254 entries of at most 255 bytes each
    if data.size() > 65536 {
        return Err(Error::io("indexed metadata table too large"));
    }
    parse_indexed_metadata(&data.read_all()?)
}

/// Decode the indexed metadata table from a buffer.
pub fn parse_indexed_metadata(buf: &[u8]) -> Result<Vec<MetaData>> {
    let mut table = vec![MetaData::new()];
    let mut pos = 0usize;
    while pos < buf.len() {
        let len = buf[pos] as usize;
        pos += 1;
        if pos + len > buf.len() {
            return Err(Error::io("truncated indexed metadata entry"));
        }
        let text = std::str::from_utf8(&buf[pos..pos + len])?;
        pos += len;
        table.push(MetaData::parse(text));
    }
    Ok(table)
}

/// Deduplicating builder for the indexed metadata table.
///
/// Frequently repeated metadata serializes as a one-byte index in the entity
/// headers; oversized or overflow entries fall back to inline storage.
pub struct MetadataIndexer {
    entries: Vec<MetaData>,
    by_text: HashMap<String, usize>,
}

impl MetadataIndexer {
    pub fn new() -> Self {
        Self {
            // slot 0 is the implicit empty entry
            entries: vec![MetaData::new()],
            by_text: HashMap::new(),
        }
    }

    /// Index for the given metadata, or [`INLINE_METADATA`] when it has to
    /// be stored inline.
    pub fn index_for(&mut self, meta: &MetaData) -> u8 {
        let text = meta.serialize();
        if text.is_empty() {
            return 0;
        }
        if let Some(&idx) = self.by_text.get(&text) {
            return idx as u8;
        }
        if self.entries.len() >= 254 || text.len() > 255 {
            return INLINE_METADATA;
        }
        let idx = self.entries.len();
        self.entries.push(meta.clone());
        self.by_text.insert(text, idx);
        idx as u8
    }

    /// Encode the table (entry 0 is implicit).
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        for meta in self.entries.iter().skip(1) {
            let text = meta.serialize();
            buf.push(text.len() as u8);
            buf.extend_from_slice(text.as_bytes());
        }
        buf
    }
}

impl Default for MetadataIndexer {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Object headers
// ---------------------------------------------------------------------------

/// One decoded child-object catalogue entry.
#[derive(Debug, Clone)]
pub struct ObjectEntry {
    pub name: String,
    pub meta_data: MetaData,
}

/// Decode the child-object catalogue of one object group. The block ends
/// with a 32-byte digest trailer; a block of only the trailer means no
/// children.
pub fn read_object_entries(data: &IData, indexed: &[MetaData]) -> Result<Vec<ObjectEntry>> {
    if data.size() <= OBJECT_HASH_TRAILER as u64 {
        return Ok(Vec::new());
    }
    parse_object_entries(&data.read_all()?, indexed)
}

/// Decode the child-object catalogue from a buffer (trailer included).
pub fn parse_object_entries(buf: &[u8], indexed: &[MetaData]) -> Result<Vec<ObjectEntry>> {
    let mut entries = Vec::new();
    if buf.len() <= OBJECT_HASH_TRAILER {
        return Ok(entries);
    }
    let buf = &buf[..buf.len() - OBJECT_HASH_TRAILER];
    let mut pos = 0usize;

    while pos < buf.len() {
        if pos + 4 > buf.len() {
            return Err(Error::io("truncated object entry"));
        }
        let name_len = read_u32(buf, &mut pos) as usize;
        if name_len == 0 || pos + name_len + 1 > buf.len() {
            return Err(Error::io("malformed object entry name"));
        }
        let name = std::str::from_utf8(&buf[pos..pos + name_len])?.to_string();
        pos += name_len;

        let meta_index = buf[pos];
        pos += 1;

        let meta_data = if meta_index == INLINE_METADATA {
            if pos + 4 > buf.len() {
                return Err(Error::io("truncated inline object metadata"));
            }
            let len = read_u32(buf, &mut pos) as usize;
            if pos + len > buf.len() {
                return Err(Error::io("truncated inline object metadata"));
            }
            let text = std::str::from_utf8(&buf[pos..pos + len])?;
            pos += len;
            MetaData::parse(text)
        } else {
            indexed
                .get(meta_index as usize)
                .cloned()
                .ok_or_else(|| Error::io(format!("bad metadata index {meta_index}")))?
        };

        entries.push(ObjectEntry { name, meta_data });
    }

    Ok(entries)
}

/// Read the digest trailer of an object headers block.
pub fn read_object_hashes(data: &IData) -> Result<([u8; 16], [u8; 16])> {
    if data.size() < OBJECT_HASH_TRAILER as u64 {
        return Ok(([0; 16], [0; 16]));
    }
    let trailer =
        data.read_range(data.size() - OBJECT_HASH_TRAILER as u64, OBJECT_HASH_TRAILER)?;
    let mut props = [0u8; 16];
    let mut children = [0u8; 16];
    props.copy_from_slice(&trailer[..16]);
    children.copy_from_slice(&trailer[16..]);
    Ok((props, children))
}

/// Encode the child-object catalogue plus digest trailer.
pub fn write_object_entries(
    children: &[(&str, &MetaData)],
    properties_hash: [u8; 16],
    children_hash: [u8; 16],
    indexer: &mut MetadataIndexer,
) -> Vec<u8> {
    let mut buf = Vec::new();
    for (name, meta) in children {
        buf.extend_from_slice(&(name.len() as u32).to_le_bytes());
        buf.extend_from_slice(name.as_bytes());
        let idx = indexer.index_for(meta);
        buf.push(idx);
        if idx == INLINE_METADATA {
            let text = meta.serialize();
            buf.extend_from_slice(&(text.len() as u32).to_le_bytes());
            buf.extend_from_slice(text.as_bytes());
        }
    }
    buf.extend_from_slice(&properties_hash);
    buf.extend_from_slice(&children_hash);
    buf
}

// ---------------------------------------------------------------------------
// Property headers
// ---------------------------------------------------------------------------

// Layout of the info word:
//   bits 0-1   property type (0 compound, 1 scalar, 2 array)
//   bits 2-3   integer size hint (u8 / u16 / u32)
//   bits 4-7   POD kind
//   bit  8     time sampling index follows
//   bit  9     explicit first/last changed indices follow
//   bit  10    homogeneous array (dimensions never change)
//   bit  11    all samples identical
//   bits 12-19 extent
//   bits 20-27 metadata index
const INFO_PTYPE_MASK: u32 = 0x0003;
const INFO_HINT_SHIFT: u32 = 2;
const INFO_POD_SHIFT: u32 = 4;
const INFO_HAS_TSIDX: u32 = 0x0100;
const INFO_EXPLICIT_CHANGED: u32 = 0x0200;
const INFO_CONSTANT: u32 = 0x0800;
const INFO_EXTENT_SHIFT: u32 = 12;
const INFO_META_SHIFT: u32 = 20;

/// One decoded property catalogue entry.
#[derive(Debug, Clone)]
pub struct PropertyEntry {
    pub name: String,
    pub property_type: PropertyType,
    pub data_type: DataType,
    pub time_sampling_index: u32,
    pub meta_data: MetaData,
    pub num_samples: u32,
    pub first_changed: u32,
    pub last_changed: u32,
}

impl PropertyEntry {
    /// No appended sample ever differed from its predecessor.
    pub fn is_constant(&self) -> bool {
        self.first_changed == 0 && self.last_changed == 0
    }
}

/// What the serializer needs to know about one property.
pub struct PropertyCatalogEntry<'a> {
    pub name: &'a str,
    pub property_type: PropertyType,
    pub data_type: DataType,
    pub time_sampling_index: u32,
    pub meta_data: &'a MetaData,
    pub num_samples: u32,
    pub first_changed: u32,
    pub last_changed: u32,
}

/// Decode the property catalogue of one compound group.
pub fn read_property_entries(data: &IData, indexed: &[MetaData]) -> Result<Vec<PropertyEntry>> {
    if data.is_empty() {
        return Ok(Vec::new());
    }
    parse_property_entries(&data.read_all()?, indexed)
}

/// Decode the property catalogue from a buffer.
pub fn parse_property_entries(buf: &[u8], indexed: &[MetaData]) -> Result<Vec<PropertyEntry>> {
    let mut entries = Vec::new();
    let mut pos = 0usize;

    while pos < buf.len() {
        if pos + 4 > buf.len() {
            return Err(Error::io("truncated property entry"));
        }
        let info = read_u32(buf, &mut pos);

        let property_type = match info & INFO_PTYPE_MASK {
            0 => PropertyType::Compound,
            1 => PropertyType::Scalar,
            _ => PropertyType::Array,
        };
        let hint = (info >> INFO_HINT_SHIFT) & 0x3;

        let (data_type, time_sampling_index, num_samples, first_changed, last_changed) =
            if property_type == PropertyType::Compound {
                (DataType::UNKNOWN, 0, 0, 0, 0)
            } else {
                let pod = PodKind::from_u8(((info >> INFO_POD_SHIFT) & 0xf) as u8);
                if pod == PodKind::Unknown {
                    return Err(Error::io("bad POD kind in property entry"));
                }
                let extent = ((info >> INFO_EXTENT_SHIFT) & 0xff) as u8;
                let num_samples = read_sized(buf, &mut pos, hint)?;

                let (first, last) = if info & INFO_EXPLICIT_CHANGED != 0 {
                    let first = read_sized(buf, &mut pos, hint)?;
                    let last = read_sized(buf, &mut pos, hint)?;
                    (first, last)
                } else if info & INFO_CONSTANT != 0 {
                    (0, 0)
                } else {
                    (1, num_samples.saturating_sub(1))
                };

                let tsidx = if info & INFO_HAS_TSIDX != 0 {
                    read_sized(buf, &mut pos, hint)?
                } else {
                    0
                };

                (DataType::new(pod, extent), tsidx, num_samples, first, last)
            };

        let name_len = read_sized(buf, &mut pos, hint)? as usize;
        if name_len == 0 || pos + name_len > buf.len() {
            return Err(Error::io("malformed property entry name"));
        }
        let name = std::str::from_utf8(&buf[pos..pos + name_len])?.to_string();
        pos += name_len;

        let meta_index = ((info >> INFO_META_SHIFT) & 0xff) as u8;
        let meta_data = if meta_index == INLINE_METADATA {
            let len = read_sized(buf, &mut pos, hint)? as usize;
            if pos + len > buf.len() {
                return Err(Error::io("truncated inline property metadata"));
            }
            let text = std::str::from_utf8(&buf[pos..pos + len])?;
            pos += len;
            MetaData::parse(text)
        } else {
            indexed
                .get(meta_index as usize)
                .cloned()
                .ok_or_else(|| Error::io(format!("bad metadata index {meta_index}")))?
        };

        entries.push(PropertyEntry {
            name,
            property_type,
            data_type,
            time_sampling_index,
            meta_data,
            num_samples,
            first_changed,
            last_changed,
        });
    }

    Ok(entries)
}

/// Encode the property catalogue of one compound group.
pub fn write_property_entries(
    entries: &[PropertyCatalogEntry<'_>],
    indexer: &mut MetadataIndexer,
) -> Vec<u8> {
    let mut buf = Vec::new();
    for e in entries {
        let meta_text = e.meta_data.serialize();
        let meta_index = indexer.index_for(e.meta_data);

        let constant = e.num_samples > 0 && e.first_changed == 0 && e.last_changed == 0;
        let default_changed = (1, e.num_samples.saturating_sub(1));
        let explicit_changed = !constant && (e.first_changed, e.last_changed) != default_changed;

        // Every hint-sized integer in the entry must fit the chosen width.
        let mut widest = e.num_samples.max(e.name.len() as u32);
        if explicit_changed {
            widest = widest.max(e.first_changed).max(e.last_changed);
        }
        if e.time_sampling_index != 0 {
            widest = widest.max(e.time_sampling_index);
        }
        if meta_index == INLINE_METADATA {
            widest = widest.max(meta_text.len() as u32);
        }
        let hint: u32 = if widest < 0x100 {
            0
        } else if widest < 0x10000 {
            1
        } else {
            2
        };

        let ptype_bits: u32 = match e.property_type {
            PropertyType::Compound => 0,
            PropertyType::Scalar => 1,
            PropertyType::Array => 2,
        };

        let mut info =
            ptype_bits | (hint << INFO_HINT_SHIFT) | ((meta_index as u32) << INFO_META_SHIFT);
        if e.property_type != PropertyType::Compound {
            info |= (e.data_type.pod as u32) << INFO_POD_SHIFT;
            info |= (e.data_type.extent as u32) << INFO_EXTENT_SHIFT;
            if e.time_sampling_index != 0 {
                info |= INFO_HAS_TSIDX;
            }
            if constant {
                info |= INFO_CONSTANT;
            } else if explicit_changed {
                info |= INFO_EXPLICIT_CHANGED;
            }
        }
        buf.extend_from_slice(&info.to_le_bytes());

        if e.property_type != PropertyType::Compound {
            write_sized(&mut buf, e.num_samples, hint);
            if explicit_changed {
                write_sized(&mut buf, e.first_changed, hint);
                write_sized(&mut buf, e.last_changed, hint);
            }
            if e.time_sampling_index != 0 {
                write_sized(&mut buf, e.time_sampling_index, hint);
            }
        }

        write_sized(&mut buf, e.name.len() as u32, hint);
        buf.extend_from_slice(e.name.as_bytes());

        if meta_index == INLINE_METADATA {
            write_sized(&mut buf, meta_text.len() as u32, hint);
            buf.extend_from_slice(meta_text.as_bytes());
        }
    }
    buf
}

// ---------------------------------------------------------------------------
// Primitive helpers
// ---------------------------------------------------------------------------

fn read_u32(buf: &[u8], pos: &mut usize) -> u32 {
    let v = u32::from_le_bytes(buf[*pos..*pos + 4].try_into().unwrap());
    *pos += 4;
    v
}

fn read_f64(buf: &[u8], pos: &mut usize) -> f64 {
    let v = f64::from_le_bytes(buf[*pos..*pos + 8].try_into().unwrap());
    *pos += 8;
    v
}

/// Read an integer whose width is picked by the entry's size hint.
fn read_sized(buf: &[u8], pos: &mut usize, hint: u32) -> Result<u32> {
    let width = match hint {
        0 => 1,
        1 => 2,
        _ => 4,
    };
    if *pos + width > buf.len() {
        return Err(Error::io("truncated sized integer"));
    }
    let v = match width {
        1 => buf[*pos] as u32,
        2 => u16::from_le_bytes(buf[*pos..*pos + 2].try_into().unwrap()) as u32,
        _ => u32::from_le_bytes(buf[*pos..*pos + 4].try_into().unwrap()),
    };
    *pos += width;
    Ok(v)
}

fn write_sized(buf: &mut Vec<u8>, value: u32, hint: u32) {
    match hint {
        0 => buf.push(value as u8),
        1 => buf.extend_from_slice(&(value as u16).to_le_bytes()),
        _ => buf.extend_from_slice(&value.to_le_bytes()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn property_catalogue_roundtrip() {
        let mut indexer = MetadataIndexer::new();
        let mut meta = MetaData::new();
        meta.set("interpretation", "point");

        let entries = [
            PropertyCatalogEntry {
                name: "P",
                property_type: PropertyType::Array,
                data_type: DataType::VEC3F,
                time_sampling_index: 1,
                meta_data: &meta,
                num_samples: 20,
                first_changed: 1,
                last_changed: 19,
            },
            PropertyCatalogEntry {
                name: ".geom",
                property_type: PropertyType::Compound,
                data_type: DataType::UNKNOWN,
                time_sampling_index: 0,
                meta_data: &MetaData::new(),
                num_samples: 0,
                first_changed: 0,
                last_changed: 0,
            },
            PropertyCatalogEntry {
                name: "static",
                property_type: PropertyType::Scalar,
                data_type: DataType::FLOAT64,
                time_sampling_index: 0,
                meta_data: &MetaData::new(),
                num_samples: 5,
                first_changed: 0,
                last_changed: 0,
            },
            PropertyCatalogEntry {
                name: "partial",
                property_type: PropertyType::Scalar,
                data_type: DataType::UINT8,
                time_sampling_index: 0,
                meta_data: &MetaData::new(),
                num_samples: 10,
                first_changed: 3,
                last_changed: 7,
            },
        ];
        let bytes = write_property_entries(&entries, &mut indexer);
        let indexed = parse_indexed_metadata(&indexer.serialize()).unwrap();
        let parsed = parse_property_entries(&bytes, &indexed).unwrap();
        assert_eq!(parsed.len(), 4);

        assert_eq!(parsed[0].name, "P");
        assert_eq!(parsed[0].property_type, PropertyType::Array);
        assert_eq!(parsed[0].data_type, DataType::VEC3F);
        assert_eq!(parsed[0].time_sampling_index, 1);
        assert_eq!(parsed[0].num_samples, 20);
        assert_eq!(parsed[0].meta_data.get("interpretation"), Some("point"));
        assert!(!parsed[0].is_constant());

        assert_eq!(parsed[1].property_type, PropertyType::Compound);
        assert_eq!(parsed[1].name, ".geom");

        assert_eq!(parsed[2].num_samples, 5);
        assert!(parsed[2].is_constant());

        assert_eq!(parsed[3].first_changed, 3);
        assert_eq!(parsed[3].last_changed, 7);
    }

    #[test]
    fn object_catalogue_roundtrip() {
        let mut indexer = MetadataIndexer::new();
        let mut schema = MetaData::new();
        schema.set_schema("AbcGeom_Xform_v3");

        let empty = MetaData::new();
        let children: Vec<(&str, &MetaData)> = vec![("a", &schema), ("b", &empty)];
        let bytes = write_object_entries(&children, [1; 16], [2; 16], &mut indexer);

        let indexed = parse_indexed_metadata(&indexer.serialize()).unwrap();
        let parsed = parse_object_entries(&bytes, &indexed).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].name, "a");
        assert_eq!(parsed[0].meta_data.schema(), Some("AbcGeom_Xform_v3"));
        assert_eq!(parsed[1].name, "b");
        assert!(parsed[1].meta_data.is_empty());
    }

    #[test]
    fn empty_object_catalogue_is_trailer_only() {
        let mut indexer = MetadataIndexer::new();
        let bytes = write_object_entries(&[], [0; 16], [0; 16], &mut indexer);
        assert_eq!(bytes.len(), OBJECT_HASH_TRAILER);
        assert!(parse_object_entries(&bytes, &[MetaData::new()])
            .unwrap()
            .is_empty());
    }

    #[test]
    fn time_sampling_table_roundtrip() {
        let samplings = vec![
            Arc::new(TimeSampling::identity()),
            Arc::new(TimeSampling::uniform(1.0 / 24.0, 0.5)),
            Arc::new(TimeSampling::cyclic(1.0, vec![0.0, 0.25])),
            Arc::new(TimeSampling::acyclic(vec![0.0, 0.7, 3.0])),
        ];
        let max = vec![0u32, 20, 4, 3];
        let bytes = write_time_samplings(&samplings, &max);
        let (parsed, parsed_max) = parse_time_samplings(&bytes).unwrap();
        assert_eq!(parsed.len(), 4);
        assert_eq!(parsed_max, max);
        for (a, b) in samplings.iter().zip(parsed.iter()) {
            assert!(a.is_equivalent(b), "{a:?} vs {b:?}");
        }
    }

    #[test]
    fn metadata_indexer_dedups() {
        let mut indexer = MetadataIndexer::new();
        let mut a = MetaData::new();
        a.set("schema", "X");
        assert_eq!(indexer.index_for(&MetaData::new()), 0);
        let i = indexer.index_for(&a);
        assert_eq!(indexer.index_for(&a), i);
        assert_ne!(i, 0);
        assert!(!indexer.serialize().is_empty());
    }

    #[test]
    fn oversized_metadata_goes_inline() {
        let mut indexer = MetadataIndexer::new();
        let mut big = MetaData::new();
        big.set("k", "v".repeat(300));
        assert_eq!(indexer.index_for(&big), INLINE_METADATA);

        let entries = [PropertyCatalogEntry {
            name: "p",
            property_type: PropertyType::Scalar,
            data_type: DataType::INT32,
            time_sampling_index: 0,
            meta_data: &big,
            num_samples: 1,
            first_changed: 0,
            last_changed: 0,
        }];
        let bytes = write_property_entries(&entries, &mut indexer);
        let parsed = parse_property_entries(&bytes, &[MetaData::new()]).unwrap();
        assert_eq!(parsed[0].meta_data.get("k").map(|v| v.len()), Some(300));
    }
}
