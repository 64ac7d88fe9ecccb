//! Serialization of a staged archive into the Ogawa container.
//!
//! The sink receives the finished staging tree once, on close, and writes
//! the file in a single pass: sample data and child groups bottom-up, then
//! the catalogue blocks, then the archive root group, and finally the header
//! fix-up that seals the file. Keyed sample blocks are deduplicated by
//! content, so repeated samples cost one group entry instead of a copy of
//! the payload.

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::format::*;
use super::layout::{
    self, MetadataIndexer, PropertyCatalogEntry, DATA_KEY_SIZE,
};
use super::stream::OStream;
use crate::core::{
    compute_digest, ArchiveKind, ArchiveSink, ArchiveStaging, ObjId, PropId, SampleDigest,
    StagedPropertyData,
};
use crate::util::{Error, Result};

/// Ogawa [`ArchiveSink`].
pub struct OgawaSink {
    path: PathBuf,
}

impl OgawaSink {
    /// Prepare a sink for `path`. The target is probed for writability but
    /// not truncated; an existing file stays intact until commit.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| Error::io(format!("cannot create {}: {e}", path.display())))?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ArchiveSink for OgawaSink {
    fn commit(&mut self, staging: &ArchiveStaging) -> Result<()> {
        let mut writer = CommitPass {
            stream: OStream::create(&self.path)?,
            staging,
            indexer: MetadataIndexer::new(),
            dedup: HashMap::new(),
        };
        writer.run()?;
        debug!(path = %self.path.display(), "sealed ogawa archive");
        Ok(())
    }

    fn kind(&self) -> ArchiveKind {
        ArchiveKind::Ogawa
    }
}

/// State of one commit.
struct CommitPass<'a> {
    stream: OStream,
    staging: &'a ArchiveStaging,
    indexer: MetadataIndexer,
    /// Content key -> file position of an already written keyed block.
    dedup: HashMap<(SampleDigest, usize), u64>,
}

impl CommitPass<'_> {
    fn run(&mut self) -> Result<()> {
        // Header with a root position placeholder, patched at the end.
        self.stream.write_bytes(MAGIC)?;
        self.stream.write_u8(NOT_FROZEN_FLAG)?;
        self.stream.write_bytes(&VERSION)?;
        self.stream.write_u64(0)?;

        let file_version_pos = self.write_data(&layout::FILE_VERSION.to_le_bytes())?;
        let library_version_pos = self.write_data(&layout::LIBRARY_VERSION.to_le_bytes())?;

        let (root_obj_pos, _, _) = self.write_object(crate::core::ROOT_OBJECT)?;

        let meta_text = self.staging.archive_metadata.serialize();
        let meta_pos = self.write_data(meta_text.as_bytes())?;

        let ts_table =
            layout::write_time_samplings(&self.staging.time_samplings, &self.staging.max_samples);
        let ts_pos = self.write_data(&ts_table)?;

        let idx_table = self.indexer.serialize();
        let idx_pos = self.write_data(&idx_table)?;

        let root_pos = self.write_group(&[
            data_offset(file_version_pos),
            data_offset(library_version_pos),
            group_offset(root_obj_pos),
            data_offset(meta_pos),
            data_offset(ts_pos),
            data_offset(idx_pos),
        ])?;

        // Seal: root position first, frozen flag last.
        self.stream.seek(ROOT_POS_OFFSET as u64)?;
        self.stream.write_u64(root_pos)?;
        self.stream.seek(FROZEN_OFFSET as u64)?;
        self.stream.write_u8(FROZEN_FLAG)?;
        self.stream.flush()?;
        Ok(())
    }

    /// Write one object group. Children are serialized before their parent
    /// so every offset is known when the group is emitted.
    ///
    /// Returns (position, properties digest, subtree digest).
    fn write_object(&mut self, obj: ObjId) -> Result<(u64, SampleDigest, SampleDigest)> {
        let node = self.staging.object(obj);

        let mut child_positions = Vec::with_capacity(node.children.len());
        let mut child_digests: Vec<u8> = Vec::new();
        for &child in &node.children {
            let (pos, _, subtree) = self.write_object(child)?;
            child_positions.push(pos);
            child_digests.extend_from_slice(&subtree);
        }
        let children_hash = if child_digests.is_empty() {
            [0u8; 16]
        } else {
            compute_digest(&child_digests)
        };

        let (props_pos, props_hash) = self.write_compound(node.properties)?;

        let child_meta: Vec<(&str, &crate::core::MetaData)> = node
            .children
            .iter()
            .map(|&c| {
                let h = &self.staging.object(c).header;
                (h.name.as_str(), &h.meta_data)
            })
            .collect();
        let headers_block =
            layout::write_object_entries(&child_meta, props_hash, children_hash, &mut self.indexer);
        let headers_pos = self.write_data(&headers_block)?;

        let mut group = Vec::with_capacity(node.children.len() + 2);
        group.push(group_offset(props_pos));
        group.extend(child_positions.into_iter().map(group_offset));
        group.push(data_offset(headers_pos));
        let pos = self.write_group(&group)?;

        // Subtree digest: children, then own data, metadata and name.
        let mut material = child_digests;
        material.extend_from_slice(&props_hash);
        material.extend_from_slice(node.header.meta_data.serialize().as_bytes());
        material.extend_from_slice(node.header.name.as_bytes());
        let subtree = compute_digest(&material);

        Ok((pos, props_hash, subtree))
    }

    /// Write one compound property group and its catalogue.
    ///
    /// Returns (position, digest over the children's digests).
    fn write_compound(&mut self, prop: PropId) -> Result<(u64, SampleDigest)> {
        let node = self.staging.property(prop);
        let StagedPropertyData::Compound { children, .. } = &node.data else {
            return Err(Error::state("write_compound on a non-compound property"));
        };

        let mut positions = Vec::with_capacity(children.len());
        let mut digests: Vec<u8> = Vec::new();
        let mut catalog = Vec::with_capacity(children.len());

        for &child in children {
            let child_node = self.staging.property(child);
            let (pos, digest, num, first, last) = match &child_node.data {
                StagedPropertyData::Compound { .. } => {
                    let (pos, digest) = self.write_compound(child)?;
                    (pos, digest, 0, 0, 0)
                }
                StagedPropertyData::Scalar(s) => {
                    let constant = node_is_constant(s.first_changed, s.last_changed);
                    let stored: &[Vec<u8>] = if constant && !s.samples.is_empty() {
                        &s.samples[..1]
                    } else {
                        &s.samples
                    };
                    let mut offsets = Vec::with_capacity(stored.len());
                    let mut material = Vec::with_capacity(stored.len() * 16);
                    for (i, bytes) in stored.iter().enumerate() {
                        let pos = self.write_keyed_data(bytes, s.digests[i])?;
                        offsets.push(data_offset(pos));
                        material.extend_from_slice(&s.digests[i]);
                    }
                    let pos = self.write_group(&offsets)?;
                    (
                        pos,
                        compute_digest(&material),
                        s.samples.len() as u32,
                        s.first_changed,
                        s.last_changed,
                    )
                }
                StagedPropertyData::Array(a) => {
                    let constant = node_is_constant(a.first_changed, a.last_changed);
                    let stored = if constant && !a.samples.is_empty() {
                        &a.samples[..1]
                    } else {
                        &a.samples[..]
                    };
                    let mut offsets = Vec::with_capacity(stored.len() * 2);
                    let mut material = Vec::with_capacity(stored.len() * 16);
                    for sample in stored {
                        let pos = self.write_keyed_data(&sample.bytes, sample.digest)?;
                        offsets.push(data_offset(pos));

                        let mut dim_bytes = Vec::with_capacity(sample.dims.len() * 8);
                        for d in &sample.dims {
                            dim_bytes.extend_from_slice(&d.to_le_bytes());
                        }
                        let dims_pos = self.write_data(&dim_bytes)?;
                        offsets.push(data_offset(dims_pos));

                        material.extend_from_slice(&sample.digest);
                    }
                    let pos = self.write_group(&offsets)?;
                    (
                        pos,
                        compute_digest(&material),
                        a.samples.len() as u32,
                        a.first_changed,
                        a.last_changed,
                    )
                }
            };

            positions.push(pos);
            digests.extend_from_slice(&digest);
            catalog.push(PropertyCatalogEntry {
                name: &child_node.header.name,
                property_type: child_node.header.property_type,
                data_type: child_node.header.data_type,
                time_sampling_index: child_node.header.time_sampling_index,
                meta_data: &child_node.header.meta_data,
                num_samples: num,
                first_changed: first,
                last_changed: last,
            });
        }

        if positions.is_empty() {
            // a fully empty compound collapses to the empty group marker
            return Ok((0, [0u8; 16]));
        }

        let headers_block = layout::write_property_entries(&catalog, &mut self.indexer);
        let headers_pos = self.write_data(&headers_block)?;

        let mut group: Vec<u64> = positions.into_iter().map(group_offset).collect();
        group.push(data_offset(headers_pos));
        let pos = self.write_group(&group)?;

        Ok((pos, compute_digest(&digests)))
    }

    /// Raw data block; empty payloads collapse to the empty marker.
    fn write_data(&mut self, data: &[u8]) -> Result<u64> {
        if data.is_empty() {
            return Ok(0);
        }
        let pos = self.stream.pos();
        self.stream.write_u64(data.len() as u64)?;
        self.stream.write_bytes(data)?;
        Ok(pos)
    }

    /// Keyed data block (16-byte digest + payload), deduplicated by content.
    fn write_keyed_data(&mut self, data: &[u8], digest: SampleDigest) -> Result<u64> {
        let key = (digest, data.len());
        if let Some(&pos) = self.dedup.get(&key) {
            return Ok(pos);
        }
        let pos = self.stream.pos();
        self.stream.write_u64((DATA_KEY_SIZE + data.len()) as u64)?;
        self.stream.write_bytes(&digest)?;
        self.stream.write_bytes(data)?;
        self.dedup.insert(key, pos);
        Ok(pos)
    }

    /// Group node; empty groups collapse to the empty marker.
    fn write_group(&mut self, children: &[u64]) -> Result<u64> {
        if children.is_empty() {
            return Ok(0);
        }
        let pos = self.stream.pos();
        self.stream.write_u64(children.len() as u64)?;
        for &child in children {
            self.stream.write_u64(child)?;
        }
        Ok(pos)
    }
}

fn node_is_constant(first: u32, last: u32) -> bool {
    first == 0 && last == 0
}
