//! Serialization of a staged archive into an HDF5 file.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use hdf5::types::VarLenUnicode;
use hdf5::Group;
use tracing::debug;

use super::{attr, PROPERTIES_GROUP, PTYPE_ARRAY, PTYPE_COMPOUND, PTYPE_SCALAR, ROOT_GROUP,
    SAMPLINGS_GROUP};
use crate::core::{
    ArchiveKind, ArchiveSink, ArchiveStaging, ObjId, PropId, StagedPropertyData,
    TimeSamplingKind,
};
use crate::ogawa::layout::{ACYCLIC_TIME_PER_CYCLE, FILE_VERSION, LIBRARY_VERSION};
use crate::util::{Error, Result};

/// HDF5 [`ArchiveSink`].
pub struct Hdf5Sink {
    path: PathBuf,
}

impl Hdf5Sink {
    /// Prepare a sink for `path`; the target is probed but not truncated
    /// until commit.
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
}

impl ArchiveSink for Hdf5Sink {
    fn commit(&mut self, staging: &ArchiveStaging) -> Result<()> {
        let file = hdf5::File::create(&self.path)?;

        write_i32_attr(&file, attr::FILE_VERSION, FILE_VERSION)?;
        write_i32_attr(&file, attr::LIBRARY_VERSION, LIBRARY_VERSION)?;
        write_str_attr(&file, attr::ARCHIVE_META, &staging.archive_metadata.serialize())?;

        write_samplings(&file, staging)?;
        write_object(&file, staging, crate::core::ROOT_OBJECT, ROOT_GROUP)?;

        file.flush()?;
        debug!(path = %self.path.display(), "sealed hdf5 archive");
        Ok(())
    }

    fn kind(&self) -> ArchiveKind {
        ArchiveKind::Hdf5
    }
}

/// The time sampling table: one f64 dataset of stored times per sampling,
/// with the cycle duration as an attribute. No max-sample summary is kept.
fn write_samplings(file: &hdf5::File, staging: &ArchiveStaging) -> Result<()> {
    let group = file.create_group(SAMPLINGS_GROUP)?;
    for (i, ts) in staging.time_samplings.iter().enumerate() {
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
        let ds = group
            .new_dataset_builder()
            .with_data(&times)
            .create(format!("times{i}").as_str())?;
        ds.new_attr::<f64>()
            .create(attr::TIME_PER_CYCLE)?
            .write_scalar(&tpc)?;
    }
    Ok(())
}

fn write_object(
    parent: &Group,
    staging: &ArchiveStaging,
    obj: ObjId,
    group_name: &str,
) -> Result<()> {
    let node = staging.object(obj);
    let group = parent.create_group(group_name)?;

    write_str_attr(&group, attr::META, &node.header.meta_data.serialize())?;

    let order: Vec<&str> = node
        .children
        .iter()
        .map(|&c| staging.object(c).header.name.as_str())
        .collect();
    write_str_attr(&group, attr::ORDER, &serde_json::to_string(&order).unwrap_or_default())?;

    write_compound(&group, staging, node.properties, PROPERTIES_GROUP)?;

    for &child in &node.children {
        let name = staging.object(child).header.name.clone();
        write_object(&group, staging, child, &name)?;
    }
    Ok(())
}

fn write_compound(
    parent: &Group,
    staging: &ArchiveStaging,
    prop: PropId,
    group_name: &str,
) -> Result<()> {
    let node = staging.property(prop);
    let group = parent.create_group(group_name)?;

    write_str_attr(&group, attr::META, &node.header.meta_data.serialize())?;
    write_u8_attr(&group, attr::PTYPE, PTYPE_COMPOUND)?;

    let StagedPropertyData::Compound { children, .. } = &node.data else {
        return Err(Error::state("write_compound on a non-compound property"));
    };

    let order: Vec<&str> = children
        .iter()
        .map(|&c| staging.property(c).header.name.as_str())
        .collect();
    write_str_attr(&group, attr::ORDER, &serde_json::to_string(&order).unwrap_or_default())?;

    for &child in children {
        let child_node = staging.property(child);
        let name = child_node.header.name.clone();
        match &child_node.data {
            StagedPropertyData::Compound { .. } => {
                write_compound(&group, staging, child, &name)?;
            }
            StagedPropertyData::Scalar(_) | StagedPropertyData::Array(_) => {
                write_sampled(&group, staging, child, &name)?;
            }
        }
    }
    Ok(())
}

/// Scalar and array properties: one group carrying the header attributes
/// and one byte dataset per stored sample. Constant properties store a
/// single dataset that stands in for every index.
fn write_sampled(
    parent: &Group,
    staging: &ArchiveStaging,
    prop: PropId,
    group_name: &str,
) -> Result<()> {
    let node = staging.property(prop);
    let header = &node.header;
    let group = parent.create_group(group_name)?;

    write_str_attr(&group, attr::META, &header.meta_data.serialize())?;
    write_u8_attr(&group, attr::POD, header.data_type.pod as u8)?;
    write_u8_attr(&group, attr::EXTENT, header.data_type.extent)?;
    write_u32_attr(&group, attr::TSIDX, header.time_sampling_index)?;

    match &node.data {
        StagedPropertyData::Scalar(samples) => {
            write_u8_attr(&group, attr::PTYPE, PTYPE_SCALAR)?;
            write_u32_attr(&group, attr::NUM_SAMPLES, samples.samples.len() as u32)?;
            write_u32_attr(&group, attr::FIRST_CHANGED, samples.first_changed)?;
            write_u32_attr(&group, attr::LAST_CHANGED, samples.last_changed)?;

            let constant = node.is_constant();
            for (i, bytes) in samples.samples.iter().enumerate() {
                if constant && i > 0 {
                    break;
                }
                let ds = group
                    .new_dataset_builder()
                    .with_data(bytes.as_slice())
                    .create(format!("s{i}").as_str())?;
                ds.new_attr::<u8>()
                    .shape(16)
                    .create(attr::KEY)?
                    .write(&samples.digests[i])?;
            }
        }
        StagedPropertyData::Array(samples) => {
            write_u8_attr(&group, attr::PTYPE, PTYPE_ARRAY)?;
            write_u32_attr(&group, attr::NUM_SAMPLES, samples.samples.len() as u32)?;
            write_u32_attr(&group, attr::FIRST_CHANGED, samples.first_changed)?;
            write_u32_attr(&group, attr::LAST_CHANGED, samples.last_changed)?;

            let constant = node.is_constant();
            for (i, sample) in samples.samples.iter().enumerate() {
                if constant && i > 0 {
                    break;
                }
                let ds = group
                    .new_dataset_builder()
                    .with_data(sample.bytes.as_slice())
                    .create(format!("s{i}").as_str())?;
                ds.new_attr::<u64>()
                    .shape(sample.dims.len())
                    .create(attr::DIMS)?
                    .write(&sample.dims)?;
                ds.new_attr::<u8>()
                    .shape(16)
                    .create(attr::KEY)?
                    .write(&sample.digest)?;
            }
        }
        StagedPropertyData::Compound { .. } => unreachable!("dispatched in write_compound"),
    }
    Ok(())
}

// Attribute plumbing. libhdf5 rejects zero-size attribute writes of
// variable-length strings on some versions, so empty strings are skipped
// and read back as absent.

fn write_str_attr(loc: &hdf5::Location, name: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Ok(());
    }
    let text = VarLenUnicode::from_str(value)
        .map_err(|e| Error::io(format!("attribute {name}: {e}")))?;
    loc.new_attr::<VarLenUnicode>()
        .create(name)?
        .write_scalar(&text)?;
    Ok(())
}

fn write_u8_attr(loc: &hdf5::Location, name: &str, value: u8) -> Result<()> {
    loc.new_attr::<u8>().create(name)?.write_scalar(&value)?;
    Ok(())
}

fn write_u32_attr(loc: &hdf5::Location, name: &str, value: u32) -> Result<()> {
    loc.new_attr::<u32>().create(name)?.write_scalar(&value)?;
    Ok(())
}

fn write_i32_attr(loc: &hdf5::Location, name: &str, value: i32) -> Result<()> {
    loc.new_attr::<i32>().create(name)?.write_scalar(&value)?;
    Ok(())
}
