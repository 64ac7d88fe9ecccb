//! Write-side staging tree.
//!
//! A writer archive accumulates its whole object/property tree and every
//! sample in memory; the backend sink serializes the finished tree in one
//! pass at close. Nothing touches the file before that, so an interrupted
//! write can never corrupt a previously closed archive.

use std::collections::HashMap;
use std::sync::Arc;

use super::{
    compute_digest, MetaData, ObjectHeader, PropertyHeader, PropertyType, SampleDigest,
    TimeSampling,
};
use crate::util::{DataType, Error, Result};

/// Index of a staged object.
pub type ObjId = usize;
/// Index of a staged property.
pub type PropId = usize;

/// The implicit top object.
pub const ROOT_OBJECT: ObjId = 0;

/// A staged object node.
#[derive(Debug)]
pub struct StagedObject {
    pub header: ObjectHeader,
    pub parent: Option<ObjId>,
    pub children: Vec<ObjId>,
    /// The object's single top compound property.
    pub properties: PropId,
}

/// Samples of a staged scalar property.
#[derive(Debug, Default)]
pub struct ScalarSamples {
    pub samples: Vec<Vec<u8>>,
    pub digests: Vec<SampleDigest>,
    /// First index whose value differs from its predecessor; 0 while all
    /// samples are identical.
    pub first_changed: u32,
    pub last_changed: u32,
}

/// One staged array sample.
#[derive(Debug)]
pub struct StagedArraySample {
    pub bytes: Vec<u8>,
    pub dims: Vec<u64>,
    pub digest: SampleDigest,
}

/// Samples of a staged array property.
#[derive(Debug, Default)]
pub struct ArraySamples {
    pub samples: Vec<StagedArraySample>,
    pub first_changed: u32,
    pub last_changed: u32,
}

/// Per-variant staged payload.
#[derive(Debug)]
pub enum StagedPropertyData {
    Scalar(ScalarSamples),
    Array(ArraySamples),
    Compound {
        children: Vec<PropId>,
        by_name: HashMap<String, PropId>,
    },
}

/// A staged property node.
#[derive(Debug)]
pub struct StagedProperty {
    pub header: PropertyHeader,
    pub parent: Option<PropId>,
    pub data: StagedPropertyData,
}

impl StagedProperty {
    pub fn num_samples(&self) -> usize {
        match &self.data {
            StagedPropertyData::Scalar(s) => s.samples.len(),
            StagedPropertyData::Array(s) => s.samples.len(),
            StagedPropertyData::Compound { .. } => 0,
        }
    }

    /// Constant means no appended sample ever differed from its predecessor.
    pub fn is_constant(&self) -> bool {
        let (first, last) = match &self.data {
            StagedPropertyData::Scalar(s) => (s.first_changed, s.last_changed),
            StagedPropertyData::Array(s) => (s.first_changed, s.last_changed),
            StagedPropertyData::Compound { .. } => return false,
        };
        first == 0 && last == 0
    }
}

/// The complete staged archive: object tree, property trees, samples and the
/// shared time sampling table.
pub struct ArchiveStaging {
    pub archive_metadata: MetaData,
    pub time_samplings: Vec<Arc<TimeSampling>>,
    /// Highest appended sample count per time sampling index.
    pub max_samples: Vec<u32>,
    pub objects: Vec<StagedObject>,
    pub properties: Vec<StagedProperty>,
}

impl ArchiveStaging {
    /// Fresh staging with the implicit root object and the identity time
    /// sampling at table index 0.
    pub fn new() -> Self {
        let root_props = StagedProperty {
            header: PropertyHeader::compound(""),
            parent: None,
            data: StagedPropertyData::Compound {
                children: Vec::new(),
                by_name: HashMap::new(),
            },
        };
        let root = StagedObject {
            header: ObjectHeader::new("ABC", "/"),
            parent: None,
            children: Vec::new(),
            properties: 0,
        };
        Self {
            archive_metadata: MetaData::new(),
            time_samplings: vec![Arc::new(TimeSampling::identity())],
            max_samples: vec![0],
            objects: vec![root],
            properties: vec![root_props],
        }
    }

    /// Register a time sampling, reusing an equivalent existing entry.
    pub fn add_time_sampling(&mut self, ts: TimeSampling) -> u32 {
        for (i, existing) in self.time_samplings.iter().enumerate() {
            if existing.is_equivalent(&ts) {
                return i as u32;
            }
        }
        self.time_samplings.push(Arc::new(ts));
        self.max_samples.push(0);
        (self.time_samplings.len() - 1) as u32
    }

    pub fn object(&self, id: ObjId) -> &StagedObject {
        &self.objects[id]
    }

    pub fn property(&self, id: PropId) -> &StagedProperty {
        &self.properties[id]
    }

    /// Append a child object. Fails with `DuplicateName` on a sibling name
    /// collision; the existing child is untouched.
    pub fn create_child(&mut self, parent: ObjId, name: &str, meta: MetaData) -> Result<ObjId> {
        let parent_full = self.objects[parent].header.full_name.clone();
        if self.objects[parent]
            .children
            .iter()
            .any(|&c| self.objects[c].header.name == name)
        {
            return Err(Error::DuplicateName {
                parent: parent_full,
                name: name.to_string(),
            });
        }

        let full_name = if parent_full == "/" {
            format!("/{name}")
        } else {
            format!("{parent_full}/{name}")
        };

        let props = self.properties.len();
        self.properties.push(StagedProperty {
            header: PropertyHeader::compound(""),
            parent: None,
            data: StagedPropertyData::Compound {
                children: Vec::new(),
                by_name: HashMap::new(),
            },
        });

        let id = self.objects.len();
        self.objects.push(StagedObject {
            header: ObjectHeader::new(name, full_name).with_meta_data(meta),
            parent: Some(parent),
            children: Vec::new(),
            properties: props,
        });
        self.objects[parent].children.push(id);
        Ok(id)
    }

    /// Append a property under a compound. The header's name must be unique
    /// among the compound's children, its data type valid for the variant,
    /// and its time sampling index must refer to a registered sampling.
    pub fn create_property(&mut self, parent: PropId, header: PropertyHeader) -> Result<PropId> {
        let ts_index = header.time_sampling_index as usize;
        if ts_index >= self.time_samplings.len() {
            return Err(Error::IndexOutOfRange {
                index: ts_index,
                count: self.time_samplings.len(),
            });
        }

        if header.property_type != PropertyType::Compound {
            let dt = header.data_type;
            if !dt.is_valid() {
                return Err(Error::type_mismatch("a known data type", dt));
            }
            // string kinds are single-element by definition
            if dt.pod.is_string() && dt.extent != 1 {
                return Err(Error::type_mismatch("string with extent 1", dt));
            }
        }

        let data = match header.property_type {
            PropertyType::Scalar => StagedPropertyData::Scalar(ScalarSamples::default()),
            PropertyType::Array => StagedPropertyData::Array(ArraySamples::default()),
            PropertyType::Compound => StagedPropertyData::Compound {
                children: Vec::new(),
                by_name: HashMap::new(),
            },
        };

        let parent_name = self.properties[parent].header.name.clone();
        let id = self.properties.len();
        let StagedPropertyData::Compound { children, by_name } = &mut self.properties[parent].data
        else {
            return Err(Error::state("parent property is not a compound"));
        };
        if by_name.contains_key(&header.name) {
            return Err(Error::DuplicateName {
                parent: parent_name,
                name: header.name.clone(),
            });
        }

        by_name.insert(header.name.clone(), id);
        children.push(id);
        self.properties.push(StagedProperty {
            header,
            parent: Some(parent),
            data,
        });
        Ok(id)
    }

    /// Append a scalar sample. The byte length must match the property's
    /// data type exactly (string kinds are variable-length and exempt).
    pub fn add_scalar_sample(&mut self, prop: PropId, bytes: &[u8]) -> Result<usize> {
        let header = &self.properties[prop].header;
        let dt = header.data_type;
        if !dt.pod.is_string() && bytes.len() != dt.num_bytes() {
            return Err(Error::type_mismatch(
                format!("{dt} ({} bytes)", dt.num_bytes()),
                format!("{} bytes", bytes.len()),
            ));
        }
        let ts_index = header.time_sampling_index;

        let StagedPropertyData::Scalar(samples) = &mut self.properties[prop].data else {
            return Err(Error::state("property is not scalar"));
        };

        let digest = compute_digest(bytes);
        let index = samples.samples.len();
        if let Some(prev) = samples.digests.last() {
            if *prev != digest {
                if samples.first_changed == 0 {
                    samples.first_changed = index as u32;
                }
                samples.last_changed = index as u32;
            }
        }
        samples.samples.push(bytes.to_vec());
        samples.digests.push(digest);

        self.note_samples(ts_index, index + 1);
        Ok(index)
    }

    /// Append an array sample with explicit dimensions. A single dimension
    /// equal to the element count is inferred when `dims` is empty.
    pub fn add_array_sample(
        &mut self,
        prop: PropId,
        bytes: &[u8],
        dims: Option<&[u64]>,
    ) -> Result<usize> {
        let header = &self.properties[prop].header;
        let dt = header.data_type;
        let elem_bytes = dt.num_bytes();
        if !dt.pod.is_string() && (elem_bytes == 0 || bytes.len() % elem_bytes != 0) {
            return Err(Error::type_mismatch(
                format!("multiple of {elem_bytes} bytes ({dt})"),
                format!("{} bytes", bytes.len()),
            ));
        }

        let dims: Vec<u64> = match dims {
            Some(d) => {
                let total: u64 = d.iter().product();
                if !dt.pod.is_string() && total as usize * elem_bytes != bytes.len() {
                    return Err(Error::type_mismatch(
                        format!("{total} elements of {dt}"),
                        format!("{} bytes", bytes.len()),
                    ));
                }
                d.to_vec()
            }
            None => {
                let count = if dt.pod.is_string() {
                    bytes.iter().filter(|&&b| b == 0).count() as u64
                } else {
                    (bytes.len() / elem_bytes) as u64
                };
                vec![count]
            }
        };

        let ts_index = header.time_sampling_index;
        let StagedPropertyData::Array(samples) = &mut self.properties[prop].data else {
            return Err(Error::state("property is not an array"));
        };

        let digest = compute_digest(bytes);
        let index = samples.samples.len();
        if let Some(prev) = samples.samples.last() {
            // Equality is checked against the immediately preceding sample
            // only; non-adjacent duplicates do not collapse.
            if prev.digest != digest {
                if samples.first_changed == 0 {
                    samples.first_changed = index as u32;
                }
                samples.last_changed = index as u32;
            }
        }
        samples.samples.push(StagedArraySample {
            bytes: bytes.to_vec(),
            dims,
            digest,
        });

        self.note_samples(ts_index, index + 1);
        Ok(index)
    }

    fn note_samples(&mut self, ts_index: u32, count: usize) {
        if let Some(max) = self.max_samples.get_mut(ts_index as usize) {
            *max = (*max).max(count as u32);
        }
    }
}

impl Default for ArchiveStaging {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_is_preseeded() {
        let staging = ArchiveStaging::new();
        assert_eq!(staging.objects.len(), 1);
        assert_eq!(staging.object(ROOT_OBJECT).header.name, "ABC");
        assert_eq!(staging.object(ROOT_OBJECT).header.full_name, "/");
        assert_eq!(staging.time_samplings.len(), 1);
    }

    #[test]
    fn duplicate_child_rejected() {
        let mut staging = ArchiveStaging::new();
        let a = staging
            .create_child(ROOT_OBJECT, "a", MetaData::new())
            .unwrap();
        let err = staging
            .create_child(ROOT_OBJECT, "a", MetaData::new())
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateName { .. }));
        // the first child is unaffected
        assert_eq!(staging.object(a).header.full_name, "/a");
        assert_eq!(staging.object(ROOT_OBJECT).children.len(), 1);
    }

    #[test]
    fn duplicate_property_rejected() {
        let mut staging = ArchiveStaging::new();
        let root_props = staging.object(ROOT_OBJECT).properties;
        staging
            .create_property(root_props, PropertyHeader::scalar("v", DataType::FLOAT32))
            .unwrap();
        let err = staging
            .create_property(root_props, PropertyHeader::array("v", DataType::UINT32))
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateName { .. }));
    }

    #[test]
    fn scalar_sample_type_checked() {
        let mut staging = ArchiveStaging::new();
        let root_props = staging.object(ROOT_OBJECT).properties;
        let p = staging
            .create_property(root_props, PropertyHeader::scalar("v", DataType::FLOAT32))
            .unwrap();
        staging.add_scalar_sample(p, &1.0f32.to_le_bytes()).unwrap();
        let err = staging.add_scalar_sample(p, &1.0f64.to_le_bytes()).unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { .. }));
        // the failed append left no trace
        assert_eq!(staging.property(p).num_samples(), 1);
    }

    #[test]
    fn constant_tracks_previous_sample_only() {
        let mut staging = ArchiveStaging::new();
        let root_props = staging.object(ROOT_OBJECT).properties;
        let p = staging
            .create_property(root_props, PropertyHeader::array("v", DataType::UINT32))
            .unwrap();

        let a: &[u8] = bytemuck::cast_slice::<u32, u8>(&[1, 2, 3]);
        let b: &[u8] = bytemuck::cast_slice::<u32, u8>(&[4, 5, 6]);

        staging.add_array_sample(p, a, None).unwrap();
        staging.add_array_sample(p, a, None).unwrap();
        assert!(staging.property(p).is_constant());

        staging.add_array_sample(p, b, None).unwrap();
        assert!(!staging.property(p).is_constant());

        // returning to the original value does not restore constancy
        staging.add_array_sample(p, a, None).unwrap();
        assert!(!staging.property(p).is_constant());
    }

    #[test]
    fn max_samples_follow_appends() {
        let mut staging = ArchiveStaging::new();
        let ts = staging.add_time_sampling(TimeSampling::uniform(1.0 / 24.0, 0.0));
        assert_eq!(ts, 1);
        // registering an equivalent sampling reuses the slot
        assert_eq!(
            staging.add_time_sampling(TimeSampling::uniform(1.0 / 24.0, 0.0)),
            1
        );

        let root_props = staging.object(ROOT_OBJECT).properties;
        let p = staging
            .create_property(
                root_props,
                PropertyHeader::scalar("v", DataType::UINT8).with_time_sampling(ts),
            )
            .unwrap();
        staging.add_scalar_sample(p, &[1]).unwrap();
        staging.add_scalar_sample(p, &[2]).unwrap();
        assert_eq!(staging.max_samples[1], 2);
    }
}
