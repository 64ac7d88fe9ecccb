//! Geometry parameters: per-element attributes, optionally indexed.
//!
//! A non-indexed parameter is a bare array property. An indexed parameter
//! is a compound of `.vals` (the distinct values) and `.indices` (u32 per
//! element); both forms carry their [`GeometryScope`] in metadata.

use crate::abc::{ICompoundProperty, OCompoundProperty};
use crate::core::{GeometryScope, MetaData, PropertyHeader};
use crate::util::{DataType, Error, Result};

/// Metadata key carrying the geometry scope token.
pub const GEO_SCOPE_KEY: &str = "geoScope";

const VALS_PROPERTY: &str = ".vals";
const INDICES_PROPERTY: &str = ".indices";

/// One decoded geometry parameter sample.
#[derive(Clone, Debug)]
pub struct GeomParamSample {
    /// Raw value payload.
    pub values: Vec<u8>,
    /// Element indices for indexed parameters.
    pub indices: Option<Vec<u32>>,
    pub scope: GeometryScope,
    pub data_type: DataType,
}

impl GeomParamSample {
    /// Distinct value count (not expanded through indices).
    pub fn num_values(&self) -> usize {
        let elem = self.data_type.num_bytes();
        if elem == 0 {
            0
        } else {
            self.values.len() / elem
        }
    }

    /// Final element count: index count when indexed, value count
    /// otherwise.
    pub fn num_elements(&self) -> usize {
        match &self.indices {
            Some(idx) => idx.len(),
            None => self.num_values(),
        }
    }

    /// Values as an f32 slice (for float parameters).
    pub fn values_as_f32(&self) -> &[f32] {
        bytemuck::try_cast_slice(&self.values).unwrap_or(&[])
    }

    /// Expand through the index table into one value per element, `width`
    /// f32 components each.
    pub fn expand_f32(&self, width: usize) -> Vec<f32> {
        let vals = self.values_as_f32();
        let Some(indices) = &self.indices else {
            return vals.to_vec();
        };
        let mut out = Vec::with_capacity(indices.len() * width);
        for &i in indices {
            let start = i as usize * width;
            if start + width <= vals.len() {
                out.extend_from_slice(&vals[start..start + width]);
            } else {
                out.extend(std::iter::repeat(0.0f32).take(width));
            }
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

/// Geometry parameter writer, builder style: collect samples, then
/// [`attach`](Self::attach) into a parent compound.
pub struct OGeomParam {
    name: String,
    data_type: DataType,
    scope: GeometryScope,
    time_sampling_index: u32,
    samples: Vec<(Vec<u8>, Option<Vec<u32>>)>,
}

impl OGeomParam {
    pub fn new(name: impl Into<String>, data_type: DataType, scope: GeometryScope) -> Self {
        Self {
            name: name.into(),
            data_type,
            scope,
            time_sampling_index: 0,
            samples: Vec::new(),
        }
    }

    pub fn with_time_sampling(mut self, index: u32) -> Self {
        self.time_sampling_index = index;
        self
    }

    /// Stage a non-indexed sample.
    pub fn add_sample(&mut self, values: Vec<u8>) -> &mut Self {
        self.samples.push((values, None));
        self
    }

    /// Stage an indexed sample.
    pub fn add_indexed_sample(&mut self, values: Vec<u8>, indices: Vec<u32>) -> &mut Self {
        self.samples.push((values, Some(indices)));
        self
    }

    /// Write the parameter into `parent`. Mixing indexed and non-indexed
    /// samples is rejected.
    pub fn attach(self, parent: &OCompoundProperty) -> Result<()> {
        let indexed = self
            .samples
            .first()
            .map(|(_, i)| i.is_some())
            .unwrap_or(false);
        if self.samples.iter().any(|(_, i)| i.is_some() != indexed) {
            return Err(Error::type_mismatch(
                "all samples indexed or all samples non-indexed",
                "mixed",
            ));
        }

        let mut meta = MetaData::new();
        meta.set(GEO_SCOPE_KEY, self.scope.as_str());

        if !indexed {
            let prop = parent.create_array_with(
                PropertyHeader::array(&self.name, self.data_type)
                    .with_time_sampling(self.time_sampling_index)
                    .with_meta_data(meta),
            )?;
            for (values, _) in &self.samples {
                prop.add_sample(values, None)?;
            }
            return Ok(());
        }

        let compound = parent.create_compound_with(
            PropertyHeader::compound(&self.name).with_meta_data(meta.clone()),
        )?;
        let vals = compound.create_array_with(
            PropertyHeader::array(VALS_PROPERTY, self.data_type)
                .with_time_sampling(self.time_sampling_index)
                .with_meta_data(meta),
        )?;
        let indices = compound.create_array_with(
            PropertyHeader::array(INDICES_PROPERTY, DataType::UINT32)
                .with_time_sampling(self.time_sampling_index),
        )?;
        for (values, index_table) in &self.samples {
            vals.add_sample(values, None)?;
            indices.add_typed(index_table.as_deref().unwrap_or(&[]))?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

/// Geometry parameter reader over either representation.
pub struct IGeomParam {
    name: String,
    scope: GeometryScope,
    data_type: DataType,
    values: crate::abc::IArrayProperty,
    indices: Option<crate::abc::IArrayProperty>,
}

impl IGeomParam {
    /// Look up `name` in `parent`; `None` when absent or not a parameter.
    pub fn new(parent: &ICompoundProperty, name: &str) -> Option<Self> {
        let prop = parent.property_by_name(name)?;
        match prop {
            crate::abc::IProperty::Array(values) => {
                let scope = scope_of(values.header().meta_data.get(GEO_SCOPE_KEY));
                Some(Self {
                    name: name.to_string(),
                    scope,
                    data_type: values.header().data_type,
                    values,
                    indices: None,
                })
            }
            crate::abc::IProperty::Compound(compound) => {
                let values = compound.array_by_name(VALS_PROPERTY)?;
                let indices = compound.array_by_name(INDICES_PROPERTY)?;
                let scope = scope_of(compound.header().meta_data.get(GEO_SCOPE_KEY));
                Some(Self {
                    name: name.to_string(),
                    scope,
                    data_type: values.header().data_type,
                    values,
                    indices: Some(indices),
                })
            }
            _ => None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn scope(&self) -> GeometryScope {
        self.scope
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn is_indexed(&self) -> bool {
        self.indices.is_some()
    }

    pub fn num_samples(&self) -> usize {
        self.values.num_samples()
    }

    pub fn is_constant(&self) -> bool {
        self.values.is_constant()
            && self
                .indices
                .as_ref()
                .map(|i| i.is_constant())
                .unwrap_or(true)
    }

    /// Read the sample at `index`.
    pub fn sample(&self, index: usize) -> Result<GeomParamSample> {
        let values = self.values.sample_bytes(index)?;
        let indices = self
            .indices
            .as_ref()
            .map(|p| p.get_typed::<u32>(index))
            .transpose()?;
        Ok(GeomParamSample {
            values,
            indices,
            scope: self.scope,
            data_type: self.data_type,
        })
    }
}

fn scope_of(token: Option<&str>) -> GeometryScope {
    token.map(GeometryScope::parse).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expand_through_indices() {
        let values: Vec<u8> = bytemuck::cast_slice(&[1.0f32, 2.0, 10.0, 20.0]).to_vec();
        let sample = GeomParamSample {
            values,
            indices: Some(vec![1, 0, 1]),
            scope: GeometryScope::FaceVarying,
            data_type: DataType::VEC2F,
        };
        assert_eq!(sample.num_values(), 2);
        assert_eq!(sample.num_elements(), 3);
        assert_eq!(sample.expand_f32(2), [10.0, 20.0, 1.0, 2.0, 10.0, 20.0]);
    }

    #[test]
    fn non_indexed_passthrough() {
        let values: Vec<u8> = bytemuck::cast_slice(&[3.0f32, 4.0]).to_vec();
        let sample = GeomParamSample {
            values,
            indices: None,
            scope: GeometryScope::Vertex,
            data_type: DataType::FLOAT32,
        };
        assert_eq!(sample.num_elements(), 2);
        assert_eq!(sample.expand_f32(1), [3.0, 4.0]);
    }
}
