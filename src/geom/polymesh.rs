//! Polygon mesh schema.
//!
//! A mesh object carries a `.geom` compound with `P` (point positions),
//! `.faceIndices`, `.faceCounts`, a `.selfBnds` bound box per sample, and
//! optionally a `uv` geometry parameter.

use glam::Vec3;

use crate::abc::{IObject, OObject};
use crate::core::{GeometryScope, MetaData, PropertyHeader};
use crate::util::{DataType, Error, Result};

use super::geom_param::{IGeomParam, OGeomParam};
use super::require_schema;

/// Schema tag for polygon mesh objects.
pub const POLYMESH_SCHEMA: &str = "AbcGeom_PolyMesh_v1";

const GEOM_COMPOUND: &str = ".geom";
const POSITIONS_PROPERTY: &str = "P";
const FACE_INDICES_PROPERTY: &str = ".faceIndices";
const FACE_COUNTS_PROPERTY: &str = ".faceCounts";
const SELF_BOUNDS_PROPERTY: &str = ".selfBnds";
const UV_PROPERTY: &str = "uv";

/// One mesh sample.
#[derive(Clone, Debug, Default)]
pub struct PolyMeshSample {
    pub positions: Vec<Vec3>,
    /// Per-corner indices into `positions`.
    pub face_indices: Vec<i32>,
    /// Vertex count per face.
    pub face_counts: Vec<i32>,
    /// Optional per-corner UVs, `[u, v]` per entry.
    pub uvs: Option<Vec<[f32; 2]>>,
}

impl PolyMeshSample {
    pub fn new(positions: Vec<Vec3>, face_counts: Vec<i32>, face_indices: Vec<i32>) -> Self {
        Self {
            positions,
            face_indices,
            face_counts,
            uvs: None,
        }
    }

    pub fn with_uvs(mut self, uvs: Vec<[f32; 2]>) -> Self {
        self.uvs = Some(uvs);
        self
    }

    pub fn num_vertices(&self) -> usize {
        self.positions.len()
    }

    pub fn num_faces(&self) -> usize {
        self.face_counts.len()
    }

    /// Axis-aligned bounds of the positions as `[min xyz, max xyz]`.
    pub fn bounds(&self) -> [f64; 6] {
        let mut min = Vec3::splat(f32::INFINITY);
        let mut max = Vec3::splat(f32::NEG_INFINITY);
        for p in &self.positions {
            min = min.min(*p);
            max = max.max(*p);
        }
        if self.positions.is_empty() {
            return [0.0; 6];
        }
        [
            min.x as f64,
            min.y as f64,
            min.z as f64,
            max.x as f64,
            max.y as f64,
            max.z as f64,
        ]
    }
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

/// Mesh writer, builder style: collect samples, then
/// [`attach`](Self::attach) under a parent object.
pub struct OPolyMesh {
    name: String,
    time_sampling_index: u32,
    samples: Vec<PolyMeshSample>,
}

impl OPolyMesh {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            time_sampling_index: 0,
            samples: Vec::new(),
        }
    }

    pub fn with_time_sampling(mut self, index: u32) -> Self {
        self.time_sampling_index = index;
        self
    }

    pub fn add_sample(&mut self, sample: PolyMeshSample) -> &mut Self {
        self.samples.push(sample);
        self
    }

    /// Create the mesh object under `parent` and write every staged sample.
    pub fn attach(self, parent: &OObject) -> Result<OObject> {
        let mut meta = MetaData::new();
        meta.set_schema(POLYMESH_SCHEMA);

        let object = parent.create_child_with(&self.name, meta.clone())?;
        let geom = object
            .properties()
            .create_compound_with(PropertyHeader::compound(GEOM_COMPOUND).with_meta_data(meta))?;

        let mut point_meta = MetaData::new();
        point_meta.set(MetaData::INTERPRETATION_KEY, "point");
        let positions = geom.create_array_with(
            PropertyHeader::array(POSITIONS_PROPERTY, DataType::VEC3F)
                .with_time_sampling(self.time_sampling_index)
                .with_meta_data(point_meta),
        )?;
        let face_indices = geom.create_array_with(
            PropertyHeader::array(FACE_INDICES_PROPERTY, DataType::INT32)
                .with_time_sampling(self.time_sampling_index),
        )?;
        let face_counts = geom.create_array_with(
            PropertyHeader::array(FACE_COUNTS_PROPERTY, DataType::INT32)
                .with_time_sampling(self.time_sampling_index),
        )?;
        let bounds = geom.create_scalar_with(
            PropertyHeader::scalar(SELF_BOUNDS_PROPERTY, DataType::BOX3D)
                .with_time_sampling(self.time_sampling_index),
        )?;

        for sample in &self.samples {
            let flat: &[f32] = bytemuck::cast_slice(&sample.positions);
            positions.add_sample(
                bytemuck::cast_slice(flat),
                Some(&[sample.positions.len() as u64]),
            )?;
            face_indices.add_typed(&sample.face_indices)?;
            face_counts.add_typed(&sample.face_counts)?;
            bounds.add_typed(&sample.bounds())?;
        }

        if self.samples.iter().any(|s| s.uvs.is_some()) {
            let mut uv_param = OGeomParam::new(
                UV_PROPERTY,
                DataType::VEC2F,
                GeometryScope::FaceVarying,
            )
            .with_time_sampling(self.time_sampling_index);
            for sample in &self.samples {
                let uvs = sample.uvs.as_deref().unwrap_or(&[]);
                uv_param.add_sample(bytemuck::cast_slice(uvs).to_vec());
            }
            uv_param.attach(&geom)?;
        }

        Ok(object)
    }
}

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

/// Mesh reader over an object with the [`POLYMESH_SCHEMA`] tag.
pub struct IPolyMesh {
    object: IObject,
    geom: crate::abc::ICompoundProperty,
}

impl IPolyMesh {
    /// Does the header carry the mesh schema tag?
    pub fn matches(meta: &MetaData) -> bool {
        meta.matches_schema(POLYMESH_SCHEMA)
    }

    /// Wrap `object`; fails with `SchemaMismatch` on any other schema tag.
    pub fn new(object: &IObject) -> Result<Self> {
        require_schema(&object.header().meta_data, POLYMESH_SCHEMA)?;
        let props = object.properties()?;
        let geom = props
            .compound_by_name(GEOM_COMPOUND)
            .ok_or_else(|| Error::io("mesh object without .geom compound"))?;
        Ok(Self {
            object: object.clone(),
            geom,
        })
    }

    pub fn object(&self) -> &IObject {
        &self.object
    }

    pub fn num_samples(&self) -> usize {
        self.geom
            .array_by_name(POSITIONS_PROPERTY)
            .map(|p| p.num_samples())
            .unwrap_or(0)
    }

    pub fn is_constant(&self) -> bool {
        self.geom
            .array_by_name(POSITIONS_PROPERTY)
            .map(|p| p.is_constant())
            .unwrap_or(true)
    }

    /// Read the sample at `index`.
    pub fn sample(&self, index: usize) -> Result<PolyMeshSample> {
        let positions_prop = self
            .geom
            .array_by_name(POSITIONS_PROPERTY)
            .ok_or_else(|| Error::io("mesh without P"))?;
        let flat = positions_prop.get_typed::<f32>(index)?;
        let positions = flat
            .chunks_exact(3)
            .map(|c| Vec3::new(c[0], c[1], c[2]))
            .collect();

        let face_indices = self
            .geom
            .array_by_name(FACE_INDICES_PROPERTY)
            .ok_or_else(|| Error::io("mesh without .faceIndices"))?
            .get_typed::<i32>(index)?;
        let face_counts = self
            .geom
            .array_by_name(FACE_COUNTS_PROPERTY)
            .ok_or_else(|| Error::io("mesh without .faceCounts"))?
            .get_typed::<i32>(index)?;

        let uvs = IGeomParam::new(&self.geom, UV_PROPERTY)
            .map(|param| -> Result<Vec<[f32; 2]>> {
                let sample = param.sample(index)?;
                Ok(sample
                    .expand_f32(2)
                    .chunks_exact(2)
                    .map(|c| [c[0], c[1]])
                    .collect())
            })
            .transpose()?;

        Ok(PolyMeshSample {
            positions,
            face_indices,
            face_counts,
            uvs,
        })
    }

    /// Stored bounds of the sample at `index`.
    pub fn bounds(&self, index: usize) -> Result<[f64; 6]> {
        self.geom
            .scalar_by_name(SELF_BOUNDS_PROPERTY)
            .ok_or_else(|| Error::io("mesh without .selfBnds"))?
            .get_typed::<[f64; 6]>(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_bounds() {
        let sample = PolyMeshSample::new(
            vec![
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(1.0, 2.0, -1.0),
                Vec3::new(0.5, 1.0, 0.0),
            ],
            vec![3],
            vec![0, 1, 2],
        );
        assert_eq!(sample.num_vertices(), 3);
        assert_eq!(sample.num_faces(), 1);
        assert_eq!(sample.bounds(), [0.0, 0.0, -1.0, 1.0, 2.0, 0.0]);
    }
}
