//! Transform schema: a stack of operations sampled over time.
//!
//! On disk an xform is a `.xform` compound with a static `.ops` scalar (one
//! encoded byte per operation), a `.vals` array holding every operation
//! channel per sample, a `.animChans` array naming the channels that vary,
//! and an `.inherits` flag.

use glam::{DMat4, DVec3};

use crate::abc::{IObject, OObject};
use crate::core::{MetaData, PropertyHeader};
use crate::util::{DataType, Error, Result};

use super::require_schema;

/// Schema tag for transform objects.
pub const XFORM_SCHEMA: &str = "AbcGeom_Xform_v3";

const XFORM_COMPOUND: &str = ".xform";
const OPS_PROPERTY: &str = ".ops";
const VALS_PROPERTY: &str = ".vals";
const ANIM_CHANS_PROPERTY: &str = ".animChans";
const INHERITS_PROPERTY: &str = ".inherits";

/// Transform operation kinds, with their on-disk encoding in the high
/// nibble of the `.ops` byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum XformOpKind {
    Scale,
    Translate,
    /// Axis + angle (degrees).
    Rotate,
    /// Full row-major 4x4 matrix.
    Matrix,
    RotateX,
    RotateY,
    RotateZ,
}

impl XformOpKind {
    /// Number of value channels the operation consumes.
    pub const fn num_channels(self) -> usize {
        match self {
            Self::Scale | Self::Translate => 3,
            Self::Rotate => 4,
            Self::Matrix => 16,
            Self::RotateX | Self::RotateY | Self::RotateZ => 1,
        }
    }

    pub(crate) const fn encode(self) -> u8 {
        let kind: u8 = match self {
            Self::Scale => 0,
            Self::Translate => 1,
            Self::Rotate => 2,
            Self::Matrix => 3,
            Self::RotateX => 4,
            Self::RotateY => 5,
            Self::RotateZ => 6,
        };
        kind << 4
    }

    pub(crate) const fn decode(byte: u8) -> Option<Self> {
        match byte >> 4 {
            0 => Some(Self::Scale),
            1 => Some(Self::Translate),
            2 => Some(Self::Rotate),
            3 => Some(Self::Matrix),
            4 => Some(Self::RotateX),
            5 => Some(Self::RotateY),
            6 => Some(Self::RotateZ),
            _ => None,
        }
    }
}

/// One transform operation of one sample.
#[derive(Clone, Debug)]
pub struct XformOp {
    pub kind: XformOpKind,
    /// Channel values, `kind.num_channels()` long.
    pub values: Vec<f64>,
    /// Per-channel animation flags, filled in by the reader.
    pub animated: Vec<bool>,
}

impl XformOp {
    fn new(kind: XformOpKind, values: Vec<f64>) -> Self {
        debug_assert_eq!(values.len(), kind.num_channels());
        let animated = vec![false; values.len()];
        Self {
            kind,
            values,
            animated,
        }
    }

    pub fn translate(x: f64, y: f64, z: f64) -> Self {
        Self::new(XformOpKind::Translate, vec![x, y, z])
    }

    pub fn scale(x: f64, y: f64, z: f64) -> Self {
        Self::new(XformOpKind::Scale, vec![x, y, z])
    }

    /// Rotation around X, in degrees.
    pub fn rotate_x(degrees: f64) -> Self {
        Self::new(XformOpKind::RotateX, vec![degrees])
    }

    /// Rotation around Y, in degrees.
    pub fn rotate_y(degrees: f64) -> Self {
        Self::new(XformOpKind::RotateY, vec![degrees])
    }

    /// Rotation around Z, in degrees.
    pub fn rotate_z(degrees: f64) -> Self {
        Self::new(XformOpKind::RotateZ, vec![degrees])
    }

    /// Rotation around an arbitrary axis, angle in degrees.
    pub fn rotate(axis: DVec3, degrees: f64) -> Self {
        Self::new(XformOpKind::Rotate, vec![axis.x, axis.y, axis.z, degrees])
    }

    /// Row-major 4x4 matrix operation.
    pub fn matrix_op(m: [f64; 16]) -> Self {
        Self::new(XformOpKind::Matrix, m.to_vec())
    }

    /// Is the first channel animated across the property's samples?
    pub fn is_x_animated(&self) -> bool {
        self.animated.first().copied().unwrap_or(false)
    }

    pub fn is_y_animated(&self) -> bool {
        self.animated.get(1).copied().unwrap_or(false)
    }

    pub fn is_z_animated(&self) -> bool {
        self.animated.get(2).copied().unwrap_or(false)
    }

    /// The operation's matrix contribution.
    pub fn matrix(&self) -> DMat4 {
        let v = &self.values;
        match self.kind {
            XformOpKind::Scale => DMat4::from_scale(DVec3::new(v[0], v[1], v[2])),
            XformOpKind::Translate => DMat4::from_translation(DVec3::new(v[0], v[1], v[2])),
            XformOpKind::RotateX => DMat4::from_rotation_x(v[0].to_radians()),
            XformOpKind::RotateY => DMat4::from_rotation_y(v[0].to_radians()),
            XformOpKind::RotateZ => DMat4::from_rotation_z(v[0].to_radians()),
            XformOpKind::Rotate => {
                let axis = DVec3::new(v[0], v[1], v[2]);
                if axis.length_squared() > 1.0e-8 {
                    DMat4::from_axis_angle(axis.normalize(), v[3].to_radians())
                } else {
                    DMat4::IDENTITY
                }
            }
            XformOpKind::Matrix => {
                // stored row-major; glam is column-major
                DMat4::from_cols_array(&[
                    v[0], v[4], v[8], v[12],
                    v[1], v[5], v[9], v[13],
                    v[2], v[6], v[10], v[14],
                    v[3], v[7], v[11], v[15],
                ])
            }
        }
    }
}

/// One transform sample: an ordered operation stack plus the inherit flag.
#[derive(Clone, Debug)]
pub struct XformSample {
    pub ops: Vec<XformOp>,
    pub inherits: bool,
}

impl Default for XformSample {
    fn default() -> Self {
        Self {
            ops: Vec::new(),
            inherits: true,
        }
    }
}

impl XformSample {
    /// Identity transform (no operations).
    pub fn identity() -> Self {
        Self::default()
    }

    pub fn push(&mut self, op: XformOp) -> &mut Self {
        self.ops.push(op);
        self
    }

    /// Combined matrix, applying operations in stack order.
    pub fn matrix(&self) -> DMat4 {
        let mut result = DMat4::IDENTITY;
        for op in &self.ops {
            result *= op.matrix();
        }
        result
    }

    /// Translation of the first translate operation, falling back to the
    /// combined matrix.
    pub fn translation(&self) -> DVec3 {
        for op in &self.ops {
            if op.kind == XformOpKind::Translate {
                return DVec3::new(op.values[0], op.values[1], op.values[2]);
            }
        }
        self.matrix().w_axis.truncate()
    }

    /// Total channel count across the operation stack.
    pub fn num_channels(&self) -> usize {
        self.ops.iter().map(|op| op.kind.num_channels()).sum()
    }

    fn op_layout(&self) -> Vec<u8> {
        self.ops.iter().map(|op| op.kind.encode()).collect()
    }

    fn channel_values(&self) -> Vec<f64> {
        let mut vals = Vec::with_capacity(self.num_channels());
        for op in &self.ops {
            vals.extend_from_slice(&op.values);
        }
        vals
    }
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

/// Transform writer, builder style: collect samples, then
/// [`attach`](Self::attach) under a parent object.
pub struct OXform {
    name: String,
    time_sampling_index: u32,
    samples: Vec<XformSample>,
}

impl OXform {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            time_sampling_index: 0,
            samples: Vec::new(),
        }
    }

    /// Index the samples against a registered time sampling.
    pub fn with_time_sampling(mut self, index: u32) -> Self {
        self.time_sampling_index = index;
        self
    }

    pub fn add_sample(&mut self, sample: XformSample) -> &mut Self {
        self.samples.push(sample);
        self
    }

    /// Create the transform object under `parent` and write every staged
    /// sample. All samples must share one operation layout.
    pub fn attach(self, parent: &OObject) -> Result<OObject> {
        let first = self.samples.first();
        let layout: Vec<u8> = first.map(|s| s.op_layout()).unwrap_or_default();
        for sample in &self.samples {
            if sample.op_layout() != layout {
                return Err(Error::type_mismatch(
                    "a fixed operation stack across samples",
                    "varying operation stacks",
                ));
            }
        }

        let mut meta = MetaData::new();
        meta.set_schema(XFORM_SCHEMA);

        let object = parent.create_child_with(&self.name, meta.clone())?;
        let xf = object
            .properties()
            .create_compound_with(PropertyHeader::compound(XFORM_COMPOUND).with_meta_data(meta))?;

        let inherits = xf.create_scalar(INHERITS_PROPERTY, DataType::BOOL)?;
        inherits.add_sample(&[first.map(|s| s.inherits).unwrap_or(true) as u8])?;

        if layout.is_empty() {
            return Ok(object);
        }

        // static op layout
        let ops = xf.create_scalar(
            OPS_PROPERTY,
            DataType::new(crate::util::PodKind::Uint8, layout.len() as u8),
        )?;
        ops.add_sample(&layout)?;

        // per-sample channel values
        let vals = xf.create_array_with(
            PropertyHeader::array(VALS_PROPERTY, DataType::FLOAT64)
                .with_time_sampling(self.time_sampling_index),
        )?;
        for sample in &self.samples {
            vals.add_typed(&sample.channel_values())?;
        }

        // channels whose value differs from the first sample anywhere
        let reference = self.samples[0].channel_values();
        let mut animated: Vec<u32> = Vec::new();
        for (c, &first_value) in reference.iter().enumerate() {
            if self
                .samples
                .iter()
                .any(|s| s.channel_values()[c] != first_value)
            {
                animated.push(c as u32);
            }
        }
        let chans = xf.create_array(ANIM_CHANS_PROPERTY, DataType::UINT32)?;
        chans.add_typed(&animated)?;

        Ok(object)
    }
}

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

/// Transform reader over an object with the [`XFORM_SCHEMA`] tag.
pub struct IXform {
    object: IObject,
    xf: crate::abc::ICompoundProperty,
}

impl IXform {
    /// Does the header carry the transform schema tag?
    pub fn matches(meta: &MetaData) -> bool {
        meta.matches_schema(XFORM_SCHEMA)
    }

    /// Wrap `object`; fails with `SchemaMismatch` on any other schema tag.
    pub fn new(object: &IObject) -> Result<Self> {
        require_schema(&object.header().meta_data, XFORM_SCHEMA)?;
        let props = object.properties()?;
        let xf = props
            .compound_by_name(XFORM_COMPOUND)
            .ok_or_else(|| Error::io("transform object without .xform compound"))?;
        Ok(Self {
            object: object.clone(),
            xf,
        })
    }

    pub fn object(&self) -> &IObject {
        &self.object
    }

    /// Number of operations in the (static) stack.
    pub fn num_ops(&self) -> usize {
        self.xf
            .scalar_by_name(OPS_PROPERTY)
            .map(|p| p.header().data_type.extent as usize)
            .unwrap_or(0)
    }

    pub fn num_samples(&self) -> usize {
        self.xf
            .array_by_name(VALS_PROPERTY)
            .map(|p| p.num_samples())
            .unwrap_or(1)
    }

    pub fn is_constant(&self) -> bool {
        self.xf
            .array_by_name(VALS_PROPERTY)
            .map(|p| p.is_constant())
            .unwrap_or(true)
    }

    /// Does this transform compose with its parent?
    pub fn inherits(&self) -> bool {
        self.xf
            .scalar_by_name(INHERITS_PROPERTY)
            .and_then(|p| p.sample_bytes(0usize).ok())
            .map(|b| b.first().copied().unwrap_or(1) != 0)
            .unwrap_or(true)
    }

    /// Read the sample at `index`.
    pub fn sample(&self, index: usize) -> Result<XformSample> {
        let mut sample = XformSample {
            ops: Vec::new(),
            inherits: self.inherits(),
        };

        let Some(ops_prop) = self.xf.scalar_by_name(OPS_PROPERTY) else {
            return Ok(sample); // identity
        };
        let op_bytes = ops_prop.sample_bytes(0usize)?;

        let vals = self
            .xf
            .array_by_name(VALS_PROPERTY)
            .ok_or_else(|| Error::io("transform without .vals"))?
            .get_typed::<f64>(index)?;

        let animated: Vec<u32> = self
            .xf
            .array_by_name(ANIM_CHANS_PROPERTY)
            .map(|p| p.get_typed::<u32>(0usize))
            .transpose()?
            .unwrap_or_default();

        let mut cursor = 0usize;
        for &code in &op_bytes {
            let kind = XformOpKind::decode(code)
                .ok_or_else(|| Error::io(format!("unknown xform op encoding {code:#x}")))?;
            let n = kind.num_channels();
            if cursor + n > vals.len() {
                return Err(Error::io("xform .vals shorter than the op stack"));
            }
            let mut op = XformOp::new(kind, vals[cursor..cursor + n].to_vec());
            for (local, flag) in op.animated.iter_mut().enumerate() {
                *flag = animated.contains(&((cursor + local) as u32));
            }
            cursor += n;
            sample.ops.push(op);
        }

        Ok(sample)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn op_encoding_roundtrip() {
        for kind in [
            XformOpKind::Scale,
            XformOpKind::Translate,
            XformOpKind::Rotate,
            XformOpKind::Matrix,
            XformOpKind::RotateX,
            XformOpKind::RotateY,
            XformOpKind::RotateZ,
        ] {
            assert_eq!(XformOpKind::decode(kind.encode()), Some(kind));
        }
        assert_eq!(XformOpKind::decode(0x70), None);
    }

    #[test]
    fn identity_sample() {
        let s = XformSample::identity();
        assert!(s.ops.is_empty());
        assert_eq!(s.matrix(), DMat4::IDENTITY);
        assert_eq!(s.translation(), DVec3::ZERO);
    }

    #[test]
    fn translation_and_matrix() {
        let mut s = XformSample::identity();
        s.push(XformOp::translate(1.0, 2.0, 3.0));
        s.push(XformOp::scale(2.0, 2.0, 2.0));
        assert_eq!(s.translation(), DVec3::new(1.0, 2.0, 3.0));
        assert_eq!(s.num_channels(), 6);

        let m = s.matrix();
        let p = m.transform_point3(DVec3::new(1.0, 0.0, 0.0));
        assert!((p - DVec3::new(3.0, 2.0, 3.0)).length() < 1e-12);
    }

    #[test]
    fn rotation_matrix() {
        let mut s = XformSample::identity();
        s.push(XformOp::rotate_z(90.0));
        let v = s.matrix().transform_vector3(DVec3::new(1.0, 0.0, 0.0));
        assert!(v.x.abs() < 1e-9);
        assert!((v.y - 1.0).abs() < 1e-9);
    }
}
