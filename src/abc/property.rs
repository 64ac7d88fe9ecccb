//! Reader property handles.

use std::sync::Arc;

use crate::core::{
    ArrayPropertyReader, CompoundPropertyReader, PropertyHeader, PropertyReader, PropertyType,
    SampleDigest, SampleSelector, ScalarPropertyReader, TimeSampling,
};
use crate::util::{Error, PodValue, Result};

/// Any property, resolved to its concrete variant.
pub enum IProperty {
    Scalar(IScalarProperty),
    Array(IArrayProperty),
    Compound(ICompoundProperty),
}

impl IProperty {
    pub(crate) fn from_reader(reader: Arc<dyn PropertyReader>) -> Result<Self> {
        match reader.header().property_type {
            PropertyType::Scalar => {
                let scalar = reader
                    .into_scalar()
                    .ok_or_else(|| Error::io("scalar property without scalar reader"))?;
                Ok(Self::Scalar(IScalarProperty { reader: scalar }))
            }
            PropertyType::Array => {
                let array = reader
                    .into_array()
                    .ok_or_else(|| Error::io("array property without array reader"))?;
                Ok(Self::Array(IArrayProperty { reader: array }))
            }
            PropertyType::Compound => {
                let compound = reader
                    .into_compound()
                    .ok_or_else(|| Error::io("compound property without compound reader"))?;
                Ok(Self::Compound(ICompoundProperty::new(compound)))
            }
        }
    }

    pub fn header(&self) -> &PropertyHeader {
        match self {
            Self::Scalar(p) => p.header(),
            Self::Array(p) => p.header(),
            Self::Compound(p) => p.header(),
        }
    }

    pub fn name(&self) -> &str {
        &self.header().name
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self, Self::Scalar(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Self::Array(_))
    }

    pub fn is_compound(&self) -> bool {
        matches!(self, Self::Compound(_))
    }

    pub fn as_scalar(&self) -> Option<&IScalarProperty> {
        match self {
            Self::Scalar(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&IArrayProperty> {
        match self {
            Self::Array(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_compound(&self) -> Option<&ICompoundProperty> {
        match self {
            Self::Compound(p) => Some(p),
            _ => None,
        }
    }
}

/// A compound property opened for reading.
#[derive(Clone)]
pub struct ICompoundProperty {
    reader: Arc<dyn CompoundPropertyReader>,
}

impl ICompoundProperty {
    pub(crate) fn new(reader: Arc<dyn CompoundPropertyReader>) -> Self {
        Self { reader }
    }

    pub fn header(&self) -> &PropertyHeader {
        self.reader.header()
    }

    /// The compound owning this one; `None` for an object's top compound.
    pub fn parent(&self) -> Option<ICompoundProperty> {
        self.reader.parent().map(ICompoundProperty::new)
    }

    /// The object whose property tree holds this compound.
    pub fn object(&self) -> crate::abc::IObject {
        crate::abc::IObject::new(self.reader.object())
    }

    pub fn num_properties(&self) -> usize {
        self.reader.num_properties()
    }

    /// Child header by position, in creation order.
    pub fn property_header(&self, index: usize) -> Result<&PropertyHeader> {
        self.reader.property_header(index)
    }

    pub fn has_property(&self, name: &str) -> bool {
        self.reader.property_index(name).is_some()
    }

    /// Child property by position, in creation order.
    pub fn property(&self, index: usize) -> Result<IProperty> {
        IProperty::from_reader(self.reader.clone().property(index)?)
    }

    /// Child property by name.
    pub fn property_by_name(&self, name: &str) -> Option<IProperty> {
        let index = self.reader.property_index(name)?;
        self.property(index).ok()
    }

    /// Named child as a scalar property, if it is one.
    pub fn scalar_by_name(&self, name: &str) -> Option<IScalarProperty> {
        match self.property_by_name(name)? {
            IProperty::Scalar(p) => Some(p),
            _ => None,
        }
    }

    /// Named child as an array property, if it is one.
    pub fn array_by_name(&self, name: &str) -> Option<IArrayProperty> {
        match self.property_by_name(name)? {
            IProperty::Array(p) => Some(p),
            _ => None,
        }
    }

    /// Named child as a compound property, if it is one.
    pub fn compound_by_name(&self, name: &str) -> Option<ICompoundProperty> {
        match self.property_by_name(name)? {
            IProperty::Compound(p) => Some(p),
            _ => None,
        }
    }

    /// Child names in creation order.
    pub fn property_names(&self) -> Vec<String> {
        (0..self.num_properties())
            .filter_map(|i| self.property_header(i).ok().map(|h| h.name.clone()))
            .collect()
    }
}

/// A scalar property opened for reading.
#[derive(Clone)]
pub struct IScalarProperty {
    reader: Arc<dyn ScalarPropertyReader>,
}

impl IScalarProperty {
    pub fn header(&self) -> &PropertyHeader {
        self.reader.header()
    }

    /// The compound owning this property.
    pub fn parent(&self) -> Option<ICompoundProperty> {
        self.reader.parent().map(ICompoundProperty::new)
    }

    /// The object whose property tree holds this property.
    pub fn object(&self) -> crate::abc::IObject {
        crate::abc::IObject::new(self.reader.object())
    }

    pub fn num_samples(&self) -> usize {
        self.reader.num_samples()
    }

    /// True iff one distinct value stands in for every logical sample.
    pub fn is_constant(&self) -> bool {
        self.reader.is_constant()
    }

    /// The sampling this property's samples are indexed against.
    pub fn time_sampling(&self) -> Arc<TimeSampling> {
        self.reader.time_sampling()
    }

    /// Raw payload of the selected sample.
    pub fn sample_bytes(&self, selector: impl Into<SampleSelector>) -> Result<Vec<u8>> {
        let index = self.resolve(selector.into());
        self.reader.sample_bytes(index)
    }

    /// Selected sample decoded as a fixed-size value.
    ///
    /// `T` must match the property's element size exactly; use tuples of
    /// [`PodValue`]s via `bytemuck`-compatible arrays for extents > 1.
    pub fn get_typed<T: bytemuck::AnyBitPattern>(
        &self,
        selector: impl Into<SampleSelector>,
    ) -> Result<T> {
        let bytes = self.sample_bytes(selector)?;
        bytemuck::try_pod_read_unaligned(&bytes).map_err(|_| {
            Error::type_mismatch(
                format!("{} ({} bytes)", self.header().data_type, bytes.len()),
                format!("{} bytes", std::mem::size_of::<T>()),
            )
        })
    }

    /// Selected sample decoded as a single POD element (extent 1 only).
    pub fn get_pod<T: PodValue>(&self, selector: impl Into<SampleSelector>) -> Result<T> {
        let dt = self.header().data_type;
        if dt.pod != T::KIND || dt.extent != 1 {
            return Err(Error::type_mismatch(dt, T::KIND.name()));
        }
        self.get_typed(selector)
    }

    /// Selected sample decoded as a UTF-8 string (string kinds only).
    pub fn get_string(&self, selector: impl Into<SampleSelector>) -> Result<String> {
        let dt = self.header().data_type;
        if !dt.pod.is_string() {
            return Err(Error::type_mismatch("string", dt));
        }
        let bytes = self.sample_bytes(selector)?;
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        Ok(String::from_utf8(bytes[..end].to_vec())?)
    }

    fn resolve(&self, selector: SampleSelector) -> usize {
        match selector {
            SampleSelector::Index(i) => i,
            other => other.resolve(&self.time_sampling(), self.num_samples()),
        }
    }
}

/// An array property opened for reading.
#[derive(Clone)]
pub struct IArrayProperty {
    reader: Arc<dyn ArrayPropertyReader>,
}

impl IArrayProperty {
    pub fn header(&self) -> &PropertyHeader {
        self.reader.header()
    }

    /// The compound owning this property.
    pub fn parent(&self) -> Option<ICompoundProperty> {
        self.reader.parent().map(ICompoundProperty::new)
    }

    /// The object whose property tree holds this property.
    pub fn object(&self) -> crate::abc::IObject {
        crate::abc::IObject::new(self.reader.object())
    }

    pub fn num_samples(&self) -> usize {
        self.reader.num_samples()
    }

    pub fn is_constant(&self) -> bool {
        self.reader.is_constant()
    }

    pub fn time_sampling(&self) -> Arc<TimeSampling> {
        self.reader.time_sampling()
    }

    /// Element count of the selected sample.
    pub fn sample_len(&self, selector: impl Into<SampleSelector>) -> Result<usize> {
        let index = self.resolve(selector.into());
        self.reader.sample_len(index)
    }

    /// Raw payload of the selected sample.
    pub fn sample_bytes(&self, selector: impl Into<SampleSelector>) -> Result<Vec<u8>> {
        let index = self.resolve(selector.into());
        self.reader.sample_bytes(index)
    }

    /// Stored content digest of the selected sample. Samples with equal
    /// digests hold identical data; no payload is fetched.
    pub fn sample_key(&self, selector: impl Into<SampleSelector>) -> Result<SampleDigest> {
        let index = self.resolve(selector.into());
        self.reader.sample_key(index)
    }

    /// Stored dimensions of the selected sample (`[len]` for rank 1).
    pub fn dimensions(&self, selector: impl Into<SampleSelector>) -> Result<Vec<u64>> {
        let index = self.resolve(selector.into());
        self.reader.sample_dimensions(index)
    }

    /// Selected sample decoded as a vector of POD elements.
    pub fn get_typed<T: PodValue>(&self, selector: impl Into<SampleSelector>) -> Result<Vec<T>> {
        let dt = self.header().data_type;
        if dt.pod != T::KIND {
            return Err(Error::type_mismatch(dt, T::KIND.name()));
        }
        let bytes = self.sample_bytes(selector)?;
        let slice: &[T] = bytemuck::try_cast_slice(&bytes)
            .map_err(|_| Error::type_mismatch(dt, "misaligned payload"))?;
        Ok(slice.to_vec())
    }

    /// Selected sample decoded as NUL-separated strings.
    pub fn get_strings(&self, selector: impl Into<SampleSelector>) -> Result<Vec<String>> {
        let dt = self.header().data_type;
        if !dt.pod.is_string() {
            return Err(Error::type_mismatch("string array", dt));
        }
        let bytes = self.sample_bytes(selector)?;
        let mut out = Vec::new();
        for chunk in bytes.split(|&b| b == 0) {
            if !chunk.is_empty() {
                out.push(String::from_utf8(chunk.to_vec())?);
            }
        }
        Ok(out)
    }

    fn resolve(&self, selector: SampleSelector) -> usize {
        match selector {
            SampleSelector::Index(i) => i,
            other => other.resolve(&self.time_sampling(), self.num_samples()),
        }
    }
}
