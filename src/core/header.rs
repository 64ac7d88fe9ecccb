//! Self-describing headers for objects and properties.
//!
//! A header is created once, when the entity is added on the write side or
//! discovered in the container's catalogue on the read side, and is immutable
//! afterwards.

use super::MetaData;
use crate::util::DataType;

/// Header of an object in the hierarchy.
#[derive(Clone, Debug, Default)]
pub struct ObjectHeader {
    /// Name, unique among siblings. Empty only for the implicit top object.
    pub name: String,
    /// Full path from the root, e.g. `/group/mesh`.
    pub full_name: String,
    /// Schema tag and other hints.
    pub meta_data: MetaData,
}

impl ObjectHeader {
    pub fn new(name: impl Into<String>, full_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            full_name: full_name.into(),
            meta_data: MetaData::new(),
        }
    }

    pub fn with_meta_data(mut self, meta_data: MetaData) -> Self {
        self.meta_data = meta_data;
        self
    }

    pub fn schema(&self) -> Option<&str> {
        self.meta_data.schema()
    }
}

/// The three property variants.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PropertyType {
    /// One fixed-size value per sample.
    #[default]
    Scalar,
    /// One variable-length buffer per sample.
    Array,
    /// Container of named child properties; carries no samples itself.
    Compound,
}

/// Header of a property.
#[derive(Clone, Debug)]
pub struct PropertyHeader {
    /// Name, unique among siblings.
    pub name: String,
    pub property_type: PropertyType,
    /// Element type; `UNKNOWN` for compounds.
    pub data_type: DataType,
    /// Index into the archive's time sampling table (0 = identity).
    pub time_sampling_index: u32,
    pub meta_data: MetaData,
}

impl PropertyHeader {
    pub fn scalar(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            property_type: PropertyType::Scalar,
            data_type,
            time_sampling_index: 0,
            meta_data: MetaData::new(),
        }
    }

    pub fn array(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            property_type: PropertyType::Array,
            data_type,
            time_sampling_index: 0,
            meta_data: MetaData::new(),
        }
    }

    pub fn compound(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            property_type: PropertyType::Compound,
            data_type: DataType::UNKNOWN,
            time_sampling_index: 0,
            meta_data: MetaData::new(),
        }
    }

    pub fn with_time_sampling(mut self, index: u32) -> Self {
        self.time_sampling_index = index;
        self
    }

    pub fn with_meta_data(mut self, meta_data: MetaData) -> Self {
        self.meta_data = meta_data;
        self
    }

    pub fn is_scalar(&self) -> bool {
        self.property_type == PropertyType::Scalar
    }

    pub fn is_array(&self) -> bool {
        self.property_type == PropertyType::Array
    }

    pub fn is_compound(&self) -> bool {
        self.property_type == PropertyType::Compound
    }

    pub fn interpretation(&self) -> Option<&str> {
        self.meta_data.interpretation()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_header() {
        let h = ObjectHeader::new("mesh", "/group/mesh");
        assert_eq!(h.name, "mesh");
        assert_eq!(h.full_name, "/group/mesh");
        assert!(h.schema().is_none());
    }

    #[test]
    fn property_variants() {
        let s = PropertyHeader::scalar("P", DataType::VEC3F);
        assert!(s.is_scalar() && !s.is_array() && !s.is_compound());

        let a = PropertyHeader::array("idx", DataType::UINT32).with_time_sampling(2);
        assert!(a.is_array());
        assert_eq!(a.time_sampling_index, 2);

        let c = PropertyHeader::compound(".geom");
        assert!(c.is_compound());
        assert_eq!(c.data_type, DataType::UNKNOWN);
    }
}
