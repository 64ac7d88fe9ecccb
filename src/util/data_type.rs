//! DataType - a POD kind together with an extent.

use super::PodKind;
use std::fmt;

/// Describes how one element of a sample is stored.
///
/// The extent is the number of POD values per element: a 3D float vector is
/// `Float32` with extent 3. String kinds always use extent 1.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct DataType {
    pub pod: PodKind,
    pub extent: u8,
}

impl DataType {
    /// Create a DataType from kind and extent.
    #[inline]
    pub const fn new(pod: PodKind, extent: u8) -> Self {
        Self { pod, extent }
    }

    /// Single-element DataType (extent = 1).
    #[inline]
    pub const fn scalar(pod: PodKind) -> Self {
        Self { pod, extent: 1 }
    }

    /// Total size in bytes of one element.
    #[inline]
    pub const fn num_bytes(&self) -> usize {
        self.pod.num_bytes() * self.extent as usize
    }

    /// A known kind with a non-zero extent.
    ///
    /// Only the `UNKNOWN` sentinel carries extent 0.
    #[inline]
    pub const fn is_valid(&self) -> bool {
        !matches!(self.pod, PodKind::Unknown) && self.extent > 0
    }

    /// Sentinel for absent/invalid types.
    pub const UNKNOWN: Self = Self::new(PodKind::Unknown, 0);

    pub const BOOL: Self = Self::scalar(PodKind::Bool);
    pub const UINT8: Self = Self::scalar(PodKind::Uint8);
    pub const INT8: Self = Self::scalar(PodKind::Int8);
    pub const UINT16: Self = Self::scalar(PodKind::Uint16);
    pub const INT16: Self = Self::scalar(PodKind::Int16);
    pub const UINT32: Self = Self::scalar(PodKind::Uint32);
    pub const INT32: Self = Self::scalar(PodKind::Int32);
    pub const UINT64: Self = Self::scalar(PodKind::Uint64);
    pub const INT64: Self = Self::scalar(PodKind::Int64);
    pub const FLOAT16: Self = Self::scalar(PodKind::Float16);
    pub const FLOAT32: Self = Self::scalar(PodKind::Float32);
    pub const FLOAT64: Self = Self::scalar(PodKind::Float64);
    pub const STRING: Self = Self::scalar(PodKind::String);
    pub const WSTRING: Self = Self::scalar(PodKind::Wstring);

    pub const VEC2F: Self = Self::new(PodKind::Float32, 2);
    pub const VEC3F: Self = Self::new(PodKind::Float32, 3);
    pub const VEC2D: Self = Self::new(PodKind::Float64, 2);
    pub const VEC3D: Self = Self::new(PodKind::Float64, 3);
    pub const VEC3I: Self = Self::new(PodKind::Int32, 3);

    pub const MAT33D: Self = Self::new(PodKind::Float64, 9);
    pub const MAT44D: Self = Self::new(PodKind::Float64, 16);

    // Axis-aligned boxes store min and max corners.
    pub const BOX3F: Self = Self::new(PodKind::Float32, 6);
    pub const BOX3D: Self = Self::new(PodKind::Float64, 6);
}

impl Default for DataType {
    fn default() -> Self {
        Self::UNKNOWN
    }
}

impl fmt::Debug for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.extent == 1 {
            write!(f, "{}", self.pod.name())
        } else {
            write!(f, "{}[{}]", self.pod.name(), self.extent)
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes() {
        assert_eq!(DataType::BOOL.num_bytes(), 1);
        assert_eq!(DataType::VEC3F.num_bytes(), 12);
        assert_eq!(DataType::MAT44D.num_bytes(), 128);
        assert_eq!(DataType::BOX3D.num_bytes(), 48);
    }

    #[test]
    fn display() {
        assert_eq!(format!("{}", DataType::FLOAT32), "float32_t");
        assert_eq!(format!("{}", DataType::VEC3F), "float32_t[3]");
    }

    #[test]
    fn validity() {
        assert!(DataType::UINT32.is_valid());
        assert!(!DataType::UNKNOWN.is_valid());
        assert!(!DataType::new(PodKind::Float32, 0).is_valid());
    }
}
