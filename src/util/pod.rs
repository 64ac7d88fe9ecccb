//! Plain-old-data kinds - the fundamental storage types.

use bytemuck::{Pod, Zeroable};
use half::f16;
use std::fmt;

/// The closed set of basic storage kinds a sample element can have.
///
/// Each kind has a fixed size and a well-defined binary representation,
/// except the two string kinds which are variable-length on disk.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum PodKind {
    /// Boolean, stored as one byte (0 = false, non-zero = true)
    Bool = 0,
    Uint8 = 1,
    Int8 = 2,
    Uint16 = 3,
    Int16 = 4,
    Uint32 = 5,
    Int32 = 6,
    Uint64 = 7,
    Int64 = 8,
    /// IEEE 754 half precision
    Float16 = 9,
    Float32 = 10,
    Float64 = 11,
    /// UTF-8 string
    String = 12,
    /// Wide string (stored as UTF-8 here)
    Wstring = 13,
    /// Sentinel for absent/invalid types
    #[default]
    Unknown = 127,
}

impl PodKind {
    /// Number of known kinds (excluding `Unknown`).
    pub const COUNT: usize = 14;

    /// Size in bytes of a single element of this kind.
    ///
    /// String kinds report the size of the in-memory string object, not a
    /// byte count of the stored payload.
    #[inline]
    pub const fn num_bytes(self) -> usize {
        match self {
            Self::Bool | Self::Uint8 | Self::Int8 => 1,
            Self::Uint16 | Self::Int16 | Self::Float16 => 2,
            Self::Uint32 | Self::Int32 | Self::Float32 => 4,
            Self::Uint64 | Self::Int64 | Self::Float64 => 8,
            Self::String | Self::Wstring => std::mem::size_of::<String>(),
            Self::Unknown => 0,
        }
    }

    /// Canonical name, as used in metadata interchange.
    #[inline]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Bool => "bool_t",
            Self::Uint8 => "uint8_t",
            Self::Int8 => "int8_t",
            Self::Uint16 => "uint16_t",
            Self::Int16 => "int16_t",
            Self::Uint32 => "uint32_t",
            Self::Int32 => "int32_t",
            Self::Uint64 => "uint64_t",
            Self::Int64 => "int64_t",
            Self::Float16 => "float16_t",
            Self::Float32 => "float32_t",
            Self::Float64 => "float64_t",
            Self::String => "string",
            Self::Wstring => "wstring",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Parse a kind from its canonical name.
    pub fn from_name(name: &str) -> Self {
        match name {
            "bool_t" => Self::Bool,
            "uint8_t" => Self::Uint8,
            "int8_t" => Self::Int8,
            "uint16_t" => Self::Uint16,
            "int16_t" => Self::Int16,
            "uint32_t" => Self::Uint32,
            "int32_t" => Self::Int32,
            "uint64_t" => Self::Uint64,
            "int64_t" => Self::Int64,
            "float16_t" => Self::Float16,
            "float32_t" => Self::Float32,
            "float64_t" => Self::Float64,
            "string" => Self::String,
            "wstring" => Self::Wstring,
            _ => Self::Unknown,
        }
    }

    /// Decode from the on-disk discriminant.
    pub const fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Bool,
            1 => Self::Uint8,
            2 => Self::Int8,
            3 => Self::Uint16,
            4 => Self::Int16,
            5 => Self::Uint32,
            6 => Self::Int32,
            7 => Self::Uint64,
            8 => Self::Int64,
            9 => Self::Float16,
            10 => Self::Float32,
            11 => Self::Float64,
            12 => Self::String,
            13 => Self::Wstring,
            _ => Self::Unknown,
        }
    }

    /// True for the two variable-length string kinds.
    #[inline]
    pub const fn is_string(self) -> bool {
        matches!(self, Self::String | Self::Wstring)
    }

    /// True for integer and floating point kinds.
    #[inline]
    pub const fn is_numeric(self) -> bool {
        !matches!(self, Self::Bool | Self::String | Self::Wstring | Self::Unknown)
    }
}

impl fmt::Display for PodKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Types that map onto a fixed-size [`PodKind`] element.
///
/// Gives sample readers/writers a typed view over the raw byte payloads.
pub trait PodValue: Pod + Zeroable + Copy + Default {
    /// The storage kind of this type.
    const KIND: PodKind;
}

impl PodValue for u8 {
    const KIND: PodKind = PodKind::Uint8;
}

impl PodValue for i8 {
    const KIND: PodKind = PodKind::Int8;
}

impl PodValue for u16 {
    const KIND: PodKind = PodKind::Uint16;
}

impl PodValue for i16 {
    const KIND: PodKind = PodKind::Int16;
}

impl PodValue for u32 {
    const KIND: PodKind = PodKind::Uint32;
}

impl PodValue for i32 {
    const KIND: PodKind = PodKind::Int32;
}

impl PodValue for u64 {
    const KIND: PodKind = PodKind::Uint64;
}

impl PodValue for i64 {
    const KIND: PodKind = PodKind::Int64;
}

impl PodValue for f32 {
    const KIND: PodKind = PodKind::Float32;
}

impl PodValue for f64 {
    const KIND: PodKind = PodKind::Float64;
}

impl PodValue for f16 {
    const KIND: PodKind = PodKind::Float16;
}

/// Boolean with guaranteed one-byte storage.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
#[repr(transparent)]
pub struct Bool(u8);

impl Bool {
    pub const TRUE: Self = Self(1);
    pub const FALSE: Self = Self(0);

    #[inline]
    pub const fn new(v: bool) -> Self {
        Self(v as u8)
    }

    #[inline]
    pub const fn get(self) -> bool {
        self.0 != 0
    }
}

impl From<bool> for Bool {
    #[inline]
    fn from(v: bool) -> Self {
        Self::new(v)
    }
}

impl From<Bool> for bool {
    #[inline]
    fn from(v: Bool) -> Self {
        v.get()
    }
}

impl fmt::Debug for Bool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.get())
    }
}

impl PodValue for Bool {
    const KIND: PodKind = PodKind::Bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_sizes() {
        assert_eq!(PodKind::Bool.num_bytes(), 1);
        assert_eq!(PodKind::Int16.num_bytes(), 2);
        assert_eq!(PodKind::Uint32.num_bytes(), 4);
        assert_eq!(PodKind::Float64.num_bytes(), 8);
        assert_eq!(PodKind::Unknown.num_bytes(), 0);
    }

    #[test]
    fn kind_roundtrip() {
        for v in 0..14u8 {
            let kind = PodKind::from_u8(v);
            assert_ne!(kind, PodKind::Unknown);
            assert_eq!(kind as u8, v);
            assert_eq!(PodKind::from_name(kind.name()), kind);
        }
        assert_eq!(PodKind::from_u8(99), PodKind::Unknown);
    }

    #[test]
    fn bool_storage() {
        assert_eq!(std::mem::size_of::<Bool>(), 1);
        assert!(Bool::new(true).get());
        assert!(!Bool::FALSE.get());
    }
}
