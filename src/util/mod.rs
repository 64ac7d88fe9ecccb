//! Fundamental types used throughout the crate.
//!
//! - [`PodKind`] - the closed set of plain-old-data storage kinds
//! - [`DataType`] - POD kind plus extent (dimensionality)
//! - [`Error`] / [`Result`] - error handling

mod pod;
mod data_type;
mod error;

pub use pod::{PodKind, PodValue, Bool};
pub use data_type::DataType;
pub use error::{Error, Result};

/// Time values are double-precision seconds.
pub type Chrono = f64;
