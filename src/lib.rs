//! # abcio
//!
//! Reading and writing of hierarchical, time-sampled scene archives.
//!
//! An archive is a single file holding a tree of named objects. Every object
//! owns one compound property, which in turn owns named scalar, array and
//! nested compound properties; each scalar/array property carries a stream of
//! time-indexed samples. Two container mappings are supported: the Ogawa
//! chunked binary layout (default) and HDF5 (behind the `hdf5` feature).
//! The container is auto-detected on open from the file's magic bytes.
//!
//! ## Modules
//!
//! - [`util`] - POD kinds, [`DataType`], error taxonomy
//! - [`core`] - time sampling, metadata, headers, backend traits
//! - [`ogawa`] - Ogawa chunked binary container
//! - [`factory`] - container detection and open-by-path
//! - [`abc`] - high-level API ([`abc::IArchive`], [`abc::OArchive`], objects,
//!   properties)
//! - [`geom`] - schema conveniences (Xform, PolyMesh, GeomParam)
//!
//! ## Example
//!
//! ```no_run
//! use abcio::abc::IArchive;
//!
//! # fn main() -> abcio::Result<()> {
//! let archive = IArchive::open("animation.abc")?;
//! for child in archive.top().children() {
//!     println!("{}", child.name());
//! }
//! # Ok(())
//! # }
//! ```

pub mod util;
pub mod core;
pub mod ogawa;
#[cfg(feature = "hdf5")]
pub mod hdf5;
pub mod factory;
pub mod abc;
pub mod geom;

pub use util::{DataType, PodKind, Error, Result};
pub use factory::ArchiveKind;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::util::{DataType, PodKind, Error, Result};
    pub use crate::abc::{IArchive, OArchive, IObject, OObject};
    pub use crate::core::{TimeSampling, SampleSelector};
    pub use crate::factory::ArchiveKind;
    pub use crate::geom::*;
}
