//! High-level archive API.
//!
//! Reading goes through [`IArchive`] and the `I*` handles, which wrap the
//! backend reader traits behind `Arc`s - cheap to clone, safe to send across
//! threads, no lifetimes to thread through calling code. Writing goes
//! through [`OArchive`] and the `O*` handles, which append into a shared
//! staging tree that the backend serializes on [`OArchive::close`].
//!
//! ```no_run
//! use abcio::abc::OArchive;
//! use abcio::DataType;
//!
//! # fn main() -> abcio::Result<()> {
//! let archive = OArchive::create("out.abc")?;
//! let child = archive.top().create_child("body")?;
//! let prop = child.properties().create_scalar("mass", DataType::FLOAT64)?;
//! prop.add_typed(&42.0f64)?;
//! archive.close()?;
//! # Ok(())
//! # }
//! ```

mod archive;
mod object;
mod property;
mod writer;

pub use archive::IArchive;
pub use object::IObject;
pub use property::{IArrayProperty, ICompoundProperty, IProperty, IScalarProperty};
pub use writer::{
    OArchive, OArrayProperty, OCompoundProperty, OObject, OScalarProperty, WriteOptions,
};

/// Archive metadata key: writing application.
pub const APPLICATION_KEY: &str = "_ai_Application";
/// Archive metadata key: write date.
pub const DATE_WRITTEN_KEY: &str = "_ai_DateWritten";
/// Archive metadata key: user description.
pub const DESCRIPTION_KEY: &str = "_ai_Description";
/// Archive metadata key: writing library version.
pub const LIBRARY_VERSION_KEY: &str = "_ai_LibraryVersion";
