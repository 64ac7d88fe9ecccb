//! Ogawa chunked binary container.
//!
//! The file is a flat arena of two node kinds reached from a root offset in
//! the header: *groups* (lists of child offsets) and *data* blocks (raw
//! bytes). The archive catalogue - object headers, property headers, time
//! samplings, indexed metadata - is encoded into data blocks by
//! [`layout`]. Readers resolve everything lazily over a shared memory map;
//! the writer serializes a finished staging tree in one pass.
//!
//! ```text
//! +------------------+
//! | Magic: "Ogawa"   |  5 bytes
//! +------------------+
//! | Frozen flag      |  1 byte (0x00 or 0xFF)
//! +------------------+
//! | Version          |  2 bytes
//! +------------------+
//! | Root group pos   |  8 bytes (u64 LE)
//! +------------------+
//! | ... nodes ...    |
//! +------------------+
//! ```

pub mod format;
mod stream;
mod node;
pub mod layout;
mod reader;
mod writer;

pub use stream::{IStreams, OStream};
pub use node::{IGroup, IData, IChild};
pub use reader::OgawaArchiveReader;
pub use writer::OgawaSink;
