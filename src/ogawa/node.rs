//! Group and data node accessors.
//!
//! Nodes never own file state beyond the shared stream handle, so cloning a
//! group and walking it from several threads is free.

use std::sync::Arc;

use super::format::*;
use super::stream::IStreams;
use crate::util::{Error, Result};

/// A group node: an ordered list of child offsets.
#[derive(Clone)]
pub struct IGroup {
    streams: Arc<IStreams>,
    pos: u64,
    child_offsets: Vec<u64>,
}

impl IGroup {
    /// Load the group at `pos`; position 0 is the canonical empty group.
    pub fn load(streams: Arc<IStreams>, pos: u64) -> Result<Self> {
        let child_offsets = if pos == 0 {
            Vec::new()
        } else {
            let num_children = streams.read_u64(pos)?;
            let mut offsets = Vec::with_capacity(num_children as usize);
            for i in 0..num_children {
                offsets.push(streams.read_u64(pos + 8 + i * 8)?);
            }
            offsets
        };
        Ok(Self {
            streams,
            pos,
            child_offsets,
        })
    }

    #[inline]
    pub fn pos(&self) -> u64 {
        self.pos
    }

    #[inline]
    pub fn num_children(&self) -> usize {
        self.child_offsets.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.child_offsets.is_empty()
    }

    /// Raw child offset (with the kind flag).
    pub fn child_offset(&self, index: usize) -> Result<u64> {
        self.child_offsets
            .get(index)
            .copied()
            .ok_or(Error::IndexOutOfRange {
                index,
                count: self.child_offsets.len(),
            })
    }

    pub fn is_child_group(&self, index: usize) -> Result<bool> {
        Ok(is_group_offset(self.child_offset(index)?))
    }

    pub fn is_child_data(&self, index: usize) -> Result<bool> {
        Ok(is_data_offset(self.child_offset(index)?))
    }

    /// Child group at `index`.
    pub fn group(&self, index: usize) -> Result<IGroup> {
        let offset = self.child_offset(index)?;
        if !is_group_offset(offset) {
            return Err(Error::io(format!(
                "expected group at child {index}, found data"
            )));
        }
        IGroup::load(self.streams.clone(), extract_pos(offset))
    }

    /// Child data block at `index`.
    pub fn data(&self, index: usize) -> Result<IData> {
        let offset = self.child_offset(index)?;
        if !is_data_offset(offset) {
            return Err(Error::io(format!(
                "expected data at child {index}, found group"
            )));
        }
        IData::load(self.streams.clone(), extract_pos(offset))
    }

    /// Walk all children in order.
    pub fn children(&self) -> impl Iterator<Item = Result<IChild>> + '_ {
        (0..self.num_children()).map(move |i| {
            let offset = self.child_offset(i)?;
            let pos = extract_pos(offset);
            if is_group_offset(offset) {
                Ok(IChild::Group(IGroup::load(self.streams.clone(), pos)?))
            } else {
                Ok(IChild::Data(IData::load(self.streams.clone(), pos)?))
            }
        })
    }
}

/// Either child node kind.
pub enum IChild {
    Group(IGroup),
    Data(IData),
}

/// A data node: a sized run of bytes.
pub struct IData {
    streams: Arc<IStreams>,
    pos: u64,
    size: u64,
}

impl IData {
    /// Load the data block at `pos`; position 0 is the canonical empty block.
    pub fn load(streams: Arc<IStreams>, pos: u64) -> Result<Self> {
        let size = if pos == 0 { 0 } else { streams.read_u64(pos)? };
        Ok(Self { streams, pos, size })
    }

    #[inline]
    pub fn pos(&self) -> u64 {
        self.pos
    }

    #[inline]
    pub fn size(&self) -> u64 {
        self.size
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Position of the payload (past the size field).
    #[inline]
    pub fn payload_pos(&self) -> u64 {
        if self.pos == 0 {
            0
        } else {
            self.pos + 8
        }
    }

    /// Read the whole payload.
    pub fn read_all(&self) -> Result<Vec<u8>> {
        if self.size == 0 {
            return Ok(Vec::new());
        }
        self.streams.read_bytes(self.payload_pos(), self.size as usize)
    }

    /// Read a sub-range of the payload.
    pub fn read_range(&self, offset: u64, len: usize) -> Result<Vec<u8>> {
        if offset + len as u64 > self.size {
            return Err(Error::io(format!(
                "data range {offset}+{len} exceeds block size {}",
                self.size
            )));
        }
        self.streams.read_bytes(self.payload_pos() + offset, len)
    }

    /// Read the payload as a UTF-8 string, dropping a trailing NUL.
    pub fn read_string(&self) -> Result<String> {
        let bytes = self.read_all()?;
        let len = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        Ok(String::from_utf8(bytes[..len].to_vec())?)
    }
}
