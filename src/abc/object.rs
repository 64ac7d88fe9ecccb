//! Reader object handle.

use std::sync::Arc;

use crate::core::{MetaData, ObjectHeader, ObjectReader};
use crate::util::Result;

use super::property::ICompoundProperty;

/// An object node opened for reading.
#[derive(Clone)]
pub struct IObject {
    reader: Arc<dyn ObjectReader>,
}

impl IObject {
    pub(crate) fn new(reader: Arc<dyn ObjectReader>) -> Self {
        Self { reader }
    }

    pub fn header(&self) -> &ObjectHeader {
        self.reader.header()
    }

    pub fn name(&self) -> &str {
        &self.reader.header().name
    }

    /// Full path from the root, e.g. `/group/mesh`.
    pub fn full_name(&self) -> &str {
        &self.reader.header().full_name
    }

    pub fn meta_data(&self) -> &MetaData {
        &self.reader.header().meta_data
    }

    /// The archive's top object carries the reserved name and path.
    pub fn is_root(&self) -> bool {
        self.reader.header().full_name == "/"
    }

    /// Does the object's `schema` tag equal `tag`?
    pub fn matches_schema(&self, tag: &str) -> bool {
        self.reader.header().meta_data.matches_schema(tag)
    }

    /// The owning object; `None` at the root.
    pub fn parent(&self) -> Option<IObject> {
        self.reader.parent().map(IObject::new)
    }

    pub fn num_children(&self) -> usize {
        self.reader.num_children()
    }

    /// Child by position, in creation order.
    pub fn child(&self, index: usize) -> Result<IObject> {
        Ok(IObject::new(self.reader.clone().child(index)?))
    }

    /// Child by name.
    pub fn child_by_name(&self, name: &str) -> Option<IObject> {
        let index = self.reader.child_index(name)?;
        self.child(index).ok()
    }

    /// Header of the child at `index` without materializing a reader.
    pub fn child_header(&self, index: usize) -> Result<&ObjectHeader> {
        self.reader.child_header(index)
    }

    pub fn has_child(&self, name: &str) -> bool {
        self.reader.child_index(name).is_some()
    }

    /// Walk the children in creation order, skipping unreadable nodes.
    pub fn children(&self) -> impl Iterator<Item = IObject> + '_ {
        (0..self.num_children()).filter_map(move |i| self.child(i).ok())
    }

    /// The object's top compound property.
    pub fn properties(&self) -> Result<ICompoundProperty> {
        Ok(ICompoundProperty::new(self.reader.clone().properties()?))
    }
}

impl std::fmt::Debug for IObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IObject")
            .field("full_name", &self.full_name())
            .field("children", &self.num_children())
            .finish()
    }
}
