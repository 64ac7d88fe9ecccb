//! Schema conveniences over the generic property API.
//!
//! A schema is a naming-and-metadata convention, not a file format feature:
//! the `schema` metadata tag identifies the interpretation, and a typed
//! wrapper validates the tag before exposing semantic accessors. The core
//! stays format-agnostic; everything here goes through the public `abc`
//! handles.

mod geom_param;
mod xform;
mod polymesh;

pub use geom_param::{GeomParamSample, IGeomParam, OGeomParam, GEO_SCOPE_KEY};
pub use xform::{IXform, OXform, XformOp, XformOpKind, XformSample, XFORM_SCHEMA};
pub use polymesh::{IPolyMesh, OPolyMesh, PolyMeshSample, POLYMESH_SCHEMA};

use crate::core::MetaData;
use crate::util::{Error, Result};

/// Fail with `SchemaMismatch` unless the metadata carries the expected tag.
pub(crate) fn require_schema(meta: &MetaData, expected: &str) -> Result<()> {
    let actual = meta.schema().unwrap_or("");
    if actual != expected {
        return Err(Error::SchemaMismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
        });
    }
    Ok(())
}
