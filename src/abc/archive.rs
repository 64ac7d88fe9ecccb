//! Reader archive handle.

use std::path::Path;
use std::sync::Arc;

use crate::core::{ArchiveKind, ArchiveReader, MetaData, TimeSampling};
use crate::factory;
use crate::util::{Chrono, Result};

use super::object::IObject;
use super::property::{ICompoundProperty, IProperty};
use super::{APPLICATION_KEY, DATE_WRITTEN_KEY, DESCRIPTION_KEY};

/// An archive opened for reading.
///
/// Immutable after open; clones share the underlying reader and its caches,
/// and any number of threads may resolve samples concurrently.
#[derive(Clone)]
pub struct IArchive {
    reader: Arc<dyn ArchiveReader>,
}

impl IArchive {
    /// Open an archive, auto-detecting the container from its magic bytes.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            reader: factory::open(path)?,
        })
    }

    /// Open with an explicit container kind (no sniffing).
    pub fn open_kind(path: impl AsRef<Path>, kind: ArchiveKind) -> Result<Self> {
        Ok(Self {
            reader: factory::open_kind(path, kind)?,
        })
    }

    /// Wrap an already constructed backend reader.
    pub fn from_reader(reader: Arc<dyn ArchiveReader>) -> Self {
        Self { reader }
    }

    /// Path the archive was opened from.
    pub fn name(&self) -> &str {
        self.reader.name()
    }

    /// The backing container kind.
    pub fn kind(&self) -> ArchiveKind {
        self.reader.kind()
    }

    /// The top object.
    pub fn top(&self) -> IObject {
        IObject::new(self.reader.clone().root())
    }

    /// Find an object by full path ("/group/mesh").
    pub fn find(&self, path: &str) -> Option<IObject> {
        let mut cursor = self.top();
        for part in path.split('/').filter(|s| !s.is_empty()) {
            cursor = cursor.child_by_name(part)?;
        }
        Some(cursor)
    }

    pub fn num_time_samplings(&self) -> usize {
        self.reader.num_time_samplings()
    }

    pub fn time_sampling(&self, index: usize) -> Option<Arc<TimeSampling>> {
        self.reader.time_sampling(index)
    }

    /// Highest sample count recorded against a time sampling, when the
    /// container stores that summary.
    pub fn max_num_samples(&self, ts_index: usize) -> Option<usize> {
        self.reader.max_num_samples(ts_index)
    }

    pub fn archive_metadata(&self) -> &MetaData {
        self.reader.archive_metadata()
    }

    /// Application that wrote the archive, if stamped.
    pub fn app_name(&self) -> Option<&str> {
        self.reader.archive_metadata().get(APPLICATION_KEY)
    }

    /// Date the archive was written, if stamped.
    pub fn date_written(&self) -> Option<&str> {
        self.reader.archive_metadata().get(DATE_WRITTEN_KEY)
    }

    /// Free-form description, if stamped.
    pub fn user_description(&self) -> Option<&str> {
        self.reader.archive_metadata().get(DESCRIPTION_KEY)
    }

    /// Earliest and latest sample time over every sampled property.
    ///
    /// Served from the container's per-sampling max-sample summary when it
    /// has one. A container without the summary is an expected, ordinary
    /// case: the answer degrades to a full tree walk that visits every
    /// property once and skips anything it cannot interpret. `None` means
    /// the archive holds no animated samples at all.
    pub fn time_range(&self) -> Option<(Chrono, Chrono)> {
        let mut range: Option<(Chrono, Chrono)> = None;

        // The identity sampling at index 0 describes static data and does
        // not contribute to the animated range.
        let mut summary_complete = true;
        for i in 1..self.reader.num_time_samplings() {
            match self.reader.max_num_samples(i) {
                Some(max) if max > 0 => {
                    let ts = self.reader.time_sampling(i)?;
                    let start = ts.time_at(0, max).ok()?;
                    let end = ts.time_at(max - 1, max).ok()?;
                    merge_range(&mut range, start, end);
                }
                Some(_) => {}
                None => {
                    summary_complete = false;
                    break;
                }
            }
        }

        if summary_complete && self.reader.num_time_samplings() > 1 {
            return range;
        }
        self.time_range_walk()
    }

    /// The O(objects) fallback: walk the whole tree and widen the range by
    /// every property's first and last sample time.
    pub fn time_range_walk(&self) -> Option<(Chrono, Chrono)> {
        let mut range = None;
        walk_object(&self.top(), &mut range);
        range
    }
}

fn merge_range(range: &mut Option<(Chrono, Chrono)>, start: Chrono, end: Chrono) {
    match range {
        Some((lo, hi)) => {
            *lo = lo.min(start);
            *hi = hi.max(end);
        }
        None => *range = Some((start, end)),
    }
}

fn walk_object(object: &IObject, range: &mut Option<(Chrono, Chrono)>) {
    if let Ok(props) = object.properties() {
        walk_compound(&props, range);
    }
    for child in object.children() {
        walk_object(&child, range);
    }
}

fn walk_compound(compound: &ICompoundProperty, range: &mut Option<(Chrono, Chrono)>) {
    for index in 0..compound.num_properties() {
        let Ok(prop) = compound.property(index) else {
            // unreadable properties are skipped, not fatal
            continue;
        };
        match prop {
            IProperty::Compound(sub) => walk_compound(&sub, range),
            IProperty::Scalar(p) => {
                if p.header().time_sampling_index != 0 {
                    note_samples(p.time_sampling().as_ref(), p.num_samples(), range);
                }
            }
            IProperty::Array(p) => {
                if p.header().time_sampling_index != 0 {
                    note_samples(p.time_sampling().as_ref(), p.num_samples(), range);
                }
            }
        }
    }
}

// Properties on the identity sampling (index 0) are static by convention
// and do not contribute, matching the summary fast path.
fn note_samples(ts: &TimeSampling, num_samples: usize, range: &mut Option<(Chrono, Chrono)>) {
    // A property needs more than one sample to span time.
    if num_samples < 2 {
        return;
    }
    let (Ok(start), Ok(end)) = (ts.time_at(0, num_samples), ts.time_at(num_samples - 1, num_samples))
    else {
        return;
    };
    merge_range(range, start, end);
}
