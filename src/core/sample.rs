//! Sample selection and geometry scopes.

use super::TimeSampling;
use crate::util::Chrono;

/// Selects a sample either by index or by time.
#[derive(Clone, Copy, Debug)]
pub enum SampleSelector {
    /// Exact index.
    Index(usize),
    /// Greatest sample time <= the given time.
    TimeFloor(Chrono),
    /// Smallest sample time >= the given time.
    TimeCeil(Chrono),
    /// Nearest sample time; ties resolve to the lower index.
    TimeNear(Chrono),
}

impl SampleSelector {
    /// The first (static) sample.
    pub const fn first() -> Self {
        Self::Index(0)
    }

    /// Resolve against a sampling and a sample count. Index selectors pass
    /// through unchanged (bounds are checked by the property read itself);
    /// time selectors clamp into `[0, num_samples - 1]`.
    pub fn resolve(&self, ts: &TimeSampling, num_samples: usize) -> usize {
        match *self {
            Self::Index(i) => i,
            Self::TimeFloor(t) => ts.floor_index(t, num_samples).0,
            Self::TimeCeil(t) => ts.ceil_index(t, num_samples).0,
            Self::TimeNear(t) => ts.near_index(t, num_samples).0,
        }
    }
}

impl Default for SampleSelector {
    fn default() -> Self {
        Self::Index(0)
    }
}

impl From<usize> for SampleSelector {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

impl From<Chrono> for SampleSelector {
    fn from(time: Chrono) -> Self {
        Self::TimeNear(time)
    }
}

/// Extent of a geometry parameter over the primitive it annotates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum GeometryScope {
    /// One value for the whole primitive.
    #[default]
    Constant,
    /// One value per face.
    Uniform,
    /// One value per point, varying interpolation.
    Varying,
    /// One value per vertex.
    Vertex,
    /// One value per face-vertex.
    FaceVarying,
}

impl GeometryScope {
    /// Parse the short metadata token.
    pub fn parse(s: &str) -> Self {
        match s {
            "uni" | "uniform" => Self::Uniform,
            "var" | "varying" => Self::Varying,
            "vtx" | "vertex" => Self::Vertex,
            "fvr" | "facevarying" => Self::FaceVarying,
            _ => Self::Constant,
        }
    }

    /// Short token stored in metadata.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Constant => "con",
            Self::Uniform => "uni",
            Self::Varying => "var",
            Self::Vertex => "vtx",
            Self::FaceVarying => "fvr",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_resolution() {
        let ts = TimeSampling::uniform(1.0, 0.0);
        assert_eq!(SampleSelector::Index(7).resolve(&ts, 10), 7);
        assert_eq!(SampleSelector::TimeFloor(3.9).resolve(&ts, 10), 3);
        assert_eq!(SampleSelector::TimeCeil(3.1).resolve(&ts, 10), 4);
        assert_eq!(SampleSelector::TimeNear(3.6).resolve(&ts, 10), 4);
    }

    #[test]
    fn selector_conversions() {
        assert!(matches!(SampleSelector::from(3), SampleSelector::Index(3)));
        assert!(matches!(
            SampleSelector::from(1.5),
            SampleSelector::TimeNear(t) if (t - 1.5).abs() < 1e-12
        ));
    }

    #[test]
    fn scope_tokens() {
        assert_eq!(GeometryScope::parse("fvr"), GeometryScope::FaceVarying);
        assert_eq!(GeometryScope::parse("???"), GeometryScope::Constant);
        assert_eq!(GeometryScope::Vertex.as_str(), "vtx");
    }
}
