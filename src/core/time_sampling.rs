//! Time sampling - the mapping from sample index to time.
//!
//! Properties are sampled over time. Uniform sampling (a fixed step from a
//! start time) is the common case; cyclic sampling repeats a short pattern of
//! times each cycle, and acyclic sampling stores an explicit time per sample.

use crate::util::{Chrono, Error, Result};

/// The shape of a sampling's index-to-time mapping.
#[derive(Clone, Debug, PartialEq)]
pub enum TimeSamplingKind {
    /// Regular interval: `start_time + index * time_per_cycle`.
    Uniform {
        time_per_cycle: Chrono,
        start_time: Chrono,
    },

    /// A repeating pattern of times, advancing by `time_per_cycle` each
    /// cycle. Stored times must be non-decreasing within the cycle.
    Cyclic {
        time_per_cycle: Chrono,
        times: Vec<Chrono>,
    },

    /// Explicit, non-decreasing time per sample.
    Acyclic { times: Vec<Chrono> },
}

/// Maps sample indices to times and back.
///
/// Lookup past the stored cycle extrapolates by wrapping with the cycle
/// duration, so a cyclic sampling answers queries for any sample count.
#[derive(Clone, Debug, PartialEq)]
pub struct TimeSampling {
    kind: TimeSamplingKind,
}

// Guard added to floor computations so that a time produced by `time_at`
// maps back onto its own index despite rounding in (i * tpc) / tpc.
const FLOOR_GUARD: Chrono = 1.0e-9;

impl TimeSampling {
    /// Static sampling: one conceptual sample at time 0.
    pub fn identity() -> Self {
        Self::uniform(1.0, 0.0)
    }

    /// Uniform sampling with the given step and start time.
    pub fn uniform(time_per_cycle: Chrono, start_time: Chrono) -> Self {
        Self {
            kind: TimeSamplingKind::Uniform {
                time_per_cycle,
                start_time,
            },
        }
    }

    /// Cyclic sampling: `times` holds one cycle, repeated every
    /// `time_per_cycle`.
    pub fn cyclic(time_per_cycle: Chrono, times: Vec<Chrono>) -> Self {
        debug_assert!(
            times.windows(2).all(|w| w[0] <= w[1]),
            "cyclic sample times must be non-decreasing"
        );
        Self {
            kind: TimeSamplingKind::Cyclic {
                time_per_cycle,
                times,
            },
        }
    }

    /// Acyclic sampling with an explicit time per sample.
    pub fn acyclic(times: Vec<Chrono>) -> Self {
        debug_assert!(
            times.windows(2).all(|w| w[0] <= w[1]),
            "acyclic sample times must be non-decreasing"
        );
        Self {
            kind: TimeSamplingKind::Acyclic { times },
        }
    }

    #[inline]
    pub fn kind(&self) -> &TimeSamplingKind {
        &self.kind
    }

    /// Number of stored times per cycle (1 for uniform).
    pub fn samples_per_cycle(&self) -> usize {
        match &self.kind {
            TimeSamplingKind::Uniform { .. } => 1,
            TimeSamplingKind::Cyclic { times, .. } => times.len().max(1),
            TimeSamplingKind::Acyclic { times } => times.len(),
        }
    }

    /// Cycle duration; `None` for acyclic sampling.
    pub fn time_per_cycle(&self) -> Option<Chrono> {
        match &self.kind {
            TimeSamplingKind::Uniform { time_per_cycle, .. }
            | TimeSamplingKind::Cyclic { time_per_cycle, .. } => Some(*time_per_cycle),
            TimeSamplingKind::Acyclic { .. } => None,
        }
    }

    /// The stored times of one cycle (the start time for uniform sampling).
    pub fn stored_times(&self) -> Vec<Chrono> {
        match &self.kind {
            TimeSamplingKind::Uniform { start_time, .. } => vec![*start_time],
            TimeSamplingKind::Cyclic { times, .. } | TimeSamplingKind::Acyclic { times } => {
                times.clone()
            }
        }
    }

    /// Time of the sample at `index`, checked against the sample count.
    ///
    /// The value is exact: querying the index a sample was appended at
    /// returns the same time the sampling assigned when it was appended.
    pub fn time_at(&self, index: usize, num_samples: usize) -> Result<Chrono> {
        if index >= num_samples {
            return Err(Error::IndexOutOfRange {
                index,
                count: num_samples,
            });
        }
        if let TimeSamplingKind::Acyclic { times } = &self.kind {
            return times.get(index).copied().ok_or(Error::IndexOutOfRange {
                index,
                count: times.len(),
            });
        }
        Ok(self.sample_time(index))
    }

    /// Unchecked index-to-time mapping for the computed (non-acyclic) kinds;
    /// acyclic indices past the stored table clamp to the last entry.
    pub fn sample_time(&self, index: usize) -> Chrono {
        match &self.kind {
            TimeSamplingKind::Uniform {
                time_per_cycle,
                start_time,
            } => *start_time + index as Chrono * *time_per_cycle,
            TimeSamplingKind::Cyclic {
                time_per_cycle,
                times,
            } => {
                if times.is_empty() {
                    return 0.0;
                }
                let cycle = index / times.len();
                times[index % times.len()] + cycle as Chrono * *time_per_cycle
            }
            TimeSamplingKind::Acyclic { times } => match times.get(index) {
                Some(t) => *t,
                None => times.last().copied().unwrap_or(0.0),
            },
        }
    }

    /// Greatest index whose sample time is <= `time`, clamped to
    /// `[0, num_samples - 1]`. Returns the index and its actual time.
    pub fn floor_index(&self, time: Chrono, num_samples: usize) -> (usize, Chrono) {
        if num_samples == 0 {
            return (0, self.sample_time(0));
        }
        let last = num_samples - 1;

        let idx = match &self.kind {
            TimeSamplingKind::Uniform {
                time_per_cycle,
                start_time,
            } => {
                if time <= *start_time {
                    0
                } else {
                    let frac = (time - start_time) / time_per_cycle;
                    (frac + FLOOR_GUARD).floor() as usize
                }
            }
            TimeSamplingKind::Cyclic {
                time_per_cycle,
                times,
            } => {
                let n = times.len();
                if n == 0 || time <= times[0] {
                    0
                } else {
                    // Locate the cycle, then the slot within it. The slot
                    // search may have to step back one cycle when `time`
                    // falls before the first stored time of its cycle.
                    let cycle = ((time - times[0]) / time_per_cycle + FLOOR_GUARD).floor() as i64;
                    let mut found = 0usize;
                    'cycles: for c in [cycle, cycle - 1] {
                        if c < 0 {
                            continue;
                        }
                        let base = c as Chrono * *time_per_cycle;
                        for j in (0..n).rev() {
                            if times[j] + base <= time + FLOOR_GUARD {
                                found = c as usize * n + j;
                                break 'cycles;
                            }
                        }
                    }
                    found
                }
            }
            TimeSamplingKind::Acyclic { times } => {
                let n = num_samples.min(times.len());
                // Binary search for the last time <= `time`.
                let mut lo = 0usize;
                let mut hi = n;
                while lo < hi {
                    let mid = lo + (hi - lo) / 2;
                    if times[mid] <= time {
                        lo = mid + 1;
                    } else {
                        hi = mid;
                    }
                }
                lo.saturating_sub(1)
            }
        };

        let idx = idx.min(last);
        (idx, self.sample_time(idx))
    }

    /// Smallest index whose sample time is >= `time`, clamped to
    /// `[0, num_samples - 1]`.
    pub fn ceil_index(&self, time: Chrono, num_samples: usize) -> (usize, Chrono) {
        if num_samples == 0 {
            return (0, self.sample_time(0));
        }
        let (floor_idx, floor_time) = self.floor_index(time, num_samples);
        if floor_time >= time {
            return (floor_idx, floor_time);
        }
        let idx = (floor_idx + 1).min(num_samples - 1);
        (idx, self.sample_time(idx))
    }

    /// Index whose sample time is nearest to `time`; an exact tie between
    /// the floor and ceil candidates resolves to the lower index.
    pub fn near_index(&self, time: Chrono, num_samples: usize) -> (usize, Chrono) {
        if num_samples == 0 {
            return (0, self.sample_time(0));
        }
        let (floor_idx, floor_time) = self.floor_index(time, num_samples);
        if floor_idx + 1 >= num_samples {
            return (floor_idx, floor_time);
        }
        let ceil_time = self.sample_time(floor_idx + 1);
        if (time - floor_time).abs() <= (ceil_time - time).abs() {
            (floor_idx, floor_time)
        } else {
            (floor_idx + 1, ceil_time)
        }
    }

    /// Value equality used by the writer to reuse an already-registered
    /// sampling instead of appending a duplicate to the archive table.
    pub fn is_equivalent(&self, other: &TimeSampling) -> bool {
        self.kind == other.kind
    }
}

impl Default for TimeSampling {
    fn default() -> Self {
        Self::identity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FPS24: Chrono = 1.0 / 24.0;

    #[test]
    fn uniform_times() {
        let ts = TimeSampling::uniform(FPS24, 0.0);
        assert_eq!(ts.sample_time(0), 0.0);
        assert!((ts.sample_time(24) - 1.0).abs() < 1e-12);
        assert!((ts.time_at(48, 100).unwrap() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn time_at_checks_bounds() {
        let ts = TimeSampling::uniform(FPS24, 0.0);
        assert!(matches!(
            ts.time_at(10, 10),
            Err(Error::IndexOutOfRange { index: 10, count: 10 })
        ));
    }

    #[test]
    fn floor_ceil_near_uniform() {
        let ts = TimeSampling::uniform(1.0, 0.0);
        assert_eq!(ts.floor_index(0.5, 10).0, 0);
        assert_eq!(ts.floor_index(1.5, 10).0, 1);
        assert_eq!(ts.floor_index(99.0, 10).0, 9);
        assert_eq!(ts.ceil_index(0.5, 10).0, 1);
        assert_eq!(ts.ceil_index(3.0, 10).0, 3);
        assert_eq!(ts.near_index(0.4, 10).0, 0);
        assert_eq!(ts.near_index(0.6, 10).0, 1);
        // exact tie resolves to the lower index
        assert_eq!(ts.near_index(0.5, 10).0, 0);
    }

    #[test]
    fn floor_of_own_time_is_identity() {
        for ts in [
            TimeSampling::uniform(FPS24, 0.25),
            TimeSampling::cyclic(1.0, vec![0.0, 0.1, 0.7]),
            TimeSampling::acyclic(vec![0.0, 0.5, 1.0, 4.0]),
        ] {
            let n = 4;
            for i in 0..n {
                let t = ts.time_at(i, n).unwrap();
                assert_eq!(ts.floor_index(t, n).0, i, "floor({t}) in {ts:?}");
                assert_eq!(ts.ceil_index(t, n).0, i, "ceil({t}) in {ts:?}");
                if i > 0 {
                    assert!(ts.time_at(i - 1, n).unwrap() <= t);
                }
            }
        }
    }

    #[test]
    fn cyclic_extrapolates_past_stored_cycle() {
        let ts = TimeSampling::cyclic(1.0, vec![0.0, 0.25]);
        // index 5 = cycle 2, slot 1
        assert!((ts.sample_time(5) - 2.25).abs() < 1e-12);
        assert_eq!(ts.floor_index(2.3, 100).0, 5);
        assert_eq!(ts.ceil_index(2.3, 100).0, 6);
        // before the first stored time of cycle 2, floor steps back a cycle
        assert_eq!(ts.floor_index(1.9, 100).0, 3);
    }

    #[test]
    fn acyclic_lookup() {
        let ts = TimeSampling::acyclic(vec![0.0, 0.5, 1.0, 2.0]);
        assert_eq!(ts.floor_index(0.75, 4).0, 1);
        assert_eq!(ts.ceil_index(0.75, 4).0, 2);
        assert_eq!(ts.floor_index(-1.0, 4).0, 0);
        assert_eq!(ts.floor_index(9.0, 4).0, 3);
    }

    #[test]
    fn equivalence() {
        let a = TimeSampling::uniform(FPS24, 0.0);
        let b = TimeSampling::uniform(FPS24, 0.0);
        let c = TimeSampling::uniform(FPS24, 1.0);
        assert!(a.is_equivalent(&b));
        assert!(!a.is_equivalent(&c));
        assert!(!a.is_equivalent(&TimeSampling::acyclic(vec![0.0])));
    }
}
