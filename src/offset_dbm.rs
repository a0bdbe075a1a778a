//! Offset-DBM kernel: asynchronous zones over `refcount` reference clocks
//! plus one offset variable per process clock.
//!
//! Dimension `d = refcount + offset_count`. The first `refcount` rows/columns
//! are the reference clocks `R_0 .. R_{refcount-1}`; the rest are offset
//! variables, each mapped to exactly one reference clock by `refmap`. This
//! module mirrors the operations of `tchecker::dbm::offset_dbm` in the
//! original source: `universal_positive`, `bound_spread`, `synchronize`,
//! `reset_to_refclock`, `asynchronous_open_up`, and `to_dbm`.

use thiserror::Error;

use crate::bound::Bound;
use crate::dbm::Dbm;

/// Errors raised by offset-DBM operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum OffsetDbmError {
    /// `refmap` referenced a reference-clock index outside `0..refcount`.
    #[error("reference clock {index} out of range for refcount {refcount}")]
    RefClockOutOfRange { index: usize, refcount: usize },
    /// The offset variable count didn't match `refmap`'s length.
    #[error("refmap length {got} does not match dimension {dim}")]
    RefmapLenMismatch { got: usize, dim: usize },
}

type Result<T> = std::result::Result<T, OffsetDbmError>;

/// An offset-DBM: `refcount` reference clocks followed by offset variables,
/// each assigned to one reference clock via `refmap`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OffsetDbm {
    refcount: usize,
    /// `refmap[i]` for `i < refcount` is `i` itself; for offset variables it
    /// names the reference clock that variable is relative to.
    refmap: Vec<usize>,
    dbm: Dbm,
}

impl OffsetDbm {
    /// Builds the universal-positive offset-DBM: all clocks unconstrained
    /// above, bounded below by 0, and each offset variable's defining
    /// inequality `x - R_{refmap(x)} <= 0` in place (the "positive"
    /// invariant: every offset variable starts synchronized with its
    /// reference clock).
    pub fn universal_positive(refcount: usize, refmap: Vec<usize>) -> Result<OffsetDbm> {
        let dim = refcount + refmap.len();
        if refmap.len() + refcount != dim {
            return Err(OffsetDbmError::RefmapLenMismatch { got: refmap.len(), dim });
        }
        for &r in &refmap {
            if r >= refcount {
                return Err(OffsetDbmError::RefClockOutOfRange { index: r, refcount });
            }
        }
        let mut dbm = Dbm::universal_positive(dim);
        for (offset_i, &r) in refmap.iter().enumerate() {
            let i = refcount + offset_i;
            dbm.set_raw(r, i, Bound::LE_ZERO);
        }
        dbm.tighten();
        Ok(OffsetDbm { refcount, refmap, dbm })
    }

    /// Number of reference clocks.
    pub fn refcount(&self) -> usize {
        self.refcount
    }

    /// Total dimension (reference clocks + offset variables).
    pub fn dim(&self) -> usize {
        self.dbm.dim()
    }

    /// The reference clock that offset variable `i` (a global index, `i >=
    /// refcount`) is defined relative to.
    pub fn refclock_of(&self, i: usize) -> usize {
        if i < self.refcount {
            i
        } else {
            self.refmap[i - self.refcount]
        }
    }

    /// Read access to the underlying DBM, e.g. for inclusion tests.
    pub fn dbm(&self) -> &Dbm {
        &self.dbm
    }

    /// Whether the underlying DBM denotes the empty zone.
    pub fn is_empty(&self) -> bool {
        self.dbm.is_empty()
    }

    /// Whether variable `i` carries the "positive" invariant `x -
    /// R_{refmap(i)} <= 0` (true for all reference clocks trivially).
    pub fn is_positive(&self) -> bool {
        for i in self.refcount..self.dim() {
            let r = self.refclock_of(i);
            if self.dbm.get(r, i) > Bound::LE_ZERO {
                return false;
            }
        }
        true
    }

    /// Clamps every pairwise difference between reference clocks to at most
    /// `spread` in both directions, then retightens. Mirrors
    /// `tchecker::dbm::bound_spread`: this is the operation that keeps the
    /// asynchronous product's reference clocks from drifting apart without
    /// bound.
    pub fn bound_spread(&mut self, spread: i64) {
        if self.dbm.is_empty() {
            return;
        }
        for r1 in 0..self.refcount {
            for r2 in 0..self.refcount {
                if r1 == r2 {
                    continue;
                }
                if self.dbm.get(r1, r2) > Bound::le(spread) {
                    self.dbm.set_raw(r1, r2, Bound::le(spread));
                }
            }
        }
        self.dbm.tighten();
    }

    /// Synchronizes all reference clocks to the same value: `bound_spread(0)`.
    /// Produces the zone in which every reference clock reads identically,
    /// the starting point for fully-synchronous semantics.
    pub fn synchronize(&mut self) {
        self.bound_spread(0);
    }

    /// Whether all reference clocks are pairwise equal in every valuation of
    /// this zone (the post-condition `synchronize` establishes).
    pub fn is_synchronized(&self) -> bool {
        if self.dbm.is_empty() {
            return true;
        }
        for r1 in 0..self.refcount {
            for r2 in 0..self.refcount {
                if r1 == r2 {
                    continue;
                }
                if self.dbm.get(r1, r2) != Bound::LE_ZERO {
                    return false;
                }
            }
        }
        true
    }

    /// Whether every pairwise reference-clock difference is within
    /// `[-spread, spread]`.
    pub fn is_spread_bounded(&self, spread: i64) -> bool {
        if self.dbm.is_empty() {
            return true;
        }
        for r1 in 0..self.refcount {
            for r2 in 0..self.refcount {
                if r1 == r2 {
                    continue;
                }
                if self.dbm.get(r1, r2) > Bound::le(spread) {
                    return false;
                }
            }
        }
        true
    }

    /// Resets offset variable `x` to its reference clock's current value by
    /// copying `refmap(x)`'s row and column into `x`'s row and column.
    /// Mirrors `tchecker::dbm::reset_to_refclock`.
    pub fn reset_to_refclock(&mut self, x: usize) {
        if self.dbm.is_empty() {
            return;
        }
        let r = self.refclock_of(x);
        let n = self.dim();
        for j in 0..n {
            if j == x {
                continue;
            }
            self.dbm.set_raw(x, j, self.dbm.get(r, j));
            self.dbm.set_raw(j, x, self.dbm.get(j, r));
        }
        self.dbm.set_raw(x, x, Bound::LE_ZERO);
        self.dbm.tighten();
    }

    /// Lets time elapse independently per reference clock: for each
    /// reference clock `r`, every variable's bound toward `r` (`m[i][r]`) is
    /// relaxed to infinity, so only clocks sharing a reference clock stay
    /// synchronized by this step. If `delay_allowed` is given, reference
    /// clocks whose bit is unset are excluded (their column is left intact,
    /// modeling a process that cannot currently let time pass).
    pub fn asynchronous_open_up(&mut self, delay_allowed: Option<&fixedbitset::FixedBitSet>) {
        if self.dbm.is_empty() {
            return;
        }
        let n = self.dim();
        for r in 0..self.refcount {
            if let Some(allowed) = delay_allowed {
                if !allowed.contains(r) {
                    continue;
                }
            }
            for i in 0..n {
                if i == r {
                    continue;
                }
                self.dbm.set_raw(i, r, Bound::Infinity);
            }
        }
    }

    /// Projects a synchronized offset-DBM onto a single-reference-clock
    /// [`Dbm`] of dimension `dim - refcount + 1`, by collapsing all
    /// reference clocks into clock `0`. Requires [`OffsetDbm::is_synchronized`];
    /// callers that have not established synchronization should call
    /// [`OffsetDbm::synchronize`] first.
    pub fn to_dbm(&self) -> Dbm {
        let old_n = self.dim();
        let new_n = old_n - self.refcount + 1;
        let mut out = Dbm::universal(new_n);
        // new index 0 = collapsed reference clock, i.e. old index 0.
        // new index for old offset variable i (i >= refcount) is
        // i - refcount + 1.
        let map_old_to_new = |old: usize| -> usize {
            if old < self.refcount {
                0
            } else {
                old - self.refcount + 1
            }
        };
        for oi in 0..old_n {
            for oj in 0..old_n {
                let ni = map_old_to_new(oi);
                let nj = map_old_to_new(oj);
                let candidate = self.dbm.get(oi, oj);
                if candidate < out.get(ni, nj) {
                    out.set_raw(ni, nj, candidate);
                }
            }
        }
        out.tighten();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_proc_one_clock_each() -> OffsetDbm {
        // refcount = 2 (R0, R1), offset vars: x (ref R0), y (ref R1).
        OffsetDbm::universal_positive(2, vec![0, 1]).unwrap()
    }

    #[test]
    fn universal_positive_is_positive_and_not_empty() {
        let od = two_proc_one_clock_each();
        assert!(!od.is_empty());
        assert!(od.is_positive());
    }

    #[test]
    fn synchronize_makes_reference_clocks_equal() {
        let mut od = two_proc_one_clock_each();
        od.synchronize();
        assert!(od.is_synchronized());
        assert!(!od.is_empty());
    }

    #[test]
    fn bound_spread_enforces_spread_bound() {
        let mut od = two_proc_one_clock_each();
        od.asynchronous_open_up(None);
        od.bound_spread(5);
        assert!(od.is_spread_bounded(5));
    }

    #[test]
    fn reset_to_refclock_then_synchronized_tracks_reference() {
        let mut od = two_proc_one_clock_each();
        od.asynchronous_open_up(None);
        od.reset_to_refclock(2); // x := R0
        assert_eq!(od.dbm().get(0, 2), Bound::LE_ZERO);
        assert_eq!(od.dbm().get(2, 0), Bound::LE_ZERO);
    }

    #[test]
    fn to_dbm_after_synchronize_has_reduced_dimension() {
        let mut od = two_proc_one_clock_each();
        od.synchronize();
        let d = od.to_dbm();
        // old dim 4 (R0,R1,x,y), refcount 2 => new dim 4-2+1=3.
        assert_eq!(d.dim(), 3);
        assert!(!d.is_empty());
    }

    #[test]
    fn delay_allowed_excludes_blocked_reference_clock() {
        let mut od = two_proc_one_clock_each();
        let mut allowed = fixedbitset::FixedBitSet::with_capacity(2);
        allowed.insert(0); // only R0 may elapse
        od.asynchronous_open_up(Some(&allowed));
        // R1 -> x (old positive bound) should remain constrained since R1's
        // column was not relaxed; but R0's column (toward x, since refmap(x)=0)
        // was relaxed.
        assert_eq!(od.dbm().get(2, 0), Bound::Infinity);
    }
}
