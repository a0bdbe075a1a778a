//! Difference-bound matrix kernel.
//!
//! A [`Dbm`] of dimension `d` constrains `d` clocks, clock `0` being the
//! reference clock that is always `0`. Every public operation other than the
//! explicitly-named raw constructors restores tightness (Floyd-Warshall
//! closure) before returning, so a non-empty `Dbm` observed from outside this
//! module is always both tight and consistent.

use thiserror::Error;

use crate::bound::Bound;

/// Errors raised by DBM operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DbmError {
    /// Two DBMs of different dimension were combined.
    #[error("dimension mismatch: {a} vs {b}")]
    DimensionMismatch { a: usize, b: usize },
    /// A clock index was out of range for this DBM's dimension.
    #[error("clock index {index} out of range for dimension {dim}")]
    ClockOutOfRange { index: usize, dim: usize },
}

type Result<T> = std::result::Result<T, DbmError>;

/// A difference-bound matrix over `dim` clocks (clock `0` is the reference).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dbm {
    dim: usize,
    m: Vec<Bound>,
}

impl Dbm {
    /// The universal DBM: every clock unconstrained relative to every other,
    /// diagonal and row/column 0 left at their required values by a
    /// subsequent call to [`Dbm::zero`]-style constraints. This is the raw
    /// "no information at all" matrix; prefer [`Dbm::zero`] or
    /// [`Dbm::universal_positive`] for a usable starting point.
    pub fn universal(dim: usize) -> Dbm {
        let mut m = vec![Bound::Infinity; dim * dim];
        for i in 0..dim {
            m[i * dim + i] = Bound::LE_ZERO;
        }
        Dbm { dim, m }
    }

    /// The universal DBM restricted to non-negative clock values: every
    /// clock is unconstrained above but bounded below by zero, i.e.
    /// `m[0][i] = <=0` for all `i`. This is the correct "all clocks free"
    /// starting point for reachability (every clock value is some
    /// non-negative real).
    pub fn universal_positive(dim: usize) -> Dbm {
        let mut d = Dbm::universal(dim);
        for i in 1..dim {
            d.m[i] = Bound::LE_ZERO;
        }
        d
    }

    /// The zone containing exactly the valuation where every clock is 0.
    pub fn zero(dim: usize) -> Dbm {
        Dbm {
            dim,
            m: vec![Bound::LE_ZERO; dim * dim],
        }
    }

    /// Number of clocks tracked, including the reference clock 0.
    pub fn dim(&self) -> usize {
        self.dim
    }

    #[inline]
    fn idx(&self, i: usize, j: usize) -> usize {
        i * self.dim + j
    }

    /// Raw read access to `m[i][j]`. Panics if indices are out of range.
    pub fn get(&self, i: usize, j: usize) -> Bound {
        self.m[self.idx(i, j)]
    }

    /// Raw write access to `m[i][j]`, bypassing tightening. Callers that use
    /// this must call [`Dbm::tighten`] before relying on any public
    /// invariant again.
    pub fn set_raw(&mut self, i: usize, j: usize, b: Bound) {
        let idx = self.idx(i, j);
        self.m[idx] = b;
    }

    fn check_dim(&self, i: usize, j: usize) -> Result<()> {
        if i >= self.dim {
            return Err(DbmError::ClockOutOfRange { index: i, dim: self.dim });
        }
        if j >= self.dim {
            return Err(DbmError::ClockOutOfRange { index: j, dim: self.dim });
        }
        Ok(())
    }

    /// Restores tight, consistent form by all-pairs shortest paths. Once a
    /// negative cycle is detected on the diagonal, the DBM is collapsed to
    /// the canonical empty representation (`m[0][0] = <0`) and closure
    /// stops early.
    pub fn tighten(&mut self) {
        let n = self.dim;
        for k in 0..n {
            for i in 0..n {
                if self.m[i * n + k].is_infinity() {
                    continue;
                }
                for j in 0..n {
                    let via = self.m[i * n + k] + self.m[k * n + j];
                    if via < self.m[i * n + j] {
                        self.m[i * n + j] = via;
                    }
                }
            }
        }
        for i in 0..n {
            if self.m[i * n + i] < Bound::LE_ZERO {
                self.collapse_to_empty();
                return;
            }
        }
    }

    fn collapse_to_empty(&mut self) {
        self.m.fill(Bound::Infinity);
        self.m[0] = Bound::lt(0);
    }

    /// Whether this DBM denotes the empty zone. By convention the canonical
    /// empty DBM has `m[0][0] < 0`; any DBM with a negative-length diagonal
    /// cycle is empty, but after [`Dbm::tighten`] this always manifests as
    /// `m[0][0] < 0`.
    pub fn is_empty(&self) -> bool {
        self.m[0] < Bound::LE_ZERO
    }

    /// Intersects this DBM with the constraint `x_i - x_j <prec> k` and
    /// re-tightens.
    pub fn constrain(&mut self, i: usize, j: usize, bound: Bound) -> Result<()> {
        self.check_dim(i, j)?;
        if self.is_empty() {
            return Ok(());
        }
        let idx = self.idx(i, j);
        if bound < self.m[idx] {
            self.m[idx] = bound;
            self.tighten();
        }
        Ok(())
    }

    /// Resets clock `x` to the constant `value` (typically `0`).
    pub fn reset(&mut self, x: usize, value: i64) -> Result<()> {
        self.check_dim(x, x)?;
        if self.is_empty() {
            return Ok(());
        }
        let n = self.dim;
        for i in 0..n {
            if i == x {
                continue;
            }
            self.m[x * n + i] = self.m[0 * n + i] + Bound::le(value);
            self.m[i * n + x] = self.m[i * n + 0] + Bound::le(-value);
        }
        self.m[x * n + x] = Bound::LE_ZERO;
        self.tighten();
        Ok(())
    }

    /// Lets time elapse: removes all upper bounds on every clock except the
    /// reference clock (`m[i][0] = inf` for `i != 0`).
    pub fn open_up(&mut self) {
        if self.is_empty() {
            return;
        }
        let n = self.dim;
        for i in 1..n {
            self.m[i * n + 0] = Bound::Infinity;
        }
    }

    /// Exact inclusion test: does `self` denote a subset of `other`?
    /// Requires equal dimension.
    pub fn is_le(&self, other: &Dbm) -> Result<bool> {
        if self.dim != other.dim {
            return Err(DbmError::DimensionMismatch { a: self.dim, b: other.dim });
        }
        if self.is_empty() {
            return Ok(true);
        }
        if other.is_empty() {
            return Ok(false);
        }
        Ok(self.m.iter().zip(other.m.iter()).all(|(a, b)| a <= b))
    }

    /// Bound-for-bound equality of two tight DBMs of equal dimension.
    pub fn is_equal(&self, other: &Dbm) -> bool {
        self.dim == other.dim && self.m == other.m
    }

    /// The clock bound in `m[i][0]`, i.e. the tightest known upper bound on
    /// clock `i` alone. Used by the extrapolation operators.
    pub fn upper_bound(&self, i: usize) -> Bound {
        self.m[self.idx(i, 0)]
    }

    /// The clock bound in `m[0][i]`, negated, i.e. the tightest known lower
    /// bound on clock `i` alone.
    pub fn lower_bound(&self, i: usize) -> Bound {
        self.m[self.idx(0, i)].negate()
    }

    /// Relaxes entries exceeding the per-clock maximum constant `max[i]`
    /// (ExtraM): `m[i][0]` is set to infinity if it exceeds `max[i]`, and any
    /// other entry referencing a clock whose bound has gone unconstrained is
    /// relaxed symmetrically, then the whole matrix is retightened. `max`
    /// must have length `dim`; index `0` is ignored.
    pub fn extra_m(&mut self, max: &[i64]) {
        debug_assert_eq!(max.len(), self.dim);
        if self.is_empty() {
            return;
        }
        let n = self.dim;
        for i in 1..n {
            if let Some(k) = self.m[i * n + 0].value() {
                if k > max[i] {
                    self.m[i * n + 0] = Bound::Infinity;
                }
            }
            if let Some(k) = self.m[0 * n + i].value() {
                if -k > max[i] {
                    self.m[0 * n + i] = Bound::Infinity;
                }
            }
        }
        for i in 1..n {
            for j in 1..n {
                if i == j {
                    continue;
                }
                if let Some(k) = self.m[i * n + j].value() {
                    if -k > max[j] {
                        self.m[i * n + j] = Bound::Infinity;
                    }
                }
            }
        }
        self.tighten();
    }

    /// ExtraLU: as [`Dbm::extra_m`] but with independent lower bounds `l[i]`
    /// and upper bounds `u[i]` per clock.
    pub fn extra_lu(&mut self, l: &[i64], u: &[i64]) {
        debug_assert_eq!(l.len(), self.dim);
        debug_assert_eq!(u.len(), self.dim);
        if self.is_empty() {
            return;
        }
        let n = self.dim;
        for i in 1..n {
            if let Some(k) = self.m[i * n + 0].value() {
                if k > u[i] {
                    self.m[i * n + 0] = Bound::Infinity;
                }
            }
            if let Some(k) = self.m[0 * n + i].value() {
                if -k > l[i] {
                    self.m[0 * n + i] = Bound::Infinity;
                }
            }
        }
        for i in 1..n {
            for j in 1..n {
                if i == j {
                    continue;
                }
                if let Some(k) = self.m[i * n + j].value() {
                    if -k > l[j] {
                        self.m[i * n + j] = Bound::Infinity;
                    }
                }
            }
        }
        self.tighten();
    }

    /// ExtraM+: ExtraM followed by one additional retightening pass over the
    /// relaxed matrix. This is a documented simplification of the published
    /// "+"-refinement (see DESIGN.md) rather than the precise two-hop rule;
    /// it only ever discards entries implied by others, so it remains sound.
    pub fn extra_m_plus(&mut self, max: &[i64]) {
        self.extra_m(max);
        self.tighten();
    }

    /// ExtraLU+: see [`Dbm::extra_m_plus`].
    pub fn extra_lu_plus(&mut self, l: &[i64], u: &[i64]) {
        self.extra_lu(l, u);
        self.tighten();
    }

    /// Abstraction-then-inclusion covering test: does `self` fit under
    /// `other` once `other` is widened by ExtraLU(`l`,`u`)? See DESIGN.md for
    /// why this, rather than the pairwise shortcut formula, is used.
    pub fn is_alu_le(&self, other: &Dbm, l: &[i64], u: &[i64]) -> Result<bool> {
        if self.dim != other.dim {
            return Err(DbmError::DimensionMismatch { a: self.dim, b: other.dim });
        }
        let mut widened = other.clone();
        widened.extra_lu(l, u);
        self.is_le(&widened)
    }

    /// Abstraction-then-inclusion covering test against ExtraM(`max`).
    pub fn is_am_le(&self, other: &Dbm, max: &[i64]) -> Result<bool> {
        if self.dim != other.dim {
            return Err(DbmError::DimensionMismatch { a: self.dim, b: other.dim });
        }
        let mut widened = other.clone();
        widened.extra_m(max);
        self.is_le(&widened)
    }

    /// A hash stable under bitwise equality of the canonical form, consistent
    /// with [`Dbm::is_equal`].
    pub fn canonical_hash(&self) -> u64 {
        use std::hash::{Hash, Hasher};
        let mut h = rustc_hash::FxHasher::default();
        self.dim.hash(&mut h);
        for b in &self.m {
            match b {
                Bound::Infinity => 0i64.hash(&mut h),
                Bound::Finite { strict, k } => {
                    (*strict, *k).hash(&mut h);
                }
            }
        }
        h.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_dbm_is_not_empty_and_all_diagonal_zero() {
        let d = Dbm::zero(3);
        assert!(!d.is_empty());
        for i in 0..3 {
            assert_eq!(d.get(i, i), Bound::LE_ZERO);
        }
    }

    #[test]
    fn constrain_to_contradiction_yields_empty() {
        let mut d = Dbm::zero(2);
        // x1 - x0 <= 0 already (zero dbm); force x1 - x0 < 0, contradiction.
        d.constrain(1, 0, Bound::lt(0)).unwrap();
        assert!(d.is_empty());
    }

    #[test]
    fn open_up_then_constrain_upper_bound_recovers_finite_zone() {
        let mut d = Dbm::zero(2);
        d.open_up();
        assert_eq!(d.get(1, 0), Bound::Infinity);
        d.constrain(1, 0, Bound::le(5)).unwrap();
        assert_eq!(d.get(1, 0), Bound::le(5));
        assert!(!d.is_empty());
    }

    #[test]
    fn reset_then_open_up_is_le_universal_positive_with_same_reset() {
        let mut d = Dbm::universal_positive(2);
        d.open_up();
        d.reset(1, 0).unwrap();
        // After resetting x1 to 0 and letting time elapse, x1 should equal
        // the reference clock's future: x1 - 0 is unconstrained above,
        // 0 - x1 <= 0.
        assert_eq!(d.get(0, 1), Bound::LE_ZERO);
    }

    #[test]
    fn is_le_reflexive_and_antisymmetric_on_distinct_zones() {
        let d1 = Dbm::zero(2);
        let mut d2 = Dbm::zero(2);
        d2.open_up();
        assert!(d1.is_le(&d1).unwrap());
        assert!(d1.is_le(&d2).unwrap());
        assert!(!d2.is_le(&d1).unwrap());
    }

    #[test]
    fn extra_m_relaxes_bounds_above_max_and_remains_sound_superset() {
        let mut d = Dbm::zero(2);
        d.open_up();
        d.constrain(1, 0, Bound::le(100)).unwrap();
        let original = d.clone();
        d.extra_m(&[0, 1]);
        // extrapolation only widens: original must be included in the result.
        assert!(original.is_le(&d).unwrap());
        assert_eq!(d.get(1, 0), Bound::Infinity);
    }

    #[test]
    fn is_am_le_holds_when_within_widened_envelope() {
        let mut small = Dbm::zero(2);
        small.open_up();
        small.constrain(1, 0, Bound::le(2)).unwrap();

        let mut big = Dbm::zero(2);
        big.open_up();
        big.constrain(1, 0, Bound::le(50)).unwrap();

        assert!(small.is_am_le(&big, &[0, 1]).unwrap());
    }

    #[test]
    fn canonical_hash_consistent_with_equality() {
        let a = Dbm::zero(2);
        let b = Dbm::zero(2);
        assert!(a.is_equal(&b));
        assert_eq!(a.canonical_hash(), b.canonical_hash());
    }
}
