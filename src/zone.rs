//! Zone values: a fixed-dimension wrapper around either kernel, plus the
//! extrapolation operator selected for a given semantics.

use thiserror::Error;

use crate::dbm::Dbm;

/// Errors from zone-level operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ZoneError {
    /// The extrapolation bound table didn't match the zone's clock count.
    #[error("bound table length {got} does not match clock count {expected}")]
    BoundTableLenMismatch { got: usize, expected: usize },
}

/// Which extrapolation operator a semantics uses to guarantee termination of
/// the exploration. Selected once from `-m` at startup (see `src/config.rs`)
/// and then threaded through every `Zone::extrapolate` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extrapolation {
    /// No extrapolation: exact zones, used only for small finite-state models.
    None,
    /// ExtraM with one global maximum constant per clock.
    ExtraMGlobal,
    /// ExtraLU with one global (lower, upper) pair per clock.
    ExtraLuGlobal,
    /// ExtraM+, local per-location maxima (caller supplies the right table).
    ExtraMPlusLocal,
    /// ExtraLU+, local per-location (lower, upper) pairs.
    ExtraLuPlusLocal,
}

/// A zone: a DBM together with the extrapolation policy to apply to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Zone {
    dbm: Dbm,
}

impl Zone {
    /// A zone with all clocks reset to zero.
    pub fn zero(dim: usize) -> Zone {
        Zone { dbm: Dbm::zero(dim) }
    }

    /// Number of clocks.
    pub fn dim(&self) -> usize {
        self.dbm.dim()
    }

    /// Shared read access to the underlying DBM.
    pub fn dbm(&self) -> &Dbm {
        &self.dbm
    }

    /// Mutable access, for the TS layers that drive guard/reset operations
    /// directly against the kernel.
    pub fn dbm_mut(&mut self) -> &mut Dbm {
        &mut self.dbm
    }

    /// Whether this zone is empty.
    pub fn is_empty(&self) -> bool {
        self.dbm.is_empty()
    }

    /// Applies the given extrapolation operator with the supplied bound
    /// tables. `max` is used for the ExtraM variants, `(l, u)` for the
    /// ExtraLU variants; unused tables are ignored.
    pub fn extrapolate(
        &mut self,
        op: Extrapolation,
        max: &[i64],
        l: &[i64],
        u: &[i64],
    ) -> Result<(), ZoneError> {
        let dim = self.dbm.dim();
        match op {
            Extrapolation::None => {}
            Extrapolation::ExtraMGlobal | Extrapolation::ExtraMPlusLocal => {
                if max.len() != dim {
                    return Err(ZoneError::BoundTableLenMismatch { got: max.len(), expected: dim });
                }
                if matches!(op, Extrapolation::ExtraMPlusLocal) {
                    self.dbm.extra_m_plus(max);
                } else {
                    self.dbm.extra_m(max);
                }
            }
            Extrapolation::ExtraLuGlobal | Extrapolation::ExtraLuPlusLocal => {
                if l.len() != dim || u.len() != dim {
                    return Err(ZoneError::BoundTableLenMismatch { got: l.len().max(u.len()), expected: dim });
                }
                if matches!(op, Extrapolation::ExtraLuPlusLocal) {
                    self.dbm.extra_lu_plus(l, u);
                } else {
                    self.dbm.extra_lu(l, u);
                }
            }
        }
        Ok(())
    }

    /// Covering test appropriate to `op`: exact inclusion when `op ==
    /// None`, abstraction-then-inclusion otherwise.
    pub fn is_covered_by(
        &self,
        other: &Zone,
        op: Extrapolation,
        max: &[i64],
        l: &[i64],
        u: &[i64],
    ) -> bool {
        match op {
            Extrapolation::None => self.dbm.is_le(&other.dbm).unwrap_or(false),
            Extrapolation::ExtraMGlobal | Extrapolation::ExtraMPlusLocal => {
                self.dbm.is_am_le(&other.dbm, max).unwrap_or(false)
            }
            Extrapolation::ExtraLuGlobal | Extrapolation::ExtraLuPlusLocal => {
                self.dbm.is_alu_le(&other.dbm, l, u).unwrap_or(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extrapolate_none_leaves_zone_untouched() {
        let mut z = Zone::zero(2);
        z.dbm_mut().open_up();
        let before = z.clone();
        z.extrapolate(Extrapolation::None, &[], &[], &[]).unwrap();
        assert_eq!(z, before);
    }

    #[test]
    fn extra_m_widens_and_self_is_covered_by_widened() {
        let mut z = Zone::zero(2);
        z.dbm_mut().open_up();
        z.dbm_mut().constrain(1, 0, crate::bound::Bound::le(10)).unwrap();
        let before = z.clone();
        z.extrapolate(Extrapolation::ExtraMGlobal, &[0, 2], &[], &[]).unwrap();
        assert!(before.is_covered_by(&z, Extrapolation::None, &[], &[], &[]));
    }

    #[test]
    fn mismatched_bound_table_is_an_error() {
        let mut z = Zone::zero(3);
        let err = z.extrapolate(Extrapolation::ExtraMGlobal, &[0, 1], &[], &[]);
        assert!(err.is_err());
    }
}
