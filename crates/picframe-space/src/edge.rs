//! Behaviour of the global domain at its outer faces.

use picframe_core::Coord3;

/// What happens when particles or halos reach a face of the global domain.
///
/// `Periodic` makes the opposite face the neighbour; `Absorbing` leaves the
/// face without a neighbour, so exchanges in that direction are skipped and
/// particles reaching the guard there are removed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Boundary {
    /// The face wraps to the opposite side (torus topology).
    Periodic,
    /// The face has no neighbour.
    Absorbing,
}

impl Boundary {
    /// Per-axis boundaries from a `0`/`1` periodicity vector.
    ///
    /// # Examples
    ///
    /// ```
    /// use picframe_space::Boundary;
    /// use picframe_core::Coord3;
    ///
    /// let b = Boundary::from_flags(Coord3::new(1, 0, 1));
    /// assert_eq!(b, [Boundary::Periodic, Boundary::Absorbing, Boundary::Periodic]);
    /// ```
    pub fn from_flags(periodic: Coord3) -> [Boundary; 3] {
        periodic.to_array().map(|p| {
            if p != 0 {
                Boundary::Periodic
            } else {
                Boundary::Absorbing
            }
        })
    }
}

/// Resolve a single axis position under the given boundary.
/// Returns `Some(wrapped)` or `None` for an absorbing out-of-range value.
pub(crate) fn resolve_axis(val: i32, len: i32, boundary: Boundary) -> Option<i32> {
    if (0..len).contains(&val) {
        return Some(val);
    }
    match boundary {
        Boundary::Absorbing => None,
        Boundary::Periodic => Some(val.rem_euclid(len)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn periodic_wraps_both_ways() {
        assert_eq!(resolve_axis(-1, 4, Boundary::Periodic), Some(3));
        assert_eq!(resolve_axis(4, 4, Boundary::Periodic), Some(0));
    }

    #[test]
    fn absorbing_drops_out_of_range() {
        assert_eq!(resolve_axis(-1, 4, Boundary::Absorbing), None);
        assert_eq!(resolve_axis(2, 4, Boundary::Absorbing), Some(2));
    }
}
