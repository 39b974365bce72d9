//! Pipette routing table
//!
//! Maps a transfer volume to exactly one pipette. Routes are half-open
//! volume intervals `(lower, upper]` kept in ascending order; construction
//! rejects any table where the intervals leave a gap or overlap, so a
//! positive volume below the table's ceiling always has exactly one route.
//!
//! Route order is also dispatch priority: the small-volume pipette runs
//! its pass before the large-volume pipette.

use core::fmt;

use dilutor_hal::Mount;
use heapless::Vec;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Maximum routes per table (one per mount)
pub const MAX_PIPETTES: usize = 2;

/// Volume interval `(lower, upper]` in µL, `upper = None` means unbounded
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct VolumeRange {
    lower_ul: f64,
    upper_ul: Option<f64>,
}

impl VolumeRange {
    /// Interval `(lower, upper]`
    pub const fn between(lower_ul: f64, upper_ul: f64) -> Self {
        Self {
            lower_ul,
            upper_ul: Some(upper_ul),
        }
    }

    /// Interval `(lower, ∞)`
    pub const fn above(lower_ul: f64) -> Self {
        Self {
            lower_ul,
            upper_ul: None,
        }
    }

    /// Exclusive lower bound
    pub fn lower_ul(&self) -> f64 {
        self.lower_ul
    }

    /// Inclusive upper bound, if any
    pub fn upper_ul(&self) -> Option<f64> {
        self.upper_ul
    }

    /// Check if a volume falls inside this interval
    pub fn contains(&self, volume_ul: f64) -> bool {
        volume_ul > self.lower_ul && self.upper_ul.map_or(true, |upper| volume_ul <= upper)
    }

    fn is_well_formed(&self) -> bool {
        self.lower_ul.is_finite()
            && match self.upper_ul {
                Some(upper) => upper.is_finite() && upper > self.lower_ul,
                None => true,
            }
    }
}

impl fmt::Display for VolumeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.upper_ul {
            Some(upper) => write!(f, "({} µL, {} µL]", self.lower_ul, upper),
            None => write!(f, "({} µL, ∞)", self.lower_ul),
        }
    }
}

/// One pipette and the volumes it is responsible for
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PipetteRoute {
    pub mount: Mount,
    pub range: VolumeRange,
}

impl PipetteRoute {
    pub const fn new(mount: Mount, range: VolumeRange) -> Self {
        Self { mount, range }
    }
}

/// Reasons a routing table is rejected
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RoutingError {
    /// No routes given
    Empty,
    /// More routes than mounts
    TooManyRoutes,
    /// Bounds are not finite or the interval is empty
    MalformedRange { mount: Mount },
    /// The first route does not start at 0 µL
    MustStartAtZero { lower_ul: f64 },
    /// Volumes between two routes are not covered
    Gap { after_ul: f64, next_lower_ul: f64 },
    /// Two routes claim the same volumes
    Overlap { after_ul: f64, next_lower_ul: f64 },
    /// An unbounded route is followed by another route
    UnboundedBeforeLast { mount: Mount },
    /// The same mount appears twice
    DuplicateMount(Mount),
}

impl fmt::Display for RoutingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoutingError::Empty => write!(f, "routing table has no pipettes"),
            RoutingError::TooManyRoutes => {
                write!(f, "routing table has more than {} pipettes", MAX_PIPETTES)
            }
            RoutingError::MalformedRange { mount } => {
                write!(f, "{} pipette has an empty or non-finite volume range", mount)
            }
            RoutingError::MustStartAtZero { lower_ul } => {
                write!(f, "smallest route starts at {} µL instead of 0 µL", lower_ul)
            }
            RoutingError::Gap {
                after_ul,
                next_lower_ul,
            } => write!(
                f,
                "volumes between {} µL and {} µL have no pipette",
                after_ul, next_lower_ul
            ),
            RoutingError::Overlap {
                after_ul,
                next_lower_ul,
            } => write!(
                f,
                "volumes between {} µL and {} µL are claimed by two pipettes",
                next_lower_ul, after_ul
            ),
            RoutingError::UnboundedBeforeLast { mount } => {
                write!(f, "{} pipette is unbounded but not the last route", mount)
            }
            RoutingError::DuplicateMount(mount) => {
                write!(f, "{} mount appears in more than one route", mount)
            }
        }
    }
}

impl core::error::Error for RoutingError {}

/// Ordered, gap-free and overlap-free volume-to-pipette table
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RoutingTable {
    routes: Vec<PipetteRoute, MAX_PIPETTES>,
}

impl RoutingTable {
    /// Build a table from routes in ascending volume order
    pub fn new(routes: &[PipetteRoute]) -> Result<Self, RoutingError> {
        let first = routes.first().ok_or(RoutingError::Empty)?;
        if routes.len() > MAX_PIPETTES {
            return Err(RoutingError::TooManyRoutes);
        }
        if first.range.lower_ul != 0.0 {
            return Err(RoutingError::MustStartAtZero {
                lower_ul: first.range.lower_ul,
            });
        }

        let mut table = Vec::new();
        for (i, route) in routes.iter().enumerate() {
            if !route.range.is_well_formed() {
                return Err(RoutingError::MalformedRange { mount: route.mount });
            }
            if routes[..i].iter().any(|r| r.mount == route.mount) {
                return Err(RoutingError::DuplicateMount(route.mount));
            }

            if let Some(next) = routes.get(i + 1) {
                let upper = route
                    .range
                    .upper_ul
                    .ok_or(RoutingError::UnboundedBeforeLast { mount: route.mount })?;
                let next_lower = next.range.lower_ul;
                if next_lower > upper {
                    return Err(RoutingError::Gap {
                        after_ul: upper,
                        next_lower_ul: next_lower,
                    });
                }
                if next_lower < upper {
                    return Err(RoutingError::Overlap {
                        after_ul: upper,
                        next_lower_ul: next_lower,
                    });
                }
            }

            table
                .push(*route)
                .map_err(|_| RoutingError::TooManyRoutes)?;
        }

        Ok(Self { routes: table })
    }

    /// Build the two-pipette table split at a single threshold
    ///
    /// The small pipette takes `(0, threshold]`, the large pipette takes
    /// `(threshold, ceiling]` (or everything above the threshold when no
    /// ceiling is given).
    pub fn split_at(
        threshold_ul: f64,
        small: Mount,
        large: Mount,
        ceiling_ul: Option<f64>,
    ) -> Result<Self, RoutingError> {
        let large_range = match ceiling_ul {
            Some(ceiling) => VolumeRange::between(threshold_ul, ceiling),
            None => VolumeRange::above(threshold_ul),
        };
        Self::new(&[
            PipetteRoute::new(small, VolumeRange::between(0.0, threshold_ul)),
            PipetteRoute::new(large, large_range),
        ])
    }

    /// Look up the pipette responsible for a volume
    ///
    /// Returns `None` for volumes ≤ 0 (nothing to transfer) and for volumes
    /// above the table's ceiling.
    pub fn route(&self, volume_ul: f64) -> Option<Mount> {
        self.routes
            .iter()
            .find(|r| r.range.contains(volume_ul))
            .map(|r| r.mount)
    }

    /// Routes in dispatch priority order
    pub fn routes(&self) -> &[PipetteRoute] {
        &self.routes
    }

    /// Check if a positive volume lacks a pipette
    pub fn is_gap(&self, volume_ul: f64) -> bool {
        volume_ul > 0.0 && self.route(volume_ul).is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn default_table() -> RoutingTable {
        RoutingTable::split_at(30.0, Mount::Left, Mount::Right, None).unwrap()
    }

    #[test]
    fn test_threshold_boundary_goes_to_small_pipette() {
        let table = default_table();
        assert_eq!(table.route(30.0), Some(Mount::Left));
        assert_eq!(table.route(30.000_001), Some(Mount::Right));
        assert_eq!(table.route(0.001), Some(Mount::Left));
    }

    #[test]
    fn test_non_positive_volume_has_no_route() {
        let table = default_table();
        assert_eq!(table.route(0.0), None);
        assert_eq!(table.route(-1.0), None);
        assert!(!table.is_gap(0.0));
    }

    #[test]
    fn test_ceiling_creates_gap_above() {
        let table = RoutingTable::split_at(30.0, Mount::Left, Mount::Right, Some(300.0)).unwrap();
        assert_eq!(table.route(300.0), Some(Mount::Right));
        assert_eq!(table.route(300.5), None);
        assert!(table.is_gap(300.5));
    }

    #[test]
    fn test_gap_rejected() {
        let result = RoutingTable::new(&[
            PipetteRoute::new(Mount::Left, VolumeRange::between(0.0, 10.0)),
            PipetteRoute::new(Mount::Right, VolumeRange::above(30.0)),
        ]);
        assert_eq!(
            result,
            Err(RoutingError::Gap {
                after_ul: 10.0,
                next_lower_ul: 30.0
            })
        );
    }

    #[test]
    fn test_overlap_rejected() {
        let result = RoutingTable::new(&[
            PipetteRoute::new(Mount::Left, VolumeRange::between(0.0, 30.0)),
            PipetteRoute::new(Mount::Right, VolumeRange::above(20.0)),
        ]);
        assert!(matches!(result, Err(RoutingError::Overlap { .. })));
    }

    #[test]
    fn test_structural_errors() {
        assert_eq!(RoutingTable::new(&[]), Err(RoutingError::Empty));

        let not_zero = RoutingTable::new(&[PipetteRoute::new(
            Mount::Left,
            VolumeRange::above(1.0),
        )]);
        assert_eq!(not_zero, Err(RoutingError::MustStartAtZero { lower_ul: 1.0 }));

        let unbounded_first = RoutingTable::new(&[
            PipetteRoute::new(Mount::Left, VolumeRange::above(0.0)),
            PipetteRoute::new(Mount::Right, VolumeRange::above(30.0)),
        ]);
        assert_eq!(
            unbounded_first,
            Err(RoutingError::UnboundedBeforeLast { mount: Mount::Left })
        );

        let same_mount = RoutingTable::split_at(30.0, Mount::Left, Mount::Left, None);
        assert_eq!(same_mount, Err(RoutingError::DuplicateMount(Mount::Left)));

        let inverted = RoutingTable::split_at(30.0, Mount::Left, Mount::Right, Some(20.0));
        assert_eq!(
            inverted,
            Err(RoutingError::MalformedRange {
                mount: Mount::Right
            })
        );

        let zero_threshold = RoutingTable::split_at(0.0, Mount::Left, Mount::Right, None);
        assert_eq!(
            zero_threshold,
            Err(RoutingError::MalformedRange { mount: Mount::Left })
        );
    }

    #[test]
    fn test_single_route_table() {
        let table =
            RoutingTable::new(&[PipetteRoute::new(Mount::Right, VolumeRange::above(0.0))]).unwrap();
        assert_eq!(table.route(5.0), Some(Mount::Right));
        assert_eq!(table.routes().len(), 1);
    }

    proptest! {
        #[test]
        fn prop_every_positive_volume_has_exactly_one_route(
            threshold in 0.5f64..500.0,
            volume in 1e-6f64..10_000.0,
        ) {
            let table = RoutingTable::split_at(threshold, Mount::Left, Mount::Right, None).unwrap();
            let matching = table.routes().iter().filter(|r| r.range.contains(volume)).count();
            prop_assert_eq!(matching, 1);
            let expected = if volume <= threshold { Mount::Left } else { Mount::Right };
            prop_assert_eq!(table.route(volume), Some(expected));
        }
    }
}
