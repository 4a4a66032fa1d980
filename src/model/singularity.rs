// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Detection and mitigation of degenerate joint configurations.
use nalgebra::Matrix6;
use std::fmt;

use crate::model::LinkParameters;
use crate::utils::Joints;

/// |sin(q5)| below this value flags a wrist alignment.
pub const WRIST_ALIGNMENT_THRESHOLD: f64 = 1e-1;
/// |cos(q3)| below this value flags a forearm alignment.
pub const FOREARM_ALIGNMENT_THRESHOLD: f64 = 1e-1;
/// |cos(q2)*a2 + sin(q2+q3)*d4| below this value flags a shoulder alignment.
pub const SHOULDER_ALIGNMENT_THRESHOLD: f64 = 1e-1;

/// The degenerate configurations the detector can flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SingularityKind {
    /// Axes 4 and 6 are collinear; two angular twist components are lost.
    WristAlignment,
    /// The forearm is stretched in line with the upper arm.
    ForearmAlignment,
    /// The wrist center passes over the axis of joint 1.
    ShoulderAlignment,
}

impl fmt::Display for SingularityKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SingularityKind::WristAlignment => {
                write!(f, "wrist alignment")
            }
            SingularityKind::ForearmAlignment => {
                write!(f, "forearm alignment")
            }
            SingularityKind::ShoulderAlignment => {
                write!(f, "shoulder alignment")
            }
        }
    }
}

/// Flags a near-singular configuration and zeroes the Jacobian entries that
/// would otherwise make the inversion ill-conditioned.
///
/// The three conditions are checked in a fixed priority order and only the
/// first hit is mitigated; the physical configurations rarely coincide, and
/// zeroing for all of them at once would strip more of the matrix than the
/// degeneracy warrants. The caller inverts the mitigated matrix with a
/// pseudo-inverse fallback, so zeroed rows produce zero joint velocity for the
/// lost twist components instead of blowing up through a near-zero pivot.
///
/// Returns the flagged condition, or `None` when the Jacobian was left
/// untouched. Not an error either way.
pub fn mitigate_singularity(
    links: &LinkParameters,
    q: &Joints,
    jacobian: &mut Matrix6<f64>,
) -> Option<SingularityKind> {
    if q[4].sin().abs() < WRIST_ALIGNMENT_THRESHOLD {
        for column in 0..6 {
            jacobian[(3, column)] = 0.;
            jacobian[(5, column)] = 0.;
        }
        return Some(SingularityKind::WristAlignment);
    }
    if q[2].cos().abs() < FOREARM_ALIGNMENT_THRESHOLD {
        for column in 0..3 {
            for row in 1..6 {
                jacobian[(row, column)] = 0.;
            }
        }
        return Some(SingularityKind::ForearmAlignment);
    }
    let wrist_reach = q[1].cos() * links.a2 + (q[1] + q[2]).sin() * links.d4;
    if wrist_reach.abs() < SHOULDER_ALIGNMENT_THRESHOLD {
        for column in 0..2 {
            jacobian[(0, column)] = 0.;
            for row in 3..6 {
                jacobian[(row, column)] = 0.;
            }
        }
        return Some(SingularityKind::ShoulderAlignment);
    }
    None
}

#[cfg(test)]
mod test {
    use super::*;

    fn filled_jacobian() -> Matrix6<f64> {
        Matrix6::from_fn(|row, column| 1. + row as f64 + 10. * column as f64)
    }

    #[test]
    fn wrist_alignment_zeros_two_angular_rows() {
        let links = LinkParameters::default();
        let mut jacobian = filled_jacobian();
        let kind = mitigate_singularity(&links, &[0.; 6], &mut jacobian);
        assert_eq!(kind, Some(SingularityKind::WristAlignment));
        for column in 0..6 {
            assert_eq!(jacobian[(3, column)], 0.);
            assert_eq!(jacobian[(5, column)], 0.);
            assert_ne!(jacobian[(4, column)], 0.);
            assert_ne!(jacobian[(0, column)], 0.);
        }
    }

    #[test]
    fn forearm_alignment_zeros_first_three_columns() {
        let links = LinkParameters::default();
        // q5 well clear of the wrist condition, q3 at 90 degrees.
        let q = [0., 0.5, std::f64::consts::FRAC_PI_2, 0., 1.0, 0.];
        let mut jacobian = filled_jacobian();
        let kind = mitigate_singularity(&links, &q, &mut jacobian);
        assert_eq!(kind, Some(SingularityKind::ForearmAlignment));
        for column in 0..3 {
            assert_ne!(jacobian[(0, column)], 0.);
            for row in 1..6 {
                assert_eq!(jacobian[(row, column)], 0.);
            }
        }
        for column in 3..6 {
            for row in 0..6 {
                assert_ne!(jacobian[(row, column)], 0.);
            }
        }
    }

    #[test]
    fn shoulder_alignment_zeros_first_two_columns() {
        let links = LinkParameters::default();
        // tan(q2) = -a2/d4 puts the wrist center on the joint-1 axis.
        let q2 = (-links.a2 / links.d4).atan();
        let q = [0., q2, 0., 0., 1.0, 0.];
        let mut jacobian = filled_jacobian();
        let kind = mitigate_singularity(&links, &q, &mut jacobian);
        assert_eq!(kind, Some(SingularityKind::ShoulderAlignment));
        for column in 0..2 {
            assert_eq!(jacobian[(0, column)], 0.);
            assert_ne!(jacobian[(1, column)], 0.);
            assert_ne!(jacobian[(2, column)], 0.);
            for row in 3..6 {
                assert_eq!(jacobian[(row, column)], 0.);
            }
        }
    }

    #[test]
    fn checks_short_circuit_in_priority_order() {
        let links = LinkParameters::default();
        // Wrist and forearm conditions hold at once; only the wrist rows go.
        let q = [0., 0.5, std::f64::consts::FRAC_PI_2, 0., 0., 0.];
        let mut jacobian = filled_jacobian();
        let kind = mitigate_singularity(&links, &q, &mut jacobian);
        assert_eq!(kind, Some(SingularityKind::WristAlignment));
        assert_ne!(jacobian[(1, 0)], 0.);
        assert_ne!(jacobian[(2, 0)], 0.);
    }

    #[test]
    fn regular_configuration_is_untouched() {
        let links = LinkParameters::default();
        let q = [30_f64.to_radians(); 6];
        let mut jacobian = filled_jacobian();
        assert_eq!(mitigate_singularity(&links, &q, &mut jacobian), None);
        assert_eq!(jacobian, filled_jacobian());
    }
}
