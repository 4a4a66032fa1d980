// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the velocity saturation applied before any command reaches the axes.
use nalgebra::Vector6;

/// Default maximum translation velocity. Unit: \[m/s\].
pub static DEFAULT_MAX_TRANSLATION_VELOCITY: f64 = 0.7;
/// Default maximum rotation velocity. Unit: \[rad/s\]. Also bounds each joint,
/// since every axis of the arm is revolute.
pub static DEFAULT_MAX_ROTATION_VELOCITY: f64 = 0.2;

/// Scales a velocity down so that no component exceeds its per-axis maximum.
///
/// The scaling is uniform: the single worst excess ratio divides every
/// component, so the direction of the command is preserved. A vector already
/// within its limits is returned unchanged, which makes the operation
/// idempotent.
pub fn saturate_velocities(velocity: &Vector6<f64>, maxima: &Vector6<f64>) -> Vector6<f64> {
    let mut worst = 1.;
    for i in 0..6 {
        let ratio = (velocity[i] / maxima[i]).abs();
        if ratio > worst {
            worst = ratio;
        }
    }
    velocity / worst
}

/// Per-component maxima of a Cartesian twist: the translation bound on the
/// three linear components, the rotation bound on the three angular ones.
pub fn cartesian_maxima(max_translation: f64, max_rotation: f64) -> Vector6<f64> {
    Vector6::new(
        max_translation,
        max_translation,
        max_translation,
        max_rotation,
        max_rotation,
        max_rotation,
    )
}

/// Per-axis maxima of a joint velocity: the rotation bound on every axis.
pub fn joint_maxima(max_rotation: f64) -> Vector6<f64> {
    Vector6::from_element(max_rotation)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn within_limits_is_returned_unchanged() {
        let velocity = Vector6::new(0.1, -0.2, 0.05, 0.1, -0.05, 0.15);
        let maxima = cartesian_maxima(0.7, 0.2);
        assert_eq!(saturate_velocities(&velocity, &maxima), velocity);
    }

    #[test]
    fn saturation_preserves_direction() {
        let velocity = Vector6::new(1.4, 0., 0., 0., 0., 0.1);
        let maxima = cartesian_maxima(0.7, 0.2);
        let saturated = saturate_velocities(&velocity, &maxima);
        // Worst offender is translation x at twice its maximum.
        let scale = saturated[0] / velocity[0];
        assert!((scale - 0.5).abs() < 1e-12);
        for i in 0..6 {
            assert!((saturated[i] - velocity[i] * scale).abs() < 1e-12);
        }
    }

    #[test]
    fn saturation_is_idempotent() {
        let velocity = Vector6::new(1.4, -0.9, 0.3, 0.5, -0.8, 0.1);
        let maxima = cartesian_maxima(0.7, 0.2);
        let once = saturate_velocities(&velocity, &maxima);
        let twice = saturate_velocities(&once, &maxima);
        for i in 0..6 {
            assert!((once[i] - twice[i]).abs() < 1e-12);
        }
    }

    #[test]
    fn worst_component_lands_exactly_on_its_maximum() {
        let velocity = Vector6::new(0., 0., 0., 0., 0.8, 0.);
        let maxima = cartesian_maxima(0.7, 0.2);
        let saturated = saturate_velocities(&velocity, &maxima);
        assert!((saturated[4] - 0.2).abs() < 1e-12);
    }
}
