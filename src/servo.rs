// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the pose-based visual-servo task and the loop that runs it.
pub mod gain;
pub mod logger;
pub mod observer;
pub mod servo_loop;

use std::f64::consts::PI;
use std::time::Duration;

use nalgebra::{Isometry3, Translation3, UnitQuaternion, Vector3, Vector6};
use tracing::info;

use crate::servo::gain::Gain;

/// Translation-error norm below which the task counts as converged. Unit: \[m\].
pub const DEFAULT_CONVERGENCE_THRESHOLD_TRANSLATION: f64 = 1e-4;
/// Rotation-error norm below which the task counts as converged. Unit: \[deg\].
pub const DEFAULT_CONVERGENCE_THRESHOLD_ROTATION: f64 = 0.05;

/// A pose-based visual-servo task: drive the camera until the observed target
/// pose matches the desired one.
///
/// The feature error stacks the translation and the θu rotation vector of the
/// transform between desired and current camera pose. [`PbvsTask::control_law`]
/// turns the error into a camera-frame twist;
/// [`ServoLoop`](`crate::servo::servo_loop::ServoLoop`) hands that twist to the
/// robot once per iteration.
pub struct PbvsTask {
    c_d_m_o: Isometry3<f64>,
    o_m_o: Option<Isometry3<f64>>,
    gain: Gain,
    convergence_threshold_t: f64,
    convergence_threshold_tu: f64,
    sequencing_ramp: Option<Duration>,
}

impl PbvsTask {
    /// Creates a task for a desired target pose in the camera frame and a gain
    /// policy. Convergence thresholds start at the defaults; task sequencing is
    /// off.
    pub fn new(c_d_m_o: Isometry3<f64>, gain: Gain) -> Self {
        PbvsTask {
            c_d_m_o,
            o_m_o: None,
            gain,
            convergence_threshold_t: DEFAULT_CONVERGENCE_THRESHOLD_TRANSLATION,
            convergence_threshold_tu: DEFAULT_CONVERGENCE_THRESHOLD_ROTATION,
            sequencing_ramp: None,
        }
    }

    /// Returns the desired target pose in the camera frame.
    pub fn desired_pose(&self) -> Isometry3<f64> {
        self.c_d_m_o
    }

    /// Sets the convergence thresholds. Units: \[m\] and \[deg\].
    pub fn set_convergence_thresholds(&mut self, translation: f64, rotation_deg: f64) {
        self.convergence_threshold_t = translation;
        self.convergence_threshold_tu = rotation_deg;
    }

    /// Sets both convergence thresholds to zero, so the task never reports
    /// convergence and runs until the operator quits.
    pub fn disable_convergence_thresholds(&mut self) {
        self.set_convergence_thresholds(0., 0.);
    }

    /// Ramps the commanded velocity in over the given duration after servo
    /// activation instead of step-commanding at full gain.
    pub fn enable_task_sequencing(&mut self, ramp: Duration) {
        self.sequencing_ramp = Some(ramp);
    }

    /// Resolves the orientation ambiguity of the target on the first valid
    /// observation.
    ///
    /// A planar target and its 180°-rotated twin both satisfy the geometric
    /// constraint. Whichever twin needs the smaller net camera rotation from
    /// the current pose becomes the desired orientation, and the choice stays
    /// frozen for the rest of the session. Later calls are no-ops.
    pub fn resolve_orientation(&mut self, c_m_o: &Isometry3<f64>) {
        if self.o_m_o.is_some() {
            return;
        }
        let flipped = Isometry3::from_parts(
            Translation3::identity(),
            UnitQuaternion::from_scaled_axis(Vector3::new(0., 0., PI)),
        );
        let rotation_to = |o_m_o: &Isometry3<f64>| {
            (self.c_d_m_o * o_m_o * c_m_o.inverse()).rotation.angle()
        };
        if rotation_to(&Isometry3::identity()) <= rotation_to(&flipped) {
            self.o_m_o = Some(Isometry3::identity());
        } else {
            info!("desired frame rotated by 180 degrees to avoid a pi rotation of the camera");
            self.o_m_o = Some(flipped);
        }
    }

    /// Computes the stacked feature error for an observed target pose:
    /// translation and θu rotation vector of the transform between desired and
    /// current camera pose.
    pub fn error(&self, c_m_o: &Isometry3<f64>) -> Vector6<f64> {
        let o_m_o = self.o_m_o.unwrap_or_else(Isometry3::identity);
        let c_d_m_c = self.c_d_m_o * o_m_o * c_m_o.inverse();
        let t = c_d_m_c.translation.vector;
        let tu = c_d_m_c.rotation.scaled_axis();
        Vector6::new(t.x, t.y, t.z, tu.x, tu.y, tu.z)
    }

    /// Computes the camera-frame control velocity `-gain(‖e‖) * e`, scaled by
    /// the sequencing ramp when one is enabled. `elapsed` is the servo time
    /// since activation.
    pub fn control_law(&self, error: &Vector6<f64>, elapsed: Duration) -> Vector6<f64> {
        let mut velocity = error * (-self.gain.value(error.norm()));
        if let Some(ramp) = self.sequencing_ramp {
            if elapsed < ramp {
                velocity *= elapsed.as_secs_f64() / ramp.as_secs_f64();
            }
        }
        velocity
    }

    /// Whether both feature-error norms are below their thresholds.
    pub fn has_converged(&self, error: &Vector6<f64>) -> bool {
        let error_t = error.fixed_rows::<3>(0).norm();
        let error_tu = error.fixed_rows::<3>(3).norm().to_degrees();
        error_t < self.convergence_threshold_t && error_tu < self.convergence_threshold_tu
    }
}
