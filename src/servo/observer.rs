// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the external collaborators of the servo loop: the pose observer
//! and the operator input.
use nalgebra::Isometry3;

use crate::exception::KawasakiResult;

/// Source of observed target poses, one batch per control cycle.
///
/// Implementations wrap whatever estimates the pose of the target in the
/// current camera frame. The servo loop only acts on cycles with exactly one
/// observation and commands zero velocity otherwise; more than one target in
/// view is treated the same as none.
pub trait PoseObserver {
    /// Gets the target poses observed for this cycle, in the camera frame.
    fn observe(&mut self) -> KawasakiResult<Vec<Isometry3<f64>>>;
}

/// Operator requests, polled once per servo iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServoEvent {
    /// Arm or disarm sending of the computed velocities.
    ToggleVelocities,
    /// Leave the loop after a final zero-velocity command.
    Quit,
}
