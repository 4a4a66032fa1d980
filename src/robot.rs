// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains everything needed for controlling the robot: the driver-enable
//! handshake, the control-state bookkeeping and the velocity dispatch down to
//! per-axis pulse rates.
pub mod control_frame;
pub mod control_state;
pub mod saturation;

use std::f64::consts::PI;
use std::thread;
use std::time::{Duration, Instant};

use nalgebra::{Isometry3, Matrix6, Vector6};
use nalgebra::linalg::SVD;
use num_traits::FromPrimitive;
use tracing::{info, warn};

use crate::exception::{KawasakiException, KawasakiResult};
use crate::model::{
    mitigate_singularity, velocity_twist, Frame, KawasakiModel, LinkParameters,
};
use crate::motion_port::{AxisCommandMode, DriverStatus, MotionPort};
use crate::robot::control_frame::ControlFrame;
use crate::robot::control_state::{transition_directives, ControlState, TransitionDirective};
use crate::robot::saturation::{
    cartesian_maxima, joint_maxima, saturate_velocities, DEFAULT_MAX_ROTATION_VELOCITY,
    DEFAULT_MAX_TRANSLATION_VELOCITY,
};
use crate::utils::{joints_to_degrees, vector_to_joints, Joints, ROBOT_DOF};

/// How long [`Kawasaki::connect`] waits for all axis drivers to report enabled.
pub static CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Singular values below this are treated as zero when the mitigated Jacobian
/// has to be inverted through the pseudo-inverse.
static PSEUDO_INVERSE_EPSILON: f64 = 1e-6;

/// A 6-axis Kawasaki manipulator reached through a [`MotionPort`].
///
/// The robot owns its port, its kinematic model and the extrinsic tool
/// calibration. It starts out in [`ControlState::Stopped`]; switch to
/// [`ControlState::VelocityControl`] once before sending velocities.
pub struct Kawasaki<P: MotionPort> {
    port: P,
    model: KawasakiModel,
    e_m_c: Isometry3<f64>,
    state: ControlState,
    max_translation_velocity: f64,
    max_rotation_velocity: f64,
    latch_settle: Duration,
    mode_settle: Duration,
}

impl<P: MotionPort> Kawasaki<P> {
    /// Creates a robot over the given port and link geometry. Does not touch
    /// the hardware; call [`Kawasaki::connect`] for that.
    pub fn new(port: P, links: LinkParameters) -> Self {
        Kawasaki {
            port,
            model: KawasakiModel::new(links),
            e_m_c: Isometry3::identity(),
            state: ControlState::Stopped,
            max_translation_velocity: DEFAULT_MAX_TRANSLATION_VELOCITY,
            max_rotation_velocity: DEFAULT_MAX_ROTATION_VELOCITY,
            latch_settle: Duration::from_millis(100),
            mode_settle: Duration::from_secs(1),
        }
    }

    /// Opens the device and waits for every axis driver to report enabled.
    /// # Errors
    /// * [`ConnectionException`](`KawasakiException::ConnectionException`) if
    /// the drivers are not all enabled within [`CONNECT_TIMEOUT`]. The device
    /// is closed again before returning.
    pub fn connect(&mut self) -> KawasakiResult<()> {
        self.connect_with_timeout(CONNECT_TIMEOUT)
    }

    pub(crate) fn connect_with_timeout(&mut self, timeout: Duration) -> KawasakiResult<()> {
        self.port.open();
        let start = Instant::now();
        loop {
            let enabled = (0..ROBOT_DOF).all(|axis| {
                DriverStatus::from_u32(self.port.axis_driver_state(axis))
                    == Some(DriverStatus::Enabled)
            });
            if enabled {
                info!("all axis drivers enabled");
                return Ok(());
            }
            if start.elapsed() > timeout {
                self.port.close();
                return Err(KawasakiException::ConnectionException {
                    message: format!(
                        "axis drivers did not enable within {:?}",
                        timeout
                    ),
                });
            }
        }
    }

    /// Stops the robot and closes the device.
    pub fn disconnect(&mut self) {
        self.set_control_state(ControlState::Stopped);
        self.port.close();
    }

    /// Returns the current control state.
    pub fn control_state(&self) -> ControlState {
        self.state
    }

    /// Returns the kinematic model of the arm.
    pub fn model(&self) -> &KawasakiModel {
        &self.model
    }

    /// Returns the constant transformation between end-effector and tool
    /// (or camera) frame.
    pub fn extrinsic_offset(&self) -> Isometry3<f64> {
        self.e_m_c
    }

    /// Sets the constant transformation between end-effector and tool frame.
    /// If the tool is a camera, this transformation comes from hand-eye
    /// calibration.
    pub fn set_extrinsic_offset(&mut self, e_m_c: Isometry3<f64>) {
        self.e_m_c = e_m_c;
    }

    /// Sets the per-component translation bound used by the Cartesian
    /// saturation. Unit: \[m/s\].
    pub fn set_max_translation_velocity(&mut self, max: f64) {
        self.max_translation_velocity = max;
    }

    /// Sets the per-component rotation bound used by the Cartesian and joint
    /// saturation. Unit: \[rad/s\].
    pub fn set_max_rotation_velocity(&mut self, max: f64) {
        self.max_rotation_velocity = max;
    }

    /// Overrides the firmware settle pauses used during state transitions.
    /// The defaults match the controller documentation; tests run with zero.
    pub fn set_settle_delays(&mut self, latch: Duration, mode: Duration) {
        self.latch_settle = latch;
        self.mode_settle = mode;
    }

    /// Switches the robot to another control state, performing the actuator
    /// handshake of the transition.
    pub fn set_control_state(&mut self, target: ControlState) {
        info!(from = %self.state, to = %target, "control state transition");
        for directive in transition_directives(self.state, target) {
            self.execute_directive(directive);
        }
        self.state = target;
    }

    fn execute_directive(&mut self, directive: TransitionDirective) {
        match directive {
            TransitionDirective::ZeroAllVelocities => {
                for axis in 0..ROBOT_DOF {
                    self.port.set_axis_velocity_command(axis, 0);
                }
            }
            TransitionDirective::StopAllAxes => {
                self.port.stop_all_axes();
            }
            TransitionDirective::LatchCurrentPositions => {
                for axis in 0..ROBOT_DOF {
                    let position = self.port.axis_encoder_position(axis);
                    self.port.set_axis_position_command(axis, position);
                    thread::sleep(self.latch_settle);
                }
            }
            TransitionDirective::SetCommandModes(mode) => {
                for axis in 0..ROBOT_DOF {
                    self.port.set_axis_command_mode(axis, mode);
                }
            }
            TransitionDirective::EnableVelocityModes => {
                for axis in 0..ROBOT_DOF {
                    thread::sleep(self.mode_settle);
                    self.port
                        .set_axis_command_mode(axis, AxisCommandMode::Velocity);
                }
                thread::sleep(self.mode_settle);
            }
        }
    }

    /// Reads the joint angles back from the axis encoders. Unit: \[rad\].
    pub fn joint_position(&mut self) -> Joints {
        let links = *self.model.link_parameters();
        let mut q = [0.; ROBOT_DOF];
        for axis in 0..ROBOT_DOF {
            let counts = self.port.axis_encoder_position(axis);
            q[axis] = ((counts - links.home_counts[axis]) as f64
                * f64::from(links.directions[axis])
                * 2.
                * PI)
                / (links.encoder_resolution as f64 * links.reduction_ratios[axis])
                + links.home_angles[axis];
        }
        // The wrist gearing drags axis 6 along with axis 5.
        q[5] += links.wrist_coupling * q[4];
        q
    }

    /// Gets the pose of a frame of the arm at the current joint position.
    pub fn pose(&mut self, frame: &Frame) -> Isometry3<f64> {
        let q = self.joint_position();
        self.model.pose(frame, &q, &self.e_m_c)
    }

    /// Sends a velocity to the robot in the given control frame.
    ///
    /// Cartesian velocities are 6-dim twists (m/s, rad/s); joint velocities
    /// have one entry per axis (rad/s). The vector is saturated uniformly to
    /// the configured maxima, Cartesian twists are converted to joint
    /// velocities through the end-effector Jacobian, and the result is
    /// dispatched as per-axis pulse rates.
    ///
    /// # Errors
    /// * [`StateException`](`KawasakiException::StateException`) outside
    /// velocity control.
    /// * [`DimensionException`](`KawasakiException::DimensionException`) if
    /// the vector does not match the frame.
    /// * [`UnsupportedFrameException`](`KawasakiException::UnsupportedFrameException`)
    /// for [`ControlFrame::Mixed`].
    pub fn set_velocity(&mut self, frame: ControlFrame, velocity: &[f64]) -> KawasakiResult<()> {
        if self.state != ControlState::VelocityControl {
            return Err(KawasakiException::StateException {
                state: self.state,
                message: "Cannot send a velocity to the robot. Switch to velocity control once \
                          before entering the control loop",
            });
        }
        match frame {
            ControlFrame::Tool => {
                let saturated = self.saturated_cartesian(frame, velocity)?;
                // The extrinsic calibration maps the tool twist into the
                // end-effector frame.
                let twist = velocity_twist(&self.e_m_c) * saturated;
                let qdot = self.joint_velocities_for(&twist);
                self.set_joint_velocity(&qdot);
                Ok(())
            }
            ControlFrame::EndEffector | ControlFrame::Reference => {
                // Velocity-equivalent in the joint-velocity path; no further
                // conversion before the Jacobian.
                let saturated = self.saturated_cartesian(frame, velocity)?;
                let qdot = self.joint_velocities_for(&saturated);
                self.set_joint_velocity(&qdot);
                Ok(())
            }
            ControlFrame::Joint => {
                let saturated = self.saturated_joint(frame, velocity)?;
                self.set_joint_velocity(&vector_to_joints(&saturated));
                Ok(())
            }
            ControlFrame::Mixed => Err(KawasakiException::UnsupportedFrameException { frame }),
        }
    }

    /// Computes the per-axis velocity a Cartesian or joint command would
    /// produce, in \[deg/s\]. Purely observational: nothing is sent to the
    /// hardware. Subject to the same state, dimension and frame checks as
    /// [`Kawasaki::set_velocity`].
    pub fn axis_velocity(&mut self, frame: ControlFrame, velocity: &[f64]) -> KawasakiResult<Joints> {
        if self.state != ControlState::VelocityControl {
            return Err(KawasakiException::StateException {
                state: self.state,
                message: "Cannot compute axis velocities. Switch to velocity control once \
                          before entering the control loop",
            });
        }
        match frame {
            ControlFrame::Tool => {
                let saturated = self.saturated_cartesian(frame, velocity)?;
                let twist = velocity_twist(&self.e_m_c) * saturated;
                let qdot = self.joint_velocities_for(&twist);
                Ok(joints_to_degrees(&qdot))
            }
            ControlFrame::EndEffector | ControlFrame::Reference => {
                let saturated = self.saturated_cartesian(frame, velocity)?;
                let qdot = self.joint_velocities_for(&saturated);
                Ok(joints_to_degrees(&qdot))
            }
            ControlFrame::Joint => {
                let saturated = self.saturated_joint(frame, velocity)?;
                Ok(joints_to_degrees(&vector_to_joints(&saturated)))
            }
            ControlFrame::Mixed => Err(KawasakiException::UnsupportedFrameException { frame }),
        }
    }

    /// Computes the per-motor velocity a command would produce, in \[deg/s\]:
    /// the axis velocity scaled by each axis direction and gear reduction.
    /// Purely observational, like [`Kawasaki::axis_velocity`].
    pub fn motor_velocity(
        &mut self,
        frame: ControlFrame,
        velocity: &[f64],
    ) -> KawasakiResult<Joints> {
        let axis_velocity = self.axis_velocity(frame, velocity)?;
        let links = *self.model.link_parameters();
        let mut motor = [0.; ROBOT_DOF];
        for i in 0..ROBOT_DOF {
            motor[i] =
                axis_velocity[i] * f64::from(links.directions[i]) * links.reduction_ratios[i];
        }
        Ok(motor)
    }

    fn saturated_cartesian(
        &self,
        frame: ControlFrame,
        velocity: &[f64],
    ) -> KawasakiResult<Vector6<f64>> {
        if velocity.len() != 6 {
            return Err(KawasakiException::DimensionException {
                frame,
                expected: 6,
                actual: velocity.len(),
            });
        }
        let maxima = cartesian_maxima(self.max_translation_velocity, self.max_rotation_velocity);
        Ok(saturate_velocities(
            &Vector6::from_row_slice(velocity),
            &maxima,
        ))
    }

    fn saturated_joint(
        &self,
        frame: ControlFrame,
        velocity: &[f64],
    ) -> KawasakiResult<Vector6<f64>> {
        if velocity.len() != ROBOT_DOF {
            return Err(KawasakiException::DimensionException {
                frame,
                expected: ROBOT_DOF,
                actual: velocity.len(),
            });
        }
        let maxima = joint_maxima(self.max_rotation_velocity);
        Ok(saturate_velocities(
            &Vector6::from_row_slice(velocity),
            &maxima,
        ))
    }

    /// Inverts the (possibly mitigated) end-effector Jacobian at the current
    /// configuration and maps the twist to joint velocities.
    fn joint_velocities_for(&mut self, end_effector_twist: &Vector6<f64>) -> Joints {
        let q = self.joint_position();
        let mut jacobian = self.model.ee_jacobian(&q);
        if let Some(kind) = mitigate_singularity(self.model.link_parameters(), &q, &mut jacobian)
        {
            warn!(%kind, "near-singular configuration, Jacobian entries zeroed");
        }
        let inverse = invert_jacobian(&jacobian);
        vector_to_joints(&(inverse * end_effector_twist))
    }

    fn set_joint_velocity(&mut self, qdot: &Joints) {
        let links = *self.model.link_parameters();
        for axis in 0..ROBOT_DOF {
            let pulse_rate = (qdot[axis]
                * f64::from(links.directions[axis])
                * links.reduction_ratios[axis]
                * links.encoder_resolution as f64
                / (2. * PI)) as i64;
            self.port.set_axis_velocity_command(axis, pulse_rate);
        }
    }
}

/// Inverts a Jacobian, falling back to the SVD pseudo-inverse when the matrix
/// is rank deficient after singularity mitigation. The pseudo-inverse drops
/// the zeroed twist components instead of amplifying them.
fn invert_jacobian(jacobian: &Matrix6<f64>) -> Matrix6<f64> {
    if let Some(inverse) = jacobian.try_inverse() {
        return inverse;
    }
    let svd = SVD::new(*jacobian, true, true);
    // U and V are requested above, so the pseudo-inverse always exists.
    svd.pseudo_inverse(PSEUDO_INVERSE_EPSILON)
        .unwrap_or_else(|_| Matrix6::zeros())
}
