// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the actuator port through which the motion-controller card is reached.
use num_derive::{FromPrimitive, ToPrimitive};

/// Command classes an axis can be switched to.
///
/// The controller firmware only accepts commands of the class an axis was
/// explicitly switched to, which is why every state transition of
/// [`Kawasaki`](`crate::Kawasaki`) performs the mode handshake described in
/// [`transition_directives`](`crate::robot::control_state::transition_directives`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, ToPrimitive)]
pub enum AxisCommandMode {
    /// Axis follows position commands. Also the resting mode after a stop.
    Position = 0,
    /// Axis follows pulse-rate velocity commands.
    Velocity = 1,
}

/// Known values of the status word the axis drivers report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, ToPrimitive)]
pub enum DriverStatus {
    /// Power stage off.
    Disabled = 0,
    /// Drive enabled and ready for commands.
    Enabled = 8,
}

/// Low-level access to the per-axis motion controller.
///
/// Implementations wrap the vendor driver of the pulse-rate controller card;
/// the rest of the library never sees anything below this boundary. All
/// per-axis calls address one axis by index `0..ROBOT_DOF`. A port instance is
/// owned exclusively by one robot.
#[cfg_attr(test, mockall::automock)]
pub trait MotionPort {
    /// Opens the device.
    fn open(&mut self);
    /// Closes the device.
    fn close(&mut self);
    /// Reads the current encoder position of an axis. Unit: \[counts\].
    fn axis_encoder_position(&mut self, axis: usize) -> i64;
    /// Commands a velocity on an axis. Unit: \[counts/s\].
    fn set_axis_velocity_command(&mut self, axis: usize, pulse_rate: i64);
    /// Commands a position on an axis. Unit: \[counts\].
    fn set_axis_position_command(&mut self, axis: usize, position: i64);
    /// Switches the command class of an axis.
    fn set_axis_command_mode(&mut self, axis: usize, mode: AxisCommandMode);
    /// Reads the raw driver status word of an axis. Decode with
    /// [`DriverStatus`]; unknown values mean not ready.
    fn axis_driver_state(&mut self, axis: usize) -> u32;
    /// Halts all axes at once.
    fn stop_all_axes(&mut self);
}
