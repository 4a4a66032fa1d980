// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! # kawasaki-servo-rs
//! kawasaki-servo-rs is a library to control a 6-axis Kawasaki manipulator
//! through a pulse-rate motion-controller card and to keep its wrist-mounted
//! camera locked onto an observed target with pose-based visual servoing.
//!
//! **ALWAYS HAVE THE USER STOP BUTTON AT
//! HAND WHILE CONTROLLING THE ROBOT!**
//!
//! ## Design
//! The library is divided into five main modules:
//! * [model](`crate::model`) - the kinematic model: forward kinematics, the
//! analytic Jacobian in base and end-effector frame and the singularity
//! detector.
//! * [motion_port](`crate::motion_port`) - the boundary to the vendor driver of
//! the motion-controller card. Everything above it is hardware independent.
//! * [robot](`crate::robot`) - the control states with their actuator
//! handshakes, velocity saturation and the dispatch of frame-tagged velocities
//! down to per-axis pulse rates.
//! * [servo](`crate::servo`) - the pose-based visual-servo task, the control
//! loop that runs it and the telemetry ring logger.
//! * [calibration](`crate::calibration`) - the extrinsic hand-eye
//! transformation between end effector and camera.
//!
//! # Example:
//! ```no_run
//! use kawasaki_servo::{
//!     AxisCommandMode, ControlFrame, ControlState, ExtrinsicOffset, Kawasaki, KawasakiResult,
//!     LinkParameters, MotionPort,
//! };
//!
//! /// Thin wrapper around the vendor driver of the controller card.
//! struct VendorPort;
//!
//! impl MotionPort for VendorPort {
//!     fn open(&mut self) {}
//!     fn close(&mut self) {}
//!     fn axis_encoder_position(&mut self, _axis: usize) -> i64 {
//!         0
//!     }
//!     fn set_axis_velocity_command(&mut self, _axis: usize, _pulse_rate: i64) {}
//!     fn set_axis_position_command(&mut self, _axis: usize, _position: i64) {}
//!     fn set_axis_command_mode(&mut self, _axis: usize, _mode: AxisCommandMode) {}
//!     fn axis_driver_state(&mut self, _axis: usize) -> u32 {
//!         8
//!     }
//!     fn stop_all_axes(&mut self) {}
//! }
//!
//! fn main() -> KawasakiResult<()> {
//!     let mut robot = Kawasaki::new(VendorPort, LinkParameters::default());
//!     robot.connect()?;
//!     robot.set_extrinsic_offset(ExtrinsicOffset::default().isometry());
//!     robot.set_control_state(ControlState::VelocityControl);
//!     robot.set_velocity(ControlFrame::EndEffector, &[0.01, 0., 0., 0., 0., 0.])?;
//!     robot.set_control_state(ControlState::Stopped);
//!     robot.disconnect();
//!     Ok(())
//! }
//! ```
//! The robot is generic over its [`MotionPort`], so the same control stack runs
//! against the real controller card, a bench simulation or a mock in tests.
//! [`Kawasaki::connect`] waits for all axis drivers to report enabled and the
//! explicit switch to [`ControlState::VelocityControl`] performs the command
//! mode handshake the firmware requires; only then are velocity commands legal.
//!
//! For the closed visual-servo loop see
//! [`ServoLoop`](`crate::servo::servo_loop::ServoLoop`) and the `servo_pbvs`
//! demo:
//! ```ignore
//! let mut servo = ServoLoop::new(&mut robot, &mut observer, task);
//! let outcome = servo.run(|| operator_input())?;
//! ```
pub mod calibration;
pub mod exception;
pub mod model;
pub mod motion_port;
pub mod robot;
pub mod servo;
pub mod utils;

pub use calibration::{ExtrinsicOffset, PoseVector};
pub use exception::{KawasakiException, KawasakiResult};
pub use model::{Frame, KawasakiModel, LinkParameters, SingularityKind};
pub use motion_port::{AxisCommandMode, DriverStatus, MotionPort};
pub use robot::control_frame::ControlFrame;
pub use robot::control_state::ControlState;
pub use robot::Kawasaki;
pub use servo::gain::{AdaptiveGain, Gain};
pub use servo::logger::ServoRecord;
pub use servo::observer::{PoseObserver, ServoEvent};
pub use servo::servo_loop::{ServoLoop, ServoOutcome};
pub use servo::PbvsTask;
