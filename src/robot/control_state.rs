// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the control states of the robot and the actuator handshake each
//! transition has to perform.
use std::fmt;

use crate::motion_port::AxisCommandMode;

/// Control states the robot can be in. Exactly one is active at a time.
///
/// Transitions are explicit and caller-requested; the robot never switches
/// state on its own. Velocity commands are only legal in
/// [`ControlState::VelocityControl`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlState {
    /// All axes hold their position, no command class is active.
    Stopped,
    /// Axes accept position commands.
    PositionControl,
    /// Axes accept pulse-rate velocity commands.
    VelocityControl,
}

impl fmt::Display for ControlState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ControlState::Stopped => {
                write!(f, "stopped")
            }
            ControlState::PositionControl => {
                write!(f, "position control")
            }
            ControlState::VelocityControl => {
                write!(f, "velocity control")
            }
        }
    }
}

/// One actuator action a state transition performs. The order within the
/// returned sequence is part of the firmware contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionDirective {
    /// Send a zero velocity command to every axis.
    ZeroAllVelocities,
    /// Halt all axes through the controller.
    StopAllAxes,
    /// Read back each axis position and re-command it as the hold target,
    /// pausing briefly after each axis.
    LatchCurrentPositions,
    /// Switch every axis to the given command class.
    SetCommandModes(AxisCommandMode),
    /// Switch every axis to velocity commands, pausing before each axis so
    /// the firmware can settle, and once more at the end.
    EnableVelocityModes,
}

/// Gets the ordered actuator actions for a control-state transition.
///
/// The firmware refuses commands of a class an axis was not switched to, and
/// switching an axis that still executes a previous command class leaves it
/// in an undefined mode. The sequences below follow the documented handshake:
/// quiesce whatever the previous state was doing, latch the current position,
/// then select the new command class.
pub fn transition_directives(
    from: ControlState,
    to: ControlState,
) -> Vec<TransitionDirective> {
    use TransitionDirective::*;
    match to {
        ControlState::Stopped => vec![
            ZeroAllVelocities,
            LatchCurrentPositions,
            SetCommandModes(AxisCommandMode::Position),
        ],
        ControlState::PositionControl => {
            let mut directives = Vec::new();
            if from == ControlState::VelocityControl {
                directives.push(ZeroAllVelocities);
            }
            directives.push(LatchCurrentPositions);
            directives.push(SetCommandModes(AxisCommandMode::Position));
            directives
        }
        ControlState::VelocityControl => {
            let mut directives = Vec::new();
            if from == ControlState::PositionControl {
                directives.push(StopAllAxes);
            }
            directives.push(ZeroAllVelocities);
            directives.push(EnableVelocityModes);
            directives
        }
    }
}
