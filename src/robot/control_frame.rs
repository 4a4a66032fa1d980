// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the control frames a velocity command can be expressed in.
use std::fmt;

/// Frames in which a velocity command can be expressed.
///
/// The set is closed: every consumer matches on all variants, and
/// [`ControlFrame::Mixed`] is rejected with an explicit error wherever it
/// shows up instead of falling through silently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlFrame {
    /// Tool (or camera) frame, offset from the end effector by the extrinsic
    /// calibration.
    Tool,
    /// End-effector frame.
    EndEffector,
    /// Base (reference) frame.
    Reference,
    /// Joint space.
    Joint,
    /// Mixed translation/rotation frame. Not supported by this robot.
    Mixed,
}

impl fmt::Display for ControlFrame {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ControlFrame::Tool => {
                write!(f, "tool frame")
            }
            ControlFrame::EndEffector => {
                write!(f, "end-effector frame")
            }
            ControlFrame::Reference => {
                write!(f, "reference frame")
            }
            ControlFrame::Joint => {
                write!(f, "joint space")
            }
            ControlFrame::Mixed => {
                write!(f, "mixed frame")
            }
        }
    }
}
