// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains exception and Result definitions
use crate::robot::control_frame::ControlFrame;
use crate::robot::control_state::ControlState;
use crate::servo::logger::ServoRecord;
use thiserror::Error;

/// Represents all kind of errors which can occur while commanding the robot or running
/// the visual-servo loop.
#[derive(Error, Debug)]
pub enum KawasakiException {
    /// ControlException is raised when a servo cycle fails. It wraps the error that ended
    /// the cycle and holds the telemetry records of the last iterations. When this
    /// exception reaches the caller the robot has already been commanded to stop.
    #[error("{source}")]
    ControlException {
        /// Telemetry records flushed from the servo logger just before the exception occurred.
        log: Vec<ServoRecord>,
        /// The error that ended the servo loop.
        #[source]
        source: Box<KawasakiException>,
    },

    /// DimensionException is raised when a velocity vector does not match the size
    /// expected by its control frame.
    #[error("Cannot apply a velocity in {frame}: expected a {expected}-dim vector, got {actual}")]
    DimensionException {
        /// Control frame the velocity was tagged with.
        frame: ControlFrame,
        /// Dimension the frame expects.
        expected: usize,
        /// Dimension of the rejected vector.
        actual: usize,
    },

    /// StateException is raised when a motion command is issued in a control state that
    /// does not accept it.
    #[error("{message} (robot is in {state})")]
    StateException {
        /// State the robot was in when the command was rejected.
        state: ControlState,
        /// Explanatory string.
        message: &'static str,
    },

    /// UnsupportedFrameException is raised for control frames that have no velocity
    /// handler, such as [`ControlFrame::Mixed`].
    #[error("Velocity control in {frame} is not supported")]
    UnsupportedFrameException {
        /// The rejected frame.
        frame: ControlFrame,
    },

    /// ConnectionException is raised if the axis drivers do not all report enabled
    /// within the connection timeout.
    #[error("{message}")]
    ConnectionException {
        /// Explanatory string.
        message: String,
    },

    /// CalibrationException is raised when an extrinsic calibration file cannot be
    /// read or parsed.
    #[error("{message}")]
    CalibrationException {
        /// Explanatory string.
        message: String,
    },
}

/// Result type which can have KawasakiException as Error
pub type KawasakiResult<T> = Result<T, KawasakiException>;
