// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the telemetry ring logger of the servo loop.
use nalgebra::Vector6;
use std::collections::VecDeque;

use crate::utils::Joints;

/// Telemetry of one servo iteration. Structure used only for logging purposes.
#[derive(Debug, Clone)]
pub struct ServoRecord {
    /// Stacked feature error of the iteration.
    pub error: Vector6<f64>,
    /// Commanded Cartesian velocity in the camera frame.
    pub cartesian_velocity: Vector6<f64>,
    /// Resulting velocity of each axis. Unit: \[deg/s\].
    pub axis_velocity: Joints,
    /// Resulting velocity of each motor. Unit: \[deg/s\].
    pub motor_velocity: Joints,
    /// Wall-clock duration of the iteration. Unit: \[ms\]. Diagnostics only,
    /// no deadline is enforced.
    pub loop_time_ms: f64,
}

pub(crate) struct ServoLogger {
    records: VecDeque<ServoRecord>,
    log_size: usize,
}

impl ServoLogger {
    pub fn new(log_size: usize) -> Self {
        ServoLogger {
            records: VecDeque::with_capacity(log_size),
            log_size,
        }
    }

    pub fn log(&mut self, record: ServoRecord) {
        if self.records.len() == self.log_size {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    pub fn flush(&mut self) -> Vec<ServoRecord> {
        self.records.drain(..).collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn record(marker: f64) -> ServoRecord {
        ServoRecord {
            error: Vector6::from_element(marker),
            cartesian_velocity: Vector6::zeros(),
            axis_velocity: [0.; 6],
            motor_velocity: [0.; 6],
            loop_time_ms: 0.,
        }
    }

    #[test]
    fn ring_keeps_the_most_recent_records() {
        let mut logger = ServoLogger::new(3);
        for marker in 0..5 {
            logger.log(record(marker as f64));
        }
        let flushed = logger.flush();
        assert_eq!(flushed.len(), 3);
        assert_eq!(flushed[0].error[0], 2.);
        assert_eq!(flushed[2].error[0], 4.);
    }

    #[test]
    fn flush_empties_the_ring() {
        let mut logger = ServoLogger::new(3);
        logger.log(record(1.));
        assert_eq!(logger.flush().len(), 1);
        assert!(logger.flush().is_empty());
    }
}
