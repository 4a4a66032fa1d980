// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the closed-loop iteration that keeps the camera locked onto the
//! observed target.
use std::time::{Duration, Instant};

use nalgebra::Vector6;
use tracing::{debug, info};

use crate::exception::{KawasakiException, KawasakiResult};
use crate::motion_port::MotionPort;
use crate::robot::control_frame::ControlFrame;
use crate::robot::control_state::ControlState;
use crate::robot::Kawasaki;
use crate::servo::logger::{ServoLogger, ServoRecord};
use crate::servo::observer::{PoseObserver, ServoEvent};
use crate::servo::PbvsTask;

/// Number of telemetry records the loop keeps for the failure report.
pub const DEFAULT_LOG_SIZE: usize = 50;

/// How a servo session ended when no error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServoOutcome {
    /// Both feature-error norms fell below their thresholds.
    Converged,
    /// The operator asked to quit.
    Cancelled,
}

/// The closed visual-servo loop over one robot and one pose observer.
///
/// The loop borrows both exclusively for its lifetime, so nothing else can
/// command the arm while it runs. Each iteration issues exactly one velocity
/// command, strictly after the joint-velocity computation of that iteration;
/// commands are never pipelined. Iteration timing is measured for diagnostics
/// and the sequencing ramp, never enforced as a deadline.
pub struct ServoLoop<'a, P: MotionPort, O: PoseObserver> {
    robot: &'a mut Kawasaki<P>,
    observer: &'a mut O,
    task: PbvsTask,
    logger: ServoLogger,
    sink: Option<Box<dyn FnMut(&ServoRecord)>>,
    armed: bool,
    activation: Option<Instant>,
}

impl<'a, P: MotionPort, O: PoseObserver> ServoLoop<'a, P, O> {
    /// Creates a servo loop over a robot and a pose observer. The loop starts
    /// armed; disarm with [`ServoLoop::set_armed`] if an operator should
    /// release the motion first.
    pub fn new(robot: &'a mut Kawasaki<P>, observer: &'a mut O, task: PbvsTask) -> Self {
        ServoLoop {
            robot,
            observer,
            task,
            logger: ServoLogger::new(DEFAULT_LOG_SIZE),
            sink: None,
            armed: true,
            activation: None,
        }
    }

    /// Installs a callback that receives every telemetry record right after
    /// its iteration, for plotting or persistence. Purely observational.
    pub fn set_record_sink(&mut self, sink: Box<dyn FnMut(&ServoRecord)>) {
        self.sink = Some(sink);
    }

    /// Arms or disarms velocity sending. While disarmed the loop keeps
    /// observing and logging but commands zero velocity.
    pub fn set_armed(&mut self, armed: bool) {
        self.armed = armed;
    }

    /// Runs the servo loop until convergence or cancellation.
    ///
    /// The robot is switched to velocity control first. Every iteration reads
    /// the observer, computes the feature error and control velocity, sends
    /// exactly one velocity command and polls `events` once. Cycles without
    /// exactly one observed pose command zero velocity and continue. When the
    /// loop ends, for whatever reason, the robot is commanded to zero velocity
    /// and moved to [`ControlState::Stopped`].
    ///
    /// # Errors
    /// * [`ControlException`](`KawasakiException::ControlException`) wrapping
    /// the error that ended a cycle, with the flushed telemetry records. The
    /// robot has been stopped before the error reaches the caller.
    pub fn run<E: FnMut() -> Option<ServoEvent>>(
        &mut self,
        mut events: E,
    ) -> KawasakiResult<ServoOutcome> {
        self.robot.set_control_state(ControlState::VelocityControl);
        match self.do_loop(&mut events) {
            Ok(outcome) => {
                self.robot.set_control_state(ControlState::Stopped);
                Ok(outcome)
            }
            Err(source) => {
                // Best-effort safety stop before the error reaches the caller.
                self.robot.set_control_state(ControlState::Stopped);
                Err(KawasakiException::ControlException {
                    log: self.logger.flush(),
                    source: Box::new(source),
                })
            }
        }
    }

    fn do_loop<E: FnMut() -> Option<ServoEvent>>(
        &mut self,
        events: &mut E,
    ) -> KawasakiResult<ServoOutcome> {
        loop {
            let iteration_start = Instant::now();
            let poses = self.observer.observe()?;
            let mut error = Vector6::zeros();
            let mut velocity = Vector6::zeros();
            let mut converged = false;
            if let [c_m_o] = poses.as_slice() {
                self.task.resolve_orientation(c_m_o);
                if self.armed && self.activation.is_none() {
                    self.activation = Some(Instant::now());
                }
                error = self.task.error(c_m_o);
                let elapsed = self
                    .activation
                    .map_or(Duration::ZERO, |since| since.elapsed());
                velocity = self.task.control_law(&error, elapsed);
                converged = self.task.has_converged(&error);
            }
            if !self.armed {
                velocity = Vector6::zeros();
            }
            let axis_velocity = self
                .robot
                .axis_velocity(ControlFrame::Tool, velocity.as_slice())?;
            let motor_velocity = self
                .robot
                .motor_velocity(ControlFrame::Tool, velocity.as_slice())?;
            self.robot
                .set_velocity(ControlFrame::Tool, velocity.as_slice())?;
            let record = ServoRecord {
                error,
                cartesian_velocity: velocity,
                axis_velocity,
                motor_velocity,
                loop_time_ms: iteration_start.elapsed().as_secs_f64() * 1e3,
            };
            debug!(
                error_norm = record.error.norm(),
                loop_time_ms = record.loop_time_ms,
                "servo iteration"
            );
            if let Some(sink) = &mut self.sink {
                sink(&record);
            }
            self.logger.log(record);
            if converged {
                info!("servo task has converged");
                return Ok(ServoOutcome::Converged);
            }
            match events() {
                Some(ServoEvent::ToggleVelocities) => self.armed = !self.armed,
                Some(ServoEvent::Quit) => return Ok(ServoOutcome::Cancelled),
                None => {}
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::model::LinkParameters;
    use crate::motion_port::{AxisCommandMode, DriverStatus};
    use crate::servo::gain::Gain;
    use nalgebra::{Isometry3, Matrix3, Rotation3, Translation3, UnitQuaternion};
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    struct StubPort {
        velocity_commands: Rc<RefCell<Vec<(usize, i64)>>>,
    }

    impl MotionPort for StubPort {
        fn open(&mut self) {}
        fn close(&mut self) {}
        fn axis_encoder_position(&mut self, axis: usize) -> i64 {
            LinkParameters::default().home_counts[axis]
        }
        fn set_axis_velocity_command(&mut self, axis: usize, pulse_rate: i64) {
            self.velocity_commands.borrow_mut().push((axis, pulse_rate));
        }
        fn set_axis_position_command(&mut self, _axis: usize, _position: i64) {}
        fn set_axis_command_mode(&mut self, _axis: usize, _mode: AxisCommandMode) {}
        fn axis_driver_state(&mut self, _axis: usize) -> u32 {
            DriverStatus::Enabled as u32
        }
        fn stop_all_axes(&mut self) {}
    }

    struct ScriptedObserver {
        batches: VecDeque<Vec<Isometry3<f64>>>,
    }

    impl PoseObserver for ScriptedObserver {
        fn observe(&mut self) -> KawasakiResult<Vec<Isometry3<f64>>> {
            Ok(self.batches.pop_front().unwrap_or_default())
        }
    }

    struct FailingObserver;

    impl PoseObserver for FailingObserver {
        fn observe(&mut self) -> KawasakiResult<Vec<Isometry3<f64>>> {
            Err(KawasakiException::ConnectionException {
                message: "camera lost".to_string(),
            })
        }
    }

    fn desired_pose() -> Isometry3<f64> {
        Isometry3::from_parts(
            Translation3::new(0., 0., 3. * 0.096),
            UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(
                Matrix3::new(1., 0., 0., 0., -1., 0., 0., 0., -1.),
            )),
        )
    }

    fn test_robot() -> (Kawasaki<StubPort>, Rc<RefCell<Vec<(usize, i64)>>>) {
        let commands = Rc::new(RefCell::new(Vec::new()));
        let port = StubPort {
            velocity_commands: commands.clone(),
        };
        let mut robot = Kawasaki::new(port, LinkParameters::default());
        robot.set_settle_delays(Duration::ZERO, Duration::ZERO);
        (robot, commands)
    }

    #[test]
    fn observing_the_desired_pose_converges_on_the_first_iteration() {
        let (mut robot, commands) = test_robot();
        let mut observer = ScriptedObserver {
            batches: VecDeque::from(vec![vec![desired_pose()]]),
        };
        let task = PbvsTask::new(desired_pose(), Gain::Constant(0.8));
        let records = Rc::new(RefCell::new(Vec::new()));
        let record_sink = records.clone();
        let mut servo = ServoLoop::new(&mut robot, &mut observer, task);
        servo.set_record_sink(Box::new(move |record: &ServoRecord| {
            record_sink.borrow_mut().push(record.clone())
        }));
        let outcome = servo.run(|| None).unwrap();
        assert_eq!(outcome, ServoOutcome::Converged);
        assert_eq!(robot.control_state(), ControlState::Stopped);
        let records = records.borrow();
        assert_eq!(records.len(), 1);
        assert!(records[0].error.norm() < 1e-12);
        assert!(records[0].cartesian_velocity.norm() < 1e-12);
        // Every pulse-rate command of the whole session was zero.
        assert!(commands.borrow().iter().all(|(_, rate)| *rate == 0));
    }

    #[test]
    fn cycles_without_observation_command_zero_velocity() {
        let (mut robot, commands) = test_robot();
        let mut observer = ScriptedObserver {
            batches: VecDeque::new(),
        };
        let task = PbvsTask::new(desired_pose(), Gain::Constant(0.8));
        let mut servo = ServoLoop::new(&mut robot, &mut observer, task);
        let mut iterations = 0;
        let outcome = servo
            .run(|| {
                iterations += 1;
                if iterations == 3 {
                    Some(ServoEvent::Quit)
                } else {
                    None
                }
            })
            .unwrap();
        assert_eq!(outcome, ServoOutcome::Cancelled);
        assert_eq!(robot.control_state(), ControlState::Stopped);
        assert!(commands.borrow().iter().all(|(_, rate)| *rate == 0));
    }

    #[test]
    fn observer_failure_stops_the_robot_and_wraps_the_error() {
        let (mut robot, _commands) = test_robot();
        let mut observer = FailingObserver;
        let task = PbvsTask::new(desired_pose(), Gain::Constant(0.8));
        let mut servo = ServoLoop::new(&mut robot, &mut observer, task);
        match servo.run(|| None) {
            Err(KawasakiException::ControlException { source, .. }) => match *source {
                KawasakiException::ConnectionException { .. } => {}
                other => panic!("unexpected source {:?}", other),
            },
            other => panic!("expected ControlException, got {:?}", other),
        }
        assert_eq!(robot.control_state(), ControlState::Stopped);
    }

    #[test]
    fn disarmed_iterations_hold_zero_until_toggled() {
        let (mut robot, commands) = test_robot();
        // Camera 1 cm short of the desired pose along x, never converging.
        let c_m_o = Isometry3::translation(-0.01, 0., 0.) * desired_pose();
        let mut observer = ScriptedObserver {
            batches: VecDeque::from(vec![vec![c_m_o]; 3]),
        };
        let mut task = PbvsTask::new(desired_pose(), Gain::Constant(0.8));
        task.disable_convergence_thresholds();
        let mut servo = ServoLoop::new(&mut robot, &mut observer, task);
        servo.set_armed(false);
        let mut iterations = 0;
        let outcome = servo
            .run(|| {
                iterations += 1;
                match iterations {
                    1 => Some(ServoEvent::ToggleVelocities),
                    3 => Some(ServoEvent::Quit),
                    _ => None,
                }
            })
            .unwrap();
        assert_eq!(outcome, ServoOutcome::Cancelled);
        let commands = commands.borrow();
        // Six zeroes from entering velocity control, six from the disarmed
        // first iteration.
        assert!(commands[..12].iter().all(|(_, rate)| *rate == 0));
        // The armed second iteration moves the arm.
        assert!(commands[12..18].iter().any(|(_, rate)| *rate != 0));
    }
}
