// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

use std::cell::RefCell;
use std::f64::consts::PI;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;

use clap::Parser;
use nalgebra::{Isometry3, Matrix3, Rotation3, Translation3, UnitQuaternion, Vector3, Vector6};

use kawasaki_servo::utils::joints_to_degrees;
use kawasaki_servo::{
    AdaptiveGain, AxisCommandMode, DriverStatus, ExtrinsicOffset, Gain, Kawasaki, KawasakiResult,
    LinkParameters, MotionPort, PbvsTask, PoseObserver, ServoEvent, ServoLoop, ServoOutcome,
};

/// Simulated seconds of arm motion per velocity command.
const CYCLE: f64 = 0.05;

/// A pose-based visual-servo session on a bench: a simulated controller card
/// integrates the pulse-rate commands and a simulated tag moves in the camera
/// image according to the commanded camera twist. The desired pose is three
/// tag sizes in front of the camera, tag facing it.
#[derive(Parser, Debug)]
#[clap(author, version, name = "servo_pbvs")]
struct CommandLineArguments {
    /// Edge length of the tag. Unit: [m].
    #[clap(long, default_value = "0.096")]
    tag_size: f64,
    /// TOML file with the extrinsic calibration; hard-coded values otherwise.
    #[clap(long)]
    emc: Option<PathBuf>,
    /// Use the adaptive gain instead of a constant 0.8.
    #[clap(long, action)]
    adaptive_gain: bool,
    /// Ramp the commanded velocity in over the first two seconds.
    #[clap(long, action)]
    task_sequencing: bool,
    /// Run without convergence thresholds.
    #[clap(long, action)]
    no_convergence_threshold: bool,
    /// Print every telemetry record.
    #[clap(long, action)]
    verbose: bool,
    /// Iterations after which the session gives up.
    #[clap(long, default_value = "2000")]
    max_iterations: usize,
}

/// Bench stand-in for the controller card: velocity commands move the
/// simulated encoders.
struct BenchPort {
    counts: Rc<RefCell<[f64; 6]>>,
}

impl MotionPort for BenchPort {
    fn open(&mut self) {}
    fn close(&mut self) {}
    fn axis_encoder_position(&mut self, axis: usize) -> i64 {
        self.counts.borrow()[axis] as i64
    }
    fn set_axis_velocity_command(&mut self, axis: usize, pulse_rate: i64) {
        self.counts.borrow_mut()[axis] += pulse_rate as f64 * CYCLE;
    }
    fn set_axis_position_command(&mut self, _axis: usize, _position: i64) {}
    fn set_axis_command_mode(&mut self, _axis: usize, _mode: AxisCommandMode) {}
    fn axis_driver_state(&mut self, _axis: usize) -> u32 {
        DriverStatus::Enabled as u32
    }
    fn stop_all_axes(&mut self) {}
}

/// Encoder counts at which the arm reads the given joint configuration.
fn counts_for(links: &LinkParameters, q: &[f64; 6]) -> [f64; 6] {
    let mut axis = *q;
    axis[5] -= links.wrist_coupling * axis[4];
    let mut counts = [0.; 6];
    for i in 0..6 {
        counts[i] = links.home_counts[i] as f64
            + (axis[i] - links.home_angles[i]) * f64::from(links.directions[i])
                * links.reduction_ratios[i]
                * links.encoder_resolution as f64
                / (2. * PI);
    }
    counts
}

/// Simulated tag: each observation moves the camera by the previously
/// commanded twist and reports the resulting target pose.
struct SimulatedTag {
    c_m_o: Isometry3<f64>,
    last_twist: Rc<RefCell<Vector6<f64>>>,
}

impl PoseObserver for SimulatedTag {
    fn observe(&mut self) -> KawasakiResult<Vec<Isometry3<f64>>> {
        let twist = *self.last_twist.borrow();
        let motion = Isometry3::from_parts(
            Translation3::from(Vector3::new(twist[0], twist[1], twist[2]) * CYCLE),
            UnitQuaternion::from_scaled_axis(Vector3::new(twist[3], twist[4], twist[5]) * CYCLE),
        );
        self.c_m_o = motion.inverse() * self.c_m_o;
        Ok(vec![self.c_m_o])
    }
}

fn main() -> KawasakiResult<()> {
    let args = CommandLineArguments::parse();
    tracing_subscriber::fmt()
        .with_max_level(if args.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .init();

    let links = LinkParameters::default();
    let start_configuration = [
        20_f64.to_radians(),
        60_f64.to_radians(),
        45_f64.to_radians(),
        10_f64.to_radians(),
        60_f64.to_radians(),
        0.,
    ];
    let counts = Rc::new(RefCell::new(counts_for(&links, &start_configuration)));
    let port = BenchPort {
        counts: counts.clone(),
    };
    let mut robot = Kawasaki::new(port, links);
    robot.connect()?;
    robot.set_extrinsic_offset(ExtrinsicOffset::load_or_default(args.emc.as_deref()).isometry());
    robot.set_settle_delays(Duration::ZERO, Duration::ZERO);

    let c_d_m_o = Isometry3::from_parts(
        Translation3::new(0., 0., 3. * args.tag_size),
        UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(Matrix3::new(
            1., 0., 0., 0., -1., 0., 0., 0., -1.,
        ))),
    );
    let gain = if args.adaptive_gain {
        Gain::Adaptive(AdaptiveGain::new(3., 0.4, 30.))
    } else {
        Gain::Constant(0.8)
    };
    let mut task = PbvsTask::new(c_d_m_o, gain);
    if args.task_sequencing {
        task.enable_task_sequencing(Duration::from_secs(2));
    }
    if args.no_convergence_threshold {
        task.disable_convergence_thresholds();
    }

    // The tag starts off to the side, a bit too far away and slightly turned.
    let last_twist = Rc::new(RefCell::new(Vector6::zeros()));
    let mut observer = SimulatedTag {
        c_m_o: Isometry3::from_parts(
            Translation3::new(0.05, -0.02, 4. * args.tag_size),
            c_d_m_o.rotation * UnitQuaternion::from_scaled_axis(Vector3::new(0.1, -0.05, 0.2)),
        ),
        last_twist: last_twist.clone(),
    };

    let mut servo = ServoLoop::new(&mut robot, &mut observer, task);
    let sink_twist = last_twist.clone();
    let verbose = args.verbose;
    servo.set_record_sink(Box::new(move |record| {
        *sink_twist.borrow_mut() = record.cartesian_velocity;
        if verbose {
            println!(
                "error_t: {:.6} error_tu: {:.4} deg v_c: {:.5?}",
                record.error.fixed_rows::<3>(0).norm(),
                record.error.fixed_rows::<3>(3).norm().to_degrees(),
                record.cartesian_velocity.as_slice(),
            );
        }
    }));

    let mut iterations = 0;
    let max_iterations = args.max_iterations;
    let outcome = servo.run(|| {
        iterations += 1;
        if iterations >= max_iterations {
            Some(ServoEvent::Quit)
        } else {
            None
        }
    })?;
    match outcome {
        ServoOutcome::Converged => println!("Servo task has converged"),
        ServoOutcome::Cancelled => {
            println!("Session left after {} iterations without convergence", iterations)
        }
    }
    println!(
        "final joint configuration (deg): {:.2?}",
        joints_to_degrees(&robot.joint_position())
    );
    robot.disconnect();
    Ok(())
}
