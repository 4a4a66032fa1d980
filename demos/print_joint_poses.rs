// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later
use clap::Parser;
use nalgebra::Isometry3;

use kawasaki_servo::{Frame, KawasakiModel, LinkParameters};

/// Prints the pose of each joint frame and the Jacobian in base and
/// end-effector frame for a joint configuration.
#[derive(Parser, Debug)]
#[clap(author, version, name = "print_joint_poses")]
struct CommandLineArguments {
    /// Joint angles in degrees
    #[clap(
        short,
        long,
        number_of_values = 6,
        allow_hyphen_values = true,
        default_values = &["0", "90", "90", "0", "0", "0"]
    )]
    joints: Vec<f64>,
}

fn main() {
    let args = CommandLineArguments::parse();
    let model = KawasakiModel::new(LinkParameters::default());
    let mut q = [0.; 6];
    for (joint, angle) in q.iter_mut().zip(args.joints.iter()) {
        *joint = angle.to_radians();
    }
    let frames = vec![
        Frame::Joint1,
        Frame::Joint2,
        Frame::Joint3,
        Frame::Joint4,
        Frame::Joint5,
        Frame::Joint6,
        Frame::EndEffector,
    ];
    for frame in frames {
        let pose = model.pose(&frame, &q, &Isometry3::identity());
        println!("{} {}", frame, pose.to_homogeneous());
    }
    println!("base-frame Jacobian {}", model.base_jacobian(&q));
    println!("end-effector-frame Jacobian {}", model.ee_jacobian(&q));
}
