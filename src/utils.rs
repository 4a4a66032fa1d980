// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! contains useful type definitions and conversion functions.
use nalgebra::{Isometry3, Matrix4, Rotation3, Vector3, Vector6};

/// Number of actuated joints of the manipulator.
pub const ROBOT_DOF: usize = 6;

/// Joint-space vector with one entry per axis. Holds angles in \[rad\] or
/// velocities in \[rad/s\] depending on context.
pub type Joints = [f64; ROBOT_DOF];

/// converts a 4x4 homogeneous matrix to an Isometry
pub fn matrix_to_isometry(matrix: &Matrix4<f64>) -> Isometry3<f64> {
    let rotation = Rotation3::from_matrix(&matrix.fixed_view::<3, 3>(0, 0).into_owned());
    Isometry3::from_parts(
        Vector3::new(matrix[(0, 3)], matrix[(1, 3)], matrix[(2, 3)]).into(),
        rotation.into(),
    )
}

/// converts a joint-space array to a nalgebra vector
pub fn joints_to_vector(joints: &Joints) -> Vector6<f64> {
    Vector6::from_row_slice(joints)
}

/// converts a nalgebra vector to a joint-space array
pub fn vector_to_joints(vector: &Vector6<f64>) -> Joints {
    let mut joints = [0.; ROBOT_DOF];
    for (out, value) in joints.iter_mut().zip(vector.iter()) {
        *out = *value;
    }
    joints
}

/// converts every entry from radians to degrees
pub fn joints_to_degrees(joints: &Joints) -> Joints {
    let mut out = [0.; ROBOT_DOF];
    for i in 0..ROBOT_DOF {
        out[i] = joints[i].to_degrees();
    }
    out
}
