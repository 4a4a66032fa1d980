// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the kinematic model of the manipulator.
use nalgebra::{Isometry3, Matrix3, Matrix4, Matrix6, Vector3};
use std::fmt;

use crate::utils::{matrix_to_isometry, Joints, ROBOT_DOF};

mod singularity;

pub use singularity::{
    mitigate_singularity, SingularityKind, FOREARM_ALIGNMENT_THRESHOLD,
    SHOULDER_ALIGNMENT_THRESHOLD, WRIST_ALIGNMENT_THRESHOLD,
};

/// Enumerates the six joints, the end effector and the tool of the manipulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frame {
    Joint1,
    Joint2,
    Joint3,
    Joint4,
    Joint5,
    Joint6,
    EndEffector,
    Tool,
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Frame::Joint1 => {
                write!(f, "Joint 1")
            }
            Frame::Joint2 => {
                write!(f, "Joint 2")
            }
            Frame::Joint3 => {
                write!(f, "Joint 3")
            }
            Frame::Joint4 => {
                write!(f, "Joint 4")
            }
            Frame::Joint5 => {
                write!(f, "Joint 5")
            }
            Frame::Joint6 => {
                write!(f, "Joint 6")
            }
            Frame::EndEffector => {
                write!(f, "End-Effector")
            }
            Frame::Tool => {
                write!(f, "Tool")
            }
        }
    }
}

/// Geometry and drive-train constants of one specific arm.
///
/// The values are fixed at construction and injected into [`KawasakiModel`] and
/// [`Kawasaki`](`crate::Kawasaki`), so the whole control stack can be exercised
/// against synthetic geometries in tests. The [`Default`] carries the values of
/// the Kawasaki arm this library was written for.
#[derive(Debug, Clone, Copy)]
pub struct LinkParameters {
    /// Upper-arm link length, joint 2 to joint 3. Unit: \[m\].
    pub a2: f64,
    /// Shoulder height above the base frame. Unit: \[m\].
    pub d1: f64,
    /// Forearm length, joint 3 to the wrist center. Unit: \[m\].
    pub d4: f64,
    /// Wrist center to end-effector mount. Unit: \[m\].
    pub d6: f64,
    /// Direction of positive rotation per axis, `1` or `-1`.
    pub directions: [i8; ROBOT_DOF],
    /// Gear reduction between each motor and its axis.
    pub reduction_ratios: [f64; ROBOT_DOF],
    /// Encoder counts per motor revolution.
    pub encoder_resolution: i64,
    /// Encoder reading of each axis at the home position. Unit: \[counts\].
    pub home_counts: [i64; ROBOT_DOF],
    /// Joint angle of each axis at the home position. Unit: \[rad\].
    pub home_angles: [f64; ROBOT_DOF],
    /// Upper software joint limits. Unit: \[deg\].
    pub joint_max_deg: [f64; ROBOT_DOF],
    /// Lower software joint limits. Unit: \[deg\].
    pub joint_min_deg: [f64; ROBOT_DOF],
    /// Kinematic coupling of axis 6 to axis 5 introduced by the wrist gearing.
    pub wrist_coupling: f64,
}

impl Default for LinkParameters {
    fn default() -> Self {
        LinkParameters {
            a2: 0.355,
            d1: 0.36,
            d4: 0.375,
            d6: 0.078,
            directions: [1, 1, -1, 1, -1, 1],
            reduction_ratios: [80.008, 99.902, 78.433, 50.001, 64.001, 40.000],
            encoder_resolution: 131072,
            home_counts: [103319, 92992, 116630, 31953, 111221, 91157],
            home_angles: [
                0.,
                90_f64.to_radians(),
                90_f64.to_radians(),
                0.,
                0.,
                0.,
            ],
            joint_max_deg: [180., 135., 155., 200., 125., 360.],
            joint_min_deg: [-180., -135., -155., -200., -125., -360.],
            wrist_coupling: 0.01248916,
        }
    }
}

/// Calculates poses of the joint frames and the analytic Jacobian of the arm.
///
/// The Jacobian is derived with the vector-cross-product method from the same
/// transform chain that the forward kinematics use, so both stay consistent by
/// construction. No numeric differencing is involved; the downstream inversion
/// is too sensitive to conditioning for that.
pub struct KawasakiModel {
    links: LinkParameters,
}

impl KawasakiModel {
    /// Creates a model for the given link geometry.
    pub fn new(links: LinkParameters) -> Self {
        KawasakiModel { links }
    }

    /// Returns the link geometry this model was built with.
    pub fn link_parameters(&self) -> &LinkParameters {
        &self.links
    }

    /// Gets the six local joint transforms `T01 .. T56` for a joint configuration.
    ///
    /// Joint angles in \[rad\]. NaN in, NaN out; validation is up to the caller.
    pub fn joint_transforms(&self, q: &Joints) -> [Matrix4<f64>; ROBOT_DOF] {
        let (s1, c1) = q[0].sin_cos();
        let (s2, c2) = q[1].sin_cos();
        let (s3, c3) = q[2].sin_cos();
        let (s4, c4) = q[3].sin_cos();
        let (s5, c5) = q[4].sin_cos();
        let (s6, c6) = q[5].sin_cos();
        let LinkParameters { a2, d1, d4, d6, .. } = self.links;
        [
            Matrix4::new(
                c1, -s1, 0., 0., //
                s1, c1, 0., 0., //
                0., 0., 1., d1, //
                0., 0., 0., 1.,
            ),
            Matrix4::new(
                c2, -s2, 0., 0., //
                0., 0., -1., 0., //
                s2, c2, 0., 0., //
                0., 0., 0., 1.,
            ),
            Matrix4::new(
                c3, -s3, 0., a2, //
                s3, c3, 0., 0., //
                0., 0., 1., 0., //
                0., 0., 0., 1.,
            ),
            Matrix4::new(
                c4, -s4, 0., 0., //
                0., 0., -1., -d4, //
                s4, c4, 0., 0., //
                0., 0., 0., 1.,
            ),
            Matrix4::new(
                c5, -s5, 0., 0., //
                0., 0., 1., 0., //
                -s5, -c5, 0., 0., //
                0., 0., 0., 1.,
            ),
            Matrix4::new(
                c6, -s6, 0., 0., //
                0., 0., -1., -d6, //
                s6, c6, 0., 0., //
                0., 0., 0., 1.,
            ),
        ]
    }

    /// Gets the pose of the given frame in the base frame.
    /// # Arguments
    /// * `frame` - The desired frame.
    /// * `q` - Joint position.
    /// * `e_m_c` - Constant transformation between end effector and tool, only
    /// used for [`Frame::Tool`].
    pub fn pose(&self, frame: &Frame, q: &Joints, e_m_c: &Isometry3<f64>) -> Isometry3<f64> {
        let transforms = self.joint_transforms(q);
        let depth = match frame {
            Frame::Joint1 => 1,
            Frame::Joint2 => 2,
            Frame::Joint3 => 3,
            Frame::Joint4 => 4,
            Frame::Joint5 => 5,
            Frame::Joint6 | Frame::EndEffector | Frame::Tool => 6,
        };
        let mut chain = Matrix4::identity();
        for transform in &transforms[..depth] {
            chain *= transform;
        }
        let pose = matrix_to_isometry(&chain);
        match frame {
            Frame::Tool => pose * *e_m_c,
            _ => pose,
        }
    }

    /// Gets the 6x6 Jacobian expressed in the base frame.
    ///
    /// Column i maps the velocity of joint i+1 to the end-effector twist:
    /// the linear part is `z_i x (p_ee - p_i)` and the angular part is `z_i`,
    /// both in base coordinates.
    pub fn base_jacobian(&self, q: &Joints) -> Matrix6<f64> {
        let transforms = self.joint_transforms(q);

        // Cumulative rotations R01 .. R06.
        let mut rotations = [Matrix3::zeros(); ROBOT_DOF];
        let mut rotation = Matrix3::identity();
        for i in 0..ROBOT_DOF {
            rotation *= transforms[i].fixed_view::<3, 3>(0, 0).into_owned();
            rotations[i] = rotation;
        }

        // Lever arms: base-frame vector from each joint origin to the
        // end-effector origin, built from the suffix chains T(i+1)6.
        let mut levers = [Vector3::zeros(); ROBOT_DOF];
        let mut suffix: Matrix4<f64> = Matrix4::identity();
        for i in (0..ROBOT_DOF).rev() {
            let local = suffix.fixed_view::<3, 1>(0, 3).into_owned();
            levers[i] = rotations[i] * local;
            suffix = transforms[i] * suffix;
        }

        let mut jacobian = Matrix6::zeros();
        let z = Vector3::z();
        for i in 0..ROBOT_DOF {
            let axis = rotations[i] * z;
            let linear = axis.cross(&levers[i]);
            jacobian.fixed_view_mut::<3, 1>(0, i).copy_from(&linear);
            jacobian.fixed_view_mut::<3, 1>(3, i).copy_from(&axis);
        }
        jacobian
    }

    /// Gets the 6x6 Jacobian expressed in the end-effector frame.
    ///
    /// This is the base-frame Jacobian rotated by the transpose of the
    /// end-effector orientation, applied block-wise to the linear and angular
    /// rows.
    pub fn ee_jacobian(&self, q: &Joints) -> Matrix6<f64> {
        let base = self.base_jacobian(q);
        let pose = self.pose(&Frame::EndEffector, q, &Isometry3::identity());
        let rotation_t = pose.rotation.to_rotation_matrix().matrix().transpose();
        let mut block = Matrix6::zeros();
        block.fixed_view_mut::<3, 3>(0, 0).copy_from(&rotation_t);
        block.fixed_view_mut::<3, 3>(3, 3).copy_from(&rotation_t);
        block * base
    }
}

/// Gets the 6x6 velocity-twist operator of a rigid transform.
///
/// Multiplying a twist expressed in the child frame by this matrix yields the
/// same twist expressed in the parent frame: the rotation block acts on both
/// the linear and angular parts, and the translation couples angular into
/// linear velocity through its skew matrix.
pub fn velocity_twist(transform: &Isometry3<f64>) -> Matrix6<f64> {
    let rotation = transform.rotation.to_rotation_matrix();
    let r = rotation.matrix();
    let t = transform.translation.vector;
    let skew = Matrix3::new(
        0., -t.z, t.y, //
        t.z, 0., -t.x, //
        -t.y, t.x, 0.,
    );
    let mut twist = Matrix6::zeros();
    twist.fixed_view_mut::<3, 3>(0, 0).copy_from(r);
    twist.fixed_view_mut::<3, 3>(0, 3).copy_from(&(skew * r));
    twist.fixed_view_mut::<3, 3>(3, 3).copy_from(r);
    twist
}
