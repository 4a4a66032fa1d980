// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the extrinsic hand-eye calibration between end effector and camera.
use std::fs;
use std::path::Path;

use nalgebra::{Isometry3, Translation3, UnitQuaternion, Vector3};
use serde::Deserialize;
use tracing::warn;

use crate::exception::{KawasakiException, KawasakiResult};

/// A pose parameterised as translation plus θu rotation vector, the exchange
/// format of the calibration file.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct PoseVector {
    /// Translation x. Unit: \[m\].
    pub tx: f64,
    /// Translation y. Unit: \[m\].
    pub ty: f64,
    /// Translation z. Unit: \[m\].
    pub tz: f64,
    /// θu rotation vector x. Unit: \[rad\].
    pub tux: f64,
    /// θu rotation vector y. Unit: \[rad\].
    pub tuy: f64,
    /// θu rotation vector z. Unit: \[rad\].
    pub tuz: f64,
}

impl PoseVector {
    /// Converts to an isometry. The rotation vector is interpreted as
    /// axis-angle.
    pub fn to_isometry(&self) -> Isometry3<f64> {
        Isometry3::from_parts(
            Translation3::new(self.tx, self.ty, self.tz),
            UnitQuaternion::from_scaled_axis(Vector3::new(self.tux, self.tuy, self.tuz)),
        )
    }
}

/// Constant transformation between the end effector and the tool (camera)
/// frame, determined once by hand-eye calibration and held for the session.
///
/// The [`Default`] carries the calibration of the camera mount this library
/// was written for; pass a TOML file with the six [`PoseVector`] fields to use
/// your own:
/// ```toml
/// tx = 0.0337731
/// ty = -0.00535012
/// tz = -0.0523339
/// tux = -0.247294
/// tuy = -0.306729
/// tuz = 1.53055
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExtrinsicOffset {
    pose: PoseVector,
}

impl Default for ExtrinsicOffset {
    fn default() -> Self {
        ExtrinsicOffset {
            pose: PoseVector {
                tx: 0.0337731,
                ty: -0.00535012,
                tz: -0.0523339,
                tux: -0.247294,
                tuy: -0.306729,
                tuz: 1.53055,
            },
        }
    }
}

impl ExtrinsicOffset {
    /// Loads the calibration from a TOML file.
    /// # Errors
    /// * [`CalibrationException`](`KawasakiException::CalibrationException`) if
    /// the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> KawasakiResult<Self> {
        let content =
            fs::read_to_string(path).map_err(|error| KawasakiException::CalibrationException {
                message: format!("cannot read calibration file {}: {}", path.display(), error),
            })?;
        let pose = toml::from_str(&content).map_err(|error| {
            KawasakiException::CalibrationException {
                message: format!("cannot parse calibration file {}: {}", path.display(), error),
            }
        })?;
        Ok(ExtrinsicOffset { pose })
    }

    /// Loads the calibration file if one is given and readable, falling back
    /// to the hard-coded default with a warning otherwise.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        match path {
            Some(path) => match ExtrinsicOffset::from_file(path) {
                Ok(offset) => offset,
                Err(error) => {
                    warn!(%error, "falling back to the hard-coded extrinsic calibration");
                    ExtrinsicOffset::default()
                }
            },
            None => {
                warn!("no calibration file given, using the hard-coded extrinsic calibration");
                ExtrinsicOffset::default()
            }
        }
    }

    /// Returns the calibration as a pose vector.
    pub fn pose_vector(&self) -> PoseVector {
        self.pose
    }

    /// Returns the calibration as the end-effector-to-camera transformation.
    pub fn isometry(&self) -> Isometry3<f64> {
        self.pose.to_isometry()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn pose_vector_converts_to_axis_angle() {
        let pose = PoseVector {
            tx: 0.1,
            ty: 0.2,
            tz: 0.3,
            tux: 0.,
            tuy: 0.,
            tuz: 1.5,
        };
        let isometry = pose.to_isometry();
        assert!((isometry.translation.vector - Vector3::new(0.1, 0.2, 0.3)).norm() < 1e-12);
        assert!((isometry.rotation.angle() - 1.5).abs() < 1e-12);
        assert!((isometry.rotation.axis().unwrap().into_inner() - Vector3::z()).norm() < 1e-12);
    }

    #[test]
    fn calibration_file_round_trip() {
        let path = std::env::temp_dir().join("kawasaki_servo_emc_test.toml");
        fs::write(
            &path,
            "tx = 0.01\nty = -0.02\ntz = 0.03\ntux = 0.1\ntuy = -0.2\ntuz = 0.3\n",
        )
        .unwrap();
        let offset = ExtrinsicOffset::from_file(&path).unwrap();
        fs::remove_file(&path).unwrap();
        assert!((offset.pose_vector().tx - 0.01).abs() < 1e-12);
        assert!((offset.pose_vector().tuz - 0.3).abs() < 1e-12);
    }

    #[test]
    fn missing_file_is_a_calibration_error() {
        let path = std::env::temp_dir().join("kawasaki_servo_emc_missing.toml");
        match ExtrinsicOffset::from_file(&path) {
            Err(KawasakiException::CalibrationException { .. }) => {}
            other => panic!("expected CalibrationException, got {:?}", other),
        }
    }

    #[test]
    fn load_or_default_falls_back_on_missing_input() {
        let offset = ExtrinsicOffset::load_or_default(None);
        assert_eq!(offset, ExtrinsicOffset::default());
        assert!((offset.isometry().translation.vector.x - 0.0337731).abs() < 1e-12);
    }
}
