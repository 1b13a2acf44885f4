//! Serializable animation clips
//!
//! A clip mirrors what a skeletal-animation importer delivers: per-joint
//! parent index (`-1` for roots) and bind pose, plus flat lists of rotation
//! and translation samples. Rotations are stored as `(x, y, z, w)`.
//!
//! ```ron
//! (
//!     name: "wave",
//!     joints: [
//!         (name: "shoulder", parent: -1),
//!         (name: "elbow", parent: 0, translation: (1.0, 0.0, 0.0)),
//!     ],
//!     rotations: [
//!         (joint: 1, time: 0.0, rotation: (0.0, 0.0, 0.0, 1.0)),
//!         (joint: 1, time: 1.0, rotation: (0.0, 0.0, 0.7071068, 0.7071068)),
//!     ],
//! )
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::config::AnimationConfig;
use crate::foundation::math::{Quat, Quaternion, Vec3};

use super::controller::JointController;
use super::skeleton::{JointDesc, Skeleton};
use super::{AnimationError, AnimationResult};

const IDENTITY_ROTATION: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

fn identity_rotation() -> [f32; 4] {
    IDENTITY_ROTATION
}

/// Joint record of a clip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipJoint {
    /// Joint name
    pub name: String,
    /// Parent index, `-1` for a root
    pub parent: i32,
    /// Bind translation relative to the parent
    #[serde(default)]
    pub translation: [f32; 3],
    /// Bind rotation relative to the parent, `(x, y, z, w)`
    #[serde(default = "identity_rotation")]
    pub rotation: [f32; 4],
}

/// One rotation keyframe
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RotationSample {
    /// Joint index
    pub joint: usize,
    /// Sample time in seconds
    pub time: f32,
    /// Rotation `(x, y, z, w)`
    pub rotation: [f32; 4],
}

/// One translation keyframe
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TranslationSample {
    /// Joint index
    pub joint: usize,
    /// Sample time in seconds
    pub time: f32,
    /// Translation relative to the bind pose
    pub translation: [f32; 3],
}

/// Skeleton plus keyframes, as loaded from disk
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnimationClip {
    /// Clip name
    #[serde(default)]
    pub name: String,
    /// Joint hierarchy
    pub joints: Vec<ClipJoint>,
    /// Rotation samples in any order
    #[serde(default)]
    pub rotations: Vec<RotationSample>,
    /// Translation samples in any order
    #[serde(default)]
    pub translations: Vec<TranslationSample>,
}

fn to_quat(xyzw: [f32; 4]) -> Option<Quat> {
    let [x, y, z, w] = xyzw;
    Quat::try_new(Quaternion::new(w, x, y, z), f32::EPSILON)
}

impl AnimationClip {
    /// Parse a clip from RON text
    pub fn from_ron_str(text: &str) -> AnimationResult<Self> {
        Ok(ron::from_str(text)?)
    }

    /// Read a clip from a RON file
    pub fn load(path: impl AsRef<Path>) -> AnimationResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_ron_str(&text)
    }

    /// Earliest and latest sample times over both channels
    pub fn time_bounds(&self) -> Option<(f32, f32)> {
        let times = self
            .rotations
            .iter()
            .map(|s| s.time)
            .chain(self.translations.iter().map(|s| s.time));
        times.fold(None, |bounds, t| match bounds {
            None => Some((t, t)),
            Some((min, max)) => Some((f32::min(min, t), f32::max(max, t))),
        })
    }

    /// Validate the joint records and build the skeleton
    pub fn skeleton(&self) -> AnimationResult<Skeleton> {
        let joints = self
            .joints
            .iter()
            .enumerate()
            .map(|(index, joint)| {
                let parent = match joint.parent {
                    -1 => None,
                    p => Some(usize::try_from(p).map_err(|_| AnimationError::InvalidParent {
                        joint: index,
                        parent: i64::from(p),
                    })?),
                };
                let rotation = to_quat(joint.rotation).ok_or(AnimationError::DegenerateRotation {
                    joint: index,
                    time: None,
                })?;
                Ok(JointDesc::new(joint.name.clone(), parent)
                    .with_translation(Vec3::from(joint.translation))
                    .with_rotation(rotation))
            })
            .collect::<AnimationResult<Vec<_>>>()?;
        Skeleton::new(joints)
    }

    /// Build an idle controller loaded with every sample
    ///
    /// Attach meshes, then call [`JointController::process`].
    pub fn into_controller(self, config: &AnimationConfig) -> AnimationResult<JointController> {
        let mut controller = JointController::with_config(self.skeleton()?, config);
        for sample in &self.rotations {
            let rotation = to_quat(sample.rotation).ok_or(AnimationError::DegenerateRotation {
                joint: sample.joint,
                time: Some(sample.time),
            })?;
            controller.add_rotation(sample.joint, sample.time, rotation)?;
        }
        for sample in &self.translations {
            controller.add_translation(sample.joint, sample.time, Vec3::from(sample.translation))?;
        }
        Ok(controller)
    }
}
