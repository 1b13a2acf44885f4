//! Joint (skeletal) animation
//!
//! A [`Skeleton`] describes the joint hierarchy and its bind pose, a
//! [`KeyframeTable`] holds sparse per-joint samples over time, and a
//! [`JointController`] turns both into per-joint skinning matrices that are
//! applied to the bind pose of every attached [`SkinnedMesh`].
//!
//! ```text
//! AnimationClip (RON) ──► JointController ──process──► update(dt) ──► SkinnedMesh buffers
//!                                                          │
//!                                                          └──► FramePublisher ──► FrameReceiver
//! ```

pub mod clip;
pub mod controller;
pub mod frame;
pub mod keyframe;
pub mod skeleton;
pub mod skin;

pub use clip::{AnimationClip, ClipJoint, RotationSample, TranslationSample};
pub use controller::{ControllerState, JointController, RepeatMode};
pub use frame::{frame_channel, FramePublisher, FrameReceiver, MeshFrame, SkinnedFrame};
pub use keyframe::{KeyframeTable, PointInTime};
pub use skeleton::{JointDesc, Skeleton};
pub use skin::{JointMeshBinding, SkinnedMesh};

use thiserror::Error;

/// Errors raised while building or driving joint animation
#[derive(Error, Debug)]
pub enum AnimationError {
    /// A joint index past the end of the skeleton
    #[error("joint {joint} is out of range for {count} joints")]
    JointOutOfRange {
        /// Offending joint index
        joint: usize,
        /// Number of joints in the skeleton
        count: usize,
    },

    /// A parent index that does not name a joint
    #[error("joint {joint} has invalid parent {parent}")]
    InvalidParent {
        /// Child joint
        joint: usize,
        /// Parent value as supplied
        parent: i64,
    },

    /// Parent links that loop back on themselves
    #[error("joint {joint} is part of a parent cycle")]
    CyclicHierarchy {
        /// A joint on the cycle
        joint: usize,
    },

    /// A time value or playback parameter that is NaN or infinite
    #[error("time value {0} is not finite")]
    NonFiniteTime(f32),

    /// Per-frame call before `process`
    #[error("controller has not been processed")]
    NotProcessed,

    /// Load-time call after `process`
    #[error("controller has already been processed")]
    AlreadyProcessed,

    /// `process` with an empty keyframe table
    #[error("no keyframes loaded")]
    NoKeyframes,

    /// Requested playback range outside the recorded keyframe times
    #[error("time range [{start}, {end}] lies outside recorded range [{min}, {max}]")]
    TimeRangeOutOfBounds {
        /// Requested start
        start: f32,
        /// Requested end
        end: f32,
        /// Earliest recorded time
        min: f32,
        /// Latest recorded time
        max: f32,
    },

    /// Playback range whose start is after its end
    #[error("time range start {start} is after end {end}")]
    InvalidTimeRange {
        /// Requested start
        start: f32,
        /// Requested end
        end: f32,
    },

    /// Per-vertex joint list that does not match the mesh
    #[error("binding covers {bindings} vertices but the mesh has {vertices}")]
    BindingMismatch {
        /// Entries in the joint list
        bindings: usize,
        /// Vertices in the mesh
        vertices: usize,
    },

    /// A zero-length quaternion in clip data
    #[error("joint {joint} has a degenerate rotation (time {time:?})")]
    DegenerateRotation {
        /// Joint the rotation belongs to
        joint: usize,
        /// Sample time, `None` for the bind rotation
        time: Option<f32>,
    },

    /// Clip text that failed to parse
    #[error("clip parse error: {0}")]
    Clip(#[from] ron::error::SpannedError),

    /// Clip file that could not be read
    #[error("clip I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for animation operations
pub type AnimationResult<T> = Result<T, AnimationError>;
