//! Joint transform controller
//!
//! Lifecycle: load keyframes while [`ControllerState::Idle`], call
//! [`JointController::process`] once, then [`play`](JointController::play)
//! and drive it with [`update`](JointController::update) every tick.
//!
//! Each update advances the clock, brackets it between two points in time,
//! blends every joint's local pose, walks the hierarchy parents-first to get
//! world joint matrices, multiplies in the inverse bind chains, and skins
//! every attached mesh from its bind pose.

use log::{debug, trace};
use serde::{Deserialize, Serialize};

use crate::core::config::AnimationConfig;
use crate::foundation::math::{utils, Mat4, Quat, Transform, Vec3};

use super::frame::{MeshFrame, SkinnedFrame};
use super::keyframe::KeyframeTable;
use super::skeleton::Skeleton;
use super::skin::SkinnedMesh;
use super::{AnimationError, AnimationResult};

/// What happens when the clock runs past either end of the time range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RepeatMode {
    /// Jump back to the other end and keep going
    #[default]
    Wrap,
    /// Stop at the end and play in the opposite direction
    Cycle,
    /// Stop at the end and pause the controller
    Clamp,
}

/// Controller lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    /// Accepting keyframes; not yet processed
    Idle,
    /// Holes filled, ready to play
    Processed,
    /// Advancing with each update
    Active,
    /// Holding the current pose
    Paused,
}

/// Drives a skeleton from keyframes and skins attached meshes
#[derive(Debug, Clone)]
pub struct JointController {
    skeleton: Skeleton,
    keyframes: KeyframeTable,
    state: ControllerState,
    repeat_mode: RepeatMode,
    speed: f32,
    update_model_bound: bool,
    reversed: bool,
    clock: f32,
    range: (f32, f32),
    world: Vec<Mat4>,
    skin: Vec<Mat4>,
    meshes: Vec<SkinnedMesh>,
    sequence: u64,
}

impl JointController {
    /// Create an idle controller with default playback settings
    pub fn new(skeleton: Skeleton) -> Self {
        Self::with_config(skeleton, &AnimationConfig::default())
    }

    /// Create an idle controller with the given playback settings
    pub fn with_config(skeleton: Skeleton, config: &AnimationConfig) -> Self {
        let count = skeleton.len();
        Self {
            keyframes: KeyframeTable::new(count),
            skeleton,
            state: ControllerState::Idle,
            repeat_mode: config.repeat_mode,
            speed: if config.speed.is_finite() { config.speed } else { 1.0 },
            update_model_bound: config.update_model_bound,
            reversed: false,
            clock: 0.0,
            range: (0.0, 0.0),
            world: vec![Mat4::identity(); count],
            skin: vec![Mat4::identity(); count],
            meshes: Vec::new(),
            sequence: 0,
        }
    }

    /// Joint hierarchy
    pub fn skeleton(&self) -> &Skeleton {
        &self.skeleton
    }

    /// Loaded keyframes
    pub fn keyframes(&self) -> &KeyframeTable {
        &self.keyframes
    }

    /// Lifecycle state
    pub fn state(&self) -> ControllerState {
        self.state
    }

    /// Record a rotation sample for a joint
    pub fn add_rotation(&mut self, joint: usize, time: f32, rotation: Quat) -> AnimationResult<()> {
        self.ensure_idle()?;
        self.keyframes.add_rotation(joint, time, rotation)
    }

    /// Record a translation sample for a joint
    pub fn add_translation(&mut self, joint: usize, time: f32, translation: Vec3) -> AnimationResult<()> {
        self.ensure_idle()?;
        self.keyframes.add_translation(joint, time, translation)
    }

    fn ensure_idle(&self) -> AnimationResult<()> {
        if self.state == ControllerState::Idle {
            Ok(())
        } else {
            Err(AnimationError::AlreadyProcessed)
        }
    }

    fn ensure_processed(&self) -> AnimationResult<()> {
        if self.state == ControllerState::Idle {
            Err(AnimationError::NotProcessed)
        } else {
            Ok(())
        }
    }

    /// Fill keyframe holes and pose the skeleton at the first recorded time
    ///
    /// Runs once; later keyframe edits are rejected.
    pub fn process(&mut self) -> AnimationResult<()> {
        self.ensure_idle()?;
        let bounds = self.keyframes.time_bounds().ok_or(AnimationError::NoKeyframes)?;

        self.keyframes.fill_holes();
        self.range = bounds;
        self.clock = bounds.0;
        self.reversed = false;
        self.state = ControllerState::Processed;
        debug!(
            "Processed joint controller: {} joints, {} points in time over [{}, {}]",
            self.skeleton.len(),
            self.keyframes.len(),
            bounds.0,
            bounds.1
        );

        self.pose();
        Ok(())
    }

    /// Start advancing with each update
    pub fn play(&mut self) -> AnimationResult<()> {
        self.ensure_processed()?;
        self.state = ControllerState::Active;
        Ok(())
    }

    /// Hold the current pose
    pub fn pause(&mut self) -> AnimationResult<()> {
        self.ensure_processed()?;
        if self.state == ControllerState::Active {
            self.state = ControllerState::Paused;
        }
        Ok(())
    }

    /// Continue after a pause
    pub fn resume(&mut self) -> AnimationResult<()> {
        self.ensure_processed()?;
        if self.state == ControllerState::Paused {
            self.state = ControllerState::Active;
        }
        Ok(())
    }

    /// Whether the controller advances on update
    pub fn is_active(&self) -> bool {
        self.state == ControllerState::Active
    }

    /// Repeat behavior at the ends of the time range
    pub fn repeat_mode(&self) -> RepeatMode {
        self.repeat_mode
    }

    /// Change repeat behavior
    ///
    /// Only cycling keeps a reversed direction; other modes play forward again.
    pub fn set_repeat_mode(&mut self, mode: RepeatMode) {
        self.repeat_mode = mode;
        if mode != RepeatMode::Cycle {
            self.reversed = false;
        }
    }

    /// Playback speed multiplier
    pub fn speed(&self) -> f32 {
        self.speed
    }

    /// Change playback speed; negative speeds play backwards
    pub fn set_speed(&mut self, speed: f32) -> AnimationResult<()> {
        if !speed.is_finite() {
            return Err(AnimationError::NonFiniteTime(speed));
        }
        self.speed = speed;
        Ok(())
    }

    /// Whether skinned meshes recompute their model bound after each update
    pub fn set_update_model_bound(&mut self, enabled: bool) {
        self.update_model_bound = enabled;
    }

    /// Restrict playback to `[start, end]` within the recorded times
    pub fn set_time_range(&mut self, start: f32, end: f32) -> AnimationResult<()> {
        self.ensure_processed()?;
        for t in [start, end] {
            if !t.is_finite() {
                return Err(AnimationError::NonFiniteTime(t));
            }
        }
        if start > end {
            return Err(AnimationError::InvalidTimeRange { start, end });
        }
        let (min, max) = self.keyframes.time_bounds().ok_or(AnimationError::NoKeyframes)?;
        if start < min || end > max {
            return Err(AnimationError::TimeRangeOutOfBounds { start, end, min, max });
        }

        self.range = (start, end);
        self.clock = self.clock.clamp(start, end);
        self.pose();
        Ok(())
    }

    /// Playable time range
    pub fn time_range(&self) -> (f32, f32) {
        self.range
    }

    /// Current clock value
    pub fn current_time(&self) -> f32 {
        self.clock
    }

    /// Whether a cycle has reversed the playback direction
    pub fn is_reversed(&self) -> bool {
        self.reversed
    }

    /// Move the clock to `time` (clamped into the range) and re-pose
    pub fn seek(&mut self, time: f32) -> AnimationResult<()> {
        self.ensure_processed()?;
        if !time.is_finite() {
            return Err(AnimationError::NonFiniteTime(time));
        }
        self.clock = time.clamp(self.range.0, self.range.1);
        self.pose();
        Ok(())
    }

    /// Advance by `dt` seconds and re-skin every attached mesh
    ///
    /// A processed controller that is not active ignores the call.
    pub fn update(&mut self, dt: f32) -> AnimationResult<()> {
        self.ensure_processed()?;
        if !dt.is_finite() {
            return Err(AnimationError::NonFiniteTime(dt));
        }
        if self.state != ControllerState::Active {
            return Ok(());
        }

        self.advance(dt * self.speed);
        self.pose();
        self.sequence += 1;
        trace!("Joint controller frame {} at t = {}", self.sequence, self.clock);
        Ok(())
    }

    fn advance(&mut self, step: f32) {
        let (min, max) = self.range;
        let span = max - min;
        if span <= 0.0 {
            self.clock = min;
            return;
        }

        let t = if self.reversed { self.clock - step } else { self.clock + step };
        if (min..=max).contains(&t) {
            self.clock = t;
            return;
        }

        match self.repeat_mode {
            RepeatMode::Wrap => {
                self.clock = min + (t - min).rem_euclid(span);
            }
            RepeatMode::Cycle => {
                self.clock = t.clamp(min, max);
                self.reversed = !self.reversed;
            }
            RepeatMode::Clamp => {
                self.clock = t.clamp(min, max);
                self.state = ControllerState::Paused;
                debug!("Joint controller clamped at t = {}; pausing", self.clock);
            }
        }
    }

    /// Recompute joint matrices at the current clock and skin every mesh
    fn pose(&mut self) {
        let Some((then, now, delta)) = self.keyframes.bracket(self.clock) else {
            return;
        };
        let points = self.keyframes.points();
        let (then, now) = (&points[then], &points[now]);

        for &joint in self.skeleton.order() {
            let local = Transform::from_rotation_translation(
                utils::slerp(&then.rotation(joint), &now.rotation(joint), delta),
                utils::lerp_vec3(&then.translation(joint), &now.translation(joint), delta),
            );
            let composed = self.skeleton.reference(joint) * local.to_matrix();
            self.world[joint] = match self.skeleton.parent(joint) {
                Some(parent) => self.world[parent] * composed,
                None => composed,
            };
            self.skin[joint] = self.world[joint] * self.skeleton.inverse_chain(joint);
        }

        for mesh in &mut self.meshes {
            mesh.apply(&self.skin, self.update_model_bound);
        }
    }

    /// World matrix of each joint at the current clock
    pub fn joint_world_transforms(&self) -> &[Mat4] {
        &self.world
    }

    /// Final per-joint skinning matrices at the current clock
    pub fn skin_transforms(&self) -> &[Mat4] {
        &self.skin
    }

    /// Attach a mesh; it is posed immediately if the controller is processed
    pub fn add_skinned_mesh(&mut self, mut mesh: SkinnedMesh) -> AnimationResult<usize> {
        if let Some(joint) = mesh.binding().max_joint() {
            if joint >= self.skeleton.len() {
                return Err(AnimationError::JointOutOfRange {
                    joint,
                    count: self.skeleton.len(),
                });
            }
        }
        if self.state != ControllerState::Idle {
            mesh.apply(&self.skin, self.update_model_bound);
        }
        self.meshes.push(mesh);
        Ok(self.meshes.len() - 1)
    }

    /// Attached meshes
    pub fn skinned_meshes(&self) -> &[SkinnedMesh] {
        &self.meshes
    }

    /// Attached mesh by index
    pub fn skinned_mesh_mut(&mut self, index: usize) -> Option<&mut SkinnedMesh> {
        self.meshes.get_mut(index)
    }

    /// Copy the current pose and vertex buffers into a frame for another thread
    pub fn snapshot_frame(&self) -> SkinnedFrame {
        SkinnedFrame {
            sequence: self.sequence,
            time: self.clock,
            skin_transforms: self.skin.clone(),
            meshes: self
                .meshes
                .iter()
                .map(|m| MeshFrame {
                    positions: m.mesh().vertices().to_vec(),
                    normals: m.mesh().normals().to_vec(),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::skeleton::JointDesc;
    use crate::scene::TriMesh;
    use approx::assert_relative_eq;
    use std::f32::consts::{FRAC_PI_2, FRAC_PI_4};

    const EPSILON: f32 = 1e-5;

    fn single_joint() -> Skeleton {
        Skeleton::new(vec![JointDesc::new("root", None)]).unwrap()
    }

    /// One joint turning a quarter circle about z between t = 0 and t = 2
    fn turning_controller(mode: RepeatMode) -> JointController {
        let mut controller = JointController::with_config(single_joint(), &AnimationConfig::default().with_repeat_mode(mode));
        controller.add_rotation(0, 0.0, Quat::identity()).unwrap();
        controller
            .add_rotation(0, 2.0, Quat::from_axis_angle(&Vec3::z_axis(), FRAC_PI_2))
            .unwrap();
        controller
    }

    fn pointer_mesh() -> SkinnedMesh {
        let mesh = TriMesh::new(
            vec![Vec3::new(1.0, 0.0, 0.0), Vec3::new(1.0, 0.1, 0.0), Vec3::new(1.0, 0.0, 0.1)],
            Vec::new(),
            vec![0, 1, 2],
        )
        .unwrap();
        SkinnedMesh::rigid(mesh, 0).unwrap()
    }

    #[test]
    fn test_update_before_process_fails() {
        let mut controller = turning_controller(RepeatMode::Wrap);
        assert!(matches!(controller.update(0.1), Err(AnimationError::NotProcessed)));
        assert!(matches!(controller.play(), Err(AnimationError::NotProcessed)));
    }

    #[test]
    fn test_process_runs_once() {
        let mut controller = turning_controller(RepeatMode::Wrap);
        controller.process().unwrap();
        assert_eq!(controller.state(), ControllerState::Processed);
        assert!(matches!(controller.process(), Err(AnimationError::AlreadyProcessed)));
        assert!(matches!(
            controller.add_rotation(0, 1.0, Quat::identity()),
            Err(AnimationError::AlreadyProcessed)
        ));

        let mut empty = JointController::new(single_joint());
        assert!(matches!(empty.process(), Err(AnimationError::NoKeyframes)));
    }

    #[test]
    fn test_wrap_mode() {
        let mut controller = turning_controller(RepeatMode::Wrap);
        controller.process().unwrap();
        controller.play().unwrap();
        controller.update(2.5).unwrap();
        assert_relative_eq!(controller.current_time(), 0.5, epsilon = EPSILON);
        assert!(controller.is_active());
    }

    #[test]
    fn test_cycle_mode_reverses() {
        let mut controller = turning_controller(RepeatMode::Cycle);
        controller.process().unwrap();
        controller.play().unwrap();
        controller.update(2.5).unwrap();
        assert_relative_eq!(controller.current_time(), 2.0, epsilon = EPSILON);
        assert!(controller.is_reversed());

        controller.update(0.3).unwrap();
        assert_relative_eq!(controller.current_time(), 1.7, epsilon = EPSILON);
    }

    #[test]
    fn test_cycle_mode_bounces_off_start() {
        let mut controller = turning_controller(RepeatMode::Cycle);
        controller.process().unwrap();
        controller.play().unwrap();
        controller.update(2.5).unwrap();
        assert!(controller.is_reversed());

        controller.update(2.5).unwrap();
        assert_relative_eq!(controller.current_time(), 0.0, epsilon = EPSILON);
        assert!(!controller.is_reversed());

        controller.update(0.3).unwrap();
        assert_relative_eq!(controller.current_time(), 0.3, epsilon = EPSILON);
    }

    #[test]
    fn test_wrap_mode_backwards() {
        let mut controller = turning_controller(RepeatMode::Wrap);
        controller.process().unwrap();
        assert!(matches!(controller.set_speed(f32::NAN), Err(AnimationError::NonFiniteTime(_))));
        controller.set_speed(-1.0).unwrap();
        assert_relative_eq!(controller.speed(), -1.0);
        controller.play().unwrap();

        controller.update(0.5).unwrap();
        assert_relative_eq!(controller.current_time(), 1.5, epsilon = EPSILON);
        assert!(controller.is_active());

        controller.update(0.5).unwrap();
        assert_relative_eq!(controller.current_time(), 1.0, epsilon = EPSILON);
    }

    #[test]
    fn test_clamp_mode_backwards_stops_at_start() {
        let mut controller = turning_controller(RepeatMode::Clamp);
        controller.process().unwrap();
        controller.seek(1.0).unwrap();
        controller.set_speed(-1.0).unwrap();
        controller.play().unwrap();

        controller.update(1.5).unwrap();
        assert_relative_eq!(controller.current_time(), 0.0, epsilon = EPSILON);
        assert_eq!(controller.state(), ControllerState::Paused);

        controller.update(0.3).unwrap();
        assert_relative_eq!(controller.current_time(), 0.0, epsilon = EPSILON);
    }

    #[test]
    fn test_leaving_cycle_mode_plays_forward() {
        let mut controller = turning_controller(RepeatMode::Cycle);
        controller.process().unwrap();
        controller.play().unwrap();
        controller.update(2.5).unwrap();
        controller.update(0.5).unwrap();
        assert!(controller.is_reversed());
        assert_relative_eq!(controller.current_time(), 1.5, epsilon = EPSILON);

        controller.set_repeat_mode(RepeatMode::Wrap);
        assert!(!controller.is_reversed());
        controller.update(0.25).unwrap();
        assert_relative_eq!(controller.current_time(), 1.75, epsilon = EPSILON);
    }

    #[test]
    fn test_clamp_mode_deactivates() {
        let mut controller = turning_controller(RepeatMode::Clamp);
        controller.process().unwrap();
        controller.play().unwrap();
        controller.update(2.5).unwrap();
        assert_relative_eq!(controller.current_time(), 2.0, epsilon = EPSILON);
        assert_eq!(controller.state(), ControllerState::Paused);

        controller.update(0.3).unwrap();
        assert_relative_eq!(controller.current_time(), 2.0, epsilon = EPSILON);
    }

    #[test]
    fn test_interpolation_hits_samples_at_boundaries() {
        let mut controller = turning_controller(RepeatMode::Wrap);
        controller.process().unwrap();

        let angle = |c: &JointController| Quat::from_matrix(&c.skin_transforms()[0].fixed_view::<3, 3>(0, 0).into_owned()).angle();
        assert_relative_eq!(angle(&controller), 0.0, epsilon = EPSILON);

        controller.seek(2.0).unwrap();
        assert_relative_eq!(angle(&controller), FRAC_PI_2, epsilon = EPSILON);

        controller.seek(1.0).unwrap();
        assert_relative_eq!(angle(&controller), FRAC_PI_4, epsilon = EPSILON);
    }

    #[test]
    fn test_zero_dt_does_not_drift() {
        let mut controller = turning_controller(RepeatMode::Wrap);
        controller.add_skinned_mesh(pointer_mesh()).unwrap();
        controller.process().unwrap();
        controller.play().unwrap();
        controller.update(0.7).unwrap();

        let before = controller.skinned_meshes()[0].mesh().vertices().to_vec();
        for _ in 0..100 {
            controller.update(0.0).unwrap();
        }
        assert_eq!(controller.skinned_meshes()[0].mesh().vertices(), before.as_slice());
    }

    #[test]
    fn test_hierarchy_composes_parents_first() {
        // Child listed first to make index order disagree with hierarchy order
        let skeleton = Skeleton::new(vec![
            JointDesc::new("tip", Some(1)).with_translation(Vec3::new(1.0, 0.0, 0.0)),
            JointDesc::new("root", None),
        ])
        .unwrap();
        let mut controller = JointController::new(skeleton);
        controller.add_rotation(1, 0.0, Quat::from_axis_angle(&Vec3::z_axis(), FRAC_PI_2)).unwrap();

        let mesh = TriMesh::new(
            vec![Vec3::new(2.0, 0.0, 0.0), Vec3::new(2.0, 0.5, 0.0), Vec3::new(2.0, 0.0, 0.5)],
            Vec::new(),
            vec![0, 1, 2],
        )
        .unwrap();
        controller.add_skinned_mesh(SkinnedMesh::rigid(mesh, 0).unwrap()).unwrap();
        controller.process().unwrap();

        let tip = controller.skinned_meshes()[0].mesh().vertices()[0];
        assert_relative_eq!(tip, Vec3::new(0.0, 2.0, 0.0), epsilon = EPSILON);
    }

    #[test]
    fn test_time_range_validation() {
        let mut controller = turning_controller(RepeatMode::Wrap);
        assert!(matches!(controller.set_time_range(0.0, 1.0), Err(AnimationError::NotProcessed)));
        controller.process().unwrap();

        assert!(matches!(
            controller.set_time_range(-1.0, 1.0),
            Err(AnimationError::TimeRangeOutOfBounds { .. })
        ));
        assert!(matches!(
            controller.set_time_range(1.5, 0.5),
            Err(AnimationError::InvalidTimeRange { .. })
        ));

        controller.set_time_range(0.5, 1.5).unwrap();
        controller.play().unwrap();
        controller.update(1.2).unwrap();
        // 0.5 + 1.2 = 1.7 wraps within [0.5, 1.5]
        assert_relative_eq!(controller.current_time(), 0.7, epsilon = EPSILON);
    }

    #[test]
    fn test_narrowing_time_range_reposes() {
        let mut controller = turning_controller(RepeatMode::Wrap);
        controller.add_skinned_mesh(pointer_mesh()).unwrap();
        controller.process().unwrap();
        assert_relative_eq!(controller.skinned_meshes()[0].mesh().vertices()[0], Vec3::new(1.0, 0.0, 0.0), epsilon = EPSILON);

        // Clock moves from 0 to 1, an eighth turn, without any update
        controller.set_time_range(1.0, 2.0).unwrap();
        assert_relative_eq!(controller.current_time(), 1.0, epsilon = EPSILON);
        let tip = controller.skinned_meshes()[0].mesh().vertices()[0];
        assert_relative_eq!(tip, Vec3::new(FRAC_PI_4.cos(), FRAC_PI_4.sin(), 0.0), epsilon = EPSILON);
    }

    #[test]
    fn test_add_mesh_checks_joint_range() {
        let mut controller = turning_controller(RepeatMode::Wrap);
        let mesh = pointer_mesh().into_mesh();
        let bad = SkinnedMesh::rigid(mesh, 3).unwrap();
        assert!(matches!(
            controller.add_skinned_mesh(bad),
            Err(AnimationError::JointOutOfRange { joint: 3, count: 1 })
        ));
    }
}
