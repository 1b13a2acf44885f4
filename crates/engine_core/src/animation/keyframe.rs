//! Sparse per-joint keyframe samples
//!
//! Samples arrive one channel at a time (rotation or translation for one
//! joint at one time). Samples at the same time share a [`PointInTime`], and
//! points stay sorted by time. After [`KeyframeTable::fill_holes`] every
//! point carries a rotation and translation for every joint.

use crate::foundation::math::{utils, Quat, Vec3};

use super::{AnimationError, AnimationResult};

/// Joint samples recorded at one instant
#[derive(Debug, Clone, PartialEq)]
pub struct PointInTime {
    /// Sample time
    pub time: f32,
    /// Per-joint translation, if recorded
    pub translations: Vec<Option<Vec3>>,
    /// Per-joint rotation, if recorded
    pub rotations: Vec<Option<Quat>>,
}

impl PointInTime {
    fn new(time: f32, joint_count: usize) -> Self {
        Self {
            time,
            translations: vec![None; joint_count],
            rotations: vec![None; joint_count],
        }
    }

    /// Translation for a joint; zero when missing
    pub fn translation(&self, joint: usize) -> Vec3 {
        self.translations[joint].unwrap_or_else(Vec3::zeros)
    }

    /// Rotation for a joint; identity when missing
    pub fn rotation(&self, joint: usize) -> Quat {
        self.rotations[joint].unwrap_or_else(Quat::identity)
    }

    /// Whether every joint has both channels
    pub fn is_complete(&self) -> bool {
        self.translations.iter().all(Option::is_some) && self.rotations.iter().all(Option::is_some)
    }
}

/// Time-sorted keyframe samples for a fixed number of joints
#[derive(Debug, Clone)]
pub struct KeyframeTable {
    joint_count: usize,
    points: Vec<PointInTime>,
}

impl KeyframeTable {
    /// Create an empty table
    pub fn new(joint_count: usize) -> Self {
        Self {
            joint_count,
            points: Vec::new(),
        }
    }

    /// Number of joints each point covers
    pub fn joint_count(&self) -> usize {
        self.joint_count
    }

    /// Number of distinct sample times
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether no samples have been added
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Points sorted by time ascending
    pub fn points(&self) -> &[PointInTime] {
        &self.points
    }

    /// Earliest and latest sample times
    pub fn time_bounds(&self) -> Option<(f32, f32)> {
        Some((self.points.first()?.time, self.points.last()?.time))
    }

    /// Record a rotation sample; replaces any earlier sample for the same
    /// joint and time
    pub fn add_rotation(&mut self, joint: usize, time: f32, rotation: Quat) -> AnimationResult<()> {
        self.point_at(joint, time)?.rotations[joint] = Some(rotation);
        Ok(())
    }

    /// Record a translation sample; replaces any earlier sample for the same
    /// joint and time
    pub fn add_translation(&mut self, joint: usize, time: f32, translation: Vec3) -> AnimationResult<()> {
        self.point_at(joint, time)?.translations[joint] = Some(translation);
        Ok(())
    }

    fn point_at(&mut self, joint: usize, time: f32) -> AnimationResult<&mut PointInTime> {
        if joint >= self.joint_count {
            return Err(AnimationError::JointOutOfRange {
                joint,
                count: self.joint_count,
            });
        }
        if !time.is_finite() {
            return Err(AnimationError::NonFiniteTime(time));
        }

        let slot = self.points.partition_point(|p| p.time < time);
        if self.points.get(slot).map_or(true, |p| p.time != time) {
            self.points.insert(slot, PointInTime::new(time, self.joint_count));
        }
        Ok(&mut self.points[slot])
    }

    /// Give every point a value for every joint and channel
    ///
    /// Leading gaps copy the first recorded sample, trailing gaps copy the
    /// last, interior gaps interpolate by time between the recorded
    /// neighbours, and a channel with no samples at all becomes identity.
    pub fn fill_holes(&mut self) {
        let times: Vec<f32> = self.points.iter().map(|p| p.time).collect();

        for joint in 0..self.joint_count {
            let mut translations: Vec<Option<Vec3>> = self.points.iter().map(|p| p.translations[joint]).collect();
            fill_channel(&times, &mut translations, Vec3::zeros(), |a, b, t| utils::lerp_vec3(a, b, t));

            let mut rotations: Vec<Option<Quat>> = self.points.iter().map(|p| p.rotations[joint]).collect();
            fill_channel(&times, &mut rotations, Quat::identity(), utils::slerp);

            for ((point, translation), rotation) in self.points.iter_mut().zip(translations).zip(rotations) {
                point.translations[joint] = translation;
                point.rotations[joint] = rotation;
            }
        }
    }

    /// Whether every point is complete
    pub fn is_filled(&self) -> bool {
        self.points.iter().all(PointInTime::is_complete)
    }

    /// Consecutive points `(then, now)` around `time` plus the fraction of
    /// the way from `then` to `now`
    ///
    /// `time` is clamped to the recorded range. A single point or a zero-length
    /// interval yields a fraction of zero. Returns `None` for an empty table.
    pub fn bracket(&self, time: f32) -> Option<(usize, usize, f32)> {
        let (min, max) = self.time_bounds()?;
        if self.points.len() == 1 {
            return Some((0, 0, 0.0));
        }

        let time = time.clamp(min, max);
        let now = self.points.partition_point(|p| p.time <= time).clamp(1, self.points.len() - 1);
        let then = now - 1;

        let span = self.points[now].time - self.points[then].time;
        let delta = if span > 0.0 {
            ((time - self.points[then].time) / span).clamp(0.0, 1.0)
        } else {
            0.0
        };
        Some((then, now, delta))
    }
}

fn fill_channel<T: Copy>(times: &[f32], samples: &mut [Option<T>], identity: T, blend: impl Fn(&T, &T, f32) -> T) {
    let known: Vec<usize> = samples
        .iter()
        .enumerate()
        .filter_map(|(i, s)| s.map(|_| i))
        .collect();

    let (Some(&first), Some(&last)) = (known.first(), known.last()) else {
        samples.iter_mut().for_each(|s| *s = Some(identity));
        return;
    };

    let head = samples[first];
    samples[..first].iter_mut().for_each(|s| *s = head);
    let tail = samples[last];
    samples[last + 1..].iter_mut().for_each(|s| *s = tail);

    for pair in known.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        if b - a < 2 {
            continue;
        }
        let (Some(va), Some(vb)) = (samples[a], samples[b]) else {
            continue;
        };
        let span = times[b] - times[a];
        for i in a + 1..b {
            let t = (times[i] - times[a]) / span;
            samples[i] = Some(blend(&va, &vb, t));
        }
    }
}
