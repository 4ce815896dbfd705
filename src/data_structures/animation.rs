//! Keyframe animation clips and their playback.
//!
//! A clip is a set of channels, each animating one property (translation,
//! rotation or scale) of one scene node. The [`AnimationPlayer`] plays every
//! clip of a model at once and loops them independently.

use cgmath::{InnerSpace, Quaternion, Vector3, VectorSpace};
use instant::Duration;

use crate::data_structures::scene_graph::{NodeId, SceneTree};

#[derive(Clone, Debug)]
pub enum Keyframes {
    Translation(Vec<Vector3<f32>>),
    Rotation(Vec<Quaternion<f32>>),
    Scale(Vec<Vector3<f32>>),
    // TODO: morph target weights
    Other,
}

impl Keyframes {
    fn len(&self) -> usize {
        match self {
            Keyframes::Translation(v) | Keyframes::Scale(v) => v.len(),
            Keyframes::Rotation(q) => q.len(),
            Keyframes::Other => 0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Interpolation {
    Step,
    #[default]
    Linear,
}

/// Animation of a single node property.
#[derive(Clone, Debug)]
pub struct Channel {
    pub node: NodeId,
    pub keyframes: Keyframes,
    pub timestamps: Vec<f32>,
    pub interpolation: Interpolation,
}

/// A named animation: a set of channels sharing one timeline.
#[derive(Clone, Debug)]
pub struct AnimationClip {
    pub name: String,
    pub channels: Vec<Channel>,
    duration: f32,
}

impl AnimationClip {
    pub fn new(name: impl Into<String>, channels: Vec<Channel>) -> Self {
        let duration = channels
            .iter()
            .filter_map(|channel| channel.timestamps.last().copied())
            .filter(|t| t.is_finite())
            .fold(0.0_f32, f32::max);
        Self {
            name: name.into(),
            channels,
            duration,
        }
    }

    pub fn duration(&self) -> f32 {
        self.duration
    }

    /// Writes the pose at `time` (seconds, already wrapped into the clip) to `scene`.
    pub fn apply(&self, time: f32, scene: &mut SceneTree) {
        for channel in &self.channels {
            let Some((from, to, alpha)) = locate(&channel.timestamps, channel.keyframes.len(), time)
            else {
                continue;
            };
            let alpha = match channel.interpolation {
                Interpolation::Step => 0.0,
                Interpolation::Linear => alpha,
            };
            let Some(node) = scene.node_mut(channel.node) else {
                log::warn!(
                    "Animation {} targets node {} which is not part of the scene.",
                    self.name,
                    channel.node
                );
                continue;
            };
            match &channel.keyframes {
                Keyframes::Translation(values) => {
                    node.local.position = values[from].lerp(values[to], alpha);
                }
                Keyframes::Rotation(values) => {
                    node.local.rotation = if from == to {
                        values[from]
                    } else {
                        values[from].slerp(values[to], alpha).normalize()
                    };
                }
                Keyframes::Scale(values) => {
                    node.local.scale = values[from].lerp(values[to], alpha);
                }
                Keyframes::Other => (),
            }
        }
    }
}

/**
 * Finds the keyframe pair around `time` and the blend factor between them.
 *
 * Only the first `min(timestamps, values)` keyframes are considered so tracks
 * with mismatching lengths can't index out of bounds. Times before the first
 * or after the last keyframe clamp to that keyframe.
 */
fn locate(timestamps: &[f32], values: usize, time: f32) -> Option<(usize, usize, f32)> {
    let len = timestamps.len().min(values);
    if len == 0 {
        return None;
    }
    let timestamps = &timestamps[..len];
    let next = timestamps.partition_point(|&t| t <= time);
    if next == 0 {
        return Some((0, 0, 0.0));
    }
    if next >= len {
        return Some((len - 1, len - 1, 0.0));
    }
    let (t0, t1) = (timestamps[next - 1], timestamps[next]);
    let span = t1 - t0;
    let alpha = if span > f32::EPSILON {
        ((time - t0) / span).clamp(0.0, 1.0)
    } else {
        0.0
    };
    Some((next - 1, next, alpha))
}

/// Plays all clips of a model simultaneously, looping each one.
#[derive(Debug)]
pub struct AnimationPlayer {
    clips: Vec<AnimationClip>,
    // f64 so the loop phase stays exact over long sessions
    time: f64,
}

impl AnimationPlayer {
    /// Returns `None` when there is nothing to play.
    pub fn new(clips: Vec<AnimationClip>) -> Option<Self> {
        if clips.is_empty() {
            return None;
        }
        Some(Self { clips, time: 0.0 })
    }

    pub fn advance(&mut self, dt: Duration, scene: &mut SceneTree) {
        self.time += dt.as_secs_f64();
        for clip in &self.clips {
            let local_time = if clip.duration() > 0.0 {
                (self.time % f64::from(clip.duration())) as f32
            } else {
                0.0
            };
            clip.apply(local_time, scene);
        }
    }

    /// Seconds played since the player was created.
    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn clip_names(&self) -> Vec<String> {
        self.clips.iter().map(|clip| clip.name.clone()).collect()
    }
}
