//! Viewer data structures: scene graphs, transforms, bounds and animation.
//!
//! - `animation` holds keyframe clips and the player that drives them
//! - `bounds` is the axis-aligned bounding box used for centering and framing
//! - `instance` holds per-node transformation data and its packed GPU form
//! - `scene_graph` is the owned node hierarchy of a loaded model

pub mod animation;
pub mod bounds;
pub mod instance;
pub mod scene_graph;
