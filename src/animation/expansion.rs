//! Per-node evaluation results.

use std::sync::Arc;

use glam::{Mat4, Vec2, Vec3};

use super::frame::Frame;
use super::spline::FergusonCoonsSpline;
use crate::mesh::MeshTopology;
use crate::rig::{NodeId, Skeleton};
use crate::skinning::{BoneWeightBuilder, SkinPalette};

/// Keyframe channels of a timeline, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyChannel {
    Srt,
    Opa,
    Bone,
    Pose,
    Mesh,
    Ffd,
    Image,
}

impl KeyChannel {
    pub const COUNT: usize = 7;

    pub const ALL: [Self; Self::COUNT] =
        [Self::Srt, Self::Opa, Self::Bone, Self::Pose, Self::Mesh, Self::Ffd, Self::Image];

    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// A key on a specific node's timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyRef {
    pub node: NodeId,
    pub frame: i32,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct SplineCache {
    pub frames: (i32, i32),
    pub spline: FergusonCoonsSpline<Vec3>,
}

/// Evaluated transform of one node.
#[derive(Debug, Clone)]
pub struct SrtExpansion {
    pub pos: Vec3,
    pub rotate: f32,
    pub scale: Vec2,
    /// World-space position of the node origin.
    pub centroid: Vec2,
    pub local_matrix: Mat4,
    pub world_matrix: Mat4,
    pub(crate) spline: Option<SplineCache>,
}

impl Default for SrtExpansion {
    fn default() -> Self {
        Self {
            pos: Vec3::ZERO,
            rotate: 0.0,
            scale: Vec2::ONE,
            centroid: Vec2::ZERO,
            local_matrix: Mat4::IDENTITY,
            world_matrix: Mat4::IDENTITY,
            spline: None,
        }
    }
}

/// Everything the evaluator resolved for one node at one frame.
#[derive(Debug, Clone)]
pub struct Expansion {
    pub srt: SrtExpansion,
    pub opacity: f32,
    pub world_opacity: f32,

    /// Nearest bone key in force, on this node or an ancestor.
    pub area_bone: Option<KeyRef>,
    /// Posed skeleton; empty without pose keys.
    pub pose: Skeleton,
    /// Bone key the pose belongs to, always on this node.
    pub pose_parent: Option<KeyRef>,
    /// Palette of the enclosing rigs, nearest rig first.
    pub pose_palette: SkinPalette,

    pub influence: Option<Arc<BoneWeightBuilder>>,
    /// Owner space to world.
    pub outer_matrix: Mat4,
    /// Node space to owner space.
    pub inner_matrix: Mat4,

    pub binding_root: Option<NodeId>,
    pub binder_bone_index: Option<usize>,
    pub binding_matrix: Mat4,
    pub is_under_binding: bool,
    pub is_affected_by_binding: bool,
    pub(crate) bound_world: Mat4,

    pub area_mesh: Option<Arc<MeshTopology>>,
    pub ffd: Vec<Vec3>,
    pub area_image: Option<i32>,

    pub(crate) key_stamps: [Option<Frame>; KeyChannel::COUNT],
    pub(crate) master_stamp: Option<Frame>,
}

impl Default for Expansion {
    fn default() -> Self {
        Self {
            srt: SrtExpansion::default(),
            opacity: 1.0,
            world_opacity: 1.0,
            area_bone: None,
            pose: Skeleton::default(),
            pose_parent: None,
            pose_palette: SkinPalette::default(),
            influence: None,
            outer_matrix: Mat4::IDENTITY,
            inner_matrix: Mat4::IDENTITY,
            binding_root: None,
            binder_bone_index: None,
            binding_matrix: Mat4::IDENTITY,
            is_under_binding: false,
            is_affected_by_binding: false,
            bound_world: Mat4::IDENTITY,
            area_mesh: None,
            ffd: Vec::new(),
            area_image: None,
            key_stamps: [None; KeyChannel::COUNT],
            master_stamp: None,
        }
    }
}

impl Expansion {
    /// World transform after any bone binding.
    #[must_use]
    pub fn world_matrix(&self) -> Mat4 {
        if self.is_affected_by_binding { self.bound_world } else { self.srt.world_matrix }
    }

    #[must_use]
    pub fn key_stamp(&self, channel: KeyChannel) -> Option<Frame> {
        self.key_stamps[channel.index()]
    }

    #[must_use]
    pub fn master_stamp(&self) -> Option<Frame> {
        self.master_stamp
    }

    pub(crate) fn is_fresh(&self, channel: KeyChannel, frame: Frame) -> bool {
        self.key_stamps[channel.index()] == Some(frame)
    }

    pub(crate) fn stamp(&mut self, channel: KeyChannel, frame: Frame) {
        self.key_stamps[channel.index()] = frame.is_cacheable().then_some(frame);
    }

    pub(crate) fn unstamp(&mut self, channel: KeyChannel) {
        self.key_stamps[channel.index()] = None;
    }

    pub(crate) fn reset_binding(&mut self) {
        self.influence = None;
        self.outer_matrix = Mat4::IDENTITY;
        self.inner_matrix = Mat4::IDENTITY;
        self.binding_root = None;
        self.binder_bone_index = None;
        self.binding_matrix = Mat4::IDENTITY;
        self.is_under_binding = false;
        self.is_affected_by_binding = false;
        self.bound_world = Mat4::IDENTITY;
    }
}
