//! Keyframe payloads and the per-node timeline.
//!
//! Each channel is an ordered map from whole frame to [`Key`]. Pose keys
//! belong to the bone key in force at their frame, FFD keys to the mesh
//! definition in force at theirs (a mesh key or an image key, whichever is
//! later); the owning key is recorded as [`Key::parent`].

use std::collections::BTreeMap;
use std::sync::Arc;

use glam::{Mat4, UVec2, Vec2, Vec3};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use super::easing::Easing;
use super::frame::Frame;
use crate::errors::Result;
use crate::mesh::{MeshTopology, TransitionCreator};
use crate::rig::{NodeId, Skeleton};
use crate::settings::RigSettings;
use crate::skinning::BoneWeightBuilder;

/// One keyframe of any channel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Key<T> {
    pub data: T,
    /// Curve used when blending from this key toward the next.
    pub easing: Easing,
    /// Frame of the owning key on the same timeline.
    pub parent: Option<i32>,
}

impl<T> Key<T> {
    #[must_use]
    pub fn new(data: T) -> Self {
        Self { data, easing: Easing::default(), parent: None }
    }

    #[must_use]
    pub fn with_easing(mut self, easing: Easing) -> Self {
        self.easing = easing;
        self
    }

    #[must_use]
    pub fn with_parent(mut self, parent: Option<i32>) -> Self {
        self.parent = parent;
        self
    }
}

pub type KeyMap<T> = BTreeMap<i32, Key<T>>;

/// Last key at or before the whole part of `frame`.
#[must_use]
pub fn last_key<T>(map: &KeyMap<T>, frame: Frame) -> Option<(i32, &Key<T>)> {
    map.range(..=frame.get()).next_back().map(|(&f, k)| (f, k))
}

// ============================================================================
// Transform & Opacity
// ============================================================================

/// How positions travel between two keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SplineType {
    Linear,
    #[default]
    CatmullRom,
}

/// Translation, rotation (radians around Z) and 2D scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SrtKey {
    pub pos: Vec3,
    pub rotate: f32,
    pub scale: Vec2,
    pub spline: SplineType,
}

impl Default for SrtKey {
    fn default() -> Self {
        Self { pos: Vec3::ZERO, rotate: 0.0, scale: Vec2::ONE, spline: SplineType::CatmullRom }
    }
}

impl SrtKey {
    #[must_use]
    pub fn from_pos(pos: Vec3) -> Self {
        Self { pos, ..Self::default() }
    }

    /// `T(pos) · Rz(rotate) · S(scale, 1)`
    #[must_use]
    pub fn local_matrix(&self) -> Mat4 {
        Mat4::from_translation(self.pos) * Mat4::from_rotation_z(self.rotate) * Mat4::from_scale(self.scale.extend(1.0))
    }

    /// Rotation and scale only.
    #[must_use]
    pub fn local_sr_matrix(&self) -> Mat4 {
        Mat4::from_rotation_z(self.rotate) * Mat4::from_scale(self.scale.extend(1.0))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OpaKey {
    pub opacity: f32,
}

impl Default for OpaKey {
    fn default() -> Self {
        Self { opacity: 1.0 }
    }
}

// ============================================================================
// Bone & Pose
// ============================================================================

/// Weight table of one node built against a bone key's skeleton.
#[derive(Debug, Clone)]
pub struct InfluenceCache {
    pub node: NodeId,
    pub influence: Arc<BoneWeightBuilder>,
    /// Node-local space to the owner's space, at the key's frame.
    pub inner: Mat4,
    /// Vertex count of the mesh the table was built for.
    pub vertex_count: usize,
}

/// A node attached rigidly to one bone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BindingCache {
    pub node: NodeId,
    /// Pre-order index of the bone in the key's skeleton.
    pub bone_index: usize,
    pub inner: Mat4,
}

/// Rest skeleton of a rig plus the derived per-node caches.
#[derive(Debug, Clone, Default)]
pub struct BoneKey {
    pub skeleton: Skeleton,
    caches: Vec<InfluenceCache>,
    binding_caches: Vec<BindingCache>,
    cache_owner: Option<NodeId>,
}

impl BoneKey {
    #[must_use]
    pub fn new(skeleton: Skeleton) -> Self {
        Self { skeleton, ..Self::default() }
    }

    #[must_use]
    pub fn caches(&self) -> &[InfluenceCache] {
        &self.caches
    }

    #[must_use]
    pub fn binding_caches(&self) -> &[BindingCache] {
        &self.binding_caches
    }

    /// Node whose world transform carries the skeleton.
    #[must_use]
    pub fn cache_owner(&self) -> Option<NodeId> {
        self.cache_owner
    }

    #[must_use]
    pub fn find_cache(&self, node: NodeId) -> Option<&InfluenceCache> {
        self.caches.iter().find(|c| c.node == node)
    }

    #[must_use]
    pub fn find_binding(&self, node: NodeId) -> Option<&BindingCache> {
        self.binding_caches.iter().find(|c| c.node == node)
    }

    pub(crate) fn set_caches(&mut self, owner: NodeId, caches: Vec<InfluenceCache>, bindings: Vec<BindingCache>) {
        self.cache_owner = Some(owner);
        self.caches = caches;
        self.binding_caches = bindings;
    }

    /// Drops every cache, cancelling outstanding builds.
    pub fn destroy_caches(&mut self) {
        for cache in self.caches.drain(..) {
            cache.influence.cancel();
        }
        self.binding_caches.clear();
    }
}

/// Posed copy of the owning bone key's skeleton. Only `rotate` differs.
#[derive(Debug, Clone, Default)]
pub struct PoseKey {
    pub skeleton: Skeleton,
}

impl PoseKey {
    /// A pose at rest for `origin`.
    #[must_use]
    pub fn from_origin(origin: &Skeleton) -> Self {
        Self { skeleton: origin.create_shadow() }
    }
}

// ============================================================================
// Mesh, FFD & Image
// ============================================================================

#[derive(Debug, Clone)]
pub struct MeshKey {
    pub mesh: Arc<MeshTopology>,
}

/// Deformed positions, one per vertex of the owning mesh.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FfdBuffer {
    pub positions: Vec<Vec3>,
}

impl FfdBuffer {
    #[must_use]
    pub fn new(positions: Vec<Vec3>) -> Self {
        Self { positions }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// Image placement of a node and the mesh generated from it.
#[derive(Debug, Clone)]
pub struct ImageArea {
    pub size: UVec2,
    pub offset: Vec2,
    pub grid_mesh: Arc<MeshTopology>,
}

// ============================================================================
// Timeline
// ============================================================================

/// Channels of one animated node.
#[derive(Debug, Clone, Default)]
pub struct Timeline {
    pub srt: KeyMap<SrtKey>,
    pub opa: KeyMap<OpaKey>,
    pub bone: KeyMap<BoneKey>,
    pub pose: KeyMap<PoseKey>,
    pub mesh: KeyMap<MeshKey>,
    pub ffd: KeyMap<FfdBuffer>,
    pub image: KeyMap<ImageArea>,
}

impl Timeline {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Frame of the bone key in force at `frame`.
    #[must_use]
    pub fn area_bone(&self, frame: Frame) -> Option<i32> {
        last_key(&self.bone, frame).map(|(f, _)| f)
    }

    /// Frame of the mesh key in force at `frame`.
    #[must_use]
    pub fn area_mesh_key(&self, frame: Frame) -> Option<i32> {
        last_key(&self.mesh, frame).map(|(f, _)| f)
    }

    /// Frame of the image key in force at `frame`.
    #[must_use]
    pub fn area_image(&self, frame: Frame) -> Option<i32> {
        last_key(&self.image, frame).map(|(f, _)| f)
    }

    /// Frame and mesh of the definition in force at `frame`: the later of the
    /// last mesh key and the last image key. A mesh key wins a tie.
    #[must_use]
    pub fn mesh_definition(&self, frame: Frame) -> Option<(i32, &Arc<MeshTopology>)> {
        let mesh = last_key(&self.mesh, frame);
        let image = last_key(&self.image, frame);
        match (mesh, image) {
            (Some((mf, _)), Some((imf, ik))) if imf > mf => Some((imf, &ik.data.grid_mesh)),
            (Some((mf, mk)), _) => Some((mf, &mk.data.mesh)),
            (None, Some((imf, ik))) => Some((imf, &ik.data.grid_mesh)),
            (None, None) => None,
        }
    }

    /// Owner recorded on FFD keys at `frame`; `None` stands for the node's
    /// own grid mesh.
    #[must_use]
    pub fn area_mesh_owner(&self, frame: Frame) -> Option<i32> {
        self.mesh_definition(frame).map(|(f, _)| f)
    }

    pub fn insert_srt(&mut self, frame: i32, data: SrtKey, easing: Easing) {
        self.srt.insert(frame, Key::new(data).with_easing(easing));
    }

    pub fn insert_opa(&mut self, frame: i32, opacity: f32, easing: Easing) {
        self.opa.insert(frame, Key::new(OpaKey { opacity }).with_easing(easing));
    }

    pub fn insert_bone(&mut self, frame: i32, skeleton: Skeleton) {
        self.bone.insert(frame, Key::new(BoneKey::new(skeleton)));
    }

    /// Inserts a pose owned by the bone key in force at `frame`.
    pub fn insert_pose(&mut self, frame: i32, pose: PoseKey, easing: Easing) {
        let parent = self.area_bone(frame.into());
        self.pose.insert(frame, Key::new(pose).with_easing(easing).with_parent(parent));
    }

    pub fn insert_mesh(&mut self, frame: i32, mesh: Arc<MeshTopology>) {
        self.mesh.insert(frame, Key::new(MeshKey { mesh }));
    }

    /// Inserts deformed positions owned by the mesh definition in force at
    /// `frame`.
    pub fn insert_ffd(&mut self, frame: i32, buffer: FfdBuffer, easing: Easing) {
        let parent = self.area_mesh_owner(frame.into());
        self.ffd.insert(frame, Key::new(buffer).with_easing(easing).with_parent(parent));
    }

    /// Inserts an image key as is. FFD keys of the mesh it displaces keep
    /// their owner; see [`replace_image`](Self::replace_image).
    pub fn insert_image(&mut self, frame: i32, area: ImageArea) {
        self.image.insert(frame, Key::new(area));
    }

    /// Sets the image key at `frame` and carries every FFD key owned by the
    /// mesh it displaces over to the new grid mesh.
    ///
    /// The displaced mesh is the definition in force at `frame` before the
    /// change, or `default_mesh` when there is none. Its FFD keys at or after
    /// `frame` are remapped through a transition from the old mesh to the
    /// new one and handed to the image key. Nothing is remapped when a mesh
    /// key on the same frame keeps priority. Returns the number of rewritten
    /// keys.
    pub fn replace_image(
        &mut self,
        frame: i32,
        area: ImageArea,
        default_mesh: Option<&Arc<MeshTopology>>,
        settings: &RigSettings,
    ) -> Result<usize> {
        let at = Frame::from(frame);
        let prev_owner = self.area_mesh_owner(at);
        let prev_mesh = self.mesh_definition(at).map(|(_, m)| Arc::clone(m)).or_else(|| default_mesh.cloned());
        let takes_over = !self.mesh.contains_key(&frame);

        let mut remapped = Vec::new();
        if takes_over && let Some(prev) = prev_mesh {
            let next = &area.grid_mesh;
            let transitions = TransitionCreator::with_settings(&prev, prev.origin, settings)
                .create(next.positions(), next.origin);
            for (&f, key) in self.ffd.range(frame..).filter(|(_, k)| k.parent == prev_owner) {
                let positions = if key.data.len() == prev.vertex_count() {
                    next.create_ffd(&key.data.positions, &transitions)?
                } else {
                    warn!("FFD key at {f} has {} positions for a mesh of {}; resetting", key.data.len(), prev.vertex_count());
                    next.positions().to_vec()
                };
                remapped.push((f, positions));
            }
        }

        self.image.insert(frame, Key::new(area));
        let count = remapped.len();
        for (f, positions) in remapped {
            if let Some(key) = self.ffd.get_mut(&f) {
                key.data.positions = positions;
                key.parent = Some(frame);
            }
        }
        debug!("Replaced image at frame {frame}, carried over {count} FFD keys");
        Ok(count)
    }
}
