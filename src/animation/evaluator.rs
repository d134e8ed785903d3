//! Frame evaluation over a keyframed rig tree.
//!
//! [`FrameEvaluator::update`] resolves every channel of every node below a
//! root for one point in time and keeps the results as [`Expansion`]s. Two
//! independent snapshots exist so that an editor can evaluate a scratch
//! frame without disturbing the frame being displayed.
//!
//! Results are stamped per channel with the frame they were computed for.
//! A node whose whole subtree is current carries a master stamp and is
//! skipped entirely; [`clear_caches`](FrameEvaluator::clear_caches) drops
//! the stamps after an edit.

use std::iter;
use std::sync::Arc;

use glam::{Mat4, Vec2, Vec3};
use log::{debug, trace, warn};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use super::expansion::{Expansion, KeyChannel, KeyRef, SplineCache};
use super::frame::{Frame, TimeInfo};
use super::gatherer::{ForceParent, KeyGatherer};
use super::keys::{BoneKey, InfluenceCache, SplineType, SrtKey, Timeline};
use super::seeker::{PreOrder, TreeSeeker};
use super::spline::FergusonCoonsSpline;
use super::values::blend_buffers;
use crate::math;
use crate::mesh::MeshTopology;
use crate::rig::{BoneId, NodeId, Skeleton};
use crate::skinning::{BoneWeightBuilder, PosePair, SkinPalette};

/// Which result set an evaluation writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Snapshot {
    /// The frame on display.
    #[default]
    Current,
    /// Scratch evaluations such as cache rebuilds.
    Working,
}

impl Snapshot {
    #[inline]
    const fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Default)]
pub struct FrameEvaluator {
    stores: [FxHashMap<NodeId, Expansion>; 2],
}

/// Bone key in force while walking down, and the binding being inherited.
#[derive(Clone, Copy)]
struct Scope {
    key: Option<KeyRef>,
    owner_world: Mat4,
    binding: Option<(NodeId, Mat4)>,
}

struct InfluenceResult {
    node: NodeId,
    influence: Option<Arc<BoneWeightBuilder>>,
    outer_matrix: Mat4,
    inner_matrix: Mat4,
    binding_root: Option<NodeId>,
    binder_bone_index: Option<usize>,
    binding_matrix: Mat4,
    is_under_binding: bool,
    bound_world: Option<Mat4>,
}

impl FrameEvaluator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn expansion(&self, node: NodeId, snapshot: Snapshot) -> Option<&Expansion> {
        self.stores[snapshot.index()].get(&node)
    }

    pub fn expansions(&self, snapshot: Snapshot) -> impl Iterator<Item = (NodeId, &Expansion)> {
        self.stores[snapshot.index()].iter().map(|(&id, e)| (id, e))
    }

    /// Drops every result in both snapshots.
    pub fn clear(&mut self) {
        for store in &mut self.stores {
            store.clear();
        }
    }

    /// Evaluates the subtree under `root` at `time`.
    pub fn update<S: TreeSeeker + ?Sized>(&mut self, seeker: &S, root: NodeId, time: &TimeInfo, snapshot: Snapshot) {
        let mut visited = Vec::new();
        self.walk(seeker, root, time, snapshot, &mut visited);
        self.update_palettes(seeker, root, snapshot);
        self.update_influences(seeker, root, snapshot);

        if time.frame.is_cacheable() {
            let store = &mut self.stores[snapshot.index()];
            for node in &visited {
                if let Some(e) = store.get_mut(node) {
                    e.master_stamp = Some(time.frame);
                }
            }
        }
        trace!("Evaluated {} nodes at frame {:.3}", visited.len(), time.frame.decimal());
    }

    /// SRT world matrix of `node`, evaluated on demand in the working
    /// snapshot.
    pub fn world_matrix<S: TreeSeeker + ?Sized>(&mut self, seeker: &S, node: NodeId, time: &TimeInfo) -> Mat4 {
        self.ensure_srt(seeker, node, time, Snapshot::Working)
    }

    /// Product of the local matrices from `node` up to, but excluding,
    /// `ancestor`. Without an ancestor this is the world matrix. Identity
    /// when `ancestor` is not above `node`.
    pub fn relative_matrix<S: TreeSeeker + ?Sized>(
        &mut self,
        seeker: &S,
        node: NodeId,
        time: &TimeInfo,
        ancestor: Option<NodeId>,
    ) -> Mat4 {
        let mut result = Mat4::IDENTITY;
        let mut current = Some(node);
        while let Some(id) = current {
            if Some(id) == ancestor {
                return result;
            }
            if seeker.timeline(id).is_some() {
                self.ensure_srt(seeker, id, time, Snapshot::Working);
                let local = self.stores[Snapshot::Working.index()]
                    .get(&id)
                    .map_or(Mat4::IDENTITY, |e| e.srt.local_matrix);
                result = local * result;
            }
            current = seeker.parent(id);
        }
        if ancestor.is_some() { Mat4::IDENTITY } else { result }
    }

    /// Drops the results of `node` and its subtree in both snapshots and
    /// the master stamps of its ancestors.
    pub fn clear_caches<S: TreeSeeker + ?Sized>(&mut self, seeker: &S, node: NodeId) {
        let subtree: Vec<NodeId> = PreOrder::new(seeker, node).collect();
        for store in &mut self.stores {
            for id in &subtree {
                store.remove(id);
            }
        }
        self.clear_master_stamps(seeker, node);
        debug!("Cleared evaluation caches of {} nodes", subtree.len());
    }

    /// Drops the results of `node`. Descendants keep their own channels but
    /// recompose what they inherit: transform, opacity and bone area.
    pub fn clear_node_caches<S: TreeSeeker + ?Sized>(&mut self, seeker: &S, node: NodeId) {
        let descendants: Vec<NodeId> = PreOrder::new(seeker, node).skip(1).collect();
        for store in &mut self.stores {
            store.remove(&node);
            for id in &descendants {
                if let Some(e) = store.get_mut(id) {
                    e.master_stamp = None;
                    for channel in [KeyChannel::Srt, KeyChannel::Opa, KeyChannel::Bone] {
                        e.unstamp(channel);
                    }
                }
            }
        }
        self.clear_master_stamps(seeker, node);
    }

    fn clear_master_stamps<S: TreeSeeker + ?Sized>(&mut self, seeker: &S, node: NodeId) {
        for ancestor in seeker.ancestors(node) {
            for store in &mut self.stores {
                if let Some(e) = store.get_mut(&ancestor) {
                    e.master_stamp = None;
                }
            }
        }
    }

    // ========================================================================
    // Static resolution
    // ========================================================================

    /// Rest transform of a node without transform keys: its initial center
    /// relative to the nearest animated ancestor.
    #[must_use]
    pub fn default_srt<S: TreeSeeker + ?Sized>(seeker: &S, node: NodeId) -> SrtKey {
        let Some(data) = seeker.data(node) else {
            return SrtKey::default();
        };
        let base = seeker
            .ancestors(node)
            .filter_map(|a| seeker.data(a))
            .find(|d| d.timeline.is_some())
            .map_or(Vec2::ZERO, |d| d.initial_center);
        SrtKey::from_pos((data.initial_center - base).extend(0.0))
    }

    /// Mesh in force at `frame`: the later of the last mesh key and the
    /// last image key, else the node's own grid mesh.
    #[must_use]
    pub fn area_mesh<S: TreeSeeker + ?Sized>(seeker: &S, node: NodeId, frame: Frame) -> Option<Arc<MeshTopology>> {
        let data = seeker.data(node)?;
        data.timeline
            .and_then(|t| t.mesh_definition(frame))
            .map(|(_, mesh)| Arc::clone(mesh))
            .or_else(|| data.grid_mesh.cloned())
    }

    /// Bone key in force at `frame` on `node` or its nearest ancestor that
    /// has one.
    #[must_use]
    pub fn area_bone<S: TreeSeeker + ?Sized>(seeker: &S, node: NodeId, frame: Frame) -> Option<KeyRef> {
        iter::once(node)
            .chain(seeker.ancestors(node))
            .find_map(|n| seeker.timeline(n)?.area_bone(frame).map(|f| KeyRef { node: n, frame: f }))
    }

    // ========================================================================
    // Channel walk
    // ========================================================================

    fn walk<S: TreeSeeker + ?Sized>(
        &mut self,
        seeker: &S,
        node: NodeId,
        time: &TimeInfo,
        snapshot: Snapshot,
        visited: &mut Vec<NodeId>,
    ) {
        let fresh = self.stores[snapshot.index()]
            .get(&node)
            .is_some_and(|e| e.master_stamp == Some(time.frame));
        if fresh {
            return;
        }
        self.evaluate_node(seeker, node, time, snapshot);
        visited.push(node);

        let mut child = seeker.first_child(node);
        while let Some(c) = child {
            self.walk(seeker, c, time, snapshot, visited);
            child = seeker.next_sibling(c);
        }
    }

    fn evaluate_node<S: TreeSeeker + ?Sized>(&mut self, seeker: &S, node: NodeId, time: &TimeInfo, snapshot: Snapshot) {
        self.ensure_srt(seeker, node, time, snapshot);
        self.ensure_opacity(seeker, node, time, snapshot);

        let frame = time.frame;
        let timeline = seeker.timeline(node);
        let entry = self.stores[snapshot.index()].entry(node).or_default();

        if !entry.is_fresh(KeyChannel::Bone, frame) {
            entry.area_bone = Self::area_bone(seeker, node, frame);
            entry.stamp(KeyChannel::Bone, frame);
        }

        if !entry.is_fresh(KeyChannel::Pose, frame) {
            let own_bone = timeline.and_then(|t| t.area_bone(frame));
            let pose = timeline.zip(own_bone).and_then(|(t, bone)| blend_pose(t, bone, time));
            match (pose, own_bone) {
                (Some(pose), Some(bone)) => {
                    entry.pose = pose;
                    entry.pose_parent = Some(KeyRef { node, frame: bone });
                }
                _ => {
                    entry.pose = Skeleton::default();
                    entry.pose_parent = None;
                }
            }
            entry.stamp(KeyChannel::Pose, frame);
        }

        if !entry.is_fresh(KeyChannel::Mesh, frame) {
            entry.area_mesh = Self::area_mesh(seeker, node, frame);
            entry.stamp(KeyChannel::Mesh, frame);
        }

        if !entry.is_fresh(KeyChannel::Ffd, frame) {
            entry.ffd = blend_ffd(timeline, entry.area_mesh.as_deref(), time);
            entry.stamp(KeyChannel::Ffd, frame);
        }

        if !entry.is_fresh(KeyChannel::Image, frame) {
            entry.area_image = timeline.and_then(|t| t.area_image(frame));
            entry.stamp(KeyChannel::Image, frame);
        }
    }

    /// Brings the transform of `node` and its ancestors up to date and
    /// returns its SRT world matrix.
    fn ensure_srt<S: TreeSeeker + ?Sized>(&mut self, seeker: &S, node: NodeId, time: &TimeInfo, snapshot: Snapshot) -> Mat4 {
        if let Some(e) = self.stores[snapshot.index()].get(&node)
            && e.is_fresh(KeyChannel::Srt, time.frame)
        {
            return e.srt.world_matrix;
        }

        let parent_world = seeker
            .parent(node)
            .map_or(Mat4::IDENTITY, |p| self.ensure_srt(seeker, p, time, snapshot));

        let entry = self.stores[snapshot.index()].entry(node).or_default();
        let srt = match seeker.timeline(node) {
            Some(timeline) => blend_srt(seeker, node, timeline, time, &mut entry.srt.spline),
            None => SrtKey::default(),
        };
        let local = if seeker.timeline(node).is_some() { srt.local_matrix() } else { Mat4::IDENTITY };
        let world = parent_world * local;

        entry.srt.pos = srt.pos;
        entry.srt.rotate = srt.rotate;
        entry.srt.scale = srt.scale;
        entry.srt.local_matrix = local;
        entry.srt.world_matrix = world;
        entry.srt.centroid = world.w_axis.truncate().truncate();
        entry.stamp(KeyChannel::Srt, time.frame);
        world
    }

    fn ensure_opacity<S: TreeSeeker + ?Sized>(&mut self, seeker: &S, node: NodeId, time: &TimeInfo, snapshot: Snapshot) -> f32 {
        if let Some(e) = self.stores[snapshot.index()].get(&node)
            && e.is_fresh(KeyChannel::Opa, time.frame)
        {
            return e.world_opacity;
        }

        let parent_opacity = seeker
            .parent(node)
            .map_or(1.0, |p| self.ensure_opacity(seeker, p, time, snapshot));
        let opacity = seeker.timeline(node).map_or(1.0, |t| blend_opacity(t, time));

        let entry = self.stores[snapshot.index()].entry(node).or_default();
        entry.opacity = opacity;
        entry.world_opacity = parent_opacity * opacity;
        entry.stamp(KeyChannel::Opa, time.frame);
        entry.world_opacity
    }

    // ========================================================================
    // Palettes & influence
    // ========================================================================

    fn update_palettes<S: TreeSeeker + ?Sized>(&mut self, seeker: &S, root: NodeId, snapshot: Snapshot) {
        let store = &self.stores[snapshot.index()];
        let palettes: Vec<(NodeId, SkinPalette)> = PreOrder::new(seeker, root)
            .map(|node| {
                let mut pairs: SmallVec<[PosePair<'_>; 4]> = SmallVec::new();
                for holder in iter::once(node).chain(seeker.ancestors(node)) {
                    let Some(e) = store.get(&holder) else {
                        continue;
                    };
                    if let Some(key) = e.pose_parent
                        && let Some(bone_key) = find_bone_key(seeker, key)
                    {
                        pairs.push(PosePair { origin: &bone_key.skeleton, pose: &e.pose });
                    }
                }
                let mut palette = SkinPalette::new();
                if !pairs.is_empty() {
                    palette.build(&pairs);
                }
                (node, palette)
            })
            .collect();

        let store = &mut self.stores[snapshot.index()];
        for (node, palette) in palettes {
            if let Some(e) = store.get_mut(&node) {
                e.pose_palette = palette;
            }
        }
    }

    fn update_influences<S: TreeSeeker + ?Sized>(&mut self, seeker: &S, root: NodeId, snapshot: Snapshot) {
        let store = &self.stores[snapshot.index()];
        let scope = enclosing_scope(seeker, store, root);
        let mut results = Vec::new();
        collect_influences(seeker, store, root, scope, &mut results);

        let store = &mut self.stores[snapshot.index()];
        for r in results {
            let Some(e) = store.get_mut(&r.node) else {
                continue;
            };
            e.reset_binding();
            e.influence = r.influence;
            e.outer_matrix = r.outer_matrix;
            e.inner_matrix = r.inner_matrix;
            e.binding_root = r.binding_root;
            e.binder_bone_index = r.binder_bone_index;
            e.binding_matrix = r.binding_matrix;
            e.is_under_binding = r.is_under_binding;
            if let Some(bound) = r.bound_world {
                e.is_affected_by_binding = true;
                e.bound_world = bound;
            }
        }
    }
}

fn find_bone_key<S: TreeSeeker + ?Sized>(seeker: &S, key: KeyRef) -> Option<&BoneKey> {
    seeker.timeline(key.node)?.bone.get(&key.frame).map(|k| &k.data)
}

/// A table built for another mesh would index past or short of the
/// vertices on display.
fn cache_fits(cache: &InfluenceCache, expansion: Option<&Expansion>) -> bool {
    let vertex_count = expansion.and_then(|e| e.area_mesh.as_ref()).map_or(0, |m| m.vertex_count());
    let fits = cache.vertex_count == vertex_count;
    if !fits {
        warn!(
            "Influence cache of {:?} covers {} vertices, mesh has {vertex_count}; skipping",
            cache.node, cache.vertex_count
        );
    }
    fits
}

/// Scope in force just above `root`, read from results already stored for
/// its ancestors.
fn enclosing_scope<S: TreeSeeker + ?Sized>(seeker: &S, store: &FxHashMap<NodeId, Expansion>, root: NodeId) -> Scope {
    let mut scope = Scope { key: None, owner_world: Mat4::IDENTITY, binding: None };
    if let Some(parent) = seeker.parent(root).and_then(|p| store.get(&p))
        && parent.is_affected_by_binding
        && let Some(binding_root) = parent.binding_root
    {
        scope.binding = Some((binding_root, parent.bound_world * parent.srt.world_matrix.inverse()));
    }
    for ancestor in seeker.ancestors(root) {
        if let Some(e) = store.get(&ancestor)
            && let Some(key) = e.pose_parent
        {
            scope.key = Some(key);
            scope.owner_world = e.world_matrix();
            break;
        }
    }
    scope
}

fn collect_influences<S: TreeSeeker + ?Sized>(
    seeker: &S,
    store: &FxHashMap<NodeId, Expansion>,
    node: NodeId,
    mut scope: Scope,
    out: &mut Vec<InfluenceResult>,
) {
    let expansion = store.get(&node);
    let srt_world = expansion.map_or(Mat4::IDENTITY, |e| e.srt.world_matrix);
    let mut result = InfluenceResult {
        node,
        influence: None,
        outer_matrix: Mat4::IDENTITY,
        inner_matrix: Mat4::IDENTITY,
        binding_root: None,
        binder_bone_index: None,
        binding_matrix: Mat4::IDENTITY,
        is_under_binding: false,
        bound_world: None,
    };
    let key_in_scope = scope.key.and_then(|k| find_bone_key(seeker, k).map(|b| (k, b)));

    match scope.binding {
        Some((root, rebase)) => {
            result.binding_root = Some(root);
            result.is_under_binding = true;
            result.bound_world = Some(rebase * srt_world);
        }
        None => {
            if let Some((key, bone_key)) = key_in_scope
                && let Some(binding) = bone_key.find_binding(node)
            {
                let palette = store.get(&key.node).map_or(Mat4::IDENTITY, |e| e.pose_palette.matrix(binding.bone_index));
                let outer = scope.owner_world * palette;
                let bound = outer * binding.inner;
                result.outer_matrix = outer;
                result.binding_matrix = binding.inner;
                result.binder_bone_index = Some(binding.bone_index);
                result.binding_root = Some(node);
                result.bound_world = Some(bound);
                scope.binding = Some((node, bound * srt_world.inverse()));
            }
        }
    }

    if result.binding_root != Some(node)
        && let Some((_, bone_key)) = key_in_scope
        && let Some(cache) = bone_key.find_cache(node).filter(|c| cache_fits(c, expansion))
    {
        result.influence = Some(Arc::clone(&cache.influence));
        result.outer_matrix = scope.owner_world;
        result.inner_matrix = cache.inner;
    }

    let world = result.bound_world.unwrap_or(srt_world);
    if let Some(key) = expansion.and_then(|e| e.pose_parent) {
        scope.key = Some(key);
        scope.owner_world = world;
        // the node's own rig may also weight its mesh
        if result.influence.is_none()
            && result.binding_root != Some(node)
            && let Some(cache) = find_bone_key(seeker, key)
                .and_then(|b| b.find_cache(node))
                .filter(|c| cache_fits(c, expansion))
        {
            result.influence = Some(Arc::clone(&cache.influence));
            result.outer_matrix = world;
            result.inner_matrix = cache.inner;
        }
    }
    out.push(result);

    let mut child = seeker.first_child(node);
    while let Some(c) = child {
        collect_influences(seeker, store, c, scope, out);
        child = seeker.next_sibling(c);
    }
}

// ============================================================================
// Channel blending
// ============================================================================

fn blend_srt<S: TreeSeeker + ?Sized>(
    seeker: &S,
    node: NodeId,
    timeline: &Timeline,
    time: &TimeInfo,
    cache: &mut Option<SplineCache>,
) -> SrtKey {
    let gather = KeyGatherer::gather(&timeline.srt, time, ForceParent::None);
    if gather.is_empty() {
        return FrameEvaluator::default_srt(seeker, node);
    }
    if gather.has_same_frame() || gather.is_single() {
        return gather.single_point().map_or_else(|| FrameEvaluator::default_srt(seeker, node), |p| p.key.data);
    }
    let (Some(p0), Some(p1), Some(t)) = (gather.point(0), gather.point(1), gather.blend_ratio()) else {
        return FrameEvaluator::default_srt(seeker, node);
    };
    let (k0, k1) = (&p0.key.data, &p1.key.data);

    let frames = (p0.frame, p1.frame);
    let spline = match cache {
        Some(c) if c.frames == frames => c.spline,
        _ => {
            let spline = position_spline(&gather);
            *cache = Some(SplineCache { frames, spline });
            spline
        }
    };

    SrtKey {
        pos: spline.get_by_linear(t),
        rotate: k0.rotate + (k1.rotate - k0.rotate) * t,
        scale: k0.scale.lerp(k1.scale, t),
        spline: k0.spline,
    }
}

/// Catmull-Rom segment between points 0 and 1. A missing outer neighbour
/// mirrors the other end's velocity across the segment direction.
fn position_spline(gather: &KeyGatherer<'_, SrtKey>) -> FergusonCoonsSpline<Vec3> {
    let pos = |i: i32| gather.point(i).map(|p| p.key.data);
    let (Some(a), Some(b)) = (pos(0), pos(1)) else {
        return FergusonCoonsSpline::new(Vec3::ZERO, Vec3::ZERO, Vec3::ZERO, Vec3::ZERO);
    };
    let before = pos(-1).filter(|_| a.spline != SplineType::Linear).map(|k| k.pos);
    let after = pos(2).filter(|_| b.spline != SplineType::Linear).map(|k| k.pos);

    let (k1, k2) = (a.pos, b.pos);
    let linear = k2 - k1;
    let axis = linear.normalize_or_zero();
    let (v0, v1) = match (before, after) {
        (None, None) => (linear, linear),
        (None, Some(k3)) => {
            let v1 = 0.5 * (k3 - k1);
            (math::reflect_across_axis(axis, v1), v1)
        }
        (Some(k0), None) => {
            let v0 = 0.5 * (k2 - k0);
            (v0, math::reflect_across_axis(axis, v0))
        }
        (Some(k0), Some(k3)) => (0.5 * (k2 - k0), 0.5 * (k3 - k1)),
    };
    FergusonCoonsSpline::new(k1, k2, v0, v1)
}

fn blend_opacity(timeline: &Timeline, time: &TimeInfo) -> f32 {
    let gather = KeyGatherer::gather(&timeline.opa, time, ForceParent::None);
    if gather.is_empty() {
        return 1.0;
    }
    if gather.has_same_frame() || gather.is_single() {
        return gather.single_point().map_or(1.0, |p| p.key.data.opacity);
    }
    match (gather.point(0), gather.point(1), gather.blend_ratio()) {
        (Some(p0), Some(p1), Some(t)) => {
            let (a, b) = (p0.key.data.opacity, p1.key.data.opacity);
            a + (b - a) * t
        }
        _ => 1.0,
    }
}

/// Pose of the rig owned by the bone key at `area_bone`. Bones are matched
/// between keys by pre-order position; only `rotate` is blended.
fn blend_pose(timeline: &Timeline, area_bone: i32, time: &TimeInfo) -> Option<Skeleton> {
    let gather = KeyGatherer::gather(&timeline.pose, time, ForceParent::Assigned(Some(area_bone)));
    if gather.is_empty() {
        return None;
    }
    if gather.has_same_frame() || gather.is_single() {
        return gather.single_point().map(|p| p.key.data.skeleton.clone());
    }
    let (p0, p1, t) = (gather.point(0)?, gather.point(1)?, gather.blend_ratio()?);

    let mut pose = p0.key.data.skeleton.clone();
    let ids: Vec<BoneId> = pose.pre_order().map(|(id, _)| id).collect();
    let targets = p1.key.data.skeleton.pre_order().map(|(_, b)| b.rotate);
    for (id, target) in ids.into_iter().zip(targets) {
        if let Some(bone) = pose.get_mut(id) {
            bone.rotate += (target - bone.rotate) * t;
        }
    }
    pose.update_all_world_transforms();
    Some(pose)
}

fn blend_ffd(timeline: Option<&Timeline>, mesh: Option<&MeshTopology>, time: &TimeInfo) -> Vec<Vec3> {
    let Some(mesh) = mesh.filter(|m| m.vertex_count() > 0) else {
        return Vec::new();
    };
    let Some(timeline) = timeline else {
        return mesh.positions().to_vec();
    };

    let owner = timeline.area_mesh_owner(time.frame);
    let gather = KeyGatherer::gather(&timeline.ffd, time, ForceParent::Assigned(owner));
    let matches_mesh = |len: usize| {
        let ok = len == mesh.vertex_count();
        if !ok {
            warn!("FFD key has {len} positions for a mesh of {} vertices", mesh.vertex_count());
        }
        ok
    };

    if gather.is_empty() {
        return mesh.positions().to_vec();
    }
    if gather.has_same_frame() || gather.is_single() {
        return match gather.single_point() {
            Some(p) if matches_mesh(p.key.data.len()) => p.key.data.positions.clone(),
            _ => mesh.positions().to_vec(),
        };
    }
    match (gather.point(0), gather.point(1), gather.blend_ratio()) {
        (Some(p0), Some(p1), Some(t)) if matches_mesh(p0.key.data.len()) && matches_mesh(p1.key.data.len()) => {
            let mut out = Vec::with_capacity(mesh.vertex_count());
            blend_buffers(&mut out, &p0.key.data.positions, &p1.key.data.positions, t);
            out
        }
        _ => mesh.positions().to_vec(),
    }
}
