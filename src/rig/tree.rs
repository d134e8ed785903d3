use std::sync::Arc;

use glam::{Mat4, Vec2};
use log::{debug, warn};
use slotmap::{SlotMap, new_key_type};

use crate::animation::evaluator::FrameEvaluator;
use crate::animation::frame::TimeInfo;
use crate::animation::keys::{BindingCache, ImageArea, InfluenceCache, Timeline};
use crate::animation::seeker::{PreOrder, SeekData, TreeSeeker};
use crate::errors::Result;
use crate::math::Rect2;
use crate::mesh::MeshTopology;
use crate::rig::Skeleton;
use crate::settings::RigSettings;
use crate::skinning::{BoneWeightBuilder, WorkerPool};

new_key_type! {
    /// Stable handle of a node inside a [`RigTree`].
    pub struct NodeId;
}

/// One layer or folder of the rig.
#[derive(Debug, Clone, Default)]
pub struct RigNode {
    pub name: String,
    /// Animated nodes carry a timeline; plain grouping nodes do not.
    pub timeline: Option<Timeline>,
    pub initial_center: Vec2,
    pub initial_rect: Rect2,
    /// Mesh generated from the node's own image, if any.
    pub grid_mesh: Option<Arc<MeshTopology>>,

    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl RigNode {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Self::default() }
    }

    #[must_use]
    pub fn with_timeline(mut self, timeline: Timeline) -> Self {
        self.timeline = Some(timeline);
        self
    }

    #[must_use]
    pub fn with_initial_rect(mut self, rect: Rect2) -> Self {
        self.initial_rect = rect;
        self.initial_center = (rect.min + rect.max) * 0.5;
        self
    }

    #[must_use]
    pub fn with_grid_mesh(mut self, mesh: Arc<MeshTopology>) -> Self {
        self.grid_mesh = Some(mesh);
        self
    }

    #[must_use]
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    #[must_use]
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Offset from the top-left of the initial rect to the initial center.
    #[must_use]
    pub fn center_offset(&self) -> Vec2 {
        self.initial_center - self.initial_rect.min
    }
}

/// Arena-backed node tree used as the default storage behind
/// [`TreeSeeker`].
#[derive(Debug, Clone, Default)]
pub struct RigTree {
    nodes: SlotMap<NodeId, RigNode>,
    root: Option<NodeId>,
}

impl RigTree {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `node` as the last child of `parent`. Without a parent the
    /// node becomes the root, replacing the root slot if it was empty.
    pub fn add_node(&mut self, parent: Option<NodeId>, mut node: RigNode) -> NodeId {
        let parent = parent.filter(|p| self.nodes.contains_key(*p));
        node.parent = parent;
        node.children.clear();
        let id = self.nodes.insert(node);
        match parent {
            Some(p) => self.nodes[p].children.push(id),
            None => {
                if self.root.is_none() {
                    self.root = Some(id);
                }
            }
        }
        id
    }

    #[must_use]
    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[must_use]
    pub fn get(&self, id: NodeId) -> Option<&RigNode> {
        self.nodes.get(id)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut RigNode> {
        self.nodes.get_mut(id)
    }

    pub fn timeline_mut(&mut self, id: NodeId) -> Option<&mut Timeline> {
        self.nodes.get_mut(id)?.timeline.as_mut()
    }

    /// Sets the image key at `frame` on `node` and carries the deformations
    /// of the displaced mesh over to the new one. Falls back to the node's
    /// grid mesh when no mesh or image key precedes `frame`.
    pub fn replace_image(&mut self, node: NodeId, frame: i32, area: ImageArea, settings: &RigSettings) -> Result<usize> {
        let Some(rig_node) = self.nodes.get_mut(node) else {
            warn!("No node {node:?} to replace an image on");
            return Ok(0);
        };
        let default_mesh = rig_node.grid_mesh.clone();
        let Some(timeline) = rig_node.timeline.as_mut() else {
            warn!("Node {} has no timeline to key an image on", rig_node.name);
            return Ok(0);
        };
        timeline.replace_image(frame, area, default_mesh.as_ref(), settings)
    }

    /// True if `node` is `ancestor` or lies below it.
    #[must_use]
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent(id);
        }
        false
    }

    /// Rebuilds the influence and binding caches of the bone key at
    /// `key_frame` on `owner`, submitting one weight build per affected node.
    ///
    /// A node is affected if it lies under `owner`, has a mesh with vertices
    /// at `key_frame`, and is neither bound to a bone nor governed by a
    /// closer bone key. Returns the number of influence caches.
    pub fn reset_influence_caches(&mut self, owner: NodeId, key_frame: i32, pool: &WorkerPool) -> Result<usize> {
        let Some(key) = self.get(owner).and_then(|n| n.timeline.as_ref()).and_then(|t| t.bone.get(&key_frame)) else {
            warn!("No bone key at frame {key_frame} to rebuild caches for");
            return Ok(0);
        };
        let skeleton = key.data.skeleton.clone();
        let mut old: Vec<InfluenceCache> = key.data.caches().to_vec();
        let time = TimeInfo::at(key_frame);

        let tree: &Self = self;
        let mut targets = Vec::new();
        tree.collect_cache_targets(owner, owner, key_frame, &skeleton, &mut targets);

        let mut evaluator = FrameEvaluator::new();
        let mut caches = Vec::with_capacity(targets.len());
        for node in targets {
            let Some(mesh) = FrameEvaluator::area_mesh(tree, node, time.frame) else {
                continue;
            };
            let center = tree.get(node).map_or(Vec2::ZERO, RigNode::center_offset);
            let inner = evaluator.relative_matrix(tree, node, &time, Some(owner))
                * Mat4::from_translation(-center.extend(0.0));

            let influence = match old.iter().position(|c| c.node == node) {
                Some(i) => old.swap_remove(i).influence,
                None => Arc::new(BoneWeightBuilder::new(pool.clone())),
            };
            influence.allocate(mesh.vertex_count(), false);
            influence.write_async(&skeleton, inner, mesh.positions())?;
            caches.push(InfluenceCache { node, influence, inner, vertex_count: mesh.vertex_count() });
        }

        let mut bindings = Vec::new();
        for (index, (_, bone)) in skeleton.pre_order().enumerate() {
            for &node in &bone.binding_nodes {
                let inner = evaluator.relative_matrix(tree, node, &time, Some(owner));
                bindings.push(BindingCache { node, bone_index: index, inner });
            }
        }

        debug!("Reset bone key caches: {} influence, {} binding", caches.len(), bindings.len());
        let count = caches.len();
        if let Some(key) = self.timeline_mut(owner).and_then(|t| t.bone.get_mut(&key_frame)) {
            key.data.set_caches(owner, caches, bindings);
        }
        Ok(count)
    }

    fn collect_cache_targets(
        &self,
        node: NodeId,
        owner: NodeId,
        key_frame: i32,
        skeleton: &Skeleton,
        out: &mut Vec<NodeId>,
    ) {
        let Some(data) = self.get(node) else {
            return;
        };
        if let Some(timeline) = &data.timeline
            && let Some(area) = timeline.area_bone(key_frame.into())
            && (node != owner || area != key_frame)
        {
            return;
        }
        if skeleton.is_binding(node) {
            return;
        }
        let has_vertices =
            FrameEvaluator::area_mesh(self, node, key_frame.into()).is_some_and(|m| m.vertex_count() > 0);
        if has_vertices {
            out.push(node);
        }
        for &child in &data.children {
            self.collect_cache_targets(child, owner, key_frame, skeleton, out);
        }
    }

    /// Nodes below `root` (inclusive) in pre-order.
    #[must_use]
    pub fn pre_order(&self, root: NodeId) -> PreOrder<'_, Self> {
        PreOrder::new(self, root)
    }
}

impl TreeSeeker for RigTree {
    fn parent(&self, pos: NodeId) -> Option<NodeId> {
        self.nodes.get(pos)?.parent
    }

    fn first_child(&self, pos: NodeId) -> Option<NodeId> {
        self.nodes.get(pos)?.children.first().copied()
    }

    fn prev_sibling(&self, pos: NodeId) -> Option<NodeId> {
        let siblings = &self.nodes.get(self.parent(pos)?)?.children;
        let index = siblings.iter().position(|&c| c == pos)?;
        index.checked_sub(1).map(|i| siblings[i])
    }

    fn next_sibling(&self, pos: NodeId) -> Option<NodeId> {
        let siblings = &self.nodes.get(self.parent(pos)?)?.children;
        let index = siblings.iter().position(|&c| c == pos)?;
        siblings.get(index + 1).copied()
    }

    fn data(&self, pos: NodeId) -> Option<SeekData<'_>> {
        let node = self.nodes.get(pos)?;
        Some(SeekData {
            timeline: node.timeline.as_ref(),
            initial_center: node.initial_center,
            initial_rect: node.initial_rect,
            grid_mesh: node.grid_mesh.as_ref(),
        })
    }
}
