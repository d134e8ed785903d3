use glam::{Mat4, Vec2};
use serde::{Deserialize, Serialize};
use slotmap::{SlotMap, new_key_type};

use super::shape::BoneShape;
use super::tree::NodeId;
use crate::math;

new_key_type! {
    /// Stable handle of a bone inside a [`Skeleton`].
    pub struct BoneId;
}

/// One joint of a 2D skeleton.
///
/// Local placement is relative to the parent joint: `local_pos` is rotated
/// by the accumulated world angle. `rotate` is the animated part of the
/// angle, everything else is rest geometry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Bone {
    pub local_pos: Vec2,
    pub local_angle: f32,
    /// Capsule radii `(wing, axial)` at the root and the tail.
    pub range: [Vec2; 2],
    pub rotate: f32,
    pub shape: BoneShape,
    /// Nodes attached rigidly to this bone.
    pub binding_nodes: Vec<NodeId>,

    world_pos: Vec2,
    world_angle: f32,
    parent: Option<BoneId>,
    children: Vec<BoneId>,
}

impl Bone {
    #[must_use]
    pub fn new(range: [Vec2; 2]) -> Self {
        Self { range, ..Self::default() }
    }

    #[inline]
    #[must_use]
    pub fn world_pos(&self) -> Vec2 {
        self.world_pos
    }

    #[inline]
    #[must_use]
    pub fn world_angle(&self) -> f32 {
        self.world_angle
    }

    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<BoneId> {
        self.parent
    }

    #[inline]
    #[must_use]
    pub fn children(&self) -> &[BoneId] {
        &self.children
    }

    #[must_use]
    pub fn has_valid_range(&self) -> bool {
        self.range[0] != Vec2::ZERO || self.range[1] != Vec2::ZERO
    }

    #[must_use]
    pub fn blended_range(&self, rate: f32) -> Vec2 {
        self.range[0].lerp(self.range[1], rate)
    }

    #[must_use]
    pub fn is_binding(&self, node: NodeId) -> bool {
        self.binding_nodes.contains(&node)
    }

    /// Transform carrying this bone's current world placement onto
    /// `(to_pos, to_angle)`.
    #[must_use]
    pub fn transformation_matrix(&self, to_pos: Vec2, to_angle: f32) -> Mat4 {
        math::rigid_transform(self.world_pos, self.world_angle, to_pos, to_angle)
    }
}

/// A forest of bones with cached world transforms.
///
/// Cloning a skeleton keeps every [`BoneId`], so a posed copy can be matched
/// bone for bone against its rest skeleton.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Skeleton {
    bones: SlotMap<BoneId, Bone>,
    roots: Vec<BoneId>,
    shadow: bool,
}

impl Skeleton {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a bone under `parent` (or as a new root) and places it at
    /// `world_pos` using the parent's current world transform.
    pub fn add_bone(&mut self, parent: Option<BoneId>, world_pos: Vec2, range: [Vec2; 2]) -> BoneId {
        let parent = parent.filter(|p| self.bones.contains_key(*p));
        let mut bone = Bone::new(range);
        bone.parent = parent;
        let id = self.bones.insert(bone);
        match parent {
            Some(p) => self.bones[p].children.push(id),
            None => self.roots.push(id),
        }
        self.set_world_pos(id, world_pos);
        self.update_world_transform(id);
        id
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bones.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }

    #[must_use]
    pub fn roots(&self) -> &[BoneId] {
        &self.roots
    }

    #[must_use]
    pub fn get(&self, id: BoneId) -> Option<&Bone> {
        self.bones.get(id)
    }

    pub fn get_mut(&mut self, id: BoneId) -> Option<&mut Bone> {
        self.bones.get_mut(id)
    }

    /// True for posed copies produced by [`create_shadow`](Self::create_shadow).
    #[must_use]
    pub fn is_shadow(&self) -> bool {
        self.shadow
    }

    /// A posable copy sharing this skeleton's rest geometry and bone ids.
    #[must_use]
    pub fn create_shadow(&self) -> Self {
        Self { bones: self.bones.clone(), roots: self.roots.clone(), shadow: true }
    }

    /// Every bone, parents before children, roots in insertion order.
    #[must_use]
    pub fn pre_order(&self) -> PreOrderBones<'_> {
        let mut stack: Vec<BoneId> = self.roots.clone();
        stack.reverse();
        PreOrderBones { skeleton: self, stack }
    }

    /// Position of `id` in [`pre_order`](Self::pre_order).
    #[must_use]
    pub fn bone_index(&self, id: BoneId) -> Option<usize> {
        self.pre_order().position(|(b, _)| b == id)
    }

    /// First bone, in pre-order, that `node` is bound to.
    #[must_use]
    pub fn find_binder_bone(&self, node: NodeId) -> Option<BoneId> {
        self.pre_order().find(|(_, bone)| bone.is_binding(node)).map(|(id, _)| id)
    }

    #[must_use]
    pub fn is_binding(&self, node: NodeId) -> bool {
        self.find_binder_bone(node).is_some()
    }

    /// Recomputes world placement of `id` and its whole subtree.
    pub fn update_world_transform(&mut self, id: BoneId) {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let parent = self.bones.get(current).and_then(|b| b.parent);
            let parent_world = parent.and_then(|p| self.bones.get(p)).map(|p| (p.world_pos, p.world_angle));
            let Some(bone) = self.bones.get_mut(current) else {
                continue;
            };
            match parent_world {
                Some((ppos, pangle)) => {
                    bone.world_angle = pangle + bone.local_angle + bone.rotate;
                    bone.world_pos = ppos + math::rotate(bone.local_pos, bone.world_angle);
                }
                None => {
                    bone.world_pos = bone.local_pos;
                    bone.world_angle = bone.local_angle;
                }
            }
            stack.extend(bone.children.iter().rev().copied());
        }
    }

    pub fn update_all_world_transforms(&mut self) {
        for root in self.roots.clone() {
            self.update_world_transform(root);
        }
    }

    /// Sets the rest placement of `id` so that it lands on `world_pos`.
    /// Children are not updated.
    pub fn set_world_pos(&mut self, id: BoneId, world_pos: Vec2) {
        let parent_world = self.bones.get(id).and_then(|b| b.parent).and_then(|p| self.bones.get(p)).map(|p| (p.world_pos, p.world_angle));
        let Some(bone) = self.bones.get_mut(id) else {
            return;
        };
        if let Some((ppos, pangle)) = parent_world {
            let dir = world_pos - ppos;
            bone.local_pos = Vec2::new(dir.length(), 0.0);
            bone.local_angle = math::angle_diff(pangle, math::angle_of(dir)) - bone.rotate;
        } else {
            bone.local_pos = world_pos;
            bone.local_angle = -bone.rotate;
        }
    }

    /// Regenerates the influence shape of every bone from the current world
    /// placement. Root bones get an empty shape.
    pub fn rebuild_shapes(&mut self) {
        let ids: Vec<BoneId> = self.pre_order().map(|(id, _)| id).collect();
        for id in ids {
            let shape = self.compute_shape(id).unwrap_or_default();
            if let Some(bone) = self.bones.get_mut(id) {
                bone.shape = shape;
            }
        }
    }

    fn compute_shape(&self, id: BoneId) -> Option<BoneShape> {
        let bone = self.bones.get(id)?;
        let parent = self.bones.get(bone.parent?)?;
        if !bone.has_valid_range() {
            return None;
        }
        let start = parent.world_pos;
        let end = bone.world_pos;
        let parent_dir = parent
            .parent
            .and_then(|gp| self.bones.get(gp))
            .map_or(Vec2::ZERO, |gp| start - gp.world_pos);
        let child_dirs = bone.children.iter().filter_map(|c| self.bones.get(*c)).map(|c| c.world_pos - end);
        BoneShape::from_segment(start, end, bone.range, parent_dir, child_dirs)
    }
}

/// Depth-first iterator over a [`Skeleton`].
pub struct PreOrderBones<'a> {
    skeleton: &'a Skeleton,
    stack: Vec<BoneId>,
}

impl<'a> Iterator for PreOrderBones<'a> {
    type Item = (BoneId, &'a Bone);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(id) = self.stack.pop() {
            if let Some(bone) = self.skeleton.bones.get(id) {
                self.stack.extend(bone.children.iter().rev().copied());
                return Some((id, bone));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn placement_round_trips_through_world_transform() {
        let mut sk = Skeleton::new();
        let root = sk.add_bone(None, Vec2::new(1.0, 1.0), [Vec2::ZERO; 2]);
        let child = sk.add_bone(Some(root), Vec2::new(1.0, 5.0), [Vec2::ONE; 2]);
        let c = sk.get(child).expect("child");
        assert!((c.world_pos() - Vec2::new(1.0, 5.0)).length() < 1e-5);
        assert!((c.world_angle() - FRAC_PI_2).abs() < 1e-5);
    }

    #[test]
    fn rotate_swings_bone_around_its_parent() {
        let mut sk = Skeleton::new();
        let root = sk.add_bone(None, Vec2::ZERO, [Vec2::ZERO; 2]);
        let child = sk.add_bone(Some(root), Vec2::new(2.0, 0.0), [Vec2::ONE; 2]);
        if let Some(c) = sk.get_mut(child) {
            c.rotate = FRAC_PI_2;
        }
        sk.update_world_transform(root);
        let c = sk.get(child).expect("child");
        assert!((c.world_pos() - Vec2::new(0.0, 2.0)).length() < 1e-5, "got {}", c.world_pos());
    }
}
