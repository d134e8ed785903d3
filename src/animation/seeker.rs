use std::sync::Arc;

use glam::Vec2;

use super::keys::Timeline;
use crate::math::Rect2;
use crate::mesh::MeshTopology;
use crate::rig::NodeId;

/// What the evaluator reads from one node.
#[derive(Debug, Clone, Copy)]
pub struct SeekData<'a> {
    pub timeline: Option<&'a Timeline>,
    pub initial_center: Vec2,
    pub initial_rect: Rect2,
    pub grid_mesh: Option<&'a Arc<MeshTopology>>,
}

/// Read-only navigation over whatever tree stores the rig.
///
/// The evaluator never owns nodes; it walks them through this trait and
/// keeps its results keyed by [`NodeId`].
pub trait TreeSeeker {
    fn parent(&self, pos: NodeId) -> Option<NodeId>;
    fn first_child(&self, pos: NodeId) -> Option<NodeId>;
    fn prev_sibling(&self, pos: NodeId) -> Option<NodeId>;
    fn next_sibling(&self, pos: NodeId) -> Option<NodeId>;
    fn data(&self, pos: NodeId) -> Option<SeekData<'_>>;

    fn timeline(&self, pos: NodeId) -> Option<&Timeline> {
        self.data(pos)?.timeline
    }

    /// Ancestors of `pos`, nearest first, `pos` excluded.
    fn ancestors(&self, pos: NodeId) -> Ancestors<'_, Self> {
        Ancestors { seeker: self, current: self.parent(pos) }
    }
}

/// Depth-first walk of a subtree, parents before children.
pub struct PreOrder<'a, S: ?Sized> {
    seeker: &'a S,
    root: NodeId,
    next: Option<NodeId>,
}

impl<'a, S: TreeSeeker + ?Sized> PreOrder<'a, S> {
    #[must_use]
    pub fn new(seeker: &'a S, root: NodeId) -> Self {
        let next = seeker.data(root).map(|_| root);
        Self { seeker, root, next }
    }
}

impl<S: TreeSeeker + ?Sized> Iterator for PreOrder<'_, S> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.seeker.first_child(current).or_else(|| {
            let mut pos = current;
            loop {
                if pos == self.root {
                    return None;
                }
                if let Some(sibling) = self.seeker.next_sibling(pos) {
                    return Some(sibling);
                }
                pos = self.seeker.parent(pos)?;
            }
        });
        Some(current)
    }
}

pub struct Ancestors<'a, S: ?Sized> {
    seeker: &'a S,
    current: Option<NodeId>,
}

impl<S: TreeSeeker + ?Sized> Iterator for Ancestors<'_, S> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.current?;
        self.current = self.seeker.parent(current);
        Some(current)
    }
}
