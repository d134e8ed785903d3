use glam::Vec2;

use super::{Rect2, Triangle2};

const DEFAULT_MAX_DEPTH: u32 = 10;

#[derive(Debug, Clone)]
struct Object<T> {
    data: T,
    tri: Triangle2,
    bounds: Rect2,
}

#[derive(Debug, Clone)]
struct Node {
    bounds: Rect2,
    children: Option<[usize; 2]>,
    objects: Vec<usize>,
}

impl Node {
    fn new(bounds: Rect2) -> Self {
        Self { bounds, children: None, objects: Vec::new() }
    }
}

/// Binary space partition of triangles for point location.
///
/// Nodes and objects live in flat arenas and refer to each other by index.
/// Each split halves the longer side of a node. An object is stored at the
/// first node it fully covers, or at the maximum depth.
#[derive(Debug, Clone)]
pub struct Bsp2d<T> {
    nodes: Vec<Node>,
    objects: Vec<Object<T>>,
    max_depth: u32,
}

impl<T> Bsp2d<T> {
    #[must_use]
    pub fn new(space: Rect2) -> Self {
        Self::with_max_depth(space, DEFAULT_MAX_DEPTH)
    }

    #[must_use]
    pub fn with_max_depth(space: Rect2, max_depth: u32) -> Self {
        Self {
            nodes: vec![Node::new(space)],
            objects: Vec::new(),
            max_depth: max_depth.max(1),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Inserts a triangle. Returns false if it lies outside the partitioned
    /// space.
    pub fn push(&mut self, data: T, tri: Triangle2) -> bool {
        let bounds = tri.bounding_rect();
        if !self.nodes[0].bounds.intersects(&bounds) {
            return false;
        }
        let id = self.objects.len();
        self.objects.push(Object { data, tri, bounds });
        self.write_object(0, id, 1);
        true
    }

    fn write_object(&mut self, node: usize, object: usize, depth: u32) {
        let bounds = self.nodes[node].bounds;
        if depth >= self.max_depth || self.objects[object].bounds.contains_rect(&bounds) {
            self.nodes[node].objects.push(object);
            return;
        }

        let children = match self.nodes[node].children {
            Some(children) => children,
            None => {
                let (a, b) = split(&bounds);
                let first = self.nodes.len();
                self.nodes.push(Node::new(a));
                self.nodes.push(Node::new(b));
                let children = [first, first + 1];
                self.nodes[node].children = Some(children);
                children
            }
        };

        for child in children {
            if self.objects[object].bounds.intersects(&self.nodes[child].bounds) {
                self.write_object(child, object, depth + 1);
            }
        }
    }

    /// Finds one triangle containing `point`, returning its payload and shape.
    #[must_use]
    pub fn find_one(&self, point: Vec2) -> Option<(&T, &Triangle2)> {
        let mut stack = vec![0usize];
        while let Some(node_id) = stack.pop() {
            let node = &self.nodes[node_id];
            if !node.bounds.contains(point) {
                continue;
            }
            for &id in &node.objects {
                let object = &self.objects[id];
                if object.bounds.contains(point) && object.tri.contains(point) {
                    return Some((&object.data, &object.tri));
                }
            }
            if let Some([a, b]) = node.children {
                // pop order visits the first child first
                stack.push(b);
                stack.push(a);
            }
        }
        None
    }
}

fn split(bounds: &Rect2) -> (Rect2, Rect2) {
    if bounds.width() >= bounds.height() {
        let mid = bounds.min.x + bounds.width() * 0.5;
        (
            Rect2::new(bounds.min, Vec2::new(mid, bounds.max.y)),
            Rect2::new(Vec2::new(mid, bounds.min.y), bounds.max),
        )
    } else {
        let mid = bounds.min.y + bounds.height() * 0.5;
        (
            Rect2::new(bounds.min, Vec2::new(bounds.max.x, mid)),
            Rect2::new(Vec2::new(bounds.min.x, mid), bounds.max),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_containing_triangle() {
        let space = Rect2::new(Vec2::ZERO, Vec2::splat(10.0));
        let mut bsp = Bsp2d::new(space);
        assert!(bsp.push(0u32, Triangle2::new(Vec2::ZERO, Vec2::new(10.0, 0.0), Vec2::new(0.0, 10.0))));
        assert!(bsp.push(1u32, Triangle2::new(Vec2::new(10.0, 0.0), Vec2::new(10.0, 10.0), Vec2::new(0.0, 10.0))));
        assert!(!bsp.push(2u32, Triangle2::new(Vec2::splat(20.0), Vec2::splat(21.0), Vec2::new(20.0, 22.0))));

        assert_eq!(bsp.find_one(Vec2::new(2.0, 2.0)).map(|(d, _)| *d), Some(0));
        assert_eq!(bsp.find_one(Vec2::new(8.0, 8.0)).map(|(d, _)| *d), Some(1));
        assert!(bsp.find_one(Vec2::new(11.0, 5.0)).is_none());
    }
}
