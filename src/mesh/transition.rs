use glam::{Vec2, Vec3};
use log::debug;

use super::topology::MeshTopology;
use crate::math::{Bsp2d, TrianglePos};
use crate::settings::RigSettings;

const DEFAULT_BSP_DEPTH: u32 = 10;

/// Where one new vertex sat inside the previous mesh.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transition {
    /// Vertex ids of the previous triangle.
    pub ids: [u32; 3],
    pub pos: TrianglePos,
}

/// Per-vertex mapping of a new mesh onto a previous one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transitions {
    /// One entry per new vertex; `None` marks an orphan.
    pub data: Vec<Option<Transition>>,
    /// Added to every reconstructed position to return to new-mesh space.
    pub offset: Vec2,
}

impl Transitions {
    /// Number of new vertices that found a source triangle.
    #[must_use]
    pub fn mapped_count(&self) -> usize {
        self.data.iter().filter(|t| t.is_some()).count()
    }
}

/// Spatial index over a mesh about to be replaced, able to locate vertices
/// of its successor.
#[derive(Debug, Clone)]
pub struct TransitionCreator {
    bsp: Bsp2d<[u32; 3]>,
    origin: Vec2,
}

impl TransitionCreator {
    #[must_use]
    pub fn new(prev: &MeshTopology, prev_origin: Vec2) -> Self {
        Self::with_max_depth(prev, prev_origin, DEFAULT_BSP_DEPTH)
    }

    /// Partition depth taken from `settings`.
    #[must_use]
    pub fn with_settings(prev: &MeshTopology, prev_origin: Vec2, settings: &RigSettings) -> Self {
        Self::with_max_depth(prev, prev_origin, settings.bsp_max_depth)
    }

    /// Indexes every triangle of `prev` with a usable face.
    #[must_use]
    pub fn with_max_depth(prev: &MeshTopology, prev_origin: Vec2, max_depth: u32) -> Self {
        let mut bsp = Bsp2d::with_max_depth(prev.vertex_rect(), max_depth);
        for i in 0..prev.triangle_count() {
            let (Some(ids), Some(shape)) = (prev.triangle(i), prev.triangle_shape(i)) else {
                continue;
            };
            if shape.has_face(f32::MIN_POSITIVE) {
                bsp.push(ids, shape);
            }
        }
        debug!("Indexed {} of {} previous triangles", bsp.len(), prev.triangle_count());
        Self { bsp, origin: prev_origin }
    }

    /// Number of indexed source triangles.
    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.bsp.len()
    }

    /// Maps every position of the new mesh placed at `next_origin`.
    #[must_use]
    pub fn create(&self, next: &[Vec3], next_origin: Vec2) -> Transitions {
        let offset = next_origin - self.origin;
        let data: Vec<_> = next
            .iter()
            .map(|p| {
                let pos = p.truncate() + offset;
                let (ids, tri) = self.bsp.find_one(pos)?;
                let pos = TrianglePos::make(tri, pos)?;
                Some(Transition { ids: *ids, pos })
            })
            .collect();

        let transitions = Transitions { data, offset: -offset };
        debug!("Mapped {} of {} vertices onto previous mesh", transitions.mapped_count(), next.len());
        transitions
    }
}
