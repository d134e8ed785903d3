use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

use super::transition::Transitions;
use crate::errors::{Result, RigError};
use crate::math::{Rect2, Triangle2, angle_between, rotate};

/// Neighbour slots per lattice vertex.
pub const HEX_CONNECTION_COUNT: usize = 6;

/// Lattice neighbours of one vertex, clockwise from +X on screen (y down).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HexConnection {
    pub id: [Option<u32>; HEX_CONNECTION_COUNT],
}

impl HexConnection {
    #[inline]
    #[must_use]
    pub fn has(&self, dir: usize) -> bool {
        self.id.get(dir).is_some_and(Option::is_some)
    }

    /// Connected vertex ids in slot order.
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.id.iter().filter_map(|id| *id)
    }
}

/// Triangulated mesh with per-vertex lattice connectivity.
///
/// Positions live in the image's pixel space; `origin` places that space in
/// its layer. Texture coordinates are in pixels as well.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeshTopology {
    positions: Vec<Vec3>,
    texcoords: Vec<Vec2>,
    indices: Vec<u32>,
    connections: Vec<HexConnection>,
    vertex_rect: Rect2,
    pub origin: Vec2,
}

impl MeshTopology {
    /// Assembles a mesh from raw buffers.
    ///
    /// `indices` must hold whole triangles referencing existing vertices and
    /// `connections` must have one entry per vertex (or be empty).
    pub fn from_parts(
        positions: Vec<Vec3>,
        texcoords: Vec<Vec2>,
        indices: Vec<u32>,
        connections: Vec<HexConnection>,
        vertex_rect: Rect2,
    ) -> Result<Self> {
        let count = positions.len();
        if texcoords.len() != count {
            return Err(RigError::VertexCountMismatch { expected: count, actual: texcoords.len() });
        }
        let connections = if connections.is_empty() { vec![HexConnection::default(); count] } else { connections };
        if connections.len() != count {
            return Err(RigError::VertexCountMismatch { expected: count, actual: connections.len() });
        }
        if indices.len() % 3 != 0 {
            return Err(RigError::InvalidValue(format!("index count {} is not a multiple of 3", indices.len())));
        }
        if let Some(&bad) = indices.iter().find(|&&i| i as usize >= count) {
            return Err(RigError::InvalidValue(format!("index {bad} out of {count} vertices")));
        }
        let out_of_range = connections.iter().flat_map(HexConnection::iter).find(|&i| i as usize >= count);
        if let Some(bad) = out_of_range {
            return Err(RigError::InvalidValue(format!("connection {bad} out of {count} vertices")));
        }
        Ok(Self { positions, texcoords, indices, connections, vertex_rect, origin: Vec2::ZERO })
    }

    /// Plain triangle mesh with texture coordinates copied from positions and
    /// no lattice connectivity.
    pub fn from_triangles(positions: Vec<Vec3>, indices: Vec<u32>) -> Result<Self> {
        let texcoords = positions.iter().map(|p| p.truncate()).collect();
        let rect = Rect2::from_points(positions.iter().map(|p| p.truncate()));
        Self::from_parts(positions, texcoords, indices, Vec::new(), rect)
    }

    #[must_use]
    pub fn with_origin(mut self, origin: Vec2) -> Self {
        self.origin = origin;
        self
    }

    #[inline]
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    #[inline]
    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    #[must_use]
    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    #[must_use]
    pub fn texcoords(&self) -> &[Vec2] {
        &self.texcoords
    }

    #[must_use]
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    #[must_use]
    pub fn connections(&self) -> &[HexConnection] {
        &self.connections
    }

    /// Bounds of the lattice, in mesh space.
    #[must_use]
    pub fn vertex_rect(&self) -> Rect2 {
        self.vertex_rect
    }

    /// Vertex ids of triangle `i`.
    #[must_use]
    pub fn triangle(&self, i: usize) -> Option<[u32; 3]> {
        let tri = self.indices.get(i * 3..i * 3 + 3)?;
        Some([tri[0], tri[1], tri[2]])
    }

    /// Rest shape of triangle `i`.
    #[must_use]
    pub fn triangle_shape(&self, i: usize) -> Option<Triangle2> {
        let [a, b, c] = self.triangle(i)?;
        let p = |id: u32| self.positions[id as usize].truncate();
        Some(Triangle2::new(p(a), p(b), p(c)))
    }

    /// Lattice neighbours of vertex `i`; all empty for an unknown vertex.
    #[must_use]
    pub fn neighbors(&self, i: usize) -> [Option<u32>; HEX_CONNECTION_COUNT] {
        self.connections.get(i).map(|c| c.id).unwrap_or_default()
    }

    /// Carries a deformation of a previous mesh over to this one.
    ///
    /// Mapped vertices are rebuilt inside their source triangles of
    /// `prev_ffd`. The rest are relaxed from already placed neighbours, sweep
    /// by sweep; whatever stays unreachable keeps its rest position.
    pub fn create_ffd(&self, prev_ffd: &[Vec3], transitions: &Transitions) -> Result<Vec<Vec3>> {
        let count = self.vertex_count();
        if transitions.data.len() != count {
            return Err(RigError::VertexCountMismatch { expected: count, actual: transitions.data.len() });
        }

        let mut result = Vec::with_capacity(count);
        let mut validity = vec![false; count];
        let mut invalid = Vec::new();

        for (i, trans) in transitions.data.iter().enumerate() {
            let mapped = trans.as_ref().and_then(|t| {
                let corner = |k: usize| prev_ffd.get(t.ids[k] as usize).map(|p| p.truncate());
                let tri = [corner(0)?, corner(1)?, corner(2)?];
                Some(t.pos.get(&tri) + transitions.offset)
            });
            match mapped {
                Some(pos) => {
                    result.push(pos.extend(0.0));
                    validity[i] = true;
                }
                None => {
                    result.push(self.positions[i]);
                    invalid.push(i);
                }
            }
        }

        let mut resolved = Vec::new();
        while !invalid.is_empty() {
            invalid.retain(|&i| match self.predict_from_neighbors(i, &result, &validity) {
                Some(pos) => {
                    result[i] = pos.extend(0.0);
                    resolved.push(i);
                    false
                }
                None => true,
            });
            if resolved.is_empty() {
                break;
            }
            for i in resolved.drain(..) {
                validity[i] = true;
            }
        }

        Ok(result)
    }

    /// Averages where each valid neighbour would put vertex `index` if the
    /// rest edge between them turned like the neighbour's own valid edges.
    fn predict_from_neighbors(&self, index: usize, current: &[Vec3], validity: &[bool]) -> Option<Vec2> {
        let rest = |i: usize| self.positions[i].truncate();
        let here = rest(index);

        let mut sum = Vec2::ZERO;
        let mut count = 0usize;
        for id in self.connections[index].iter().map(|id| id as usize) {
            if !validity[id] {
                continue;
            }
            let pos = current[id].truncate();
            let ori_pos = rest(id);
            let ori_vec = here - ori_pos;

            let mut sub_sum = Vec2::ZERO;
            let mut sub_count = 0usize;
            for id2 in self.connections[id].iter().map(|id| id as usize) {
                if !validity[id2] {
                    continue;
                }
                let turn = angle_between(rest(id2) - ori_pos, current[id2].truncate() - pos);
                sub_sum += pos + rotate(ori_vec, turn);
                sub_count += 1;
            }

            sum += if sub_count > 0 { sub_sum / sub_count as f32 } else { pos + ori_vec };
            count += 1;
        }

        (count > 0).then(|| sum / count as f32)
    }
}
