//! Hexagonal lattice meshing of an alpha mask.
//!
//! The image is covered by rows of equilateral cells that alternate between
//! upward and downward triangles. Every cell touching an opaque pixel becomes
//! one mesh triangle. Border vertices are then pulled inward ("burr
//! reduction") as far as possible without uncovering any opaque pixel.

use std::f32::consts::{FRAC_PI_3, FRAC_PI_6};
use std::time::Instant;

use glam::{Vec2, Vec3};
use log::{debug, trace};

use super::alpha::AlphaMask;
use super::topology::{HEX_CONNECTION_COUNT, HexConnection, MeshTopology};
use crate::errors::{Result, RigError};
use crate::math::{Rect2, Segment2, TriangleRasterizer};
use crate::settings::RigSettings;

/// Smallest usable cell width in pixels.
pub const MIN_CELL_SIZE: u32 = 2;

const HALF_SQRT3: f32 = 0.866_025_4;
/// Step-down attempts of the reduction probe and coverage passes.
const REDUCE_DIVISIONS: usize = 9;
const REDUCE_STEP: f32 = 0.125;

#[derive(Debug, Clone, Copy, Default)]
struct Vertex {
    exists: bool,
    pos: Vec2,
    index: u32,
    /// Adjacent cell ids, clockwise from the right.
    cell: [Option<usize>; 6],
    reduce_vec: Vec2,
    max_reduce: f32,
    reduce_rate: f32,
}

impl Vertex {
    #[inline]
    fn pos_reduced(&self) -> Vec2 {
        self.pos + self.reduce_vec * self.max_reduce * self.reduce_rate
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Cell {
    exists: bool,
    inverted: bool,
    non_reducing: bool,
    reducing_fixed: bool,
    pos: Vec2,
    vtx: [usize; 3],
}

/// Cell and vertex tables for one build.
struct Lattice {
    cell_width: f32,
    cell_height: f32,
    cells: Vec<Cell>,
    cells_w: usize,
    cells_h: usize,
    vertices: Vec<Vertex>,
    verts_w: usize,
    verts_h: usize,
}

/// Builds [`MeshTopology`] values from alpha masks.
#[derive(Debug, Clone, Copy)]
pub struct GridMeshBuilder {
    cell_size: u32,
}

impl GridMeshBuilder {
    #[must_use]
    pub fn new(cell_size: u32) -> Self {
        Self { cell_size }
    }

    #[must_use]
    pub fn from_settings(settings: &RigSettings) -> Self {
        Self::new(settings.cell_size)
    }

    #[must_use]
    pub fn cell_size(&self) -> u32 {
        self.cell_size
    }

    /// Meshes `mask` with this builder's cell size.
    pub fn build(&self, mask: &AlphaMask) -> Result<MeshTopology> {
        Self::create_from_image(mask, self.cell_size)
    }

    /// Number of lattice cells used for an image of the given size.
    #[must_use]
    pub fn cell_table_count(width: u32, height: u32, cell_size: u32) -> usize {
        let (w, h) = cell_table_size(width, height, cell_size as f32, cell_size as f32 * HALF_SQRT3);
        w * h
    }

    /// Triangulates the opaque area of `mask`.
    ///
    /// A mask without opaque pixels yields an empty mesh.
    pub fn create_from_image(mask: &AlphaMask, cell_size: u32) -> Result<MeshTopology> {
        if mask.width() == 0 || mask.height() == 0 {
            return Err(RigError::EmptyImage);
        }
        if cell_size < MIN_CELL_SIZE {
            return Err(RigError::InvalidCellSize(cell_size));
        }
        let started = Instant::now();

        let mut image = mask.clone();
        image.expand_one_pixel();

        let mut lattice = Lattice::new(&image, cell_size as f32);
        let vertex_count = lattice.assign_indices();
        lattice.reduce_burrs(&image);

        let mut positions = vec![Vec3::ZERO; vertex_count];
        let mut connections = vec![HexConnection::default(); vertex_count];
        for y in 0..lattice.verts_h {
            for x in 0..lattice.verts_w {
                let vtx = &lattice.vertices[x + y * lattice.verts_w];
                if !vtx.exists {
                    continue;
                }
                let slot = vtx.index as usize;
                positions[slot] = vtx.pos_reduced().extend(0.0);
                for dir in 0..HEX_CONNECTION_COUNT {
                    connections[slot].id[dir] = lattice.connected_vertex(x, y, dir).map(|v| v.index);
                }
            }
        }
        let texcoords = positions.iter().map(|p| p.truncate()).collect();

        let indices: Vec<u32> = lattice
            .cells
            .iter()
            .filter(|c| c.exists)
            .flat_map(|c| c.vtx.map(|v| lattice.vertices[v].index))
            .collect();

        let rect = lattice.vertex_rect();
        debug!(
            "Built grid mesh: {} vertices, {} triangles (cell {}px)",
            vertex_count,
            indices.len() / 3,
            cell_size
        );
        trace!("Grid mesh build took {:?}", started.elapsed());

        MeshTopology::from_parts(positions, texcoords, indices, connections, rect)
    }
}

fn cell_table_size(width: u32, height: u32, cell_width: f32, cell_height: f32) -> (usize, usize) {
    let half = cell_width * 0.5;
    let w = (width as f32 / half + 2.0) as usize;
    let h = (height as f32 / cell_height + 1.0) as usize;
    (w, h)
}

impl Lattice {
    fn new(image: &AlphaMask, cell_width: f32) -> Self {
        let cell_height = cell_width * HALF_SQRT3;
        let half = cell_width * 0.5;
        let (cells_w, cells_h) = cell_table_size(image.width(), image.height(), cell_width, cell_height);

        let mut cells = Vec::with_capacity(cells_w * cells_h);
        for y in 0..cells_h {
            let zalign = y % 2 == 0;
            for x in 0..cells_w {
                let mut cell = Cell {
                    inverted: zalign ^ (x % 2 == 1),
                    pos: Vec2::new(half * (x as f32 - 1.0), cell_height * y as f32),
                    ..Default::default()
                };
                cell.exists = opaque_in_cell(image, &cell, cell_width, cell_height);
                cells.push(cell);
            }
        }

        let verts_w = cells_w.div_ceil(2) + 1;
        let verts_h = cells_h + 1;
        let mut vertices = vec![Vertex::default(); verts_w * verts_h];
        for y in 0..verts_h {
            let zoffs = if y % 2 == 0 { -half } else { 0.0 };
            for x in 0..verts_w {
                vertices[x + y * verts_w].pos = Vec2::new(cell_width * x as f32 + zoffs, cell_height * y as f32);
            }
        }

        let mut lattice = Self { cell_width, cell_height, cells, cells_w, cells_h, vertices, verts_w, verts_h };
        lattice.connect_cells();
        lattice
    }

    /// Links every existing cell to its three corner vertices.
    fn connect_cells(&mut self) {
        for y in 0..self.cells_h {
            let zalign = y % 2 == 0;
            for x in 0..self.cells_w {
                let index = x + y * self.cells_w;
                if !self.cells[index].exists {
                    continue;
                }
                let w = self.verts_w;
                let at = |vx: usize, vy: usize| vx + vy * w;
                let (corners, slots) = if self.cells[index].inverted {
                    let hx = x / 2;
                    let third = if zalign { at(hx, y + 1) } else { at(hx + 1, y + 1) };
                    ([at(hx, y), at(hx + 1, y), third], [0, 2, 4])
                } else if zalign {
                    let hx = x.div_ceil(2);
                    ([at(hx, y), at(hx, y + 1), at(hx - 1, y + 1)], [1, 3, 5])
                } else {
                    let hx = x / 2;
                    ([at(hx, y), at(hx + 1, y + 1), at(hx, y + 1)], [1, 3, 5])
                };
                for (v, slot) in corners.into_iter().zip(slots) {
                    let vtx = &mut self.vertices[v];
                    vtx.cell[slot] = Some(index);
                    vtx.exists = true;
                }
                self.cells[index].vtx = corners;
            }
        }
    }

    fn assign_indices(&mut self) -> usize {
        let mut index = 0u32;
        for vtx in self.vertices.iter_mut().filter(|v| v.exists) {
            vtx.index = index;
            index += 1;
        }
        index as usize
    }

    fn vertex_at(&self, x: i64, y: i64) -> Option<&Vertex> {
        if x < 0 || y < 0 || x >= self.verts_w as i64 || y >= self.verts_h as i64 {
            return None;
        }
        Some(&self.vertices[x as usize + y as usize * self.verts_w])
    }

    /// Neighbour in direction `dir` if an existing cell spans the edge.
    fn connected_vertex(&self, x: usize, y: usize, dir: usize) -> Option<&Vertex> {
        let center = self.vertex_at(x as i64, y as i64).filter(|v| v.exists)?;
        let zoffset = i64::from(y % 2 != 0);
        let (x, y) = (x as i64, y as i64);
        let (cell_a, cell_b, nx, ny) = match dir {
            0 => (5, 0, x + 1, y),
            1 => (0, 1, x + zoffset, y + 1),
            2 => (1, 2, x + zoffset - 1, y + 1),
            3 => (2, 3, x - 1, y),
            4 => (3, 4, x + zoffset - 1, y - 1),
            _ => (4, 5, x + zoffset, y - 1),
        };
        if center.cell[cell_a].is_none() && center.cell[cell_b].is_none() {
            return None;
        }
        self.vertex_at(nx, ny).filter(|v| v.exists)
    }

    fn vertex_rect(&self) -> Rect2 {
        let half = self.cell_width * 0.5;
        Rect2::new(
            Vec2::new((-half - 1.0).trunc(), 0.0),
            Vec2::new(
                (half * self.cells_w as f32 + 1.0).trunc(),
                (self.cell_height * self.cells_h as f32 + 1.0).trunc(),
            ),
        )
    }

    // ========================================================================
    // Burr reduction
    // ========================================================================

    fn reduce_burrs(&mut self, image: &AlphaMask) {
        self.set_reducing_vectors();
        self.avoid_flips();
        self.probe_alpha(image);
        self.keep_coverage(image);
        self.shorten_one_pixel();
    }

    /// Points each border vertex toward the centre of its adjacent cells.
    fn set_reducing_vectors(&mut self) {
        let cell_width = self.cell_width;
        let cell_height = self.cell_height;
        let pair_height = cell_height * HALF_SQRT3;
        let dirs: [Vec2; 6] =
            std::array::from_fn(|i| Vec2::from_angle(FRAC_PI_6 + i as f32 * FRAC_PI_3) * cell_height);

        for vtx in &mut self.vertices {
            let (sum, count) = vtx
                .cell
                .iter()
                .zip(dirs)
                .filter(|(c, _)| c.is_some())
                .fold((Vec2::ZERO, 0usize), |(s, n), (_, d)| (s + d, n + 1));
            if count == 0 {
                continue;
            }

            let mut vec = sum / count as f32;
            let len = vec.length();
            if count == 2 && len >= pair_height * 0.95 {
                vec *= cell_width / len;
            } else if count == 3 && len >= cell_width * 0.57 {
                vec *= cell_height / len;
            } else if count == 4 && len >= pair_height * 0.45 {
                vec *= cell_width / len;
            }

            let max_reduce = vec.length();
            if max_reduce >= 1.0 {
                vtx.reduce_vec = vec / max_reduce;
                vtx.max_reduce = max_reduce;
            } else {
                vtx.reduce_vec = Vec2::ZERO;
                vtx.max_reduce = 0.0;
            }
        }
    }

    /// Halves the reach of vertices whose reductions point at each other.
    fn avoid_flips(&mut self) {
        let half_reduce = self.cell_width * 0.5;
        for ci in 0..self.cells.len() {
            let cell = self.cells[ci];
            if !cell.exists {
                continue;
            }
            if cell.vtx.iter().all(|&v| self.vertices[v].max_reduce <= 0.0) {
                let cell = &mut self.cells[ci];
                cell.non_reducing = true;
                cell.reducing_fixed = true;
                continue;
            }

            let seg = cell.vtx.map(|v| Segment2::new(self.vertices[v].pos, self.vertices[v].reduce_vec));
            for (a, b) in [(0, 1), (0, 2), (1, 2)] {
                if seg[a].is_facing(&seg[b]) {
                    for v in [cell.vtx[a], cell.vtx[b]] {
                        let vtx = &mut self.vertices[v];
                        if vtx.max_reduce > 0.0 {
                            vtx.max_reduce = half_reduce;
                        }
                    }
                }
            }
        }
    }

    /// Steps each reduction back until its target no longer lands on an
    /// opaque neighbourhood.
    fn probe_alpha(&mut self, image: &AlphaMask) {
        for vtx in self.vertices.iter_mut().filter(|v| v.exists && v.max_reduce > 0.0) {
            vtx.reduce_rate = 0.95;
            let max_reduce = vtx.max_reduce;
            for div in 0..REDUCE_DIVISIONS {
                let pos = vtx.pos_reduced();
                if !image.has_some_alpha_3x3(pos.x as i32, pos.y as i32) {
                    break;
                }
                vtx.max_reduce = ((1.0 - (div + 1) as f32 * REDUCE_STEP) * max_reduce).max(0.0);
            }
        }
    }

    /// Relaxes reductions until every opaque pixel covered by the
    /// unreduced cells is again near some reduced cell.
    fn keep_coverage(&mut self, image: &AlphaMask) {
        let iw = image.width() as i32;
        let ih = image.height() as i32;
        let pixel_count = iw as usize * ih as usize;
        // 0: untouched, 1: needs coverage, 2: covered
        let mut use_bits = vec![0u8; pixel_count];
        let mut cell_ids: Vec<Option<usize>> = vec![None; pixel_count];

        for (ci, cell) in self.cells.iter().enumerate() {
            if !cell.exists || cell.non_reducing || cell.reducing_fixed {
                continue;
            }
            let [a, b, c] = cell.vtx.map(|v| self.vertices[v].pos);
            for scan in TriangleRasterizer::new(a, b, c) {
                for rx in scan.x_begin..scan.x_end {
                    if image.has_alpha(rx, scan.y) {
                        let pix = (rx + scan.y * iw) as usize;
                        use_bits[pix] = 1;
                        cell_ids[pix] = Some(ci);
                    }
                }
            }
        }

        for div in 0..REDUCE_DIVISIONS {
            for ci in 0..self.cells.len() {
                let cell = self.cells[ci];
                if !cell.exists || cell.non_reducing || cell.reducing_fixed {
                    continue;
                }
                let [a, b, c] = cell.vtx.map(|v| self.vertices[v].pos_reduced());
                for scan in TriangleRasterizer::new(a, b, c) {
                    let ry = scan.y;
                    if ry < 0 || ry >= ih {
                        continue;
                    }
                    for rx in scan.x_begin.max(0)..scan.x_end.min(iw) {
                        for ay in (ry - 1).max(0)..=(ry + 1).min(ih - 1) {
                            for ax in (rx - 1).max(0)..=(rx + 1).min(iw - 1) {
                                let bit = &mut use_bits[(ax + ay * iw) as usize];
                                if *bit == 1 {
                                    *bit = 2;
                                }
                            }
                        }
                    }
                }
                self.cells[ci].reducing_fixed = true;
            }

            if div == REDUCE_DIVISIONS - 1 {
                break;
            }
            let next_rate = 1.0 - (div + 1) as f32 * REDUCE_STEP;
            for (pix, _) in use_bits.iter().enumerate().filter(|&(_, &bit)| bit == 1) {
                let Some(ci) = cell_ids[pix] else {
                    continue;
                };
                let cell = &mut self.cells[ci];
                if cell.non_reducing {
                    continue;
                }
                cell.reducing_fixed = false;
                for v in cell.vtx {
                    self.vertices[v].reduce_rate = next_rate;
                }
            }
        }
    }

    fn shorten_one_pixel(&mut self) {
        const SHORTEN: f32 = 1.0;
        for vtx in &mut self.vertices {
            if vtx.max_reduce * vtx.reduce_rate >= SHORTEN {
                vtx.reduce_rate = (vtx.reduce_rate - SHORTEN / vtx.max_reduce).max(0.0);
            }
        }
    }
}

/// True if any opaque pixel falls inside the cell's triangle footprint.
fn opaque_in_cell(image: &AlphaMask, cell: &Cell, cell_width: f32, cell_height: f32) -> bool {
    let t = cell.pos.y as i32;
    let b = (cell.pos.y + cell_height) as i32;
    let h = (b - t).max(1) as f32;
    let half = cell_width * 0.5;

    (t..=b).filter(|&y| y >= 0 && y < image.height() as i32).any(|y| {
        let offs = if cell.inverted { half * (y - t) as f32 / h } else { half * (h - (y - t) as f32) / h };
        let l = (cell.pos.x + offs) as i32;
        let r = (cell.pos.x + cell_width - offs) as i32;
        (l..=r).any(|x| x >= 0 && x < image.width() as i32 && image.has_alpha(x, y))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_mask(size: u32, from: u32, to: u32) -> AlphaMask {
        let alpha = (0..size * size)
            .map(|i| {
                let (x, y) = (i % size, i / size);
                if (from..to).contains(&x) && (from..to).contains(&y) { 255 } else { 0 }
            })
            .collect();
        AlphaMask::from_alpha(size, size, alpha).unwrap()
    }

    #[test]
    fn transparent_image_gives_empty_mesh() {
        let mask = AlphaMask::from_alpha(8, 8, vec![0; 64]).unwrap();
        let mesh = GridMeshBuilder::create_from_image(&mask, 4).unwrap();
        assert!(mesh.is_empty());
        assert_eq!(mesh.triangle_count(), 0);
    }

    #[test]
    fn rejects_tiny_cells() {
        let mask = square_mask(8, 2, 6);
        assert!(matches!(GridMeshBuilder::create_from_image(&mask, 1), Err(RigError::InvalidCellSize(1))));
    }

    #[test]
    fn cells_alternate_orientation() {
        let mask = square_mask(32, 0, 32);
        let mut image = mask.clone();
        image.expand_one_pixel();
        let lattice = Lattice::new(&image, 8.0);
        for y in 0..lattice.cells_h {
            for x in 1..lattice.cells_w {
                let l = lattice.cells[x - 1 + y * lattice.cells_w].inverted;
                let r = lattice.cells[x + y * lattice.cells_w].inverted;
                assert_ne!(l, r, "cells ({}, {y}) and ({x}, {y}) share orientation", x - 1);
            }
        }
    }

    #[test]
    fn connections_are_symmetric() {
        let mask = square_mask(40, 8, 32);
        let mesh = GridMeshBuilder::create_from_image(&mask, 6).unwrap();
        for (i, conn) in mesh.connections().iter().enumerate() {
            for (dir, id) in conn.id.iter().enumerate() {
                if let Some(id) = id {
                    let back = mesh.neighbors(*id as usize)[(dir + 3) % 6];
                    assert_eq!(back, Some(i as u32), "vertex {i} dir {dir}");
                }
            }
        }
    }
}
