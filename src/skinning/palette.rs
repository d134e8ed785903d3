use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Quat, Vec3, Vec4};

use crate::rig::Skeleton;

/// Bones addressable by one palette.
pub const MAX_PALETTE_COUNT: usize = 32;

/// Rigid transform as a unit dual quaternion, laid out for GPU upload.
///
/// `real` holds the rotation `(w, x, y, z)`; `dual` holds `½·t·real`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct DualQuat {
    pub real: Vec4,
    pub dual: Vec4,
}

impl DualQuat {
    pub const IDENTITY: Self = Self { real: Vec4::new(1.0, 0.0, 0.0, 0.0), dual: Vec4::ZERO };

    #[must_use]
    pub fn from_rotation_translation(q: Quat, t: Vec3) -> Self {
        let (qx, qy, qz, qw) = (q.x, q.y, q.z, q.w);
        let (tx, ty, tz) = (t.x, t.y, t.z);
        Self {
            real: Vec4::new(qw, qx, qy, qz),
            dual: 0.5
                * Vec4::new(
                    -tx * qx - ty * qy - tz * qz,
                    tx * qw + ty * qz - tz * qy,
                    -tx * qz + ty * qw + tz * qx,
                    tx * qy - ty * qx + tz * qw,
                ),
        }
    }

    /// Rotation part as a `glam` quaternion.
    #[must_use]
    pub fn rotation(&self) -> Quat {
        Quat::from_xyzw(self.real.y, self.real.z, self.real.w, self.real.x)
    }

    /// Translation encoded by the dual part: `2·dual·conj(real)`.
    #[must_use]
    pub fn translation(&self) -> Vec3 {
        let r = self.rotation();
        let d = Quat::from_xyzw(self.dual.y, self.dual.z, self.dual.w, self.dual.x);
        let t = (d * r.conjugate()) * 2.0;
        Vec3::new(t.x, t.y, t.z)
    }
}

impl Default for DualQuat {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// A rest skeleton and its posed copy, matched bone by bone in pre-order.
#[derive(Debug, Clone, Copy)]
pub struct PosePair<'a> {
    pub origin: &'a Skeleton,
    pub pose: &'a Skeleton,
}

/// Per-bone skinning transforms for every skeleton on the path from the
/// rig root down to one node.
#[derive(Debug, Clone, PartialEq)]
pub struct SkinPalette {
    matrices: [Mat4; MAX_PALETTE_COUNT],
    dual_quats: [DualQuat; MAX_PALETTE_COUNT],
    count: usize,
    is_unit: bool,
}

impl Default for SkinPalette {
    fn default() -> Self {
        Self {
            matrices: [Mat4::IDENTITY; MAX_PALETTE_COUNT],
            dual_quats: [DualQuat::IDENTITY; MAX_PALETTE_COUNT],
            count: 0,
            is_unit: true,
        }
    }
}

impl SkinPalette {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds the palette. Bones are enumerated through the pairs in
    /// order, each skeleton in pre-order, up to [`MAX_PALETTE_COUNT`].
    pub fn build(&mut self, pairs: &[PosePair<'_>]) {
        let origins = pairs.iter().flat_map(|p| p.origin.pre_order());
        let poses = pairs.iter().flat_map(|p| p.pose.pre_order());

        let mut count = 0;
        for ((_, origin), (_, pose)) in origins.zip(poses).take(MAX_PALETTE_COUNT) {
            let rotate = pose.world_angle() - origin.world_angle();
            self.matrices[count] = origin.transformation_matrix(pose.world_pos(), pose.world_angle());

            let q = Quat::from_rotation_z(rotate);
            let rotated_origin = q * origin.world_pos().extend(0.0);
            let trans = pose.world_pos().extend(0.0) - rotated_origin;
            self.dual_quats[count] = DualQuat::from_rotation_translation(q, trans);
            count += 1;
        }

        self.matrices[count..].fill(Mat4::IDENTITY);
        self.dual_quats[count..].fill(DualQuat::IDENTITY);
        self.count = count;
        self.is_unit = false;
    }

    /// Resets every entry to identity.
    pub fn clear(&mut self) {
        if self.is_unit {
            return;
        }
        *self = Self::default();
    }

    #[inline]
    #[must_use]
    pub fn count(&self) -> usize {
        self.count
    }

    #[must_use]
    pub fn matrices(&self) -> &[Mat4] {
        &self.matrices[..self.count]
    }

    #[must_use]
    pub fn dual_quaternions(&self) -> &[DualQuat] {
        &self.dual_quats[..self.count]
    }

    #[must_use]
    pub fn matrices_padded(&self) -> &[Mat4; MAX_PALETTE_COUNT] {
        &self.matrices
    }

    #[must_use]
    pub fn dual_quaternions_padded(&self) -> &[DualQuat; MAX_PALETTE_COUNT] {
        &self.dual_quats
    }

    /// Matrix of bone `index`, identity when out of range.
    #[must_use]
    pub fn matrix(&self, index: usize) -> Mat4 {
        self.matrices.get(index).copied().unwrap_or(Mat4::IDENTITY)
    }

    /// Raw bytes of the padded dual quaternion block.
    #[must_use]
    pub fn dual_quaternion_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.dual_quats)
    }
}
