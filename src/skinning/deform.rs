use glam::{Mat4, Quat, Vec3, Vec4};

use super::palette::{DualQuat, SkinPalette};
use super::weights::{BONES_PER_ROW, InfluenceAccessor};
use crate::errors::{Result, RigError};

/// How bone transforms are blended per vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SkinningMode {
    /// Weighted sum of palette matrices.
    #[default]
    Linear,
    /// Weighted sum of dual quaternions, renormalized.
    DualQuaternion,
}

/// Deforms `positions` on the CPU the way a skinning shader would.
///
/// `positions` are expected in the same space the weights were built in.
pub fn skin_positions(
    positions: &[Vec3],
    influence: &InfluenceAccessor,
    palette: &SkinPalette,
    mode: SkinningMode,
) -> Result<Vec<Vec3>> {
    if positions.len() != influence.vertex_count() {
        return Err(RigError::VertexCountMismatch { expected: influence.vertex_count(), actual: positions.len() });
    }

    let matrices = palette.matrices_padded();
    let dqs = palette.dual_quaternions_padded();
    let rows = [
        (influence.indices0(), influence.weights0()),
        (influence.indices1(), influence.weights1()),
    ];

    let out = positions
        .iter()
        .enumerate()
        .map(|(v, &p)| {
            let pairs = rows.iter().flat_map(|(ids, ws)| {
                let ids = ids[v].to_array();
                let ws = ws[v].to_array();
                (0..BONES_PER_ROW).map(move |k| (ids[k] as usize, ws[k]))
            });
            match mode {
                SkinningMode::Linear => {
                    let m = pairs.fold(Mat4::ZERO, |acc, (id, w)| {
                        acc + matrices.get(id).copied().unwrap_or(Mat4::IDENTITY) * w
                    });
                    m.transform_point3(p)
                }
                SkinningMode::DualQuaternion => {
                    let blended = pairs.fold((Vec4::ZERO, Vec4::ZERO), |(r, d), (id, w)| {
                        let dq = dqs.get(id).copied().unwrap_or(DualQuat::IDENTITY);
                        // keep every rotation in the same hemisphere as the first
                        let w = if r != Vec4::ZERO && r.dot(dq.real) < 0.0 { -w } else { w };
                        (r + dq.real * w, d + dq.dual * w)
                    });
                    apply_dual_quat(blended.0, blended.1, p)
                }
            }
        })
        .collect();
    Ok(out)
}

fn apply_dual_quat(real: Vec4, dual: Vec4, p: Vec3) -> Vec3 {
    let len = real.length();
    if len <= f32::EPSILON {
        return p;
    }
    let dq = DualQuat { real: real / len, dual: dual / len };
    let rot: Quat = dq.rotation();
    rot * p + dq.translation()
}
