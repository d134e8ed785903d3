use glam::{UVec4, Vec2, Vec3, Vec4};

use super::{Deserializer, Persist, Serializer};
use crate::animation::FfdBuffer;
use crate::errors::{Result, RigError};
use crate::math::Rect2;
use crate::mesh::{HEX_CONNECTION_COUNT, HexConnection, MeshTopology};
use crate::skinning::{BoneWeightBuilder, InfluenceTable, MAX_PALETTE_COUNT};

const MESH_SIGNATURE: &[u8; 8] = b"MeshTopo";
const FFD_SIGNATURE: &[u8; 8] = b"FfdBuffr";
const INFLUENCE_SIGNATURE: &[u8; 8] = b"BoneInfl";

/// Runs `body` inside a log scope, popping it whatever the outcome.
fn scoped<T>(input: &mut Deserializer<'_>, scope: &str, body: impl FnOnce(&mut Deserializer<'_>) -> Result<T>) -> Result<T> {
    input.push_log_scope(scope);
    let result = body(input);
    input.pop_log_scope();
    result
}

fn read_vec3s(input: &mut Deserializer<'_>) -> Result<Vec<Vec3>> {
    let count = input.read_len(12)?;
    (0..count).map(|_| input.read_vec3()).collect()
}

fn write_vec3s(out: &mut Serializer, values: &[Vec3]) -> Result<()> {
    out.write_len(values.len())?;
    values.iter().try_for_each(|&v| out.write_vec3(v))
}

// ============================================================================
// Mesh
// ============================================================================

impl Persist for MeshTopology {
    fn serialize(&self, out: &mut Serializer) -> Result<()> {
        out.begin_block(MESH_SIGNATURE)?;
        write_vec3s(out, self.positions())?;

        out.write_len(self.texcoords().len())?;
        for &t in self.texcoords() {
            out.write_vec2(t)?;
        }

        out.write_len(self.indices().len())?;
        for &i in self.indices() {
            out.write_u32(i)?;
        }

        out.write_len(self.connections().len())?;
        for c in self.connections() {
            for id in c.id {
                out.write_i32(id.map_or(-1, |v| v as i32))?;
            }
        }

        let rect = self.vertex_rect();
        out.write_vec2(rect.min)?;
        out.write_vec2(rect.max)?;
        out.write_vec2(self.origin)?;
        out.end_block();
        Ok(())
    }

    fn deserialize(&mut self, input: &mut Deserializer<'_>) -> Result<()> {
        scoped(input, "MeshTopology", |input| {
            input.begin_block(MESH_SIGNATURE)?;
            let positions = scoped(input, "positions", read_vec3s)?;
            let texcoords = scoped(input, "texcoords", |input| {
                let count = input.read_len(8)?;
                (0..count).map(|_| input.read_vec2()).collect::<Result<Vec<Vec2>>>()
            })?;
            let indices = scoped(input, "indices", |input| {
                let count = input.read_len(4)?;
                (0..count).map(|_| input.read_u32()).collect::<Result<Vec<u32>>>()
            })?;
            let connections = scoped(input, "connections", |input| {
                let count = input.read_len(4 * HEX_CONNECTION_COUNT)?;
                let mut connections = Vec::with_capacity(count);
                for _ in 0..count {
                    let mut c = HexConnection::default();
                    for slot in &mut c.id {
                        *slot = u32::try_from(input.read_i32()?).ok();
                    }
                    connections.push(c);
                }
                Ok(connections)
            })?;
            let rect = Rect2::new(input.read_vec2()?, input.read_vec2()?);
            let origin = input.read_vec2()?;
            input.end_block()?;

            let mesh = MeshTopology::from_parts(positions, texcoords, indices, connections, rect)
                .map_err(|e| input.errored(e))?;
            *self = mesh.with_origin(origin);
            Ok(())
        })
    }
}

// ============================================================================
// FFD
// ============================================================================

impl Persist for FfdBuffer {
    fn serialize(&self, out: &mut Serializer) -> Result<()> {
        out.begin_block(FFD_SIGNATURE)?;
        write_vec3s(out, &self.positions)?;
        out.end_block();
        Ok(())
    }

    fn deserialize(&mut self, input: &mut Deserializer<'_>) -> Result<()> {
        scoped(input, "FfdBuffer", |input| {
            input.begin_block(FFD_SIGNATURE)?;
            let positions = scoped(input, "positions", read_vec3s)?;
            input.end_block()?;
            self.positions = positions;
            Ok(())
        })
    }
}

// ============================================================================
// Influence
// ============================================================================

impl Persist for BoneWeightBuilder {
    /// Waits for any outstanding build before writing.
    fn serialize(&self, out: &mut Serializer) -> Result<()> {
        let accessor = self.accessor();
        out.begin_block(INFLUENCE_SIGNATURE)?;
        out.write_len(accessor.vertex_count())?;
        out.write_len(self.max_bone_count())?;
        for row in [accessor.indices0(), accessor.indices1()] {
            for ids in row {
                for id in ids.to_array() {
                    out.write_u32(id)?;
                }
            }
        }
        for row in [accessor.weights0(), accessor.weights1()] {
            for &w in row {
                out.write_vec4(w)?;
            }
        }
        out.end_block();
        Ok(())
    }

    fn deserialize(&mut self, input: &mut Deserializer<'_>) -> Result<()> {
        scoped(input, "BoneInfluence", |input| {
            input.begin_block(INFLUENCE_SIGNATURE)?;
            let vertex_count = input.read_len(64)?;
            let max_bone_count = input.read_len(0)?;
            if max_bone_count == 0 || max_bone_count > MAX_PALETTE_COUNT {
                return Err(input.errored(RigError::InvalidValue(format!("max bone count {max_bone_count}"))));
            }

            let mut table = InfluenceTable::default();
            for row in &mut table.indices {
                *row = scoped(input, "indices", |input| {
                    (0..vertex_count)
                        .map(|_| -> Result<UVec4> {
                            Ok(UVec4::new(input.read_u32()?, input.read_u32()?, input.read_u32()?, input.read_u32()?))
                        })
                        .collect::<Result<Vec<UVec4>>>()
                })?;
            }
            for row in &mut table.weights {
                *row = scoped(input, "weights", |input| {
                    (0..vertex_count).map(|_| input.read_vec4()).collect::<Result<Vec<Vec4>>>()
                })?;
            }
            input.end_block()?;

            self.restore(table, max_bone_count);
            Ok(())
        })
    }
}
