use byteorder::{LittleEndian, WriteBytesExt};
use glam::{Mat4, Vec2, Vec3, Vec4};
use log::warn;

use crate::errors::{Result, RigError};

/// Byte length of a block header: 8-byte signature plus 8-byte size.
pub const BLOCK_HEADER_SIZE: usize = 16;

/// Little-endian writer over an in-memory buffer.
///
/// Blocks are framed by a signature and a byte size that is backpatched
/// when the block closes, so readers can verify what they consumed.
#[derive(Debug, Default)]
pub struct Serializer {
    out: Vec<u8>,
    open_blocks: Vec<usize>,
}

impl Serializer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.out
    }

    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.out
    }

    #[must_use]
    pub fn position(&self) -> usize {
        self.out.len()
    }

    pub fn write_i32(&mut self, value: i32) -> Result<()> {
        self.out.write_i32::<LittleEndian>(value)?;
        Ok(())
    }

    pub fn write_u32(&mut self, value: u32) -> Result<()> {
        self.out.write_u32::<LittleEndian>(value)?;
        Ok(())
    }

    pub fn write_u64(&mut self, value: u64) -> Result<()> {
        self.out.write_u64::<LittleEndian>(value)?;
        Ok(())
    }

    pub fn write_f32(&mut self, value: f32) -> Result<()> {
        self.out.write_f32::<LittleEndian>(value)?;
        Ok(())
    }

    /// Stored as a 32-bit word.
    pub fn write_bool(&mut self, value: bool) -> Result<()> {
        self.write_u32(u32::from(value))
    }

    /// Element count as a 32-bit signed word.
    pub fn write_len(&mut self, len: usize) -> Result<()> {
        let len = i32::try_from(len)
            .map_err(|_| RigError::InvalidValue(format!("length {len} exceeds the stream limit")))?;
        self.write_i32(len)
    }

    pub fn write_vec2(&mut self, v: Vec2) -> Result<()> {
        self.write_f32(v.x)?;
        self.write_f32(v.y)
    }

    pub fn write_vec3(&mut self, v: Vec3) -> Result<()> {
        self.write_f32(v.x)?;
        self.write_f32(v.y)?;
        self.write_f32(v.z)
    }

    pub fn write_vec4(&mut self, v: Vec4) -> Result<()> {
        for c in v.to_array() {
            self.write_f32(c)?;
        }
        Ok(())
    }

    /// Column-major, one column at a time.
    pub fn write_mat4(&mut self, m: &Mat4) -> Result<()> {
        for c in m.to_cols_array() {
            self.write_f32(c)?;
        }
        Ok(())
    }

    /// Length-prefixed UTF-8, zero padded to a 4-byte boundary.
    pub fn write_string(&mut self, value: &str) -> Result<()> {
        self.write_len(value.len())?;
        self.out.extend_from_slice(value.as_bytes());
        self.align(4);
        Ok(())
    }

    pub fn begin_block(&mut self, signature: &[u8; 8]) -> Result<()> {
        self.out.extend_from_slice(signature);
        self.open_blocks.push(self.out.len());
        self.write_u64(0)
    }

    /// Closes the innermost block, writing its payload size.
    pub fn end_block(&mut self) {
        let Some(pos) = self.open_blocks.pop() else {
            warn!("end_block without a matching begin_block");
            return;
        };
        let size = (self.out.len() - pos - 8) as u64;
        self.out[pos..pos + 8].copy_from_slice(&size.to_le_bytes());
    }

    fn align(&mut self, alignment: usize) {
        let rest = self.out.len() % alignment;
        if rest != 0 {
            self.out.resize(self.out.len() + alignment - rest, 0);
        }
    }
}
