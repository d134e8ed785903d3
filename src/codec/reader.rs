use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt};
use glam::{Mat4, Vec2, Vec3, Vec4};
use log::error;

use super::ProgressReporter;
use crate::errors::{Result, RigError};

struct OpenBlock {
    signature: String,
    begin: u64,
    size: u64,
}

/// Little-endian reader over a byte slice.
///
/// Failures are recorded in a log prefixed with the active scope path, so a
/// caller can tell which part of a nested structure was malformed.
pub struct Deserializer<'a> {
    input: Cursor<&'a [u8]>,
    blocks: Vec<OpenBlock>,
    scopes: Vec<String>,
    log: Vec<String>,
    reporter: Option<&'a mut dyn ProgressReporter>,
}

impl<'a> Deserializer<'a> {
    #[must_use]
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { input: Cursor::new(bytes), blocks: Vec::new(), scopes: Vec::new(), log: Vec::new(), reporter: None }
    }

    #[must_use]
    pub fn with_reporter(mut self, reporter: &'a mut dyn ProgressReporter) -> Self {
        reporter.set_maximum(self.input.get_ref().len());
        self.reporter = Some(reporter);
        self
    }

    #[must_use]
    pub fn position(&self) -> u64 {
        self.input.position()
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        let len = self.input.get_ref().len();
        len.saturating_sub(usize::try_from(self.input.position()).unwrap_or(len))
    }

    // ------------------------------------------------------------------------
    // Scoped log
    // ------------------------------------------------------------------------

    pub fn push_log_scope(&mut self, scope: impl Into<String>) {
        self.scopes.push(scope.into());
    }

    pub fn pop_log_scope(&mut self) {
        self.scopes.pop();
    }

    #[must_use]
    pub fn log_scopes(&self) -> &[String] {
        &self.scopes
    }

    /// Failure messages recorded so far.
    #[must_use]
    pub fn log(&self) -> &[String] {
        &self.log
    }

    /// Records `err` under the current scope path and hands it back.
    pub fn errored(&mut self, err: RigError) -> RigError {
        let message = if self.scopes.is_empty() { err.to_string() } else { format!("{}: {err}", self.scopes.join(" > ")) };
        error!("{message}");
        self.log.push(message);
        err
    }

    pub fn report_current(&mut self) {
        let position = usize::try_from(self.input.position()).unwrap_or(usize::MAX);
        if let Some(reporter) = self.reporter.as_deref_mut() {
            reporter.set_progress(position);
        }
    }

    // ------------------------------------------------------------------------
    // Primitives
    // ------------------------------------------------------------------------

    fn need(&mut self, needed: usize) -> Result<()> {
        let remaining = self.remaining();
        if needed > remaining {
            return Err(self.errored(RigError::Truncated { needed, remaining }));
        }
        Ok(())
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        self.need(4)?;
        Ok(self.input.read_i32::<LittleEndian>()?)
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        self.need(4)?;
        Ok(self.input.read_u32::<LittleEndian>()?)
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        self.need(8)?;
        Ok(self.input.read_u64::<LittleEndian>()?)
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        self.need(4)?;
        Ok(self.input.read_f32::<LittleEndian>()?)
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        match self.read_u32()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(self.errored(RigError::InvalidValue(format!("bool word {other}")))),
        }
    }

    /// Element count written by `Serializer::write_len`. Rejects counts whose
    /// payload of `item_size` bytes each cannot fit in the rest of the stream.
    pub fn read_len(&mut self, item_size: usize) -> Result<usize> {
        let raw = self.read_i32()?;
        let Ok(len) = usize::try_from(raw) else {
            return Err(self.errored(RigError::InvalidValue(format!("negative length {raw}"))));
        };
        self.need(len.saturating_mul(item_size))?;
        Ok(len)
    }

    pub fn read_vec2(&mut self) -> Result<Vec2> {
        Ok(Vec2::new(self.read_f32()?, self.read_f32()?))
    }

    pub fn read_vec3(&mut self) -> Result<Vec3> {
        Ok(Vec3::new(self.read_f32()?, self.read_f32()?, self.read_f32()?))
    }

    pub fn read_vec4(&mut self) -> Result<Vec4> {
        Ok(Vec4::new(self.read_f32()?, self.read_f32()?, self.read_f32()?, self.read_f32()?))
    }

    pub fn read_mat4(&mut self) -> Result<Mat4> {
        let mut cols = [0.0; 16];
        for c in &mut cols {
            *c = self.read_f32()?;
        }
        Ok(Mat4::from_cols_array(&cols))
    }

    pub fn read_string(&mut self) -> Result<String> {
        let len = self.read_len(1)?;
        let mut bytes = vec![0; len];
        std::io::Read::read_exact(&mut self.input, &mut bytes)?;
        let padding = (4 - len % 4) % 4;
        self.need(padding)?;
        self.input.set_position(self.input.position() + padding as u64);
        String::from_utf8(bytes).map_err(|e| self.errored(RigError::InvalidValue(e.to_string())))
    }

    // ------------------------------------------------------------------------
    // Blocks
    // ------------------------------------------------------------------------

    pub fn begin_block(&mut self, signature: &[u8; 8]) -> Result<()> {
        self.need(8)?;
        let mut found = [0u8; 8];
        std::io::Read::read_exact(&mut self.input, &mut found)?;
        if &found != signature {
            return Err(self.errored(RigError::BadSignature {
                expected: String::from_utf8_lossy(signature).into_owned(),
                found: String::from_utf8_lossy(&found).into_owned(),
            }));
        }
        let size = self.read_u64()?;
        self.need(usize::try_from(size).unwrap_or(usize::MAX))?;
        self.blocks.push(OpenBlock {
            signature: String::from_utf8_lossy(signature).into_owned(),
            begin: self.input.position(),
            size,
        });
        Ok(())
    }

    /// Closes the innermost block, checking that exactly its payload was read.
    pub fn end_block(&mut self) -> Result<()> {
        let Some(block) = self.blocks.pop() else {
            return Err(self.errored(RigError::InvalidValue("end_block without a matching begin_block".into())));
        };
        let actual = self.input.position() - block.begin;
        if actual != block.size {
            return Err(self.errored(RigError::SizeMismatch { block: block.signature, expected: block.size, actual }));
        }
        self.report_current();
        Ok(())
    }
}

impl std::fmt::Debug for Deserializer<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Deserializer")
            .field("position", &self.input.position())
            .field("scopes", &self.scopes)
            .field("log", &self.log)
            .finish_non_exhaustive()
    }
}
