//! Binary persistence for rig data.
//!
//! A minimal little-endian stream with signed, size-checked blocks. Types
//! that persist implement [`Persist`]; a load decodes everything into local
//! values first and commits only when the whole block was read.

pub mod persist;
pub mod reader;
pub mod writer;

pub use reader::Deserializer;
pub use writer::{BLOCK_HEADER_SIZE, Serializer};

use crate::errors::Result;

/// Receives progress while a stream is being decoded.
pub trait ProgressReporter {
    fn set_section(&mut self, _section: &str) {}
    fn set_maximum(&mut self, maximum: usize);
    fn set_progress(&mut self, value: usize);
}

/// Value that can be written to and restored from a stream.
pub trait Persist {
    fn serialize(&self, out: &mut Serializer) -> Result<()>;

    /// Replaces `self` with the decoded value. On error `self` is left as
    /// it was.
    fn deserialize(&mut self, input: &mut Deserializer<'_>) -> Result<()>;
}
