//! Error Types
//!
//! This module defines the error types used throughout the crate.
//!
//! # Overview
//!
//! The main error type [`RigError`] covers the failure modes that are not
//! programmer errors:
//! - Stream decoding failures (bad block signature, size mismatch, truncation)
//! - Invalid input to mesh generation (empty image, bad cell size)
//! - Buffer length mismatches between meshes, FFD payloads and weight tables
//!
//! Geometric degeneracies (zero-length bones, sub-minimum radii, zero-area
//! triangles) are never reported here; they yield neutral contributions.
//!
//! # Usage
//!
//! ```rust,ignore
//! use marionette::errors::{RigError, Result};
//!
//! fn load_mesh(bytes: &[u8]) -> Result<MeshTopology> {
//!     let mut stream = Deserializer::new(bytes);
//!     MeshTopology::deserialize(&mut stream)
//! }
//! ```

use thiserror::Error;

/// The main error type for the rig engine.
#[derive(Error, Debug)]
pub enum RigError {
    // ========================================================================
    // Stream Errors
    // ========================================================================
    /// A block began with an unexpected signature.
    #[error("Bad block signature: expected {expected:?}, found {found:?}")]
    BadSignature {
        /// The signature the reader asked for
        expected: String,
        /// The signature present in the stream
        found: String,
    },

    /// A block's recorded size does not match the bytes consumed by its reader.
    #[error("Block size mismatch in {block}: expected {expected} bytes, read {actual}")]
    SizeMismatch {
        /// Block signature
        block: String,
        /// Size recorded in the block header
        expected: u64,
        /// Bytes actually consumed
        actual: u64,
    },

    /// The stream ended before a value could be read.
    #[error("Truncated stream: needed {needed} bytes, {remaining} remaining")]
    Truncated {
        /// Bytes requested
        needed: usize,
        /// Bytes left in the stream
        remaining: usize,
    },

    /// A decoded value is out of its valid domain.
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// Underlying I/O failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ========================================================================
    // Mesh & Image Errors
    // ========================================================================
    /// The alpha mask has no pixels.
    #[error("Image is empty")]
    EmptyImage,

    /// The pixel buffer does not match the declared image size.
    #[error("Image buffer size mismatch: expected {expected} pixels, got {actual}")]
    ImageSizeMismatch {
        /// Width × height
        expected: usize,
        /// Length of the supplied buffer
        actual: usize,
    },

    /// Lattice cell size is too small to build a mesh.
    #[error("Invalid mesh cell size: {0}")]
    InvalidCellSize(u32),

    /// Two buffers that must describe the same vertex set differ in length.
    #[error("Vertex count mismatch: expected {expected}, got {actual}")]
    VertexCountMismatch {
        /// Count required by the mesh
        expected: usize,
        /// Count supplied
        actual: usize,
    },

    // ========================================================================
    // Threading Errors
    // ========================================================================
    /// The worker pool has shut down and cannot accept jobs.
    #[error("Worker pool is unavailable")]
    WorkerUnavailable,
}

/// Alias for `Result<T, RigError>`.
pub type Result<T> = std::result::Result<T, RigError>;
