//! Image-driven meshes and deformation transfer between mesh versions.

pub mod alpha;
pub mod grid;
pub mod topology;
pub mod transition;

pub use alpha::{AlphaMask, OPAQUE_THRESHOLD};
pub use grid::{GridMeshBuilder, MIN_CELL_SIZE};
pub use topology::{HEX_CONNECTION_COUNT, HexConnection, MeshTopology};
pub use transition::{Transition, TransitionCreator, Transitions};
