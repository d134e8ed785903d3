//! Rig structure: skeletons, bone influence shapes and the node tree.

pub mod bone;
pub mod shape;
pub mod tree;

pub use bone::{Bone, BoneId, PreOrderBones, Skeleton};
pub use shape::{BendRange, BoneShape, RANGE_EXTEND_RATE, RANGE_MIN, capsule_outline};
pub use tree::{NodeId, RigNode, RigTree};
