//! Skinning: bone influence tables, skin palettes and CPU deformation.

pub mod deform;
pub mod palette;
pub mod weights;
pub mod worker;

pub use deform::{SkinningMode, skin_positions};
pub use palette::{DualQuat, MAX_PALETTE_COUNT, PosePair, SkinPalette};
pub use weights::{BONES_PER_ROW, BoneWeightBuilder, InfluenceAccessor, InfluenceTable, MAX_INFLUENCES, TopK};
pub use worker::WorkerPool;
