//! Rig Settings
//!
//! Tunable parameters shared by mesh generation, weight building and the
//! worker pool. Algorithm-defining constants (influence capacity, palette
//! size, radius threshold) live next to the code that owns them.
//!
//! ```rust,ignore
//! use marionette::settings::RigSettings;
//!
//! let settings = RigSettings {
//!     cell_size: 24,
//!     worker_threads: 2,
//!     ..Default::default()
//! };
//! ```

use serde::{Deserialize, Serialize};

use crate::skinning::palette::MAX_PALETTE_COUNT;

/// Engine-wide tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RigSettings {
    /// Width in pixels of one hexagonal lattice cell used by mesh generation.
    pub cell_size: u32,
    /// Upper bound of bones considered by weight builds.
    pub max_bone_count: usize,
    /// Number of background threads in the weight-build pool.
    pub worker_threads: usize,
    /// Influences below this weight are discarded.
    pub weight_epsilon: f32,
    /// Below this summed weight, the shortfall is spread instead of rescaled.
    pub min_weight_sum: f32,
    /// Maximum depth of the spatial partition used for transitions.
    pub bsp_max_depth: u32,
}

impl Default for RigSettings {
    fn default() -> Self {
        let threads = std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get);
        Self {
            cell_size: 16,
            max_bone_count: MAX_PALETTE_COUNT,
            worker_threads: threads.clamp(1, 4),
            weight_epsilon: f32::EPSILON,
            min_weight_sum: 0.01,
            bsp_max_depth: 10,
        }
    }
}

impl RigSettings {
    /// Returns a copy with every field forced into its usable range.
    #[must_use]
    pub fn sanitized(&self) -> Self {
        Self {
            cell_size: self.cell_size.max(2),
            max_bone_count: self.max_bone_count.clamp(1, MAX_PALETTE_COUNT),
            worker_threads: self.worker_threads.max(1),
            weight_epsilon: self.weight_epsilon.max(0.0),
            min_weight_sum: self.min_weight_sum.max(f32::EPSILON),
            bsp_max_depth: self.bsp_max_depth.max(1),
        }
    }
}
