#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

pub mod animation;
pub mod codec;
pub mod errors;
pub mod math;
pub mod mesh;
pub mod rig;
pub mod settings;
pub mod skinning;

pub use animation::{Easing, EasingRange, EasingType, Expansion, Frame, FrameEvaluator, Snapshot, TimeInfo, Timeline};
pub use codec::{Deserializer, Persist, Serializer};
pub use errors::{Result, RigError};
pub use mesh::{AlphaMask, GridMeshBuilder, MeshTopology, TransitionCreator, Transitions};
pub use rig::{Bone, BoneId, BoneShape, NodeId, RigNode, RigTree, Skeleton};
pub use settings::RigSettings;
pub use skinning::{BoneWeightBuilder, InfluenceAccessor, SkinPalette, SkinningMode, WorkerPool, skin_positions};
