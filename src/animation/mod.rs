pub mod easing;
pub mod evaluator;
pub mod expansion;
pub mod frame;
pub mod gatherer;
pub mod keys;
pub mod seeker;
pub mod spline;
pub mod values;

pub use easing::{Easing, EasingRange, EasingType};
pub use evaluator::{FrameEvaluator, Snapshot};
pub use expansion::{Expansion, KeyChannel, KeyRef, SrtExpansion};
pub use frame::{Frame, TimeInfo};
pub use gatherer::{ForceParent, GatherPoint, KeyGatherer, find_last_key};
pub use keys::{
    BindingCache, BoneKey, FfdBuffer, ImageArea, InfluenceCache, Key, KeyMap, MeshKey, OpaKey, PoseKey, SplineType,
    SrtKey, Timeline,
};
pub use seeker::{Ancestors, PreOrder, SeekData, TreeSeeker};
pub use spline::{FergusonCoonsSpline, SplinePoint};
pub use values::{Interpolatable, blend_buffers};
