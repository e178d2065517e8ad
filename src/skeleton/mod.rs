pub mod angle;
pub mod bones;
pub mod model;

pub use angle::{joint_angle, JointAngles};
pub use bones::{
    Anchor, BoneDescriptor, BoneKind, BoneRig, BoneSegment, BoneTransform, TorsoAnchors, BONES,
    BONE_COUNT,
};
pub use model::{Joint, JointTransform, MergeSummary, SkeletonModel, VISIBILITY_THRESHOLD};
