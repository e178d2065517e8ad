use nalgebra::Vector3;

use crate::config::VirtualBonePolicy;
use crate::pose::{Landmark, Side};
use crate::skeleton::model::SkeletonModel;

/// 実測の関節同士を結ぶか、推定アンカーを使うか
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoneKind {
    Real,
    Virtual,
}

/// ボーン端点
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    Joint(Landmark),
    /// 左右肩の中点
    Neck,
    /// 左右ヒップの中点
    Pelvis,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoneDescriptor {
    pub name: &'static str,
    pub start: Anchor,
    pub end: Anchor,
    pub kind: BoneKind,
    pub side: Side,
}

const fn real(name: &'static str, start: Landmark, end: Landmark, side: Side) -> BoneDescriptor {
    BoneDescriptor {
        name,
        start: Anchor::Joint(start),
        end: Anchor::Joint(end),
        kind: BoneKind::Real,
        side,
    }
}

const fn virtual_bone(name: &'static str, start: Anchor, end: Anchor, side: Side) -> BoneDescriptor {
    BoneDescriptor {
        name,
        start,
        end,
        kind: BoneKind::Virtual,
        side,
    }
}

pub const REAL_BONE_COUNT: usize = 21;
pub const VIRTUAL_BONE_COUNT: usize = 5;
pub const BONE_COUNT: usize = REAL_BONE_COUNT + VIRTUAL_BONE_COUNT;

/// 骨格トポロジー。実ボーン、仮想ボーンの順
///
/// 肩-ヒップ間や左右ヒップ間の「箱」は張らず、胴体は仮想ボーン (背骨・鎖骨・腰骨) で表す。
pub static BONES: [BoneDescriptor; BONE_COUNT] = {
    use Landmark::*;
    [
        // 顔
        real("face_l_eye_inner", Nose, LeftEyeInner, Side::Left),
        real("face_l_eye", LeftEyeInner, LeftEye, Side::Left),
        real("face_l_eye_outer", LeftEye, LeftEyeOuter, Side::Left),
        real("face_l_ear", LeftEyeOuter, LeftEar, Side::Left),
        real("face_r_eye_inner", Nose, RightEyeInner, Side::Right),
        real("face_r_eye", RightEyeInner, RightEye, Side::Right),
        real("face_r_eye_outer", RightEye, RightEyeOuter, Side::Right),
        real("face_r_ear", RightEyeOuter, RightEar, Side::Right),
        // 口
        real("mouth", MouthLeft, MouthRight, Side::Center),
        // 腕
        real("l_upper_arm", LeftShoulder, LeftElbow, Side::Left),
        real("l_forearm", LeftElbow, LeftWrist, Side::Left),
        real("r_upper_arm", RightShoulder, RightElbow, Side::Right),
        real("r_forearm", RightElbow, RightWrist, Side::Right),
        // 脚
        real("l_thigh", LeftHip, LeftKnee, Side::Left),
        real("l_shin", LeftKnee, LeftAnkle, Side::Left),
        real("r_thigh", RightHip, RightKnee, Side::Right),
        real("r_shin", RightKnee, RightAnkle, Side::Right),
        // 足
        real("l_heel", LeftAnkle, LeftHeel, Side::Left),
        real("l_foot", LeftHeel, LeftFootIndex, Side::Left),
        real("r_heel", RightAnkle, RightHeel, Side::Right),
        real("r_foot", RightHeel, RightFootIndex, Side::Right),
        // 仮想ボーン
        virtual_bone("spine", Anchor::Neck, Anchor::Pelvis, Side::Center),
        virtual_bone("l_clavicle", Anchor::Neck, Anchor::Joint(LeftShoulder), Side::Left),
        virtual_bone("r_clavicle", Anchor::Neck, Anchor::Joint(RightShoulder), Side::Right),
        virtual_bone("l_hip_bone", Anchor::Pelvis, Anchor::Joint(LeftHip), Side::Left),
        virtual_bone("r_hip_bone", Anchor::Pelvis, Anchor::Joint(RightHip), Side::Right),
    ]
};

/// 胴体の推定アンカー。肩・ヒップの4点が全てアクティブなときのみ得られる
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TorsoAnchors {
    pub left_shoulder: Vector3<f32>,
    pub right_shoulder: Vector3<f32>,
    pub left_hip: Vector3<f32>,
    pub right_hip: Vector3<f32>,
    pub neck: Vector3<f32>,
    pub pelvis: Vector3<f32>,
}

impl TorsoAnchors {
    pub fn from_model(model: &SkeletonModel) -> Option<Self> {
        let required = [
            Landmark::LeftShoulder,
            Landmark::RightShoulder,
            Landmark::LeftHip,
            Landmark::RightHip,
        ];
        if !required.iter().all(|&l| model.is_active(l)) {
            return None;
        }

        let left_shoulder = model.joint(Landmark::LeftShoulder).position;
        let right_shoulder = model.joint(Landmark::RightShoulder).position;
        let left_hip = model.joint(Landmark::LeftHip).position;
        let right_hip = model.joint(Landmark::RightHip).position;

        Some(Self {
            left_shoulder,
            right_shoulder,
            left_hip,
            right_hip,
            neck: (left_shoulder + right_shoulder) / 2.0,
            pelvis: (left_hip + right_hip) / 2.0,
        })
    }
}

/// 描画側に渡すボーンの変換
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoneTransform {
    pub active: bool,
    pub midpoint: Vector3<f32>,
    /// ボーンの向き (単位ベクトル、長さ0のときはゼロ)
    pub orientation: Vector3<f32>,
    /// (太さ, 長さ/2, 太さ)。描画用シリンダーは高さ2単位
    pub scale: Vector3<f32>,
    pub side: Side,
}

/// 1本のボーンの計算結果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoneSegment {
    pub start: Vector3<f32>,
    pub end: Vector3<f32>,
    pub midpoint: Vector3<f32>,
    pub direction: Vector3<f32>,
    pub length: f32,
    pub thickness: f32,
    pub active: bool,
}

impl Default for BoneSegment {
    fn default() -> Self {
        Self {
            start: Vector3::zeros(),
            end: Vector3::zeros(),
            midpoint: Vector3::zeros(),
            direction: Vector3::zeros(),
            length: 0.0,
            thickness: 0.0,
            active: false,
        }
    }
}

impl BoneSegment {
    /// 端点からボーンを更新してアクティブにする
    ///
    /// 中点・向き・長さが f32 で表せない場合は非表示にする。
    pub fn set(&mut self, start: Vector3<f32>, end: Vector3<f32>, thickness: f32) {
        let (s, e) = (start.cast::<f64>(), end.cast::<f64>());
        let midpoint = ((s + e) / 2.0).cast::<f32>();
        let direction = (e - s).cast::<f32>();
        let length = (e - s).norm() as f32;
        if !(midpoint.iter().all(|v| v.is_finite())
            && direction.iter().all(|v| v.is_finite())
            && length.is_finite())
        {
            self.deactivate();
            return;
        }
        self.start = start;
        self.end = end;
        self.midpoint = midpoint;
        self.direction = direction;
        self.length = length;
        self.thickness = thickness;
        self.active = true;
    }

    /// 非表示にする。数値は直前の値のまま
    pub fn deactivate(&mut self) {
        self.active = false;
    }

    pub fn transform(&self, side: Side) -> BoneTransform {
        let orientation = self
            .direction
            .try_normalize(f32::EPSILON)
            .unwrap_or_else(Vector3::zeros);
        BoneTransform {
            active: self.active,
            midpoint: self.midpoint,
            orientation,
            scale: Vector3::new(self.thickness, self.length * 0.5, self.thickness),
            side,
        }
    }
}

/// 全ボーンのストア。起動時に確保し、毎サイクルその場で更新する
#[derive(Debug, Clone)]
pub struct BoneRig {
    segments: [BoneSegment; BONE_COUNT],
    virtual_policy: VirtualBonePolicy,
}

impl BoneRig {
    pub fn new(virtual_policy: VirtualBonePolicy) -> Self {
        Self {
            segments: [BoneSegment::default(); BONE_COUNT],
            virtual_policy,
        }
    }

    /// モデルから全ボーンを再構成
    ///
    /// 実ボーンは両端がアクティブなときだけ表示し、それ以外は非表示にする。
    /// 仮想ボーンは肩・ヒップの4点が揃ったときだけ更新する。揃わないときは
    /// `VirtualBonePolicy::Hold` なら前回の状態のまま残す。
    pub fn reconstruct(&mut self, model: &SkeletonModel, thickness: f32) -> Option<TorsoAnchors> {
        let torso = TorsoAnchors::from_model(model);

        for (desc, segment) in BONES.iter().zip(self.segments.iter_mut()) {
            let endpoints = (
                resolve(desc.start, model, torso.as_ref()),
                resolve(desc.end, model, torso.as_ref()),
            );
            match (desc.kind, endpoints) {
                (_, (Some(start), Some(end))) => segment.set(start, end, thickness),
                (BoneKind::Real, _) => segment.deactivate(),
                (BoneKind::Virtual, _) => {
                    if self.virtual_policy == VirtualBonePolicy::Hide {
                        segment.deactivate();
                    }
                }
            }
        }

        torso
    }

    pub fn segments(&self) -> &[BoneSegment; BONE_COUNT] {
        &self.segments
    }

    /// ディスクリプタと対応するボーン
    pub fn iter(&self) -> impl Iterator<Item = (&'static BoneDescriptor, &BoneSegment)> {
        BONES.iter().zip(self.segments.iter())
    }

    pub fn by_name(&self, name: &str) -> Option<&BoneSegment> {
        self.iter().find(|(desc, _)| desc.name == name).map(|(_, seg)| seg)
    }

    pub fn active_count(&self) -> usize {
        self.segments.iter().filter(|s| s.active).count()
    }

    /// 描画用の変換を書き出す
    pub fn write_transforms(&self, out: &mut [BoneTransform]) {
        for ((desc, segment), slot) in self.iter().zip(out.iter_mut()) {
            *slot = segment.transform(desc.side);
        }
    }
}

fn resolve(anchor: Anchor, model: &SkeletonModel, torso: Option<&TorsoAnchors>) -> Option<Vector3<f32>> {
    match anchor {
        Anchor::Joint(landmark) => {
            let joint = model.joint(landmark);
            joint.active.then_some(joint.position)
        }
        Anchor::Neck => torso.map(|t| t.neck),
        Anchor::Pelvis => torso.map(|t| t.pelvis),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MissingJointPolicy;
    use crate::protocol::{SkeletonFrame, WireJoint, WireVector};
    use approx::assert_relative_eq;

    fn model_with(joints: &[(Landmark, [f32; 3], f32)]) -> SkeletonModel {
        let mut model = SkeletonModel::new(1.0, MissingJointPolicy::Hold);
        model.merge(&SkeletonFrame {
            frame: 0,
            joints: joints
                .iter()
                .map(|(l, p, v)| WireJoint::new(l.index() as i64, WireVector::new(p[0], p[1], p[2]), *v))
                .collect(),
        });
        model
    }

    fn all_joints(visibility: f32) -> SkeletonModel {
        let joints: Vec<_> = Landmark::ALL
            .iter()
            .map(|&l| (l, [l.index() as f32, 0.5 * l.index() as f32, 1.0], visibility))
            .collect();
        model_with(&joints)
    }

    fn torso(visibility: f32) -> Vec<(Landmark, [f32; 3], f32)> {
        vec![
            (Landmark::LeftShoulder, [1.0, -2.0, 0.0], visibility),
            (Landmark::RightShoulder, [-1.0, -2.0, 0.0], visibility),
            (Landmark::LeftHip, [0.5, 0.0, 0.2], visibility),
            (Landmark::RightHip, [-0.5, 0.0, 0.4], visibility),
        ]
    }

    #[test]
    fn test_segment_overflowing_f32_is_hidden() {
        let mut segment = BoneSegment::default();
        segment.set(Vector3::new(-1.0, 0.0, 0.0), Vector3::new(1.0, 0.0, 0.0), 0.1);
        assert!(segment.active);

        segment.set(Vector3::new(-3.0e38, 0.0, 0.0), Vector3::new(3.0e38, 0.0, 0.0), 0.1);
        assert!(!segment.active);
        // 直前の値はそのまま
        assert_eq!(segment.length, 2.0);
        let t = segment.transform(Side::Left);
        assert!(t.scale.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_segment_near_f32_limit_uses_wide_math() {
        let mut segment = BoneSegment::default();
        segment.set(Vector3::new(3.0e38, 0.0, 0.0), Vector3::new(3.0e38, 1.0e38, 0.0), 0.1);
        assert!(segment.active);
        assert_relative_eq!(segment.midpoint.y, 0.5e38, max_relative = 1e-6);
        assert_relative_eq!(segment.length, 1.0e38, max_relative = 1e-6);
    }

    #[test]
    fn test_topology_counts() {
        assert_eq!(BONES.iter().filter(|b| b.kind == BoneKind::Real).count(), REAL_BONE_COUNT);
        assert_eq!(BONES.iter().filter(|b| b.kind == BoneKind::Virtual).count(), VIRTUAL_BONE_COUNT);
        // 実ボーンが先に並ぶ
        assert!(BONES[..REAL_BONE_COUNT].iter().all(|b| b.kind == BoneKind::Real));
    }

    #[test]
    fn test_bone_names_unique() {
        for (i, a) in BONES.iter().enumerate() {
            for b in &BONES[i + 1..] {
                assert_ne!(a.name, b.name);
            }
        }
    }

    #[test]
    fn test_real_bones_connect_joints_only() {
        for desc in BONES.iter().filter(|b| b.kind == BoneKind::Real) {
            assert!(matches!(desc.start, Anchor::Joint(_)));
            assert!(matches!(desc.end, Anchor::Joint(_)));
        }
    }

    #[test]
    fn test_torso_box_not_connected() {
        let pairs: Vec<_> = BONES
            .iter()
            .filter_map(|b| match (b.start, b.end) {
                (Anchor::Joint(a), Anchor::Joint(b)) => Some((a, b)),
                _ => None,
            })
            .collect();
        assert!(!pairs.contains(&(Landmark::LeftShoulder, Landmark::LeftHip)));
        assert!(!pairs.contains(&(Landmark::LeftHip, Landmark::RightHip)));
    }

    #[test]
    fn test_segment_geometry() {
        let mut segment = BoneSegment::default();
        segment.set(Vector3::new(0.0, 0.0, 0.0), Vector3::new(0.0, 4.0, 0.0), 0.15);
        assert!(segment.active);
        assert_eq!(segment.midpoint, Vector3::new(0.0, 2.0, 0.0));
        assert_eq!(segment.direction, Vector3::new(0.0, 4.0, 0.0));
        assert_eq!(segment.length, 4.0);

        let t = segment.transform(Side::Left);
        assert_eq!(t.orientation, Vector3::new(0.0, 1.0, 0.0));
        assert_eq!(t.scale, Vector3::new(0.15, 2.0, 0.15));
        assert_eq!(t.side, Side::Left);
    }

    #[test]
    fn test_zero_length_orientation() {
        let mut segment = BoneSegment::default();
        segment.set(Vector3::new(1.0, 1.0, 1.0), Vector3::new(1.0, 1.0, 1.0), 0.1);
        assert_eq!(segment.transform(Side::Center).orientation, Vector3::zeros());
    }

    #[test]
    fn test_all_active_reconstructs_everything() {
        let model = all_joints(0.9);
        let mut rig = BoneRig::new(VirtualBonePolicy::Hold);
        let torso = rig.reconstruct(&model, 0.15);
        assert!(torso.is_some());
        assert_eq!(rig.active_count(), BONE_COUNT);
        assert!(rig.segments().iter().all(|s| s.thickness == 0.15));
    }

    #[test]
    fn test_real_bone_active_iff_both_endpoints_active() {
        // 偶数 id だけアクティブ
        let joints: Vec<_> = Landmark::ALL
            .iter()
            .map(|&l| (l, [l.index() as f32, 1.0, 0.0], if l.index() % 2 == 0 { 0.9 } else { 0.1 }))
            .collect();
        let model = model_with(&joints);
        let mut rig = BoneRig::new(VirtualBonePolicy::Hold);
        rig.reconstruct(&model, 0.1);

        for (desc, segment) in rig.iter().filter(|(d, _)| d.kind == BoneKind::Real) {
            let (Anchor::Joint(a), Anchor::Joint(b)) = (desc.start, desc.end) else {
                unreachable!()
            };
            assert_eq!(segment.active, model.is_active(a) && model.is_active(b), "{}", desc.name);
        }
    }

    #[test]
    fn test_real_bone_deactivated_when_endpoint_lost() {
        let mut model = all_joints(0.9);
        let mut rig = BoneRig::new(VirtualBonePolicy::Hold);
        rig.reconstruct(&model, 0.1);
        assert!(rig.by_name("l_forearm").unwrap().active);

        model.merge(&SkeletonFrame {
            frame: 1,
            joints: vec![WireJoint::new(15, WireVector::default(), 0.2)],
        });
        rig.reconstruct(&model, 0.1);
        assert!(!rig.by_name("l_forearm").unwrap().active);
        assert!(rig.by_name("l_upper_arm").unwrap().active);
    }

    #[test]
    fn test_virtual_bones_from_midpoints() {
        let model = model_with(&torso(0.9));
        let mut rig = BoneRig::new(VirtualBonePolicy::Hold);
        let anchors = rig.reconstruct(&model, 0.1).unwrap();

        // 表示座標は Y 反転済み
        assert_relative_eq!(anchors.neck, Vector3::new(0.0, 2.0, 0.0), epsilon = 1e-6);
        assert_relative_eq!(anchors.pelvis, Vector3::new(0.0, 0.0, 0.3), epsilon = 1e-6);

        let spine = rig.by_name("spine").unwrap();
        assert!(spine.active);
        assert_relative_eq!(spine.start, anchors.neck);
        assert_relative_eq!(spine.end, anchors.pelvis);

        let l_clavicle = rig.by_name("l_clavicle").unwrap();
        assert_relative_eq!(l_clavicle.end, model.joint(Landmark::LeftShoulder).position);
        let r_hip = rig.by_name("r_hip_bone").unwrap();
        assert_relative_eq!(r_hip.start, anchors.pelvis);
        assert_relative_eq!(r_hip.end, model.joint(Landmark::RightHip).position);
    }

    #[test]
    fn test_virtual_bones_require_all_four_anchors() {
        let mut joints = torso(0.9);
        joints[3].2 = 0.3;
        let model = model_with(&joints);
        let mut rig = BoneRig::new(VirtualBonePolicy::Hold);
        assert!(rig.reconstruct(&model, 0.1).is_none());
        for (_, segment) in rig.iter().filter(|(d, _)| d.kind == BoneKind::Virtual) {
            assert!(!segment.active);
        }
    }

    #[test]
    fn test_virtual_bones_hold_when_anchor_lost() {
        let mut model = model_with(&torso(0.9));
        let mut rig = BoneRig::new(VirtualBonePolicy::Hold);
        rig.reconstruct(&model, 0.1);
        let before = *rig.by_name("spine").unwrap();

        model.merge(&SkeletonFrame {
            frame: 1,
            joints: vec![WireJoint::new(23, WireVector::default(), 0.1)],
        });
        rig.reconstruct(&model, 0.1);
        assert_eq!(rig.by_name("spine").unwrap(), &before);
        assert!(rig.by_name("l_hip_bone").unwrap().active);
    }

    #[test]
    fn test_virtual_bones_hide_policy() {
        let mut model = model_with(&torso(0.9));
        let mut rig = BoneRig::new(VirtualBonePolicy::Hide);
        rig.reconstruct(&model, 0.1);

        model.merge(&SkeletonFrame {
            frame: 1,
            joints: vec![WireJoint::new(23, WireVector::default(), 0.1)],
        });
        rig.reconstruct(&model, 0.1);
        for (_, segment) in rig.iter().filter(|(d, _)| d.kind == BoneKind::Virtual) {
            assert!(!segment.active);
        }
    }

    #[test]
    fn test_write_transforms() {
        let model = all_joints(0.9);
        let mut rig = BoneRig::new(VirtualBonePolicy::Hold);
        rig.reconstruct(&model, 0.2);
        let mut out = [BoneSegment::default().transform(Side::Center); BONE_COUNT];
        rig.write_transforms(&mut out);
        for ((desc, segment), t) in rig.iter().zip(out.iter()) {
            assert_eq!(t.side, desc.side);
            assert_eq!(t.midpoint, segment.midpoint);
            assert_eq!(t.active, segment.active);
        }
    }
}
