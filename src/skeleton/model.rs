use nalgebra::Vector3;

use crate::config::MissingJointPolicy;
use crate::pose::Landmark;
use crate::protocol::{SkeletonFrame, WireVector};

/// この値を超える visibility の関節をアクティブとみなす
pub const VISIBILITY_THRESHOLD: f32 = 0.5;

/// 表示空間での関節
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Joint {
    pub position: Vector3<f32>,
    pub visibility: f32,
    pub active: bool,
}

impl Default for Joint {
    fn default() -> Self {
        Self {
            position: Vector3::zeros(),
            visibility: 0.0,
            active: false,
        }
    }
}

impl Joint {
    /// 描画用の変換。scale は関節球の直径
    pub fn transform(&self, scale: f32) -> JointTransform {
        JointTransform {
            active: self.active,
            position: self.position,
            scale,
        }
    }
}

/// 描画側に渡す関節の変換
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointTransform {
    pub active: bool,
    pub position: Vector3<f32>,
    pub scale: f32,
}

/// merge の結果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MergeSummary {
    /// 上書きした関節数
    pub updated: usize,
    /// 範囲外 id、または座標・信頼度が有限でないため無視したエントリ数
    pub ignored: usize,
    /// フレームに無く非表示にした関節数 (Hide のときのみ)
    pub hidden: usize,
}

/// 現在の姿勢。33スロット固定で、起動時に確保して以後は上書きのみ
#[derive(Debug, Clone)]
pub struct SkeletonModel {
    joints: [Joint; Landmark::COUNT],
    scale: f32,
    missing: MissingJointPolicy,
    last_frame: Option<u64>,
}

impl SkeletonModel {
    pub fn new(scale: f32, missing: MissingJointPolicy) -> Self {
        Self {
            joints: [Joint::default(); Landmark::COUNT],
            scale,
            missing,
            last_frame: None,
        }
    }

    /// ワイヤー座標 → 表示座標 (Y反転 + 一様スケール)
    pub fn to_display(&self, position: WireVector) -> Vector3<f32> {
        Vector3::new(position.x, -position.y, position.z) * self.scale
    }

    /// デコード済みフレームを取り込む
    pub fn merge(&mut self, frame: &SkeletonFrame) -> MergeSummary {
        let mut summary = MergeSummary::default();
        let mut seen = [false; Landmark::COUNT];

        for wire in &frame.joints {
            let Some(landmark) = Landmark::from_wire_id(wire.id) else {
                summary.ignored += 1;
                continue;
            };
            // f32 に収まらない値やスケール後に溢れる値は取り込まない
            let position = self.to_display(wire.position);
            if !position.iter().all(|v| v.is_finite()) || !wire.visibility.is_finite() {
                summary.ignored += 1;
                continue;
            }
            let joint = &mut self.joints[landmark.index()];
            joint.position = position;
            joint.visibility = wire.visibility;
            joint.active = wire.visibility > VISIBILITY_THRESHOLD;
            seen[landmark.index()] = true;
            summary.updated += 1;
        }

        if self.missing == MissingJointPolicy::Hide {
            for (joint, _) in self.joints.iter_mut().zip(seen).filter(|(_, seen)| !*seen) {
                if joint.active {
                    summary.hidden += 1;
                }
                joint.active = false;
            }
        }

        self.last_frame = Some(frame.frame);
        summary
    }

    pub fn joint(&self, landmark: Landmark) -> &Joint {
        &self.joints[landmark.index()]
    }

    pub fn get(&self, index: usize) -> Option<&Joint> {
        self.joints.get(index)
    }

    pub fn is_active(&self, landmark: Landmark) -> bool {
        self.joint(landmark).active
    }

    pub fn joints(&self) -> &[Joint; Landmark::COUNT] {
        &self.joints
    }

    pub fn active_count(&self) -> usize {
        self.joints.iter().filter(|j| j.active).count()
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// 最後に取り込んだフレーム番号
    pub fn last_frame(&self) -> Option<u64> {
        self.last_frame
    }
}
