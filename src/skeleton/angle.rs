use std::fmt::Write as _;

use crate::pose::Landmark;
use crate::skeleton::model::SkeletonModel;

/// 3関節 a-b-c の b における角度（度, 0〜180）
///
/// いずれかが非アクティブなら 0。
pub fn joint_angle(model: &SkeletonModel, a: Landmark, b: Landmark, c: Landmark) -> f32 {
    let (ja, jb, jc) = (model.joint(a), model.joint(b), model.joint(c));
    if !(ja.active && jb.active && jc.active) {
        return 0.0;
    }
    // f32 の端付近の座標でも内積・ノルムが溢れないよう f64 で計算する
    let b = jb.position.cast::<f64>();
    let ba = ja.position.cast::<f64>() - b;
    let bc = jc.position.cast::<f64>() - b;
    // 長さ0のベクトルは 0 を返す
    ba.angle(&bc).to_degrees() as f32
}

type Triple = (Landmark, Landmark, Landmark);

pub const LEFT_ELBOW: Triple = (Landmark::LeftShoulder, Landmark::LeftElbow, Landmark::LeftWrist);
pub const RIGHT_ELBOW: Triple = (Landmark::RightShoulder, Landmark::RightElbow, Landmark::RightWrist);
pub const LEFT_KNEE: Triple = (Landmark::LeftHip, Landmark::LeftKnee, Landmark::LeftAnkle);
pub const RIGHT_KNEE: Triple = (Landmark::RightHip, Landmark::RightKnee, Landmark::RightAnkle);

/// ダッシュボード・記録用の関節角度
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct JointAngles {
    pub left_elbow: f32,
    pub right_elbow: f32,
    pub left_knee: f32,
    pub right_knee: f32,
    /// 全ての角度の関節がアクティブだったか
    pub complete: bool,
}

impl JointAngles {
    pub fn compute(model: &SkeletonModel) -> Self {
        let angle = |(a, b, c): Triple| joint_angle(model, a, b, c);
        let complete = [LEFT_ELBOW, RIGHT_ELBOW, LEFT_KNEE, RIGHT_KNEE]
            .iter()
            .all(|&(a, b, c)| model.is_active(a) && model.is_active(b) && model.is_active(c));
        Self {
            left_elbow: angle(LEFT_ELBOW),
            right_elbow: angle(RIGHT_ELBOW),
            left_knee: angle(LEFT_KNEE),
            right_knee: angle(RIGHT_KNEE),
            complete,
        }
    }

    pub fn dashboard_text(&self) -> String {
        let mut text = String::from("SPINE TRACKER");
        for (label, value) in [
            ("L-Elbow", self.left_elbow),
            ("R-Elbow", self.right_elbow),
            ("L-Knee", self.left_knee),
            ("R-Knee", self.right_knee),
        ] {
            let _ = write!(text, "\n{}: {:.0}°", label, value);
        }
        text
    }
}
