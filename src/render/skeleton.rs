use crate::pose::Side;

/// 関節の色 (RGB)
pub const JOINT_COLOR: u32 = 0x9933E6; // 紫

/// 右側ボーンの色 (RGB)
pub const RIGHT_BONE_COLOR: u32 = 0x00FF00; // 緑

/// 左側・中央ボーンの色 (RGB)
pub const BONE_COLOR: u32 = 0xFFFFFF; // 白

/// 背景色
pub const BACKGROUND_COLOR: u32 = 0x101018;

/// 左右タグからボーンの色を決める
pub fn bone_color(side: Side) -> u32 {
    match side {
        Side::Right => RIGHT_BONE_COLOR,
        Side::Left | Side::Center => BONE_COLOR,
    }
}
