/// 体の左右区分。ボーンの色分けにも使う
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Left,
    Right,
    Center,
}

/// 33ランドマークのインデックス (ワイヤー上の id と一致)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum Landmark {
    Nose = 0,
    LeftEyeInner = 1,
    LeftEye = 2,
    LeftEyeOuter = 3,
    RightEyeInner = 4,
    RightEye = 5,
    RightEyeOuter = 6,
    LeftEar = 7,
    RightEar = 8,
    MouthLeft = 9,
    MouthRight = 10,
    LeftShoulder = 11,
    RightShoulder = 12,
    LeftElbow = 13,
    RightElbow = 14,
    LeftWrist = 15,
    RightWrist = 16,
    LeftPinky = 17,
    RightPinky = 18,
    LeftIndex = 19,
    RightIndex = 20,
    LeftThumb = 21,
    RightThumb = 22,
    LeftHip = 23,
    RightHip = 24,
    LeftKnee = 25,
    RightKnee = 26,
    LeftAnkle = 27,
    RightAnkle = 28,
    LeftHeel = 29,
    RightHeel = 30,
    LeftFootIndex = 31,
    RightFootIndex = 32,
}

impl Landmark {
    pub const COUNT: usize = 33;

    /// id順の全ランドマーク
    pub const ALL: [Landmark; Landmark::COUNT] = [
        Self::Nose,
        Self::LeftEyeInner,
        Self::LeftEye,
        Self::LeftEyeOuter,
        Self::RightEyeInner,
        Self::RightEye,
        Self::RightEyeOuter,
        Self::LeftEar,
        Self::RightEar,
        Self::MouthLeft,
        Self::MouthRight,
        Self::LeftShoulder,
        Self::RightShoulder,
        Self::LeftElbow,
        Self::RightElbow,
        Self::LeftWrist,
        Self::RightWrist,
        Self::LeftPinky,
        Self::RightPinky,
        Self::LeftIndex,
        Self::RightIndex,
        Self::LeftThumb,
        Self::RightThumb,
        Self::LeftHip,
        Self::RightHip,
        Self::LeftKnee,
        Self::RightKnee,
        Self::LeftAnkle,
        Self::RightAnkle,
        Self::LeftHeel,
        Self::RightHeel,
        Self::LeftFootIndex,
        Self::RightFootIndex,
    ];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// ワイヤー上の id (符号付き) から変換。範囲外は None
    pub fn from_wire_id(id: i64) -> Option<Self> {
        usize::try_from(id).ok().and_then(Self::from_index)
    }

    pub fn index(self) -> usize {
        self as usize
    }

    /// 被写体から見た左右
    pub fn side(self) -> Side {
        match self {
            Self::Nose => Side::Center,
            Self::LeftEyeInner
            | Self::LeftEye
            | Self::LeftEyeOuter
            | Self::LeftEar
            | Self::MouthLeft => Side::Left,
            Self::RightEyeInner
            | Self::RightEye
            | Self::RightEyeOuter
            | Self::RightEar
            | Self::MouthRight => Side::Right,
            // 11以降は奇数が左、偶数が右
            other if other.index() % 2 == 1 => Side::Left,
            _ => Side::Right,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_landmark_count() {
        assert_eq!(Landmark::COUNT, 33);
        assert_eq!(Landmark::ALL.len(), Landmark::COUNT);
    }

    #[test]
    fn test_all_is_in_id_order() {
        for (i, landmark) in Landmark::ALL.iter().enumerate() {
            assert_eq!(landmark.index(), i);
        }
    }

    #[test]
    fn test_from_index() {
        assert_eq!(Landmark::from_index(0), Some(Landmark::Nose));
        assert_eq!(Landmark::from_index(11), Some(Landmark::LeftShoulder));
        assert_eq!(Landmark::from_index(32), Some(Landmark::RightFootIndex));
        assert_eq!(Landmark::from_index(33), None);
    }

    #[test]
    fn test_from_wire_id_rejects_out_of_range() {
        assert_eq!(Landmark::from_wire_id(-1), None);
        assert_eq!(Landmark::from_wire_id(33), None);
        assert_eq!(Landmark::from_wire_id(i64::MAX), None);
        assert_eq!(Landmark::from_wire_id(24), Some(Landmark::RightHip));
    }

    #[test]
    fn test_side() {
        assert_eq!(Landmark::Nose.side(), Side::Center);
        assert_eq!(Landmark::LeftEar.side(), Side::Left);
        assert_eq!(Landmark::MouthRight.side(), Side::Right);
        assert_eq!(Landmark::LeftShoulder.side(), Side::Left);
        assert_eq!(Landmark::RightKnee.side(), Side::Right);
        assert_eq!(Landmark::LeftFootIndex.side(), Side::Left);
    }
}
