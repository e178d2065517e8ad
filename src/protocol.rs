//! UDP wire format for skeleton frames.
//!
//! One datagram carries exactly one JSON document:
//! `{"frame": 12, "joints": [{"id": 0, "position": {"x": .., "y": .., "z": ..}, "visibility": 0.98}, ...]}`.
//! There is no length prefix and no version field.

use serde::{Deserialize, Serialize};

use crate::error::{DecodeError, EncodeError};

/// 1データグラムの最大ペイロード (UDP/IPv4)
pub const MAX_DATAGRAM_SIZE: usize = 65_507;

/// デフォルトの受信ポート
pub const DEFAULT_PORT: u16 = 5065;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WireVector {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl WireVector {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireJoint {
    /// ランドマーク id。範囲外 (0..=32 以外) もデコードは通し、マージ時に無視する
    pub id: i64,
    pub position: WireVector,
    /// 信頼度 (0.0〜1.0)
    pub visibility: f32,
}

impl WireJoint {
    pub fn new(id: i64, position: WireVector, visibility: f32) -> Self {
        Self {
            id,
            position,
            visibility,
        }
    }
}

/// デコード済みの1フレーム。マージ後すぐに破棄される
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SkeletonFrame {
    pub frame: u64,
    pub joints: Vec<WireJoint>,
}

/// ペイロード文字列をフレームにデコード
pub fn decode_frame(payload: &str) -> Result<SkeletonFrame, DecodeError> {
    let trimmed = payload.trim_matches(|c: char| c.is_whitespace() || c == '\0');
    if trimmed.is_empty() {
        return Err(DecodeError::Empty);
    }
    Ok(serde_json::from_str(trimmed)?)
}

/// フレームを1データグラム分のバイト列にエンコード
pub fn encode_frame(frame: &SkeletonFrame) -> Result<Vec<u8>, EncodeError> {
    let data = serde_json::to_vec(frame)?;
    if data.len() > MAX_DATAGRAM_SIZE {
        return Err(EncodeError::TooLarge {
            size: data.len(),
            max: MAX_DATAGRAM_SIZE,
        });
    }
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{"frame": 7, "joints": [
        {"id": 11, "position": {"x": 0.1, "y": -0.2, "z": 1.5}, "visibility": 0.93},
        {"id": 40, "position": {"x": 0.0, "y": 0.0, "z": 0.0}, "visibility": 0.1}
    ]}"#;

    #[test]
    fn test_decode_sample() {
        let frame = decode_frame(SAMPLE).unwrap();
        assert_eq!(frame.frame, 7);
        assert_eq!(frame.joints.len(), 2);
        assert_eq!(frame.joints[0].id, 11);
        assert_eq!(frame.joints[0].position, WireVector::new(0.1, -0.2, 1.5));
        assert_eq!(frame.joints[0].visibility, 0.93);
        // 範囲外 id もデコード自体は成功する
        assert_eq!(frame.joints[1].id, 40);
    }

    #[test]
    fn test_decode_ignores_unknown_fields() {
        let payload = r#"{"frame": 1, "source": "tracker", "joints": []}"#;
        let frame = decode_frame(payload).unwrap();
        assert_eq!(frame.frame, 1);
        assert!(frame.joints.is_empty());
    }

    #[test]
    fn test_decode_empty() {
        assert!(matches!(decode_frame(""), Err(DecodeError::Empty)));
        assert!(matches!(decode_frame("  \n"), Err(DecodeError::Empty)));
    }

    #[test]
    fn test_decode_malformed() {
        assert!(matches!(decode_frame("not json"), Err(DecodeError::Malformed(_))));
        // 途中で切れたペイロード
        let truncated = &SAMPLE[..SAMPLE.len() / 2];
        assert!(decode_frame(truncated).is_err());
    }

    #[test]
    fn test_decode_missing_joints() {
        assert!(decode_frame(r#"{"frame": 3}"#).is_err());
    }

    #[test]
    fn test_decode_missing_position_field() {
        let payload = r#"{"frame": 3, "joints": [{"id": 0, "position": {"x": 1.0, "y": 2.0}, "visibility": 1.0}]}"#;
        assert!(decode_frame(payload).is_err());
    }

    #[test]
    fn test_encode_decodes_back() {
        let frame = SkeletonFrame {
            frame: 42,
            joints: vec![WireJoint::new(0, WireVector::new(1.0, 2.0, 3.0), 0.75)],
        };
        let data = encode_frame(&frame).unwrap();
        let text = std::str::from_utf8(&data).unwrap();
        assert_eq!(decode_frame(text).unwrap(), frame);
    }

    #[test]
    fn test_encode_too_large() {
        let joints = (0..4000)
            .map(|i| WireJoint::new(i, WireVector::new(1.0, 2.0, 3.0), 0.5))
            .collect();
        let frame = SkeletonFrame { frame: 0, joints };
        assert!(matches!(
            encode_frame(&frame),
            Err(EncodeError::TooLarge { .. })
        ));
    }
}
