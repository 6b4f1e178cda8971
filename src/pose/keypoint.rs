use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 解析で使う上半身ランドマーク
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(usize)]
pub enum LandmarkId {
    Nose = 0,
    LeftShoulder = 1,
    RightShoulder = 2,
    LeftElbow = 3,
    RightElbow = 4,
    LeftWrist = 5,
    RightWrist = 6,
    LeftHip = 7,
    RightHip = 8,
}

impl LandmarkId {
    pub const COUNT: usize = 9;

    pub const ALL: [LandmarkId; Self::COUNT] = [
        Self::Nose,
        Self::LeftShoulder,
        Self::RightShoulder,
        Self::LeftElbow,
        Self::RightElbow,
        Self::LeftWrist,
        Self::RightWrist,
        Self::LeftHip,
        Self::RightHip,
    ];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

/// 単一ランドマーク
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    /// 正規化されたX座標 (0.0〜1.0)
    pub x: f32,
    /// 正規化されたY座標 (0.0〜1.0, 下向きが正)
    pub y: f32,
    /// 奥行き。2D推定器では0。角度計算には使わない
    #[serde(default)]
    pub z: f32,
    /// 可視性/信頼度 (0.0〜1.0)
    pub visibility: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32, visibility: f32) -> Self {
        Self { x, y, z: 0.0, visibility }
    }

    pub fn with_z(x: f32, y: f32, z: f32, visibility: f32) -> Self {
        Self { x, y, z, visibility }
    }

    /// 信頼度が閾値以上か
    pub fn is_visible(&self, threshold: f32) -> bool {
        self.visibility >= threshold
    }

    /// 画像平面への投影
    pub fn point(&self) -> [f32; 2] {
        [self.x, self.y]
    }
}

impl Default for Landmark {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            z: 0.0,
            visibility: 0.0,
        }
    }
}

/// 1フレーム分のランドマーク。未検出のランドマークは visibility 0
///
/// JSONでは `{"left_shoulder": {"x": .., "y": .., "visibility": ..}, ...}` の形をとる。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<LandmarkId, Landmark>", into = "BTreeMap<LandmarkId, Landmark>")]
pub struct LandmarkFrame {
    landmarks: [Landmark; LandmarkId::COUNT],
}

impl LandmarkFrame {
    pub fn new() -> Self {
        Self {
            landmarks: [Landmark::default(); LandmarkId::COUNT],
        }
    }

    pub fn with(mut self, id: LandmarkId, landmark: Landmark) -> Self {
        self.set(id, landmark);
        self
    }

    pub fn set(&mut self, id: LandmarkId, landmark: Landmark) {
        self.landmarks[id as usize] = landmark;
    }

    pub fn get(&self, id: LandmarkId) -> &Landmark {
        &self.landmarks[id as usize]
    }

    pub fn point(&self, id: LandmarkId) -> [f32; 2] {
        self.get(id).point()
    }

    /// 全ての指定ランドマークが閾値以上で見えているか
    pub fn all_visible(&self, ids: &[LandmarkId], threshold: f32) -> bool {
        ids.iter().all(|&id| self.get(id).is_visible(threshold))
    }

    /// 指定ランドマークの平均visibility
    pub fn confidence(&self, ids: &[LandmarkId]) -> f32 {
        if ids.is_empty() {
            return 0.0;
        }
        let sum: f32 = ids.iter().map(|&id| self.get(id).visibility).sum();
        sum / ids.len() as f32
    }
}

impl Default for LandmarkFrame {
    fn default() -> Self {
        Self::new()
    }
}

impl From<BTreeMap<LandmarkId, Landmark>> for LandmarkFrame {
    fn from(map: BTreeMap<LandmarkId, Landmark>) -> Self {
        let mut frame = Self::new();
        for (id, landmark) in map {
            frame.set(id, landmark);
        }
        frame
    }
}

impl From<LandmarkFrame> for BTreeMap<LandmarkId, Landmark> {
    fn from(frame: LandmarkFrame) -> Self {
        LandmarkId::ALL
            .iter()
            .map(|&id| (id, *frame.get(id)))
            .filter(|(_, lm)| lm.visibility > 0.0)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_landmark_id_from_index() {
        assert_eq!(LandmarkId::from_index(0), Some(LandmarkId::Nose));
        assert_eq!(LandmarkId::from_index(8), Some(LandmarkId::RightHip));
        assert_eq!(LandmarkId::from_index(9), None);
        for (i, id) in LandmarkId::ALL.iter().enumerate() {
            assert_eq!(*id as usize, i);
        }
    }

    #[test]
    fn test_landmark_is_visible() {
        let lm = Landmark::new(0.5, 0.5, 0.7);
        assert!(lm.is_visible(0.5));
        assert!(!lm.is_visible(0.8));
    }

    #[test]
    fn test_frame_default_is_invisible() {
        let frame = LandmarkFrame::new();
        assert!(!frame.all_visible(&[LandmarkId::LeftShoulder], 0.1));
        assert_eq!(frame.confidence(&[LandmarkId::LeftShoulder, LandmarkId::RightShoulder]), 0.0);
    }

    #[test]
    fn test_frame_confidence_average() {
        let frame = LandmarkFrame::new()
            .with(LandmarkId::LeftShoulder, Landmark::new(0.4, 0.3, 0.9))
            .with(LandmarkId::RightShoulder, Landmark::new(0.6, 0.3, 0.5));
        let c = frame.confidence(&[LandmarkId::LeftShoulder, LandmarkId::RightShoulder]);
        assert!((c - 0.7).abs() < 1e-6);
        assert!(frame.all_visible(&[LandmarkId::LeftShoulder, LandmarkId::RightShoulder], 0.5));
        assert!(!frame.all_visible(&[LandmarkId::LeftShoulder, LandmarkId::RightShoulder], 0.6));
    }

    #[test]
    fn test_frame_json_map_form() {
        let json = r#"{"right_elbow": {"x": 0.4, "y": 0.45, "visibility": 0.9},
                       "nose": {"x": 0.5, "y": 0.1, "z": -0.2, "visibility": 0.8}}"#;
        let frame: LandmarkFrame = serde_json::from_str(json).unwrap();
        assert_eq!(frame.point(LandmarkId::RightElbow), [0.4, 0.45]);
        assert_eq!(frame.get(LandmarkId::Nose).z, -0.2);
        assert_eq!(frame.get(LandmarkId::LeftWrist).visibility, 0.0);
    }
}
