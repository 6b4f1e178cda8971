pub mod buffer;
pub mod controller;

pub use buffer::MeasurementBuffer;
pub use controller::{CalibrationController, CalibrationProgress, CalibrationStep, Measurements};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// ユーザーごとの閾値
///
/// 角度は度、手首高さは肩からの高さ（正規化画像座標、上が正）。
/// `calibrated == false` はデフォルト値と同じ扱い。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationData {
    pub neutral_trunk_angle: f32,
    pub right_min_angle: f32,
    pub right_max_angle: f32,
    pub left_min_angle: f32,
    pub left_max_angle: f32,
    pub vertical_tolerance: f32,
    pub trunk_tolerance: f32,

    pub press_start_angle: f32,
    pub press_top_angle: f32,
    pub press_start_wrist_height: f32,
    pub press_top_wrist_height: f32,
    pub press_arm_sync_tolerance: f32,
    pub press_trunk_tolerance: f32,

    pub calibrated: bool,
    pub calibrated_at: Option<DateTime<Local>>,
}

impl Default for CalibrationData {
    fn default() -> Self {
        Self {
            neutral_trunk_angle: 180.0,
            right_min_angle: 30.0,
            right_max_angle: 170.0,
            left_min_angle: 30.0,
            left_max_angle: 170.0,
            vertical_tolerance: 25.0,
            trunk_tolerance: 20.0,
            press_start_angle: 90.0,
            press_top_angle: 165.0,
            press_start_wrist_height: 0.0,
            press_top_wrist_height: 0.25,
            press_arm_sync_tolerance: 25.0,
            press_trunk_tolerance: 20.0,
            calibrated: false,
            calibrated_at: None,
        }
    }
}

impl CalibrationData {
    /// 測定値から閾値を導出する。測定の無い項目はデフォルトのまま
    pub fn from_measurements(m: &Measurements) -> Self {
        let mut data = Self::default();

        if let Some(trunk) = m.neutral_trunk {
            data.neutral_trunk_angle = trunk;
        }
        if let Some(flex) = m.right_flex_angle {
            data.right_min_angle = flex + 15.0;
        }
        if let Some(extend) = m.right_extend_angle {
            data.right_max_angle = extend - 10.0;
        }
        if let Some(flex) = m.left_flex_angle {
            data.left_min_angle = flex + 15.0;
        }
        if let Some(extend) = m.left_extend_angle {
            data.left_max_angle = extend - 10.0;
        }

        let right_vert = m.right_verticality.unwrap_or(0.0);
        let left_vert = m.left_verticality.unwrap_or(0.0);
        data.vertical_tolerance = ((right_vert + left_vert) / 2.0 + 5.0).max(20.0);
        data.trunk_tolerance = ((data.neutral_trunk_angle - 180.0).abs() + 10.0).max(20.0);

        if let Some(start) = m.press_start_angle {
            data.press_start_angle = start + 10.0;
        }
        if let Some(top) = m.press_top_angle {
            data.press_top_angle = top - 10.0;
        }
        if let Some(h) = m.press_start_wrist_height {
            data.press_start_wrist_height = h;
        }
        if let Some(h) = m.press_top_wrist_height {
            data.press_top_wrist_height = h;
        }
        if let Some(sync) = m.press_arm_sync {
            data.press_arm_sync_tolerance = (sync + 10.0).max(15.0);
        }
        if let Some(dev) = m.press_trunk_deviation {
            data.press_trunk_tolerance = (dev + 10.0).max(15.0);
        }

        data.calibrated = true;
        data.calibrated_at = Some(Local::now());
        data
    }

    pub fn is_calibrated(&self) -> bool {
        self.calibrated
    }

    /// 判定に使う値。未キャリブレーションの記録は中身を問わずデフォルトと同じ
    pub fn effective(&self) -> CalibrationData {
        if self.calibrated {
            self.clone()
        } else {
            Self::default()
        }
    }
}

pub fn save_calibration<P: AsRef<Path>>(path: P, data: &CalibrationData) -> Result<()> {
    let path = path.as_ref();
    let json = serde_json::to_string_pretty(data)?;
    fs::write(path, json)
        .with_context(|| format!("Failed to write calibration file {}", path.display()))?;
    Ok(())
}

pub fn load_calibration<P: AsRef<Path>>(path: P) -> Result<CalibrationData> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read calibration file {}", path.display()))?;
    let data: CalibrationData = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse calibration file {}", path.display()))?;
    Ok(data)
}

/// ファイルが無い・壊れている場合は未キャリブレーションのデフォルト
pub fn load_calibration_or_default<P: AsRef<Path>>(path: P) -> CalibrationData {
    let path = path.as_ref();
    if !path.exists() {
        return CalibrationData::default();
    }
    match load_calibration(path) {
        Ok(data) => data,
        Err(e) => {
            tracing::warn!("{:#}; using default calibration", e);
            CalibrationData::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_measurements() -> Measurements {
        Measurements {
            neutral_trunk: Some(176.0),
            right_flex_angle: Some(40.0),
            right_extend_angle: Some(172.0),
            left_flex_angle: Some(45.0),
            left_extend_angle: Some(170.0),
            right_verticality: Some(10.0),
            left_verticality: Some(30.0),
            press_start_angle: Some(85.0),
            press_top_angle: Some(172.0),
            press_start_wrist_height: Some(0.02),
            press_top_wrist_height: Some(0.3),
            press_arm_sync: Some(8.0),
            press_trunk_deviation: Some(2.0),
        }
    }

    #[test]
    fn test_default_is_uncalibrated() {
        let d = CalibrationData::default();
        assert!(!d.is_calibrated());
        assert!(d.calibrated_at.is_none());
        assert_eq!(d.neutral_trunk_angle, 180.0);
    }

    #[test]
    fn test_effective_ignores_uncalibrated_values() {
        let stale = CalibrationData {
            trunk_tolerance: 5.0,
            press_start_wrist_height: 0.4,
            ..CalibrationData::default()
        };
        assert_eq!(stale.effective(), CalibrationData::default());

        let d = CalibrationData::from_measurements(&full_measurements());
        assert_eq!(d.effective(), d);
    }

    #[test]
    fn test_threshold_derivation() {
        let d = CalibrationData::from_measurements(&full_measurements());
        assert!(d.is_calibrated());
        assert!(d.calibrated_at.is_some());
        assert_eq!(d.right_min_angle, 55.0);
        assert_eq!(d.right_max_angle, 162.0);
        assert_eq!(d.left_min_angle, 60.0);
        assert_eq!(d.left_max_angle, 160.0);
        // (10 + 30) / 2 + 5 = 25
        assert_eq!(d.vertical_tolerance, 25.0);
        // |176 - 180| + 10 = 14 → 下限20
        assert_eq!(d.trunk_tolerance, 20.0);
        assert_eq!(d.press_start_angle, 95.0);
        assert_eq!(d.press_top_angle, 162.0);
        assert_eq!(d.press_arm_sync_tolerance, 18.0);
        assert_eq!(d.press_trunk_tolerance, 15.0);
        assert_eq!(d.press_top_wrist_height, 0.3);
    }

    #[test]
    fn test_tolerance_floors() {
        let d = CalibrationData::from_measurements(&Measurements::default());
        assert_eq!(d.vertical_tolerance, 20.0);
        assert_eq!(d.trunk_tolerance, 20.0);
        assert_eq!(d.right_min_angle, 30.0);
        assert_eq!(d.press_arm_sync_tolerance, 25.0);
    }

    #[test]
    fn test_save_load_roundtrip() {
        let path = std::env::temp_dir().join("rep_coach_calibration_test.json");
        let d = CalibrationData::from_measurements(&full_measurements());
        save_calibration(&path, &d).unwrap();
        let loaded = load_calibration(&path).unwrap();
        assert_eq!(loaded.right_min_angle, d.right_min_angle);
        assert_eq!(loaded.calibrated_at, d.calibrated_at);
        assert!(loaded.calibrated);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_partial_record_fills_defaults() {
        let d: CalibrationData =
            serde_json::from_str(r#"{"right_min_angle": 50.0, "calibrated": true}"#).unwrap();
        assert_eq!(d.right_min_angle, 50.0);
        assert_eq!(d.left_min_angle, 30.0);
        assert!(d.calibrated_at.is_none());
    }

    #[test]
    fn test_missing_or_broken_file_is_default() {
        let missing = std::env::temp_dir().join("rep_coach_no_such_calibration.json");
        assert!(!load_calibration_or_default(&missing).calibrated);

        let broken = std::env::temp_dir().join("rep_coach_broken_calibration.json");
        fs::write(&broken, "{not json").unwrap();
        assert!(load_calibration(&broken).is_err());
        assert!(!load_calibration_or_default(&broken).calibrated);
        let _ = fs::remove_file(&broken);
    }
}
