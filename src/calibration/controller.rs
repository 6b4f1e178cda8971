//! Step-by-step calibration protocol.
//!
//! Each step watches one metric while the user holds a pose and hands it to a
//! [`MeasurementBuffer`]. A step is accepted once the buffer settles; accepted
//! steps are never revisited.

use super::buffer::MeasurementBuffer;
use super::CalibrationData;
use crate::config::Config;
use crate::exercise::curl::{CurlFrontCalculator, CurlProfileCalculator};
use crate::exercise::press::PressFrontCalculator;
use crate::pose::LandmarkFrame;
use crate::tracker::{MetricCalculator, Phase, PoseAnalyzer};
use serde::{Deserialize, Serialize};

/// このティックに実測できたスナップショット。補間中や検出が途切れた後の値は使わない
fn measured<C: MetricCalculator>(analyzer: &PoseAnalyzer<C>) -> Option<&C::Snapshot> {
    if analyzer.is_interpolating() {
        None
    } else {
        analyzer.latest()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationStep {
    Neutral,
    RightFlex,
    RightExtend,
    LeftFlex,
    LeftExtend,
    PressStart,
    PressTop,
    Complete,
}

impl CalibrationStep {
    pub fn instruction(self) -> &'static str {
        match self {
            Self::Neutral => "Stand upright with your arms relaxed at your sides",
            Self::RightFlex => "Curl your right arm up as far as you can and hold",
            Self::RightExtend => "Lower your right arm until it is fully straight",
            Self::LeftFlex => "Curl your left arm up as far as you can and hold",
            Self::LeftExtend => "Lower your left arm until it is fully straight",
            Self::PressStart => "Raise both hands to shoulder height, ready to press",
            Self::PressTop => "Press both arms straight overhead and hold",
            Self::Complete => "Calibration complete",
        }
    }

    /// ステップ採用時の確認メッセージ
    pub fn confirmation(self) -> &'static str {
        match self {
            Self::Neutral => "Good. Now curl your right arm",
            Self::RightFlex => "Great. Now straighten your right arm",
            Self::RightExtend => "Well done. Now curl your left arm",
            Self::LeftFlex => "Great. Now straighten your left arm",
            Self::LeftExtend => "Nice. Now bring your hands to the press start",
            Self::PressStart => "Good. Now press overhead",
            Self::PressTop | Self::Complete => "Calibration complete",
        }
    }
}

/// 各ステップで確定した測定値。未測定は `None`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Measurements {
    pub neutral_trunk: Option<f32>,
    pub right_flex_angle: Option<f32>,
    pub right_extend_angle: Option<f32>,
    pub left_flex_angle: Option<f32>,
    pub left_extend_angle: Option<f32>,
    pub right_verticality: Option<f32>,
    pub left_verticality: Option<f32>,
    pub press_start_angle: Option<f32>,
    pub press_top_angle: Option<f32>,
    pub press_start_wrist_height: Option<f32>,
    pub press_top_wrist_height: Option<f32>,
    pub press_arm_sync: Option<f32>,
    pub press_trunk_deviation: Option<f32>,
}

/// 1ティック分の進捗
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalibrationProgress {
    pub step: CalibrationStep,
    pub instruction: &'static str,
    /// バッファ内のサンプル数
    pub samples: usize,
    pub window: usize,
    /// このティックでステップが採用された場合の確認メッセージ
    pub accepted: Option<&'static str>,
    pub complete: bool,
}

pub struct CalibrationController {
    front: PoseAnalyzer<CurlFrontCalculator>,
    profile: PoseAnalyzer<CurlProfileCalculator>,
    press: PoseAnalyzer<PressFrontCalculator>,
    buffer: MeasurementBuffer,
    steps: Vec<CalibrationStep>,
    index: usize,
    measurements: Measurements,
}

impl CalibrationController {
    /// `include_press` でプレス用の2ステップを追加する
    pub fn new(config: &Config, include_press: bool) -> Self {
        // 計測中は個人差を反映しないデフォルト閾値で解析する
        let defaults = CalibrationData::default();
        let mut steps = vec![
            CalibrationStep::Neutral,
            CalibrationStep::RightFlex,
            CalibrationStep::RightExtend,
            CalibrationStep::LeftFlex,
            CalibrationStep::LeftExtend,
        ];
        if include_press {
            steps.push(CalibrationStep::PressStart);
            steps.push(CalibrationStep::PressTop);
        }
        steps.push(CalibrationStep::Complete);

        Self {
            front: PoseAnalyzer::from_config(CurlFrontCalculator::new(config, &defaults), &config.pose),
            profile: PoseAnalyzer::from_config(
                CurlProfileCalculator::new(config, &defaults),
                &config.pose,
            ),
            press: PoseAnalyzer::from_config(PressFrontCalculator::new(config, &defaults), &config.pose),
            buffer: MeasurementBuffer::from_config(&config.calibration),
            steps,
            index: 0,
            measurements: Measurements::default(),
        }
    }

    pub fn step(&self) -> CalibrationStep {
        self.steps
            .get(self.index)
            .copied()
            .unwrap_or(CalibrationStep::Complete)
    }

    pub fn steps(&self) -> &[CalibrationStep] {
        &self.steps
    }

    pub fn instruction(&self) -> &'static str {
        self.step().instruction()
    }

    pub fn is_complete(&self) -> bool {
        self.step() == CalibrationStep::Complete
    }

    pub fn measurements(&self) -> &Measurements {
        &self.measurements
    }

    /// 完了していれば導出した閾値を返す
    pub fn calibration_data(&self) -> Option<CalibrationData> {
        self.is_complete()
            .then(|| CalibrationData::from_measurements(&self.measurements))
    }

    pub fn process_frames(
        &mut self,
        front: Option<&LandmarkFrame>,
        profile: Option<&LandmarkFrame>,
    ) -> CalibrationProgress {
        if self.is_complete() {
            return self.progress(None);
        }

        self.front.process_frame(front);
        self.profile.process_frame(profile);
        self.press.process_frame(front);

        let step = self.step();
        let accepted = match self.candidate(step) {
            Some(value) => self.buffer.push(value),
            None => None,
        };

        match accepted {
            Some(value) => {
                self.record(step, value);
                tracing::info!("calibration step {:?} accepted: {:.2}", step, value);
                self.buffer.clear();
                self.index += 1;
                if self.is_complete() {
                    tracing::info!("calibration complete: {:?}", self.measurements);
                }
                self.progress(Some(step.confirmation()))
            }
            None => self.progress(None),
        }
    }

    fn progress(&self, accepted: Option<&'static str>) -> CalibrationProgress {
        CalibrationProgress {
            step: self.step(),
            instruction: self.instruction(),
            samples: self.buffer.len(),
            window: self.buffer.capacity(),
            accepted,
            complete: self.is_complete(),
        }
    }

    /// このステップの姿勢条件を満たしていれば計測対象の値を返す
    fn candidate(&self, step: CalibrationStep) -> Option<f32> {
        let front = measured(&self.front);
        let press = measured(&self.press);
        match step {
            CalibrationStep::Neutral => measured(&self.profile).and_then(|p| p.trunk),
            CalibrationStep::RightFlex => front
                .filter(|f| f.right.phase == Phase::Flexed)
                .map(|f| f.right.angle),
            CalibrationStep::RightExtend => front
                .filter(|f| f.right.phase == Phase::Extended)
                .map(|f| f.right.angle),
            CalibrationStep::LeftFlex => front
                .filter(|f| f.left.phase == Phase::Flexed)
                .map(|f| f.left.angle),
            CalibrationStep::LeftExtend => front
                .filter(|f| f.left.phase == Phase::Extended)
                .map(|f| f.left.angle),
            CalibrationStep::PressStart => press
                .filter(|p| p.phase == Phase::Flexed && p.in_zone)
                .map(|p| p.avg_angle),
            CalibrationStep::PressTop => press
                .filter(|p| p.phase == Phase::Extended && p.wrist_height > 0.0)
                .map(|p| p.avg_angle),
            CalibrationStep::Complete => None,
        }
    }

    /// 採用値と、その時点のスナップショットから付随する値を記録する
    fn record(&mut self, step: CalibrationStep, value: f32) {
        let front = measured(&self.front);
        let press = measured(&self.press);
        let trunk = measured(&self.profile).and_then(|p| p.trunk);
        let m = &mut self.measurements;
        match step {
            CalibrationStep::Neutral => m.neutral_trunk = Some(value),
            CalibrationStep::RightFlex => {
                m.right_flex_angle = Some(value);
                m.right_verticality = front.and_then(|f| f.right.verticality);
            }
            CalibrationStep::RightExtend => m.right_extend_angle = Some(value),
            CalibrationStep::LeftFlex => {
                m.left_flex_angle = Some(value);
                m.left_verticality = front.and_then(|f| f.left.verticality);
            }
            CalibrationStep::LeftExtend => m.left_extend_angle = Some(value),
            CalibrationStep::PressStart => {
                m.press_start_angle = Some(value);
                m.press_start_wrist_height = press.map(|p| p.wrist_height);
            }
            CalibrationStep::PressTop => {
                m.press_top_angle = Some(value);
                m.press_top_wrist_height = press.map(|p| p.wrist_height);
                m.press_arm_sync = press.map(|p| p.arm_sync_diff);
                m.press_trunk_deviation = trunk.map(|t| (t - 180.0).abs());
            }
            CalibrationStep::Complete => {}
        }
    }
}
