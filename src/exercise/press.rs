//! Overhead press.
//!
//! Both arms move together and are tracked as one averaged elbow angle. A rep
//! completes on the return to the rack position (extended -> flexed), and only
//! while the wrists are inside the active zone above the shoulders.

use super::form::{both_arms, BodyPart, ErrorCode, FormMonitor, FormSample, RepOutcome, Verdict};
use crate::calibration::CalibrationData;
use crate::config::{Config, PhaseConfig, PressConfig};
use crate::pose::{geometry, LandmarkFrame, LandmarkId};
use crate::tracker::extrapolate::{linear, linear_opt};
use crate::tracker::{
    AdaptiveSmoother, Extrapolate, MetricCalculator, MetricSnapshot, Phase, PhaseDetector,
    PoseAnalyzer, RepCompletion, RepCounter,
};

const FRONT_REQUIRED: [LandmarkId; 6] = [
    LandmarkId::RightShoulder,
    LandmarkId::LeftShoulder,
    LandmarkId::RightElbow,
    LandmarkId::LeftElbow,
    LandmarkId::RightWrist,
    LandmarkId::LeftWrist,
];

const PROFILE_REQUIRED: [LandmarkId; 6] = [
    LandmarkId::RightShoulder,
    LandmarkId::LeftShoulder,
    LandmarkId::RightElbow,
    LandmarkId::RightWrist,
    LandmarkId::RightHip,
    LandmarkId::LeftHip,
];

#[derive(Debug, Clone, PartialEq)]
pub struct PressFrontMetrics {
    pub right_angle: f32,
    pub left_angle: f32,
    pub right_raw_angle: f32,
    pub left_raw_angle: f32,
    pub avg_angle: f32,
    /// |右 - 左|
    pub arm_sync_diff: f32,
    pub phase: Phase,
    /// 手首の肩からの高さの平均（上が正）
    pub wrist_height: f32,
    pub in_zone: bool,
    pub reps: u32,
    pub armed: bool,
    /// 現在のレップ中の avg_angle 最大値
    pub peak_avg_angle: f32,
    /// 現在のレップ中の arm_sync_diff 最大値
    pub max_sync_diff: f32,
    pub velocity: f32,
    pub confidence: f32,
}

impl Extrapolate for PressFrontMetrics {
    fn extrapolate(&self, prev: &Self, decay: f32) -> Self {
        let right_angle = linear(self.right_angle, prev.right_angle, decay);
        let left_angle = linear(self.left_angle, prev.left_angle, decay);
        Self {
            right_angle,
            left_angle,
            right_raw_angle: linear(self.right_raw_angle, prev.right_raw_angle, decay),
            left_raw_angle: linear(self.left_raw_angle, prev.left_raw_angle, decay),
            avg_angle: (right_angle + left_angle) / 2.0,
            arm_sync_diff: (right_angle - left_angle).abs(),
            wrist_height: linear(self.wrist_height, prev.wrist_height, decay),
            ..self.clone()
        }
    }
}

impl MetricSnapshot for PressFrontMetrics {
    fn confidence(&self) -> f32 {
        self.confidence
    }
    fn set_confidence(&mut self, confidence: f32) {
        self.confidence = confidence;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PressProfileMetrics {
    pub trunk: Option<f32>,
    /// 腰-肩-肘の角度。肘が体の前にあるほど大きい
    pub elbow_forward_angle: Option<f32>,
    pub right_angle: f32,
    pub confidence: f32,
}

impl Extrapolate for PressProfileMetrics {
    fn extrapolate(&self, prev: &Self, decay: f32) -> Self {
        Self {
            trunk: linear_opt(self.trunk, prev.trunk, decay),
            elbow_forward_angle: linear_opt(self.elbow_forward_angle, prev.elbow_forward_angle, decay),
            right_angle: linear(self.right_angle, prev.right_angle, decay),
            confidence: self.confidence,
        }
    }
}

impl MetricSnapshot for PressProfileMetrics {
    fn confidence(&self) -> f32 {
        self.confidence
    }
    fn set_confidence(&mut self, confidence: f32) {
        self.confidence = confidence;
    }
}

/// キャリブレーション済みならラック角度と頂点角度から閾値を作る
fn press_phase_config(base: &PhaseConfig, calibration: &CalibrationData) -> PhaseConfig {
    if !calibration.calibrated {
        return *base;
    }
    let flex = calibration.press_start_angle;
    let extend = base.extend_threshold.min(calibration.press_top_angle);
    if flex >= extend {
        tracing::warn!("calibrated press range {}..{} is empty; using defaults", flex, extend);
        return *base;
    }
    PhaseConfig {
        flex_threshold: flex,
        extend_threshold: extend,
        ..*base
    }
}

/// 正面カメラ用の計算器
pub struct PressFrontCalculator {
    right_angle: AdaptiveSmoother,
    left_angle: AdaptiveSmoother,
    wrist_height: AdaptiveSmoother,
    phase: PhaseDetector,
    reps: RepCounter,
    zone_floor: f32,
    peak_avg_angle: Option<f32>,
    max_sync_diff: f32,
    min_visibility: f32,
}

impl PressFrontCalculator {
    pub fn new(config: &Config, calibration: &CalibrationData) -> Self {
        let calibration = &calibration.effective();
        Self {
            right_angle: AdaptiveSmoother::from_config(&config.smoothing.angle),
            left_angle: AdaptiveSmoother::from_config(&config.smoothing.angle),
            wrist_height: AdaptiveSmoother::from_config(&config.smoothing.wrist_distance),
            phase: PhaseDetector::from_config(&press_phase_config(&config.press.phase, calibration)),
            reps: RepCounter::new(RepCompletion::ExtendToFlex),
            zone_floor: calibration.press_start_wrist_height - config.press.active_zone_margin,
            peak_avg_angle: None,
            max_sync_diff: 0.0,
            min_visibility: config.pose.min_visibility,
        }
    }
}

impl MetricCalculator for PressFrontCalculator {
    type Snapshot = PressFrontMetrics;

    fn calculate(&mut self, frame: &LandmarkFrame) -> Option<PressFrontMetrics> {
        if !frame.all_visible(&FRONT_REQUIRED, self.min_visibility) {
            return None;
        }
        let rs = frame.point(LandmarkId::RightShoulder);
        let ls = frame.point(LandmarkId::LeftShoulder);
        let rw = frame.point(LandmarkId::RightWrist);
        let lw = frame.point(LandmarkId::LeftWrist);
        let right_raw = geometry::angle(rs, frame.point(LandmarkId::RightElbow), rw)?;
        let left_raw = geometry::angle(ls, frame.point(LandmarkId::LeftElbow), lw)?;

        let right_angle = self.right_angle.update(right_raw);
        let left_angle = self.left_angle.update(left_raw);
        let avg_angle = (right_angle + left_angle) / 2.0;
        let arm_sync_diff = (right_angle - left_angle).abs();

        let raw_height = (geometry::wrist_height(rw, rs) + geometry::wrist_height(lw, ls)) / 2.0;
        let wrist_height = self.wrist_height.update(raw_height);
        let in_zone = wrist_height >= self.zone_floor;

        self.phase.update(avg_angle);
        let phase = self.phase.phase();

        // ラック位置で待機中 = 次のレップの開始
        if phase == Phase::Flexed && !self.reps.is_armed() {
            self.peak_avg_angle = None;
            self.max_sync_diff = 0.0;
        }
        self.peak_avg_angle = Some(self.peak_avg_angle.map_or(avg_angle, |p| p.max(avg_angle)));
        self.max_sync_diff = self.max_sync_diff.max(arm_sync_diff);

        self.reps.update(phase, in_zone);

        Some(PressFrontMetrics {
            right_angle,
            left_angle,
            right_raw_angle: right_raw,
            left_raw_angle: left_raw,
            avg_angle,
            arm_sync_diff,
            phase,
            wrist_height,
            in_zone,
            reps: self.reps.count(),
            armed: self.reps.is_armed(),
            peak_avg_angle: self.peak_avg_angle.unwrap_or(avg_angle),
            max_sync_diff: self.max_sync_diff,
            velocity: self.right_angle.velocity().max(self.left_angle.velocity()),
            confidence: frame.confidence(&FRONT_REQUIRED),
        })
    }

    fn reset(&mut self) {
        self.right_angle.reset();
        self.left_angle.reset();
        self.wrist_height.reset();
        self.phase.reset();
        self.reps.reset();
        self.peak_avg_angle = None;
        self.max_sync_diff = 0.0;
    }
}

/// 側面カメラ用の計算器（体幹と肘の前方角度）
pub struct PressProfileCalculator {
    trunk: AdaptiveSmoother,
    elbow_forward: AdaptiveSmoother,
    right_angle: AdaptiveSmoother,
    min_visibility: f32,
}

impl PressProfileCalculator {
    pub fn new(config: &Config) -> Self {
        Self {
            trunk: AdaptiveSmoother::from_config(&config.smoothing.trunk),
            elbow_forward: AdaptiveSmoother::from_config(&config.smoothing.angle),
            right_angle: AdaptiveSmoother::from_config(&config.smoothing.angle),
            min_visibility: config.pose.min_visibility,
        }
    }
}

impl MetricCalculator for PressProfileCalculator {
    type Snapshot = PressProfileMetrics;

    fn calculate(&mut self, frame: &LandmarkFrame) -> Option<PressProfileMetrics> {
        if !frame.all_visible(&PROFILE_REQUIRED, self.min_visibility) {
            return None;
        }
        let rs = frame.point(LandmarkId::RightShoulder);
        let re = frame.point(LandmarkId::RightElbow);
        let rh = frame.point(LandmarkId::RightHip);
        let raw_angle = geometry::angle(rs, re, frame.point(LandmarkId::RightWrist))?;

        let shoulder_mid = geometry::midpoint(rs, frame.point(LandmarkId::LeftShoulder));
        let hip_mid = geometry::midpoint(rh, frame.point(LandmarkId::LeftHip));
        let trunk = geometry::trunk_angle(shoulder_mid, hip_mid).map(|t| self.trunk.update(t));
        let elbow_forward_angle =
            geometry::angle(rh, rs, re).map(|a| self.elbow_forward.update(a));

        Some(PressProfileMetrics {
            trunk,
            elbow_forward_angle,
            right_angle: self.right_angle.update(raw_angle),
            confidence: frame.confidence(&PROFILE_REQUIRED),
        })
    }

    fn reset(&mut self) {
        self.trunk.reset();
        self.elbow_forward.reset();
        self.right_angle.reset();
    }
}

/// レップ検出時のみ呼ばれる判定器
///
/// 優先順: 体幹 → 左右の同期 → 肘の向き → ロックアウト
#[derive(Debug, Clone)]
pub struct PressValidator {
    trunk_tolerance: f32,
    sync_tolerance: f32,
    elbow_forward_min: f32,
    lockout_angle: f32,
}

impl PressValidator {
    pub fn new(config: &PressConfig, calibration: &CalibrationData) -> Self {
        let calibration = &calibration.effective();
        Self {
            trunk_tolerance: calibration.press_trunk_tolerance,
            sync_tolerance: calibration.press_arm_sync_tolerance,
            elbow_forward_min: config.elbow_forward_min,
            lockout_angle: calibration.press_top_angle,
        }
    }

    pub fn validate(
        &self,
        front: Option<&PressFrontMetrics>,
        profile: Option<&PressProfileMetrics>,
    ) -> Verdict {
        if let Some(trunk) = profile.and_then(|p| p.trunk) {
            if (trunk - 180.0).abs() > self.trunk_tolerance {
                return Verdict::reject(ErrorCode::TrunkTilted, &[BodyPart::Trunk]);
            }
        }

        if let Some(front) = front {
            if front.max_sync_diff > self.sync_tolerance {
                return Verdict::reject(ErrorCode::ArmsNotSynchronized, both_arms());
            }
        }

        if let Some(forward) = profile.and_then(|p| p.elbow_forward_angle) {
            if forward < self.elbow_forward_min {
                return Verdict::reject(ErrorCode::ElbowsTooWide, &[BodyPart::RightArm]);
            }
        }

        if let Some(front) = front {
            if front.peak_avg_angle < self.lockout_angle {
                return Verdict::reject(ErrorCode::IncompleteLockout, both_arms());
            }
        }

        Verdict::valid()
    }
}

/// プレス1セット分の解析。左右は常に同じ回数として扱う
pub struct PressController {
    front: PoseAnalyzer<PressFrontCalculator>,
    profile: PoseAnalyzer<PressProfileCalculator>,
    validator: PressValidator,
    monitor: FormMonitor,
    trunk_tolerance: f32,
    elbow_forward_min: f32,
    uncontrolled_velocity: f32,
    prev_reps: u32,
    valid_reps: u32,
}

impl PressController {
    pub fn new(config: &Config, calibration: &CalibrationData) -> Self {
        let calibration = &calibration.effective();
        if calibration.calibrated {
            tracing::info!(
                "press using calibration: start {:.0}, top {:.0}, sync tol {:.0}",
                calibration.press_start_angle,
                calibration.press_top_angle,
                calibration.press_arm_sync_tolerance
            );
        }
        Self {
            front: PoseAnalyzer::from_config(PressFrontCalculator::new(config, calibration), &config.pose),
            profile: PoseAnalyzer::from_config(PressProfileCalculator::new(config), &config.pose),
            validator: PressValidator::new(&config.press, calibration),
            monitor: FormMonitor::from_config(&config.form),
            trunk_tolerance: calibration.press_trunk_tolerance,
            elbow_forward_min: config.press.elbow_forward_min,
            uncontrolled_velocity: config.form.uncontrolled_velocity,
            prev_reps: 0,
            valid_reps: 0,
        }
    }

    pub fn process_frames(
        &mut self,
        front: Option<&LandmarkFrame>,
        profile: Option<&LandmarkFrame>,
    ) -> RepOutcome {
        let front_now = self.front.process_frame(front).cloned();
        let profile_now = self.profile.process_frame(profile).cloned();
        let sample = self.form_sample(front_now.as_ref(), profile_now.as_ref());
        let feedback = self.monitor.observe(sample);

        let raw_reps = self.front.latest().map_or(0, |f| f.reps);
        let mut outcome = if raw_reps > self.prev_reps {
            self.prev_reps = raw_reps;
            let verdict = self.validator.validate(self.front.latest(), self.profile.latest());
            match verdict.error {
                None => {
                    self.valid_reps += 1;
                    tracing::info!("press rep accepted ({})", self.valid_reps);
                }
                Some(code) => tracing::info!("press rep rejected: {:?}", code),
            }
            RepOutcome::judged(self.valid_reps, self.valid_reps, verdict)
        } else {
            RepOutcome::idle(self.valid_reps, self.valid_reps)
        };
        outcome.feedback = feedback;
        outcome
    }

    fn form_sample(
        &self,
        front: Option<&PressFrontMetrics>,
        profile: Option<&PressProfileMetrics>,
    ) -> FormSample {
        FormSample {
            trunk_lean: profile
                .and_then(|p| p.trunk)
                .map(|t| (t - 180.0).abs() > self.trunk_tolerance),
            elbow_flare: profile
                .and_then(|p| p.elbow_forward_angle)
                .map(|a| a < self.elbow_forward_min),
            uncontrolled: front.map(|f| f.velocity > self.uncontrolled_velocity),
        }
    }

    pub fn right_reps(&self) -> u32 {
        self.valid_reps
    }

    pub fn left_reps(&self) -> u32 {
        self.valid_reps
    }

    pub fn front(&self) -> &PoseAnalyzer<PressFrontCalculator> {
        &self.front
    }

    pub fn profile(&self) -> &PoseAnalyzer<PressProfileCalculator> {
        &self.profile
    }
}
