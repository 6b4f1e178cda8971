//! Alternating bicep curl.
//!
//! The front view tracks both arms independently; the profile view tracks the
//! right arm and the trunk. A rep completes on flexed -> extended. Reps must
//! alternate between arms.

use super::form::{
    both_arms, BodyPart, ErrorCode, FormMonitor, FormSample, RepOutcome, Side, Verdict,
};
use crate::calibration::CalibrationData;
use crate::config::{Config, CurlConfig, PhaseConfig};
use crate::pose::{geometry, LandmarkFrame, LandmarkId};
use crate::tracker::extrapolate::{linear, linear_opt};
use crate::tracker::{
    AdaptiveSmoother, Extrapolate, MetricCalculator, MetricSnapshot, Phase, PhaseDetector,
    PoseAnalyzer, RepCompletion, RepCounter,
};
use std::collections::VecDeque;

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

const MAX_SIDE_HISTORY: usize = 10;

/// 正面から見た片腕のメトリクス
#[derive(Debug, Clone, PartialEq)]
pub struct ArmMetrics {
    /// 平滑化済み肘角度
    pub angle: f32,
    pub raw_angle: f32,
    pub phase: Phase,
    /// 上腕の鉛直からのずれ（度）
    pub verticality: Option<f32>,
    /// 肘-肩中心距離（肩幅単位）
    pub elbow_dist: Option<f32>,
    pub wrist_dist: f32,
    pub velocity: f32,
    pub reps: u32,
    pub armed: bool,
    /// 現在のレップ中に上腕が鉛直を保っているか
    pub stance_valid: bool,
    /// 現在のレップ中の elbow_dist の (最小, 最大)
    pub elbow_dist_range: Option<(f32, f32)>,
}

impl ArmMetrics {
    pub fn elbow_drift(&self) -> Option<f32> {
        self.elbow_dist_range.map(|(lo, hi)| hi - lo)
    }
}

impl Extrapolate for ArmMetrics {
    fn extrapolate(&self, prev: &Self, decay: f32) -> Self {
        Self {
            angle: linear(self.angle, prev.angle, decay),
            raw_angle: linear(self.raw_angle, prev.raw_angle, decay),
            verticality: linear_opt(self.verticality, prev.verticality, decay),
            elbow_dist: linear_opt(self.elbow_dist, prev.elbow_dist, decay),
            wrist_dist: linear(self.wrist_dist, prev.wrist_dist, decay),
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CurlFrontMetrics {
    pub right: ArmMetrics,
    pub left: ArmMetrics,
    pub confidence: f32,
}

impl CurlFrontMetrics {
    pub fn arm(&self, side: Side) -> &ArmMetrics {
        match side {
            Side::Right => &self.right,
            Side::Left => &self.left,
        }
    }
}

impl Extrapolate for CurlFrontMetrics {
    fn extrapolate(&self, prev: &Self, decay: f32) -> Self {
        Self {
            right: self.right.extrapolate(&prev.right, decay),
            left: self.left.extrapolate(&prev.left, decay),
            confidence: self.confidence,
        }
    }
}

impl MetricSnapshot for CurlFrontMetrics {
    fn confidence(&self) -> f32 {
        self.confidence
    }
    fn set_confidence(&mut self, confidence: f32) {
        self.confidence = confidence;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CurlProfileMetrics {
    pub angle: f32,
    pub raw_angle: f32,
    pub phase: Phase,
    pub reps: u32,
    pub armed: bool,
    /// 180° が直立
    pub trunk: Option<f32>,
    pub wrist_dist: f32,
    pub velocity: f32,
    pub trunk_velocity: f32,
    pub confidence: f32,
}

impl Extrapolate for CurlProfileMetrics {
    fn extrapolate(&self, prev: &Self, decay: f32) -> Self {
        Self {
            angle: linear(self.angle, prev.angle, decay),
            raw_angle: linear(self.raw_angle, prev.raw_angle, decay),
            trunk: linear_opt(self.trunk, prev.trunk, decay),
            wrist_dist: linear(self.wrist_dist, prev.wrist_dist, decay),
            ..self.clone()
        }
    }
}

impl MetricSnapshot for CurlProfileMetrics {
    fn confidence(&self) -> f32 {
        self.confidence
    }
    fn set_confidence(&mut self, confidence: f32) {
        self.confidence = confidence;
    }
}

/// キャリブレーション済みならユーザーの可動域をフェーズ閾値に使う
fn arm_phase_config(base: &PhaseConfig, calibration: &CalibrationData, side: Side) -> PhaseConfig {
    if !calibration.calibrated {
        return *base;
    }
    let (flex, extend) = match side {
        Side::Right => (calibration.right_min_angle, calibration.right_max_angle),
        Side::Left => (calibration.left_min_angle, calibration.left_max_angle),
    };
    if flex >= extend {
        tracing::warn!("calibrated {:?} arm range {}..{} is empty; using defaults", side, flex, extend);
        return *base;
    }
    PhaseConfig {
        flex_threshold: flex,
        extend_threshold: extend,
        ..*base
    }
}

/// 片腕分の平滑化・フェーズ・レップ状態
#[derive(Debug, Clone)]
struct ArmTrack {
    angle: AdaptiveSmoother,
    elbow_dist: AdaptiveSmoother,
    wrist_dist: AdaptiveSmoother,
    phase: PhaseDetector,
    reps: RepCounter,
    stance_valid: bool,
    elbow_range: Option<(f32, f32)>,
}

impl ArmTrack {
    fn new(config: &Config, phase: &PhaseConfig) -> Self {
        Self {
            angle: AdaptiveSmoother::from_config(&config.smoothing.angle),
            elbow_dist: AdaptiveSmoother::from_config(&config.smoothing.elbow_distance),
            wrist_dist: AdaptiveSmoother::from_config(&config.smoothing.wrist_distance),
            phase: PhaseDetector::from_config(phase),
            reps: RepCounter::new(RepCompletion::FlexToExtend),
            stance_valid: true,
            elbow_range: None,
        }
    }

    /// `arm` は [肩, 肘, 手首]、`shoulders` は (左肩, 右肩)
    fn update(
        &mut self,
        raw_angle: f32,
        arm: [[f32; 2]; 3],
        shoulders: ([f32; 2], [f32; 2]),
        vertical_tolerance: f32,
    ) -> ArmMetrics {
        let [shoulder, elbow, wrist] = arm;
        let angle = self.angle.update(raw_angle);
        self.phase.update(angle);
        let phase = self.phase.phase();

        // 下ろした状態で待機中 = 次のレップの開始
        if phase == Phase::Extended && !self.reps.is_armed() {
            self.stance_valid = true;
            self.elbow_range = None;
        }

        let verticality = geometry::vertical_angle(shoulder, elbow);
        if verticality.is_some_and(|v| v > vertical_tolerance) {
            self.stance_valid = false;
        }

        let elbow_dist = geometry::elbow_to_torso_distance(elbow, shoulders.0, shoulders.1)
            .map(|d| self.elbow_dist.update(d));
        if let Some(d) = elbow_dist {
            self.elbow_range = Some(match self.elbow_range {
                Some((lo, hi)) => (lo.min(d), hi.max(d)),
                None => (d, d),
            });
        }
        let wrist_dist = self.wrist_dist.update(geometry::distance(wrist, shoulder));

        self.reps.update(phase, true);

        ArmMetrics {
            angle,
            raw_angle,
            phase,
            verticality,
            elbow_dist,
            wrist_dist,
            velocity: self.angle.velocity(),
            reps: self.reps.count(),
            armed: self.reps.is_armed(),
            stance_valid: self.stance_valid,
            elbow_dist_range: self.elbow_range,
        }
    }

    fn reset(&mut self) {
        self.angle.reset();
        self.elbow_dist.reset();
        self.wrist_dist.reset();
        self.phase.reset();
        self.reps.reset();
        self.stance_valid = true;
        self.elbow_range = None;
    }
}

/// 正面カメラ用の計算器
pub struct CurlFrontCalculator {
    right: ArmTrack,
    left: ArmTrack,
    min_visibility: f32,
    vertical_tolerance: f32,
}

impl CurlFrontCalculator {
    pub fn new(config: &Config, calibration: &CalibrationData) -> Self {
        let calibration = &calibration.effective();
        let base = &config.curl.front_phase;
        Self {
            right: ArmTrack::new(config, &arm_phase_config(base, calibration, Side::Right)),
            left: ArmTrack::new(config, &arm_phase_config(base, calibration, Side::Left)),
            min_visibility: config.pose.min_visibility,
            vertical_tolerance: calibration.vertical_tolerance,
        }
    }
}

impl MetricCalculator for CurlFrontCalculator {
    type Snapshot = CurlFrontMetrics;

    fn calculate(&mut self, frame: &LandmarkFrame) -> Option<CurlFrontMetrics> {
        if !frame.all_visible(&FRONT_REQUIRED, self.min_visibility) {
            return None;
        }
        let rs = frame.point(LandmarkId::RightShoulder);
        let ls = frame.point(LandmarkId::LeftShoulder);
        let re = frame.point(LandmarkId::RightElbow);
        let le = frame.point(LandmarkId::LeftElbow);
        let rw = frame.point(LandmarkId::RightWrist);
        let lw = frame.point(LandmarkId::LeftWrist);

        // 両腕とも角度が取れてから状態を更新する
        let right_raw = geometry::angle(rs, re, rw)?;
        let left_raw = geometry::angle(ls, le, lw)?;

        let tol = self.vertical_tolerance;
        let right = self.right.update(right_raw, [rs, re, rw], (ls, rs), tol);
        let left = self.left.update(left_raw, [ls, le, lw], (ls, rs), tol);

        Some(CurlFrontMetrics {
            right,
            left,
            confidence: frame.confidence(&FRONT_REQUIRED),
        })
    }

    fn reset(&mut self) {
        self.right.reset();
        self.left.reset();
    }
}

/// 側面カメラ用の計算器（右腕と体幹）
pub struct CurlProfileCalculator {
    angle: AdaptiveSmoother,
    trunk: AdaptiveSmoother,
    wrist_dist: AdaptiveSmoother,
    phase: PhaseDetector,
    reps: RepCounter,
    min_visibility: f32,
}

impl CurlProfileCalculator {
    pub fn new(config: &Config, calibration: &CalibrationData) -> Self {
        let calibration = &calibration.effective();
        let phase = arm_phase_config(&config.curl.profile_phase, calibration, Side::Right);
        Self {
            angle: AdaptiveSmoother::from_config(&config.smoothing.angle),
            trunk: AdaptiveSmoother::from_config(&config.smoothing.trunk),
            wrist_dist: AdaptiveSmoother::from_config(&config.smoothing.wrist_distance),
            phase: PhaseDetector::from_config(&phase),
            reps: RepCounter::new(RepCompletion::FlexToExtend),
            min_visibility: config.pose.min_visibility,
        }
    }
}

impl MetricCalculator for CurlProfileCalculator {
    type Snapshot = CurlProfileMetrics;

    fn calculate(&mut self, frame: &LandmarkFrame) -> Option<CurlProfileMetrics> {
        if !frame.all_visible(&PROFILE_REQUIRED, self.min_visibility) {
            return None;
        }
        let rs = frame.point(LandmarkId::RightShoulder);
        let re = frame.point(LandmarkId::RightElbow);
        let rw = frame.point(LandmarkId::RightWrist);
        let raw_angle = geometry::angle(rs, re, rw)?;

        let shoulder_mid = geometry::midpoint(rs, frame.point(LandmarkId::LeftShoulder));
        let hip_mid = geometry::midpoint(
            frame.point(LandmarkId::RightHip),
            frame.point(LandmarkId::LeftHip),
        );
        let trunk = geometry::trunk_angle(shoulder_mid, hip_mid).map(|t| self.trunk.update(t));

        let angle = self.angle.update(raw_angle);
        self.phase.update(angle);
        let phase = self.phase.phase();
        self.reps.update(phase, true);
        let wrist_dist = self.wrist_dist.update(geometry::distance(rw, rs));

        Some(CurlProfileMetrics {
            angle,
            raw_angle,
            phase,
            reps: self.reps.count(),
            armed: self.reps.is_armed(),
            trunk,
            wrist_dist,
            velocity: self.angle.velocity(),
            trunk_velocity: self.trunk.velocity(),
            confidence: frame.confidence(&PROFILE_REQUIRED),
        })
    }

    fn reset(&mut self) {
        self.angle.reset();
        self.trunk.reset();
        self.wrist_dist.reset();
        self.phase.reset();
        self.reps.reset();
    }
}

/// レップ検出時のみ呼ばれる判定器
///
/// 優先順: 体幹 → 上腕の鉛直 → 肘の流れ → 両腕同時 → 同じ腕の連続
#[derive(Debug, Clone)]
pub struct CurlValidator {
    trunk_tolerance: f32,
    elbow_drift_tolerance: f32,
    simultaneous_flex: bool,
    history: VecDeque<Side>,
}

impl CurlValidator {
    pub fn new(config: &CurlConfig, calibration: &CalibrationData) -> Self {
        let calibration = &calibration.effective();
        Self {
            trunk_tolerance: calibration.trunk_tolerance,
            elbow_drift_tolerance: config.elbow_drift_tolerance,
            simultaneous_flex: false,
            history: VecDeque::with_capacity(MAX_SIDE_HISTORY),
        }
    }

    /// 毎フレーム呼ぶ。両腕が同時に flexed になったことを記憶する
    pub fn observe(&mut self, front: &CurlFrontMetrics) {
        if front.right.phase == Phase::Flexed && front.left.phase == Phase::Flexed {
            self.simultaneous_flex = true;
        }
    }

    pub fn validate(
        &mut self,
        side: Side,
        front: Option<&CurlFrontMetrics>,
        profile: Option<&CurlProfileMetrics>,
    ) -> Verdict {
        if let Some(trunk) = profile.and_then(|p| p.trunk) {
            if (trunk - 180.0).abs() > self.trunk_tolerance {
                return Verdict::reject(ErrorCode::TrunkTilted, &[BodyPart::Trunk]);
            }
        }

        if let Some(arm) = front.map(|f| f.arm(side)) {
            if !arm.stance_valid {
                return Verdict::reject(ErrorCode::ArmNotVertical, &[side.arm()]);
            }
            if arm.elbow_drift().is_some_and(|d| d > self.elbow_drift_tolerance) {
                return Verdict::reject(ErrorCode::ElbowDrifting, &[side.arm()]);
            }
        }

        if self.simultaneous_flex {
            self.simultaneous_flex = false;
            return Verdict::reject(ErrorCode::BothArmsFlexed, both_arms());
        }

        if self.history.back() == Some(&side) {
            return Verdict::reject(ErrorCode::ConsecutiveSameSide, &[side.arm()]);
        }

        Verdict::valid()
    }

    pub fn clear_simultaneous(&mut self) {
        self.simultaneous_flex = false;
    }

    pub fn record_valid(&mut self, side: Side) {
        if self.history.len() >= MAX_SIDE_HISTORY {
            self.history.pop_front();
        }
        self.history.push_back(side);
    }

    pub fn history(&self) -> impl Iterator<Item = &Side> {
        self.history.iter()
    }

    pub fn reset(&mut self) {
        self.simultaneous_flex = false;
        self.history.clear();
    }
}

/// カール1セット分の解析（2カメラ + 判定 + ライブ監視）
pub struct CurlController {
    front: PoseAnalyzer<CurlFrontCalculator>,
    profile: PoseAnalyzer<CurlProfileCalculator>,
    validator: CurlValidator,
    monitor: FormMonitor,
    trunk_tolerance: f32,
    elbow_flare_distance: f32,
    uncontrolled_velocity: f32,
    prev_right: u32,
    prev_left: u32,
    valid_right: u32,
    valid_left: u32,
}

impl CurlController {
    pub fn new(config: &Config, calibration: &CalibrationData) -> Self {
        let calibration = &calibration.effective();
        if calibration.calibrated {
            tracing::info!(
                "curl using calibration: right {:.0}-{:.0}, left {:.0}-{:.0}, vertical tol {:.0}",
                calibration.right_min_angle,
                calibration.right_max_angle,
                calibration.left_min_angle,
                calibration.left_max_angle,
                calibration.vertical_tolerance
            );
        }
        Self {
            front: PoseAnalyzer::from_config(CurlFrontCalculator::new(config, calibration), &config.pose),
            profile: PoseAnalyzer::from_config(
                CurlProfileCalculator::new(config, calibration),
                &config.pose,
            ),
            validator: CurlValidator::new(&config.curl, calibration),
            monitor: FormMonitor::from_config(&config.form),
            trunk_tolerance: calibration.trunk_tolerance,
            elbow_flare_distance: config.form.elbow_flare_distance,
            uncontrolled_velocity: config.form.uncontrolled_velocity,
            prev_right: 0,
            prev_left: 0,
            valid_right: 0,
            valid_left: 0,
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

        let front_latest = self.front.latest().cloned();
        let profile_latest = self.profile.latest().cloned();
        if let Some(f) = &front_latest {
            self.validator.observe(f);
        }

        let front_right = front_latest.as_ref().map_or(0, |f| f.right.reps);
        let profile_right = profile_latest.as_ref().map_or(0, |p| p.reps);
        let raw_right = front_right.max(profile_right);
        let raw_left = front_latest.as_ref().map_or(0, |f| f.left.reps);

        let right_edge = raw_right > self.prev_right;
        let left_edge = raw_left > self.prev_left;
        if right_edge {
            self.prev_right = raw_right;
        }
        if left_edge {
            self.prev_left = raw_left;
        }

        let mut outcome = match (right_edge, left_edge) {
            (true, true) => {
                self.validator.clear_simultaneous();
                tracing::info!("curl rep rejected: both arms in the same frame");
                RepOutcome::judged(
                    self.valid_right,
                    self.valid_left,
                    Verdict::reject(ErrorCode::BothArmsFlexed, both_arms()),
                )
            }
            (true, false) => self.judge(Side::Right, front_latest.as_ref(), profile_latest.as_ref()),
            (false, true) => self.judge(Side::Left, front_latest.as_ref(), profile_latest.as_ref()),
            (false, false) => RepOutcome::idle(self.valid_right, self.valid_left),
        };
        outcome.feedback = feedback;
        outcome
    }

    fn judge(
        &mut self,
        side: Side,
        front: Option<&CurlFrontMetrics>,
        profile: Option<&CurlProfileMetrics>,
    ) -> RepOutcome {
        let verdict = self.validator.validate(side, front, profile);
        match verdict.error {
            None => {
                self.validator.record_valid(side);
                match side {
                    Side::Right => self.valid_right += 1,
                    Side::Left => self.valid_left += 1,
                }
                tracing::info!(
                    "curl {:?} rep accepted ({} / {})",
                    side,
                    self.valid_right,
                    self.valid_left
                );
            }
            Some(code) => tracing::info!("curl {:?} rep rejected: {:?}", side, code),
        }
        RepOutcome::judged(self.valid_right, self.valid_left, verdict)
    }

    fn form_sample(
        &self,
        front: Option<&CurlFrontMetrics>,
        profile: Option<&CurlProfileMetrics>,
    ) -> FormSample {
        let flare = self.elbow_flare_distance;
        FormSample {
            trunk_lean: profile
                .and_then(|p| p.trunk)
                .map(|t| (t - 180.0).abs() > self.trunk_tolerance),
            elbow_flare: front.map(|f| {
                [&f.right, &f.left]
                    .iter()
                    .any(|arm| arm.elbow_dist.is_some_and(|d| d > flare))
            }),
            uncontrolled: front
                .map(|f| f.right.velocity.max(f.left.velocity) > self.uncontrolled_velocity),
        }
    }

    pub fn right_reps(&self) -> u32 {
        self.valid_right
    }

    pub fn left_reps(&self) -> u32 {
        self.valid_left
    }

    pub fn front(&self) -> &PoseAnalyzer<CurlFrontCalculator> {
        &self.front
    }

    pub fn profile(&self) -> &PoseAnalyzer<CurlProfileCalculator> {
        &self.profile
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{curl_front, hanging, profile, tilt_arm};

    fn controller() -> CurlController {
        CurlController::new(&Config::default(), &CalibrationData::default())
    }

    /// 同じフレームを n 回流し、検出されたレップ結果を返す
    fn hold(
        c: &mut CurlController,
        front: &LandmarkFrame,
        side: Option<&LandmarkFrame>,
        n: usize,
    ) -> Vec<RepOutcome> {
        (0..n)
            .map(|_| c.process_frames(Some(front), side))
            .filter(|o| o.rep_detected)
            .collect()
    }

    fn arm(phase: Phase) -> ArmMetrics {
        ArmMetrics {
            angle: 160.0,
            raw_angle: 160.0,
            phase,
            verticality: Some(0.0),
            elbow_dist: Some(0.9),
            wrist_dist: 0.3,
            velocity: 0.0,
            reps: 1,
            armed: false,
            stance_valid: true,
            elbow_dist_range: Some((0.9, 0.95)),
        }
    }

    fn front_metrics() -> CurlFrontMetrics {
        CurlFrontMetrics {
            right: arm(Phase::Extended),
            left: arm(Phase::Extended),
            confidence: 0.9,
        }
    }

    fn profile_metrics(trunk: f32) -> CurlProfileMetrics {
        CurlProfileMetrics {
            angle: 160.0,
            raw_angle: 160.0,
            phase: Phase::Extended,
            reps: 1,
            armed: false,
            trunk: Some(trunk),
            wrist_dist: 0.3,
            velocity: 0.0,
            trunk_velocity: 0.0,
            confidence: 0.9,
        }
    }

    fn validator() -> CurlValidator {
        CurlValidator::new(&CurlConfig::default(), &CalibrationData::default())
    }

    #[test]
    fn test_front_fails_closed_on_low_visibility() {
        let mut calc = CurlFrontCalculator::new(&Config::default(), &CalibrationData::default());
        let mut frame = hanging();
        let mut wrist = *frame.get(LandmarkId::LeftWrist);
        wrist.visibility = 0.2;
        frame.set(LandmarkId::LeftWrist, wrist);
        assert!(calc.calculate(&frame).is_none());
        assert!(calc.calculate(&hanging()).is_some());
    }

    #[test]
    fn test_front_fails_closed_on_degenerate_arm() {
        let mut calc = CurlFrontCalculator::new(&Config::default(), &CalibrationData::default());
        let mut frame = hanging();
        let elbow = *frame.get(LandmarkId::RightElbow);
        frame.set(LandmarkId::RightWrist, elbow);
        assert!(calc.calculate(&frame).is_none());
    }

    #[test]
    fn test_front_metrics_values() {
        let mut calc = CurlFrontCalculator::new(&Config::default(), &CalibrationData::default());
        let m = calc.calculate(&curl_front(90.0, 180.0)).unwrap();
        assert!((m.right.angle - 90.0).abs() < 0.01, "right={}", m.right.angle);
        assert!((m.left.angle - 180.0).abs() < 0.01, "left={}", m.left.angle);
        assert!(m.right.verticality.unwrap() < 0.01);
        // 肘(0.40,0.45) と肩中心(0.5,0.3) の距離 / 肩幅0.2
        let expected = (0.1f32 * 0.1 + 0.15 * 0.15).sqrt() / 0.2;
        assert!((m.right.elbow_dist.unwrap() - expected).abs() < 1e-4);
        assert!((m.confidence - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_alternating_reps_are_valid() {
        let mut c = controller();
        hold(&mut c, &hanging(), None, 15);

        let right = hold(&mut c, &curl_front(40.0, 180.0), None, 15);
        assert!(right.is_empty());
        let right = hold(&mut c, &hanging(), None, 15);
        assert_eq!(right.len(), 1);
        assert!(right[0].valid);
        assert_eq!(right[0].right_reps, 1);

        hold(&mut c, &curl_front(180.0, 40.0), None, 15);
        let left = hold(&mut c, &hanging(), None, 15);
        assert_eq!(left.len(), 1);
        assert!(left[0].valid);
        assert_eq!((c.right_reps(), c.left_reps()), (1, 1));
    }

    #[test]
    fn test_same_side_twice_rejected() {
        let mut c = controller();
        hold(&mut c, &hanging(), None, 15);
        for _ in 0..2 {
            hold(&mut c, &curl_front(40.0, 180.0), None, 15);
            hold(&mut c, &hanging(), None, 15);
        }
        assert_eq!(c.right_reps(), 1);

        hold(&mut c, &curl_front(40.0, 180.0), None, 15);
        let third = hold(&mut c, &hanging(), None, 15);
        assert_eq!(third.len(), 1);
        assert_eq!(third[0].error_code, Some(ErrorCode::ConsecutiveSameSide));
        assert_eq!(third[0].affected_parts, vec![BodyPart::RightArm]);
    }

    #[test]
    fn test_both_arms_together_rejected() {
        let mut c = controller();
        hold(&mut c, &hanging(), None, 15);
        hold(&mut c, &curl_front(40.0, 40.0), None, 15);
        let out = hold(&mut c, &hanging(), None, 15);
        assert_eq!(out.len(), 1);
        assert!(!out[0].valid);
        assert_eq!(out[0].error_code, Some(ErrorCode::BothArmsFlexed));
        assert_eq!(out[0].affected_parts, both_arms().to_vec());
        assert_eq!((c.right_reps(), c.left_reps()), (0, 0));
    }

    #[test]
    fn test_leaning_trunk_rejected() {
        let mut c = controller();
        let lean = profile(30.0, 180.0);
        hold(&mut c, &hanging(), Some(&lean), 15);
        hold(&mut c, &curl_front(40.0, 180.0), Some(&lean), 15);
        let out = hold(&mut c, &hanging(), Some(&lean), 15);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].error_code, Some(ErrorCode::TrunkTilted));
        assert_eq!(out[0].affected_parts, vec![BodyPart::Trunk]);
    }

    #[test]
    fn test_swinging_upper_arm_rejected() {
        let mut c = controller();
        hold(&mut c, &hanging(), None, 15);
        let swung = tilt_arm(curl_front(40.0, 180.0), Side::Right, 40.0);
        hold(&mut c, &swung, None, 15);
        let out = hold(&mut c, &hanging(), None, 15);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].error_code, Some(ErrorCode::ArmNotVertical));

        // 次のレップでは鉛直判定がリセットされる
        hold(&mut c, &curl_front(180.0, 40.0), None, 15);
        let next = hold(&mut c, &hanging(), None, 15);
        assert!(next[0].valid);
    }

    #[test]
    fn test_missing_front_frames_do_not_count() {
        let mut c = controller();
        hold(&mut c, &hanging(), None, 15);
        for _ in 0..20 {
            assert!(!c.process_frames(None, None).rep_detected);
        }
        assert_eq!(c.front().frames_since_valid(), 20);
    }

    #[test]
    fn test_validator_trunk_wins() {
        let mut v = validator();
        let mut front = front_metrics();
        front.right.stance_valid = false;
        let verdict = v.validate(Side::Right, Some(&front), Some(&profile_metrics(150.0)));
        assert_eq!(verdict.error, Some(ErrorCode::TrunkTilted));
    }

    #[test]
    fn test_validator_stance_before_drift() {
        let mut v = validator();
        let mut front = front_metrics();
        front.left.stance_valid = false;
        front.left.elbow_dist_range = Some((0.5, 1.2));
        let verdict = v.validate(Side::Left, Some(&front), Some(&profile_metrics(180.0)));
        assert_eq!(verdict.error, Some(ErrorCode::ArmNotVertical));
        assert_eq!(verdict.affected_parts, vec![BodyPart::LeftArm]);

        front.left.stance_valid = true;
        let verdict = v.validate(Side::Left, Some(&front), None);
        assert_eq!(verdict.error, Some(ErrorCode::ElbowDrifting));
    }

    #[test]
    fn test_validator_simultaneous_flag_fires_once() {
        let mut v = validator();
        let mut flexed = front_metrics();
        flexed.right.phase = Phase::Flexed;
        flexed.left.phase = Phase::Flexed;
        v.observe(&flexed);

        let front = front_metrics();
        let first = v.validate(Side::Right, Some(&front), None);
        assert_eq!(first.error, Some(ErrorCode::BothArmsFlexed));
        let second = v.validate(Side::Right, Some(&front), None);
        assert!(second.is_valid());
    }

    #[test]
    fn test_validator_side_history_bounded() {
        let mut v = validator();
        for i in 0..15 {
            v.record_valid(if i % 2 == 0 { Side::Right } else { Side::Left });
        }
        assert_eq!(v.history().count(), MAX_SIDE_HISTORY);
        assert_eq!(v.history().last(), Some(&Side::Right));
    }

    #[test]
    fn test_uncalibrated_record_uses_defaults() {
        let stale = CalibrationData {
            trunk_tolerance: 5.0,
            vertical_tolerance: 1.0,
            right_min_angle: 100.0,
            calibrated: false,
            ..CalibrationData::default()
        };
        let front = front_metrics();
        let lean = profile_metrics(170.0);
        let mut from_record = CurlValidator::new(&CurlConfig::default(), &stale);
        let mut fresh = validator();
        let expected = fresh.validate(Side::Right, Some(&front), Some(&lean));
        assert!(expected.is_valid());
        assert_eq!(from_record.validate(Side::Right, Some(&front), Some(&lean)), expected);

        // 同じ入力で同じレップ数・判定になる
        let mut a = CurlController::new(&Config::default(), &stale);
        let mut b = controller();
        let tilted = tilt_arm(curl_front(40.0, 180.0), Side::Right, 10.0);
        for frame in [hanging(), tilted, hanging()] {
            for _ in 0..15 {
                let x = a.process_frames(Some(&frame), None);
                let y = b.process_frames(Some(&frame), None);
                assert_eq!(x, y);
            }
        }
        assert_eq!(a.right_reps(), 1);
    }

    #[test]
    fn test_calibrated_thresholds_used() {
        let calibration = CalibrationData {
            right_min_angle: 55.0,
            right_max_angle: 120.0,
            calibrated: true,
            ..CalibrationData::default()
        };
        let config = Config::default();
        let phase = arm_phase_config(&config.curl.front_phase, &calibration, Side::Right);
        assert_eq!(phase.flex_threshold, 55.0);
        assert_eq!(phase.extend_threshold, 120.0);
        assert_eq!(phase.stability_frames, config.curl.front_phase.stability_frames);

        let uncalibrated = arm_phase_config(&config.curl.front_phase, &CalibrationData::default(), Side::Left);
        assert_eq!(uncalibrated, config.curl.front_phase);
    }
}
